//! Engines turn a located view file plus its data into output text

mod compiled;
mod file;
mod script;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::ViewError;
use crate::value::Data;

pub use compiled::CompilerEngine;
pub use file::FileEngine;
pub use script::ScriptEngine;

/// Engine for directive templates, compiled and cached before evaluation
pub const COMPILER: &str = "compiler";
/// Engine for files already written in the script language
pub const SCRIPT: &str = "script";
/// Engine that returns file contents untouched
pub const FILE: &str = "file";

pub trait Engine {
    /// Produce the output of the view at `path`
    fn get(&self, env: &Environment, path: &Path, data: &Data) -> Result<String, ViewError>;

    /// Whether views rendered by this engine take part in sections, so the
    /// environment flushes them once the outermost render completes
    fn is_sectionable(&self) -> bool;
}

pub type EngineFactory = Box<dyn Fn() -> Rc<dyn Engine>>;

/// Engine registry keyed by name; each engine is built once, on first use
#[derive(Default)]
pub struct EngineResolver {
    factories: RefCell<HashMap<String, EngineFactory>>,
    resolved: RefCell<HashMap<String, Rc<dyn Engine>>>,
}

impl EngineResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any engine already built under `name`
    pub fn register(&self, name: impl Into<String>, factory: impl Fn() -> Rc<dyn Engine> + 'static) {
        let name = name.into();
        self.resolved.borrow_mut().remove(&name);
        self.factories.borrow_mut().insert(name, Box::new(factory));
    }

    pub fn resolve(&self, name: &str) -> Result<Rc<dyn Engine>, ViewError> {
        if let Some(engine) = self.resolved.borrow().get(name) {
            return Ok(Rc::clone(engine));
        }

        let engine = {
            let factories = self.factories.borrow();
            let factory = factories.get(name).ok_or_else(|| ViewError::UnknownEngine {
                name: name.to_string(),
            })?;
            factory()
        };
        self.resolved
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&engine));
        Ok(engine)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.borrow().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFilesystem;
    use std::cell::Cell;

    struct Fixed(&'static str);

    impl Engine for Fixed {
        fn get(&self, _env: &Environment, _path: &Path, _data: &Data) -> Result<String, ViewError> {
            Ok(self.0.to_string())
        }

        fn is_sectionable(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_engines_are_built_once() {
        let resolver = EngineResolver::new();
        let built = Rc::new(Cell::new(0));
        let counter = Rc::clone(&built);
        resolver.register("fixed", move || {
            counter.set(counter.get() + 1);
            Rc::new(Fixed("out")) as Rc<dyn Engine>
        });

        resolver.resolve("fixed").unwrap();
        resolver.resolve("fixed").unwrap();
        assert_eq!(built.get(), 1);
    }

    #[test]
    fn test_unknown_engine() {
        let resolver = EngineResolver::new();
        let err = resolver.resolve("twig").err().unwrap();
        assert!(matches!(err, ViewError::UnknownEngine { ref name } if name == "twig"));
    }

    #[test]
    fn test_register_replaces_built_engine() {
        let resolver = EngineResolver::new();
        resolver.register("x", || Rc::new(Fixed("a")) as Rc<dyn Engine>);
        assert!(!resolver.resolve("x").unwrap().is_sectionable());
        resolver.register("x", || {
            Rc::new(ScriptEngine::new(Rc::new(MemoryFilesystem::new()))) as Rc<dyn Engine>
        });
        assert!(resolver.is_registered("x"));
        assert!(resolver.resolve("x").unwrap().is_sectionable());
    }
}
