//! A located view bound to its data, ready to render

use std::fmt;
use std::ops::Index;
use std::path::{Path, PathBuf};

use crate::environment::Environment;
use crate::error::ViewError;
use crate::value::{Data, PendingView, Value};

static NULL: Value = Value::Null;

/// A view file, the engine that evaluates it and the data it renders with
///
/// Created by [`Environment::make`]. Rendering borrows the environment, so
/// sections and the output stack are shared with every other view made by it.
#[derive(Clone)]
pub struct View<'env> {
    env: &'env Environment,
    name: String,
    path: PathBuf,
    engine: String,
    data: Data,
}

impl<'env> View<'env> {
    pub(crate) fn new(
        env: &'env Environment,
        name: impl Into<String>,
        path: PathBuf,
        engine: impl Into<String>,
        data: Data,
    ) -> Self {
        Self {
            env,
            name: name.into(),
            path,
            engine: engine.into(),
            data,
        }
    }

    pub(crate) fn from_pending(env: &'env Environment, pending: PendingView) -> Self {
        Self::new(env, pending.name, pending.path, pending.engine, pending.data)
    }

    pub(crate) fn to_pending(&self) -> PendingView {
        PendingView {
            name: self.name.clone(),
            path: self.path.clone(),
            engine: self.engine.clone(),
            data: self.data.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the engine that evaluates this view
    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn environment(&self) -> &'env Environment {
        self.env
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    /// Bind one more piece of data
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Bind every entry of `data`, overriding existing keys
    pub fn with_data(mut self, data: Data) -> Self {
        self.data.extend(data);
        self
    }

    /// Evaluate the view and return its output
    pub fn render(&self) -> Result<String, ViewError> {
        self.env.render_view(self.clone())
    }

    /// Render, passing any failure to `handler` and yielding empty output instead
    pub fn render_with_handler(&self, handler: impl FnOnce(ViewError)) -> String {
        self.render().unwrap_or_else(|e| {
            handler(e);
            String::new()
        })
    }
}

impl fmt::Debug for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("engine", &self.engine)
            .field("data", &self.data)
            .finish()
    }
}

/// Missing keys read as null
impl Index<&str> for View<'_> {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.data.get(key).unwrap_or(&NULL)
    }
}

/// Renders the view; failures go to the environment's error handler
impl fmt::Display for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Ok(output) => f.write_str(&output),
            Err(e) => {
                self.env.handle_error(&e);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::ViewConfig;
    use crate::filesystem::MemoryFilesystem;

    fn env(files: MemoryFilesystem) -> Environment {
        Environment::with_filesystem(&ViewConfig::new().with_path("views"), Rc::new(files))
    }

    #[test]
    fn test_data_accessors() {
        let env = env(MemoryFilesystem::new().with_file("views/home.quire", ""));
        let mut view = env.make("home", Data::new()).unwrap().with("title", "Home");
        assert!(view.contains("title"));
        assert_eq!(view["title"], Value::from("Home"));
        assert_eq!(view["missing"], Value::Null);

        view.set("count", 2);
        assert_eq!(view.get("count"), Some(&Value::Int(2)));
        assert_eq!(view.remove("title"), Some(Value::from("Home")));
        assert!(!view.contains("title"));
    }

    #[test]
    fn test_view_knows_where_it_came_from() {
        let env = env(MemoryFilesystem::new().with_file("views/pages/about.html", ""));
        let view = env.make("pages.about", Data::new()).unwrap();
        assert_eq!(view.name(), "pages.about");
        assert_eq!(view.path(), PathBuf::from("views/pages/about.html"));
        assert_eq!(view.engine(), crate::engines::FILE);
    }

    #[test]
    fn test_display_renders_output() {
        let env = env(MemoryFilesystem::new().with_file("views/hello.quire", "Hello, {{ $name }}!"));
        let view = env.make("hello", Data::new()).unwrap().with("name", "Ada");
        assert_eq!(view.to_string(), "Hello, Ada!");
    }

    #[test]
    fn test_display_routes_errors_to_the_handler() {
        let env = env(MemoryFilesystem::new().with_file("views/broken.quire", "{{ $missing }}"));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        env.set_error_handler(move |e| sink.borrow_mut().push(e.root_cause().to_string()));

        let view = env.make("broken", Data::new()).unwrap();
        assert_eq!(view.to_string(), "");
        assert_eq!(*seen.borrow(), vec!["undefined variable $missing".to_string()]);
    }

    #[test]
    fn test_render_with_handler() {
        let env = env(MemoryFilesystem::new().with_file("views/broken.quire", "@stop"));
        let view = env.make("broken", Data::new()).unwrap();
        let mut failed = false;
        let output = view.render_with_handler(|e| {
            failed = matches!(e.root_cause(), ViewError::NoOpenSection);
        });
        assert_eq!(output, "");
        assert!(failed);
    }
}
