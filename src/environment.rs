//! The rendering environment
//!
//! An [`Environment`] owns everything views share while rendering: the finder,
//! the engines, shared data, composers, the section stack and the output stack.
//! It is also the `$__env` host that compiled scripts call back into.
//!
//! The environment is single-threaded. Its state sits behind `Cell` and
//! `RefCell`, and no borrow is held while a nested view renders.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, error, warn};

use crate::cache::TemplateCache;
use crate::config::ViewConfig;
use crate::engines::{
    CompilerEngine, Engine, EngineFactory, EngineResolver, FileEngine, ScriptEngine, COMPILER,
    FILE, SCRIPT,
};
use crate::error::ViewError;
use crate::events::{composing_event, Dispatcher, Listener};
use crate::filesystem::{Filesystem, LocalFilesystem};
use crate::finder::{FileViewFinder, ViewFinder};
use crate::messages::ErrorBag;
use crate::output::OutputStack;
use crate::script::{escape_html, Host};
use crate::section::SectionStack;
use crate::value::{Data, PendingView, Value};
use crate::view::View;

/// Extensions known out of the box, in priority order, with their engines
pub const DEFAULT_EXTENSIONS: [(&str, &str); 3] =
    [("quire", COMPILER), ("qs", SCRIPT), ("html", FILE)];

/// Prefix marking a `renderEach` empty value as literal text
const RAW_PREFIX: &str = "raw|";

type ErrorHandler = Rc<dyn Fn(&ViewError)>;

pub struct Environment {
    finder: RefCell<Box<dyn ViewFinder>>,
    engines: EngineResolver,
    extensions: RefCell<Vec<(String, String)>>,
    events: Dispatcher,
    shared: RefCell<Data>,
    sections: RefCell<SectionStack>,
    output: RefCell<OutputStack>,
    render_count: Cell<usize>,
    error_handler: RefCell<ErrorHandler>,
}

impl Environment {
    /// An environment over a prepared finder and engine registry
    ///
    /// Extensions start as [`DEFAULT_EXTENSIONS`]; the finder should search
    /// the same ones.
    pub fn new(finder: Box<dyn ViewFinder>, engines: EngineResolver) -> Self {
        let extensions = DEFAULT_EXTENSIONS
            .iter()
            .map(|(ext, engine)| (ext.to_string(), engine.to_string()))
            .collect();
        let default_handler: ErrorHandler = Rc::new(|e: &ViewError| {
            error!(error = %e, "failed to render view");
        });
        Self {
            finder: RefCell::new(finder),
            engines,
            extensions: RefCell::new(extensions),
            events: Dispatcher::new(),
            shared: RefCell::new(Data::new()),
            sections: RefCell::new(SectionStack::new()),
            output: RefCell::new(OutputStack::new()),
            render_count: Cell::new(0),
            error_handler: RefCell::new(default_handler),
        }
    }

    /// An environment reading views from the local disk
    pub fn from_config(config: &ViewConfig) -> Self {
        Self::with_filesystem(config, Rc::new(LocalFilesystem))
    }

    /// An environment with the default engines and a finder over `files`
    pub fn with_filesystem(config: &ViewConfig, files: Rc<dyn Filesystem>) -> Self {
        let engines = EngineResolver::new();

        let compiler_files = Rc::clone(&files);
        let cache_path = config.cache.clone();
        engines.register(COMPILER, move || -> Rc<dyn Engine> {
            let cache = TemplateCache::new(Rc::clone(&compiler_files), cache_path.clone());
            Rc::new(CompilerEngine::new(cache))
        });
        let script_files = Rc::clone(&files);
        engines.register(SCRIPT, move || -> Rc<dyn Engine> {
            Rc::new(ScriptEngine::new(Rc::clone(&script_files)))
        });
        let file_files = Rc::clone(&files);
        engines.register(FILE, move || -> Rc<dyn Engine> {
            Rc::new(FileEngine::new(Rc::clone(&file_files)))
        });

        let extensions = DEFAULT_EXTENSIONS
            .iter()
            .map(|(ext, _)| ext.to_string())
            .collect();
        let mut finder = FileViewFinder::new(files, config.paths.clone(), extensions);
        for (namespace, hints) in &config.namespaces {
            finder.add_namespace(namespace, hints.clone());
        }

        let env = Self::new(Box::new(finder), engines);
        env.share("errors", ErrorBag::new());
        for (key, value) in &config.shared {
            env.share(key.clone(), Value::from(value.clone()));
        }
        env
    }

    /// Locate `name` and bind it to `data`
    pub fn make(&self, name: &str, data: Data) -> Result<View<'_>, ViewError> {
        let path = self.finder.borrow_mut().find(name)?;
        let engine = self.engine_from_path(&path)?;
        Ok(View::new(self, name, path, engine, data))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.finder.borrow_mut().find(name).is_ok()
    }

    /// Make and render in one step
    pub fn render(&self, name: &str, data: Data) -> Result<String, ViewError> {
        self.make(name, data)?.render()
    }

    /// Render `view` once per item of `collection` and concatenate the results
    ///
    /// Each item is bound as `iterator`, with its index or map key as `key`.
    /// An empty collection renders the view named by `empty`, or the text
    /// after `raw|` when `empty` carries that prefix.
    pub fn render_each(
        &self,
        view: &str,
        collection: &Value,
        iterator: &str,
        empty: &str,
    ) -> Result<String, ViewError> {
        let items: Vec<(Value, Value)> = match collection {
            Value::Null => Vec::new(),
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| (Value::from(index), item.clone()))
                .collect(),
            Value::Map(map) => map
                .iter()
                .map(|(key, item)| (Value::from(key.as_str()), item.clone()))
                .collect(),
            other => {
                return Err(ViewError::runtime(format!(
                    "renderEach() expects an array, {} given",
                    other.type_name()
                )))
            }
        };

        if items.is_empty() {
            return match empty.strip_prefix(RAW_PREFIX) {
                Some(raw) => Ok(raw.to_string()),
                None => self.render(empty, Data::new()),
            };
        }

        let mut output = String::new();
        for (key, item) in items {
            let mut data = Data::new();
            data.insert("key".to_string(), key);
            data.insert(iterator.to_string(), item);
            output.push_str(&self.render(view, data)?);
        }
        Ok(output)
    }

    /// Make `value` available to every view under `key`
    pub fn share(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.shared.borrow_mut().insert(key.into(), value.into());
    }

    pub fn shared(&self) -> Data {
        self.shared.borrow().clone()
    }

    /// Run `callback` on each listed view just before it evaluates
    pub fn composer(&self, views: &[&str], callback: impl Fn(&mut View<'_>) + 'static) {
        let listener: Listener = Rc::new(callback);
        for view in views {
            self.events
                .listen(composing_event(view), Rc::clone(&listener));
        }
    }

    pub fn call_composer(&self, view: &mut View<'_>) {
        let event = composing_event(view.name());
        self.events.fire(&event, view);
    }

    /// Open a section, or seal it at once when `content` is non-empty
    pub fn start_section(&self, name: &str, content: &str) {
        if content.is_empty() {
            let mut output = self.output.borrow_mut();
            self.sections.borrow_mut().start(name, &mut output);
        } else {
            self.inject(name, content);
        }
    }

    pub fn inject(&self, name: &str, content: &str) {
        self.sections.borrow_mut().inject(name, content);
    }

    pub fn stop_section(&self) -> Result<String, ViewError> {
        let mut output = self.output.borrow_mut();
        self.sections.borrow_mut().stop(&mut output)
    }

    pub fn append_section(&self) -> Result<String, ViewError> {
        let mut output = self.output.borrow_mut();
        self.sections.borrow_mut().append(&mut output)
    }

    pub fn yield_section(&self) -> Result<String, ViewError> {
        let mut output = self.output.borrow_mut();
        self.sections.borrow_mut().yield_section(&mut output)
    }

    /// Sealed content for `name`, or `default` escaped as HTML
    pub fn yield_content(&self, name: &str, default: &str) -> String {
        let sections = self.sections.borrow();
        if sections.has_section(name) {
            sections.yield_content(name).to_string()
        } else {
            escape_html(default)
        }
    }

    pub fn flush_sections(&self) {
        debug!("flushing sections");
        self.sections.borrow_mut().flush();
    }

    pub fn sections(&self) -> HashMap<String, String> {
        self.sections.borrow().sections().clone()
    }

    pub fn increment_render(&self) {
        self.render_count.set(self.render_count.get() + 1);
    }

    pub fn decrement_render(&self) {
        match self.render_count.get().checked_sub(1) {
            Some(count) => self.render_count.set(count),
            None => warn!("render counter decremented below zero"),
        }
    }

    /// Whether no view is currently rendering
    pub fn done_rendering(&self) -> bool {
        self.render_count.get() == 0
    }

    pub fn render_count(&self) -> usize {
        self.render_count.get()
    }

    pub fn add_location(&self, location: impl Into<PathBuf>) {
        self.finder.borrow_mut().add_location(location.into());
    }

    pub fn add_namespace(&self, namespace: &str, hints: Vec<PathBuf>) {
        self.finder.borrow_mut().add_namespace(namespace, hints);
    }

    /// Map `extension` to `engine`, ahead of every known extension
    ///
    /// When `factory` is given it is registered under `engine`, replacing any
    /// engine of that name.
    pub fn add_extension(&self, extension: &str, engine: &str, factory: Option<EngineFactory>) {
        self.finder.borrow_mut().add_extension(extension);
        if let Some(factory) = factory {
            self.engines.register(engine, factory);
        }
        let mut extensions = self.extensions.borrow_mut();
        extensions.retain(|(existing, _)| existing != extension);
        extensions.insert(0, (extension.to_string(), engine.to_string()));
    }

    pub fn engines(&self) -> &EngineResolver {
        &self.engines
    }

    /// Replace the handler that receives failures from `Display` rendering
    pub fn set_error_handler(&self, handler: impl Fn(&ViewError) + 'static) {
        *self.error_handler.borrow_mut() = Rc::new(handler);
    }

    pub fn handle_error(&self, err: &ViewError) {
        let handler = Rc::clone(&self.error_handler.borrow());
        handler(err);
    }

    pub(crate) fn output(&self) -> &RefCell<OutputStack> {
        &self.output
    }

    /// Evaluate `view`, flushing sections once the outermost render ends
    pub(crate) fn render_view(&self, mut view: View<'_>) -> Result<String, ViewError> {
        self.increment_render();
        debug!(view = view.name(), depth = self.render_count(), "rendering view");

        let result = self.evaluate(&mut view);
        self.decrement_render();
        let done = self.done_rendering();

        match result {
            Ok((output, sectionable)) => {
                if done && sectionable {
                    self.flush_sections();
                }
                Ok(output)
            }
            Err(e) => {
                if done {
                    self.flush_sections();
                }
                Err(e)
            }
        }
    }

    fn evaluate(&self, view: &mut View<'_>) -> Result<(String, bool), ViewError> {
        self.call_composer(view);
        let engine = self.engines.resolve(view.engine())?;
        let data = self.gather_data(view)?;
        let output = engine.get(self, view.path(), &data)?;
        Ok((output, engine.is_sectionable()))
    }

    /// Shared data overlaid by the view's own, with nested views rendered
    fn gather_data(&self, view: &View<'_>) -> Result<Data, ViewError> {
        let mut data = self.shared();
        for (key, value) in view.data() {
            data.insert(key.clone(), value.clone());
        }
        for value in data.values_mut() {
            if let Value::View(pending) = value {
                let nested = View::from_pending(self, (**pending).clone());
                *value = Value::Str(nested.render()?);
            }
        }
        Ok(data)
    }

    fn engine_from_path(&self, path: &Path) -> Result<String, ViewError> {
        let file = path.to_string_lossy();
        self.extensions
            .borrow()
            .iter()
            .find(|(extension, _)| file.ends_with(&format!(".{}", extension)))
            .map(|(_, engine)| engine.clone())
            .ok_or_else(|| ViewError::UnknownExtension {
                path: path.to_path_buf(),
            })
    }

    fn invoke_env(&self, method: &str, args: Vec<Value>) -> Result<Value, ViewError> {
        match method {
            "make" => {
                let name = text_arg(&args, 0, method)?;
                let mut data = data_arg(args.get(2), method)?;
                data.extend(data_arg(args.get(1), method)?);
                let view = self.make(&name, data)?;
                Ok(Value::View(Box::new(view.to_pending())))
            }
            "renderEach" => {
                let view = text_arg(&args, 0, method)?;
                let collection = args.get(1).cloned().unwrap_or_default();
                let iterator = text_arg(&args, 2, method)?;
                let empty = match args.get(3) {
                    Some(value) => value.to_output()?,
                    None => RAW_PREFIX.to_string(),
                };
                Ok(Value::Str(self.render_each(&view, &collection, &iterator, &empty)?))
            }
            "yieldContent" => {
                let name = text_arg(&args, 0, method)?;
                let default = match args.get(1) {
                    Some(value) => value.to_output()?,
                    None => String::new(),
                };
                Ok(Value::Str(self.yield_content(&name, &default)))
            }
            "startSection" => {
                let name = text_arg(&args, 0, method)?;
                let content = match args.get(1) {
                    Some(value) => value.to_output()?,
                    None => String::new(),
                };
                self.start_section(&name, &content);
                Ok(Value::Null)
            }
            "inject" => {
                let name = text_arg(&args, 0, method)?;
                let content = text_arg(&args, 1, method)?;
                self.inject(&name, &content);
                Ok(Value::Null)
            }
            "stopSection" => Ok(Value::Str(self.stop_section()?)),
            "appendSection" => Ok(Value::Str(self.append_section()?)),
            "yieldSection" => Ok(Value::Str(self.yield_section()?)),
            "exists" => Ok(Value::Bool(self.exists(&text_arg(&args, 0, method)?))),
            other => Err(ViewError::runtime(format!(
                "call to undefined method Environment::{}()",
                other
            ))),
        }
    }

    fn invoke_view(
        &self,
        pending: &PendingView,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, ViewError> {
        match method {
            "render" => {
                let view = View::from_pending(self, pending.clone());
                Ok(Value::Str(view.render()?))
            }
            "with" => {
                let mut pending = pending.clone();
                match args.as_slice() {
                    [Value::Map(data)] => pending.data.extend(data.clone()),
                    [key, value] => {
                        pending.data.insert(key.to_output()?, value.clone());
                    }
                    _ => {
                        return Err(ViewError::runtime(
                            "View::with() expects a key and value or an array",
                        ))
                    }
                }
                Ok(Value::View(Box::new(pending)))
            }
            other => Err(ViewError::runtime(format!(
                "call to undefined method View::{}()",
                other
            ))),
        }
    }
}

impl Host for Environment {
    fn write(&self, text: &str) {
        self.output.borrow_mut().write(text);
    }

    fn invoke(&self, target: &Value, method: &str, args: Vec<Value>) -> Result<Value, ViewError> {
        match target {
            Value::Env => self.invoke_env(method, args),
            Value::View(pending) => self.invoke_view(pending, method, args),
            other => Err(ViewError::runtime(format!(
                "call to a member function {}() on {}",
                method,
                other.type_name()
            ))),
        }
    }
}

fn text_arg(args: &[Value], index: usize, method: &str) -> Result<String, ViewError> {
    match args.get(index) {
        Some(value) => value.to_output(),
        None => Err(ViewError::runtime(format!(
            "{}() expects at least {} arguments",
            method,
            index + 1
        ))),
    }
}

/// View data from an optional script argument; lists are keyed by index
fn data_arg(value: Option<&Value>, method: &str) -> Result<Data, ViewError> {
    match value {
        None | Some(Value::Null) => Ok(Data::new()),
        Some(Value::Map(data)) => Ok(data.clone()),
        Some(Value::List(items)) => Ok(items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item.clone()))
            .collect()),
        Some(other) => Err(ViewError::runtime(format!(
            "{}() expects view data to be an array, {} given",
            method,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::filesystem::MemoryFilesystem;
    use crate::messages::MessageBag;

    fn env(files: MemoryFilesystem) -> Environment {
        Environment::with_filesystem(&ViewConfig::new().with_path("views"), Rc::new(files))
    }

    fn data(pairs: &[(&str, Value)]) -> Data {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_section_then_yield_in_one_view() {
        let env = env(MemoryFilesystem::new().with_file(
            "views/page.quire",
            "@section('foo')\nhi\n@stop\n@yield('foo')",
        ));
        assert_eq!(env.render("page", Data::new()).unwrap(), "hi");
        assert!(env.sections().is_empty());
        assert!(env.done_rendering());
    }

    #[test]
    fn test_extension_selects_the_engine() {
        let env = env(MemoryFilesystem::new()
            .with_file("views/raw.html", "{{ $untouched }}")
            .with_file("views/script.qs", "<% echo strtoupper($word); %>"));
        assert_eq!(env.render("raw", Data::new()).unwrap(), "{{ $untouched }}");
        let rendered = env
            .render("script", data(&[("word", Value::from("loud"))]))
            .unwrap();
        assert_eq!(rendered, "LOUD");
    }

    #[test]
    fn test_unknown_extension() {
        let env = env(MemoryFilesystem::new().with_file("views/notes.txt", ""));
        let finder = FileViewFinder::new(
            Rc::new(MemoryFilesystem::new().with_file("views/notes.txt", "")),
            vec![PathBuf::from("views")],
            vec!["txt".to_string()],
        );
        let custom = Environment::new(Box::new(finder), EngineResolver::new());
        let err = custom.make("notes", Data::new()).unwrap_err();
        assert!(matches!(err, ViewError::UnknownExtension { .. }));
        assert!(!env.exists("notes"));
    }

    #[test]
    fn test_added_extension_with_engine() {
        let env = env(MemoryFilesystem::new().with_file("views/notes.txt", "plain"));
        let factory: EngineFactory = Box::new(|| -> Rc<dyn Engine> {
            Rc::new(FileEngine::new(Rc::new(
                MemoryFilesystem::new().with_file("views/notes.txt", "from custom engine"),
            )))
        });
        env.add_extension("txt", "text", Some(factory));
        assert!(env.engines().is_registered("text"));
        assert_eq!(env.render("notes", Data::new()).unwrap(), "from custom engine");
    }

    #[test]
    fn test_shared_data_is_overridden_by_view_data() {
        let env = env(MemoryFilesystem::new().with_file("views/greet.quire", "{{ $who }}/{{ $site }}"));
        env.share("who", "everyone");
        env.share("site", "quire");
        let rendered = env
            .render("greet", data(&[("who", Value::from("Ada"))]))
            .unwrap();
        assert_eq!(rendered, "Ada/quire");
        assert_eq!(env.shared()["who"], Value::from("everyone"));
    }

    #[test]
    fn test_errors_are_shared_by_default() {
        let env = env(MemoryFilesystem::new().with_file(
            "views/form.quire",
            "@error('email')<b>{{ $message }}</b>@enderror",
        ));
        assert_eq!(env.render("form", Data::new()).unwrap(), "");

        let errors = ErrorBag::new().with_bag(
            "default",
            MessageBag::new().with("email", "The email is invalid."),
        );
        env.share("errors", errors);
        assert_eq!(
            env.render("form", Data::new()).unwrap(),
            "<b>The email is invalid.</b>"
        );
    }

    #[test]
    fn test_composer_binds_data_before_render() {
        let env = env(MemoryFilesystem::new().with_file("views/nav.quire", "{{ $user }}"));
        env.composer(&["nav"], |view| view.set("user", "grace"));
        assert_eq!(env.render("nav", Data::new()).unwrap(), "grace");
    }

    #[test]
    fn test_include_merges_explicit_data_over_parent_data() {
        let env = env(MemoryFilesystem::new()
            .with_file("views/outer.quire", "@include('inner', ['b' => 'B'])")
            .with_file("views/inner.quire", "{{ $a }}{{ $b }}"));
        let rendered = env
            .render(
                "outer",
                data(&[("a", Value::from("a")), ("b", Value::from("b"))]),
            )
            .unwrap();
        assert_eq!(rendered, "aB");
    }

    #[test]
    fn test_render_each_over_items_and_empty() {
        let env = env(MemoryFilesystem::new()
            .with_file("views/row.quire", "[{{ $key }}:{{ $item }}]")
            .with_file("views/none.quire", "nothing")
            .with_file(
                "views/list.quire",
                "@each('row', $items, 'item')\n|@each('row', [], 'item', 'none')\n|@each('row', [], 'item')",
            ));
        let items = Value::from(vec!["x", "y"]);
        let rendered = env.render("list", data(&[("items", items)])).unwrap();
        assert_eq!(rendered, "[0:x][1:y]|nothing|");
    }

    #[test]
    fn test_render_each_raw_empty() {
        let env = env(MemoryFilesystem::new());
        let rendered = env
            .render_each("row", &Value::List(Vec::new()), "item", "raw|<p>none</p>")
            .unwrap();
        assert_eq!(rendered, "<p>none</p>");
    }

    #[test]
    fn test_yield_content_default_is_escaped() {
        let env = env(MemoryFilesystem::new());
        assert_eq!(env.yield_content("title", "<none>"), "&lt;none&gt;");
        env.inject("title", "<b>Home</b>");
        assert_eq!(env.yield_content("title", "<none>"), "<b>Home</b>");
    }

    #[test]
    fn test_start_section_with_content_injects() {
        let env = env(MemoryFilesystem::new());
        env.start_section("title", "Home");
        assert_eq!(env.sections().get("title"), Some(&"Home".to_string()));
        assert!(matches!(env.stop_section(), Err(ViewError::NoOpenSection)));
    }

    #[test]
    fn test_nested_views_in_data_are_rendered() {
        let env = env(MemoryFilesystem::new()
            .with_file("views/card.quire", "card")
            .with_file("views/page.quire", "<{{ $body }}>"));
        let card = env.make("card", Data::new()).unwrap();
        let body = Value::View(Box::new(card.to_pending()));
        assert_eq!(env.render("page", data(&[("body", body)])).unwrap(), "<card>");
    }

    #[test]
    fn test_render_counter_is_balanced_after_errors() {
        let env = env(MemoryFilesystem::new()
            .with_file("views/outer.quire", "@section('s')x@stop\n@include('inner')")
            .with_file("views/inner.quire", "{{ $missing }}"));
        assert!(env.render("outer", Data::new()).is_err());
        assert_eq!(env.render_count(), 0);
        assert!(env.sections().is_empty());
        assert_eq!(env.output().borrow().depth(), 0);
    }

    #[test]
    fn test_decrement_at_zero_is_a_no_op() {
        let env = env(MemoryFilesystem::new());
        env.decrement_render();
        assert_eq!(env.render_count(), 0);
        env.increment_render();
        assert!(!env.done_rendering());
        env.decrement_render();
        assert!(env.done_rendering());
    }

    #[test]
    fn test_file_views_do_not_flush_sections() {
        let env = env(MemoryFilesystem::new().with_file("views/raw.html", "raw"));
        env.inject("kept", "yes");
        env.render("raw", Data::new()).unwrap();
        assert!(env.sections().contains_key("kept"));
    }

    #[test]
    fn test_unknown_env_method() {
        let env = env(MemoryFilesystem::new().with_file("views/bad.quire", "<% $__env->teleport(); %>"));
        let err = env.render("bad", Data::new()).unwrap_err();
        assert_eq!(
            err.root_cause().to_string(),
            "call to undefined method Environment::teleport()"
        );
    }

    #[test]
    fn test_make_with_from_a_script() {
        let env = env(MemoryFilesystem::new()
            .with_file("views/badge.quire", "{{ $label }}")
            .with_file(
                "views/page.quire",
                "<% echo $__env->make('badge')->with('label', 'new')->render(); %>",
            ));
        assert_eq!(env.render("page", Data::new()).unwrap(), "new");
    }

    #[test]
    fn test_custom_error_handler() {
        let env = env(MemoryFilesystem::new());
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        env.set_error_handler(move |_| *counter.borrow_mut() += 1);
        env.handle_error(&ViewError::NoOpenSection);
        assert_eq!(*calls.borrow(), 1);
    }
}
