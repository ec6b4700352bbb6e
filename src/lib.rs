//! Quire - directive view templates with section inheritance
//!
//! Templates are written with `{{ }}` echoes and `@` directives. The compiler
//! rewrites them into a small script language, the cache keeps compiled
//! scripts on disk, and the environment evaluates them with layouts, sections
//! and shared data.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use quire::{Data, Environment, MemoryFilesystem, ViewConfig};
//!
//! let files = MemoryFilesystem::new()
//!     .with_file("views/layout.quire", "<h1>@yield('title')</h1>")
//!     .with_file("views/home.quire", "@extends('layout')\n@section('title', 'Home')");
//! let env = Environment::with_filesystem(&ViewConfig::new().with_path("views"), Rc::new(files));
//!
//! assert_eq!(env.render("home", Data::new()).unwrap(), "<h1>Home</h1>");
//! ```

pub mod cache;
pub mod compiler;
pub mod config;
pub mod engines;
pub mod environment;
pub mod error;
pub mod events;
pub mod filesystem;
pub mod finder;
pub mod messages;
pub mod output;
pub mod script;
pub mod section;
pub mod value;
pub mod view;

pub use cache::TemplateCache;
pub use compiler::compile_string;
pub use config::ViewConfig;
pub use environment::Environment;
pub use error::{ScriptError, ViewError};
pub use filesystem::{Filesystem, LocalFilesystem, MemoryFilesystem};
pub use messages::{ErrorBag, MessageBag};
pub use value::{Data, Value};
pub use view::View;
