//! The script sandbox that executes compiled views
//!
//! A compiled view is text with code islands delimited by `<%` and `%>`.
//! [`Program::parse`] reads it into a block tree, and an [`Evaluator`] walks
//! the tree, writing output and calling back into a [`Host`] whenever the
//! script touches `$__env` or a view value.

pub mod ast;
mod builtins;
mod eval;
mod grammar;
pub mod lexer;
pub mod program;

use crate::error::ViewError;
use crate::value::Value;

pub use builtins::escape_html;
pub use eval::Evaluator;
pub use program::{Node, Program};

/// What a running script can reach outside itself
pub trait Host {
    /// Append text to the current output buffer
    fn write(&self, text: &str);

    /// Call `method` on `$__env` or on a view value returned from it
    fn invoke(&self, target: &Value, method: &str, args: Vec<Value>) -> Result<Value, ViewError>;
}
