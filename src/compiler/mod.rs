//! Template compiler: directive text in, script text out
//!
//! Compilation is a fold of [`PIPELINE`] over the source. Each pass is a plain
//! regex substitution, so the compiler never fails; anything it does not
//! recognise passes through untouched and is left for the script reader to
//! reject.

pub mod matcher;
mod passes;

use tracing::trace;

pub use passes::{Pass, PIPELINE};

/// Run every pass over `source`, in pipeline order
pub fn compile_string(source: &str) -> String {
    PIPELINE.iter().fold(source.to_string(), |text, pass| {
        let next = (pass.apply)(&text);
        if next != text {
            trace!(pass = pass.name, "pass rewrote template");
        }
        next
    })
}

/// The pass names in the order they run
pub fn pass_names() -> Vec<&'static str> {
    PIPELINE.iter().map(|pass| pass.name).collect()
}
