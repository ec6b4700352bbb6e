//! Evaluation of script-language views
//!
//! A view's whole output is trimmed at both ends. Section content is stored
//! exactly as captured, so newlines inside a section survive into the layout
//! that yields it.

use std::path::Path;
use std::rc::Rc;

use tracing::trace;

use super::Engine;
use crate::environment::Environment;
use crate::error::ViewError;
use crate::filesystem::Filesystem;
use crate::output::BufferScope;
use crate::script::{Evaluator, Program};
use crate::value::Data;

/// Evaluates files that are already written in the script language
pub struct ScriptEngine {
    files: Rc<dyn Filesystem>,
}

impl ScriptEngine {
    pub fn new(files: Rc<dyn Filesystem>) -> Self {
        Self { files }
    }
}

impl Engine for ScriptEngine {
    fn get(&self, env: &Environment, path: &Path, data: &Data) -> Result<String, ViewError> {
        let script = self.files.get(path).map_err(|e| ViewError::io(path, e))?;
        evaluate(env, path, &script, data)
    }

    fn is_sectionable(&self) -> bool {
        true
    }
}

/// Run `script` with its own output buffer and return what it wrote, trimmed
///
/// Whatever the script leaves on the output stack is discarded if it fails.
pub(crate) fn evaluate(
    env: &Environment,
    path: &Path,
    script: &str,
    data: &Data,
) -> Result<String, ViewError> {
    let program = Program::parse(script).map_err(|source| ViewError::Script {
        path: path.to_path_buf(),
        source,
    })?;
    trace!(path = %path.display(), nodes = program.nodes.len(), "evaluating script");

    let scope = BufferScope::enter(env.output());
    Evaluator::new(env, path, data).run(&program.nodes)?;
    Ok(scope.finish().trim().to_string())
}
