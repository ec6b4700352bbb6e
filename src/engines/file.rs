use std::path::Path;
use std::rc::Rc;

use super::Engine;
use crate::environment::Environment;
use crate::error::ViewError;
use crate::filesystem::Filesystem;
use crate::value::Data;

/// Serves a file's contents as-is
pub struct FileEngine {
    files: Rc<dyn Filesystem>,
}

impl FileEngine {
    pub fn new(files: Rc<dyn Filesystem>) -> Self {
        Self { files }
    }
}

impl Engine for FileEngine {
    fn get(&self, _env: &Environment, path: &Path, _data: &Data) -> Result<String, ViewError> {
        self.files.get(path).map_err(|e| ViewError::io(path, e))
    }

    fn is_sectionable(&self) -> bool {
        false
    }
}
