//! Compiled-artifact cache
//!
//! Each source template compiles to one file under the cache directory, named
//! by the hex SHA-256 of the source path. An artifact is fresh only while it
//! is strictly newer than its source.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::compiler::compile_string;
use crate::error::ViewError;
use crate::filesystem::Filesystem;

pub struct TemplateCache {
    files: Rc<dyn Filesystem>,
    cache_path: Option<PathBuf>,
}

impl TemplateCache {
    /// A cache writing under `cache_path`, or a pass-through one when `None`
    pub fn new(files: Rc<dyn Filesystem>, cache_path: Option<PathBuf>) -> Self {
        Self { files, cache_path }
    }

    /// Where the compiled form of `source` lives, if caching is enabled
    pub fn compiled_path(&self, source: &Path) -> Option<PathBuf> {
        self.cache_path
            .as_ref()
            .map(|root| root.join(path_hash(source)))
    }

    /// Whether `source` must be recompiled before it can be evaluated
    pub fn is_expired(&self, source: &Path) -> Result<bool, ViewError> {
        let Some(compiled) = self.compiled_path(source) else {
            return Ok(true);
        };
        if !self.files.exists(&compiled) {
            return Ok(true);
        }

        let source_modified = self
            .files
            .last_modified(source)
            .map_err(|e| ViewError::io(source, e))?;
        let compiled_modified = self
            .files
            .last_modified(&compiled)
            .map_err(|e| ViewError::io(&compiled, e))?;
        Ok(source_modified >= compiled_modified)
    }

    /// Compile `source` and persist the result when caching is enabled
    pub fn compile(&self, source: &Path) -> Result<String, ViewError> {
        let contents = self
            .files
            .get(source)
            .map_err(|e| ViewError::io(source, e))?;
        let compiled = compile_string(&contents);

        if let Some(target) = self.compiled_path(source) {
            debug!(source = %source.display(), target = %target.display(), "writing compiled view");
            self.files
                .put(&target, &compiled)
                .map_err(|e| ViewError::io(&target, e))?;
        }
        Ok(compiled)
    }

    /// The compiled script for `source`, compiling only when the artifact is stale
    pub fn load(&self, source: &Path) -> Result<String, ViewError> {
        if self.is_expired(source)? {
            debug!(source = %source.display(), "compiled view is stale");
            return self.compile(source);
        }

        // Not expired implies caching is enabled and the artifact exists
        let Some(compiled) = self.compiled_path(source) else {
            return self.compile(source);
        };
        debug!(source = %source.display(), "using cached view");
        self.files
            .get(&compiled)
            .map_err(|e| ViewError::io(&compiled, e))
    }
}

/// Stable file name for a source path
pub fn path_hash(source: &Path) -> String {
    hex::encode(Sha256::digest(source.to_string_lossy().as_bytes()))
}
