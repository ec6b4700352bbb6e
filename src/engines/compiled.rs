//! Directive templates: compile through the cache, then evaluate

use std::path::Path;

use super::script::evaluate;
use super::Engine;
use crate::cache::TemplateCache;
use crate::environment::Environment;
use crate::error::ViewError;
use crate::value::Data;

pub struct CompilerEngine {
    cache: TemplateCache,
}

impl CompilerEngine {
    pub fn new(cache: TemplateCache) -> Self {
        Self { cache }
    }
}

impl Engine for CompilerEngine {
    fn get(&self, env: &Environment, path: &Path, data: &Data) -> Result<String, ViewError> {
        let script = self.cache.load(path)?;
        evaluate(env, path, &script, data)
    }

    fn is_sectionable(&self) -> bool {
        true
    }
}
