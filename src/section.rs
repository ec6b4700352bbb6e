//! Named content sections and the `@parent` inheritance merge
//!
//! A section is *open* while its content is being captured and *sealed* once
//! stopped. Sealing a name that already holds content merges the two: the
//! literal `@parent` in the stored value is replaced by the new content. Since
//! a child template executes before the layout it extends, the child's
//! `@parent` ends up holding the layout's text, and chains of any depth
//! compose the same way.

use std::collections::HashMap;

use tracing::trace;

use crate::error::ViewError;
use crate::output::OutputStack;

/// Placeholder replaced during sealing
pub const PARENT_PLACEHOLDER: &str = "@parent";

/// Sealed sections plus the stack of sections currently capturing output
#[derive(Debug, Default)]
pub struct SectionStack {
    sections: HashMap<String, String>,
    stack: Vec<String>,
}

impl SectionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a section and start capturing output for it
    pub fn start(&mut self, name: &str, output: &mut OutputStack) {
        trace!(section = name, "starting section");
        output.push();
        self.stack.push(name.to_string());
    }

    /// Seal a section with literal content, bypassing output capture
    pub fn inject(&mut self, name: &str, content: &str) {
        self.extend(name, content.to_string());
    }

    /// Seal the most recently opened section, returning its name
    pub fn stop(&mut self, output: &mut OutputStack) -> Result<String, ViewError> {
        let name = self.stack.pop().ok_or(ViewError::NoOpenSection)?;
        let content = output.pop();
        self.extend(&name, content);
        Ok(name)
    }

    /// Seal the most recently opened section by appending to any stored content
    pub fn append(&mut self, output: &mut OutputStack) -> Result<String, ViewError> {
        let name = self.stack.pop().ok_or(ViewError::NoOpenSection)?;
        let content = output.pop();
        self.sections.entry(name.clone()).or_default().push_str(&content);
        Ok(name)
    }

    /// Stop the open section and return its sealed content (`@show`)
    pub fn yield_section(&mut self, output: &mut OutputStack) -> Result<String, ViewError> {
        let name = self.stop(output)?;
        Ok(self.yield_content(&name).to_string())
    }

    /// The sealed content for `name`, or an empty string
    pub fn yield_content(&self, name: &str) -> &str {
        self.sections.get(name).map(|s| s.as_str()).unwrap_or("")
    }

    /// Forget every sealed and open section
    pub fn flush(&mut self) {
        self.sections.clear();
        self.stack.clear();
    }

    pub fn sections(&self) -> &HashMap<String, String> {
        &self.sections
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Number of sections currently capturing
    pub fn open_count(&self) -> usize {
        self.stack.len()
    }

    fn extend(&mut self, name: &str, content: String) {
        let merged = match self.sections.get(name) {
            Some(existing) => existing.replace(PARENT_PLACEHOLDER, &content),
            None => content,
        };
        self.sections.insert(name.to_string(), merged);
    }
}
