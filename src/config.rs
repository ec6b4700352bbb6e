//! View configuration loaded from TOML
//!
//! ```toml
//! paths = ["resources/views"]
//! cache = "storage/views"
//!
//! [namespaces]
//! mail = ["vendor/mail/views"]
//!
//! [shared]
//! app_name = "Quire"
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ViewError;

/// Where views live, where compiled views go and what every view can see
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    /// Search locations, in priority order
    pub paths: Vec<PathBuf>,

    /// Directory for compiled views; caching is off when absent
    pub cache: Option<PathBuf>,

    /// Hint paths per namespace, for names like `mail::welcome`
    pub namespaces: IndexMap<String, Vec<PathBuf>>,

    /// Data shared with every view
    pub shared: IndexMap<String, serde_json::Value>,
}

impl ViewConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, ViewError> {
        let content = std::fs::read_to_string(path).map_err(|e| ViewError::io(path, e))?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ViewError> {
        Ok(toml::from_str(content)?)
    }

    /// Append a search location
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache = Some(path.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>, hints: Vec<PathBuf>) -> Self {
        self.namespaces.entry(namespace.into()).or_default().extend(hints);
        self
    }

    pub fn with_shared(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.shared.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = ViewConfig::default();
        assert!(config.paths.is_empty());
        assert_eq!(config.cache, None);
        assert!(config.namespaces.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let config = ViewConfig::from_str(
            r#"
paths = ["resources/views", "themes/default"]
cache = "storage/views"

[namespaces]
mail = ["vendor/mail/views"]

[shared]
app_name = "Quire"
debug = true
"#,
        )
        .expect("Should parse");

        assert_eq!(
            config.paths,
            vec![PathBuf::from("resources/views"), PathBuf::from("themes/default")]
        );
        assert_eq!(config.cache, Some(PathBuf::from("storage/views")));
        assert_eq!(config.namespaces["mail"], vec![PathBuf::from("vendor/mail/views")]);
        assert_eq!(config.shared["app_name"], json!("Quire"));
        assert_eq!(config.shared["debug"], json!(true));
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(ViewConfig::from_str("").unwrap(), ViewConfig::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = ViewConfig::from_str("pathz = []").unwrap_err();
        assert!(matches!(err, ViewError::Config(_)));
    }

    #[test]
    fn test_builder_pattern() {
        let config = ViewConfig::new()
            .with_path("views")
            .with_cache_path("cache")
            .with_namespace("mail", vec![PathBuf::from("mail")])
            .with_namespace("mail", vec![PathBuf::from("mail-fallback")])
            .with_shared("site", json!("quire"));

        assert_eq!(config.paths, vec![PathBuf::from("views")]);
        assert_eq!(config.cache, Some(PathBuf::from("cache")));
        assert_eq!(config.namespaces["mail"].len(), 2);
        assert_eq!(config.shared["site"], json!("quire"));
    }
}
