//! Locating view files from logical names
//!
//! A name like `layouts.app` maps to `layouts/app.<ext>` under each search
//! location in turn, trying extensions in priority order. `mail::welcome`
//! looks under the hint paths registered for the `mail` namespace instead.

use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::trace;

use crate::error::ViewError;
use crate::filesystem::Filesystem;

/// Separator between a namespace and a view name
pub const HINT_DELIMITER: &str = "::";

pub trait ViewFinder {
    /// The file for a logical view name
    fn find(&mut self, name: &str) -> Result<PathBuf, ViewError>;

    fn add_location(&mut self, location: PathBuf);

    fn add_namespace(&mut self, namespace: &str, hints: Vec<PathBuf>);

    /// Register an extension ahead of the existing ones
    fn add_extension(&mut self, extension: &str);
}

pub struct FileViewFinder {
    files: Rc<dyn Filesystem>,
    paths: Vec<PathBuf>,
    hints: HashMap<String, Vec<PathBuf>>,
    extensions: Vec<String>,
    views: HashMap<String, PathBuf>,
}

impl FileViewFinder {
    pub fn new(files: Rc<dyn Filesystem>, paths: Vec<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            files,
            paths,
            hints: HashMap::new(),
            extensions,
            views: HashMap::new(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn find_namespaced(&self, name: &str) -> Result<PathBuf, ViewError> {
        let mut segments = name.split(HINT_DELIMITER);
        let (Some(namespace), Some(view), None) = (segments.next(), segments.next(), segments.next())
        else {
            return Err(ViewError::InvalidName {
                name: name.to_string(),
            });
        };

        let hints = self
            .hints
            .get(namespace)
            .ok_or_else(|| ViewError::NoHintPath {
                namespace: namespace.to_string(),
            })?;
        self.find_in_paths(name, view, hints)
    }

    fn find_in_paths(&self, name: &str, view: &str, paths: &[PathBuf]) -> Result<PathBuf, ViewError> {
        let relative = view.replace('.', "/");
        for path in paths {
            for extension in &self.extensions {
                let candidate = path.join(format!("{}.{}", relative, extension));
                if self.files.exists(&candidate) {
                    return Ok(candidate);
                }
            }
        }
        Err(ViewError::NotFound {
            name: name.to_string(),
        })
    }
}

impl ViewFinder for FileViewFinder {
    fn find(&mut self, name: &str) -> Result<PathBuf, ViewError> {
        if let Some(path) = self.views.get(name) {
            return Ok(path.clone());
        }

        let path = if name.contains(HINT_DELIMITER) {
            self.find_namespaced(name)?
        } else {
            self.find_in_paths(name, name, &self.paths)?
        };
        trace!(view = name, path = %path.display(), "located view");
        self.views.insert(name.to_string(), path.clone());
        Ok(path)
    }

    fn add_location(&mut self, location: PathBuf) {
        self.paths.push(location);
    }

    fn add_namespace(&mut self, namespace: &str, hints: Vec<PathBuf>) {
        self.hints
            .entry(namespace.to_string())
            .or_default()
            .extend(hints);
    }

    fn add_extension(&mut self, extension: &str) {
        self.extensions.retain(|existing| existing != extension);
        self.extensions.insert(0, extension.to_string());
        self.views.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFilesystem;

    fn finder(files: MemoryFilesystem) -> FileViewFinder {
        FileViewFinder::new(
            Rc::new(files),
            vec![PathBuf::from("views")],
            vec!["quire".to_string(), "html".to_string()],
        )
    }

    #[test]
    fn test_dots_map_to_directories() {
        let mut finder = finder(MemoryFilesystem::new().with_file("views/layouts/app.quire", ""));
        assert_eq!(
            finder.find("layouts.app").unwrap(),
            PathBuf::from("views/layouts/app.quire")
        );
    }

    #[test]
    fn test_extensions_are_tried_in_order() {
        let files = MemoryFilesystem::new()
            .with_file("views/home.html", "")
            .with_file("views/home.quire", "");
        let mut finder = finder(files);
        assert_eq!(finder.find("home").unwrap(), PathBuf::from("views/home.quire"));
    }

    #[test]
    fn test_added_extension_takes_priority() {
        let files = MemoryFilesystem::new()
            .with_file("views/home.quire", "")
            .with_file("views/home.txt", "");
        let mut finder = finder(files);
        finder.add_extension("txt");
        assert_eq!(finder.find("home").unwrap(), PathBuf::from("views/home.txt"));
        assert_eq!(finder.extensions()[0], "txt");
    }

    #[test]
    fn test_later_locations_are_searched() {
        let mut finder = finder(MemoryFilesystem::new().with_file("shared/nav.quire", ""));
        assert!(matches!(finder.find("nav"), Err(ViewError::NotFound { .. })));
        finder.add_location(PathBuf::from("shared"));
        assert_eq!(finder.find("nav").unwrap(), PathBuf::from("shared/nav.quire"));
        assert_eq!(finder.paths().last(), Some(&PathBuf::from("shared")));
    }

    #[test]
    fn test_namespaced_views() {
        let mut finder = finder(MemoryFilesystem::new().with_file("vendor/mail/welcome.quire", ""));
        finder.add_namespace("mail", vec![PathBuf::from("vendor/mail")]);
        assert_eq!(
            finder.find("mail::welcome").unwrap(),
            PathBuf::from("vendor/mail/welcome.quire")
        );
    }

    #[test]
    fn test_malformed_namespaced_name() {
        let mut finder = finder(MemoryFilesystem::new());
        let err = finder.find("a::b::c").unwrap_err();
        assert!(matches!(err, ViewError::InvalidName { ref name } if name == "a::b::c"));
    }

    #[test]
    fn test_unknown_namespace() {
        let mut finder = finder(MemoryFilesystem::new());
        let err = finder.find("mail::welcome").unwrap_err();
        assert_eq!(err.to_string(), "no hint path defined for [mail]");
    }
}
