//! Filesystem access used by the finder, the compiled-artifact cache and the engines

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// The four filesystem operations the view layer needs
pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;

    fn get(&self, path: &Path) -> io::Result<String>;

    fn put(&self, path: &Path, contents: &str) -> io::Result<()>;

    fn last_modified(&self, path: &Path) -> io::Result<SystemTime>;
}

/// Filesystem backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn get(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn put(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, contents)
    }

    fn last_modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }
}

/// In-memory filesystem with a logical clock
///
/// Every write advances the clock by one second, so a file written after
/// another is always strictly newer. Use [`MemoryFilesystem::touch`] to set a
/// modification time explicitly.
#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    files: RefCell<HashMap<PathBuf, (String, SystemTime)>>,
    clock: Cell<u64>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, returning `self` for chaining
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        let now = self.tick();
        self.files
            .borrow_mut()
            .insert(path.into(), (contents.into(), now));
    }

    /// Set the modification time of an existing file
    pub fn touch(&self, path: &Path, modified: SystemTime) {
        if let Some(entry) = self.files.borrow_mut().get_mut(path) {
            entry.1 = modified;
        }
    }

    pub fn remove(&self, path: &Path) {
        self.files.borrow_mut().remove(path);
    }

    fn tick(&self) -> SystemTime {
        let next = self.clock.get() + 1;
        self.clock.set(next);
        SystemTime::UNIX_EPOCH + Duration::from_secs(next)
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", path.display()),
    )
}

impl Filesystem for MemoryFilesystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn get(&self, path: &Path) -> io::Result<String> {
        self.files
            .borrow()
            .get(path)
            .map(|(contents, _)| contents.clone())
            .ok_or_else(|| not_found(path))
    }

    fn put(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.insert(path, contents);
        Ok(())
    }

    fn last_modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.files
            .borrow()
            .get(path)
            .map(|(_, modified)| *modified)
            .ok_or_else(|| not_found(path))
    }
}
