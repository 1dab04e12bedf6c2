//! The source loader capability and its two stock implementations.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Reads the text of an input file.
///
/// Loaders are shared across the parse worker pool, so they must be
/// thread-safe. A failure affects only the unit being loaded.
pub trait SourceLoader: Send + Sync {
    /// Returns the full text at `path`.
    fn load(&self, path: &Path) -> io::Result<String>;
}

/// Loads sources from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Serves sources from an in-memory map. Unknown paths are `NotFound`.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }
}
