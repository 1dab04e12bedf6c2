//! Central database of all input files in a compilation session.

use crate::file_id::FileId;
use crate::source_file::SourceFile;
use std::path::PathBuf;

/// Owns every registered input file, addressed by [`FileId`].
///
/// Files are never removed, so a `FileId` stays valid for the session.
#[derive(Debug, Default)]
pub struct SourceDb {
    files: Vec<SourceFile>,
}

impl SourceDb {
    /// Creates an empty source database.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Adds a source from an in-memory string.
    ///
    /// The `name` is used to derive the input id and in diagnostics.
    pub fn add_source(&mut self, name: impl Into<PathBuf>, content: String) -> FileId {
        let id = self.next_id();
        self.files.push(SourceFile::inline(id, name.into(), content));
        id
    }

    /// Adds a path-backed source whose text is loaded on demand.
    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> FileId {
        let id = self.next_id();
        self.files.push(SourceFile::lazy(id, path.into()));
        id
    }

    /// Returns the [`SourceFile`] for the given [`FileId`].
    ///
    /// # Panics
    ///
    /// Panics if the `FileId` is invalid.
    pub fn get_file(&self, id: FileId) -> &SourceFile {
        &self.files[id.as_raw() as usize]
    }

    /// Returns all files in registration order.
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Returns the number of registered files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no file is registered.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn next_id(&self) -> FileId {
        FileId::from_raw(self.files.len() as u32)
    }
}
