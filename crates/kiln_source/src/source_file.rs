//! A single input file whose text is loaded at most once.

use crate::file_id::FileId;
use crate::input_id::InputId;
use crate::loader::SourceLoader;
use kiln_common::ContentHash;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Error recorded when a source could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot read {}: {message}", path.display())]
pub struct LoadError {
    /// The path that failed to load.
    pub path: PathBuf,
    /// The underlying I/O error message.
    pub message: String,
}

#[derive(Debug)]
struct Loaded {
    text: String,
    hash: ContentHash,
}

impl Loaded {
    fn new(text: String) -> Self {
        let hash = ContentHash::from_bytes(text.as_bytes());
        Self { text, hash }
    }
}

/// An input file registered with the session.
///
/// Inline sources carry their text from the start. Path-backed sources are
/// loaded on first use through a [`SourceLoader`]; the outcome (text or error)
/// is written exactly once, so concurrent loads of different files need no
/// locking and a file that failed keeps failing the same way.
#[derive(Debug)]
pub struct SourceFile {
    /// The identifier of this file within the [`SourceDb`](crate::SourceDb).
    pub id: FileId,
    /// The stable input id derived from `path`.
    pub input_id: InputId,
    /// The filesystem path, or a synthetic name for inline sources.
    pub path: PathBuf,
    content: OnceLock<Result<Loaded, LoadError>>,
}

impl SourceFile {
    /// Creates a source whose text is already known.
    pub fn inline(id: FileId, path: PathBuf, text: String) -> Self {
        let content = OnceLock::new();
        let _ = content.set(Ok(Loaded::new(text)));
        Self {
            id,
            input_id: InputId::from_path(&path),
            path,
            content,
        }
    }

    /// Creates a source that will be read from `path` on demand.
    pub fn lazy(id: FileId, path: PathBuf) -> Self {
        Self {
            id,
            input_id: InputId::from_path(&path),
            path,
            content: OnceLock::new(),
        }
    }

    /// Loads the text through `loader` unless it is already loaded, and
    /// returns it.
    pub fn load(&self, loader: &dyn SourceLoader) -> Result<&str, LoadError> {
        let loaded = self.content.get_or_init(|| {
            loader
                .load(&self.path)
                .map(Loaded::new)
                .map_err(|e| LoadError {
                    path: self.path.clone(),
                    message: e.to_string(),
                })
        });
        match loaded {
            Ok(l) => Ok(&l.text),
            Err(e) => Err(e.clone()),
        }
    }

    /// Returns the text if it has been loaded successfully.
    pub fn text(&self) -> Option<&str> {
        match self.content.get() {
            Some(Ok(l)) => Some(&l.text),
            _ => None,
        }
    }

    /// Returns the content hash if the text has been loaded successfully.
    pub fn content_hash(&self) -> Option<ContentHash> {
        match self.content.get() {
            Some(Ok(l)) => Some(l.hash),
            _ => None,
        }
    }

    /// Returns `true` once a load has been attempted (or the source was inline).
    pub fn is_resolved(&self) -> bool {
        self.content.get().is_some()
    }
}
