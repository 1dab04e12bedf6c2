//! On-disk checkpoint directory.

use std::path::{Path, PathBuf};

use crate::envelope::{self, PayloadKind};
use crate::error::CheckpointError;
use crate::record::CheckpointRecord;

/// File holding the encoded [`CheckpointRecord`].
const STATE_FILE: &str = "state.ckpt";

/// File holding the codec-produced program tree.
const TREE_FILE: &str = "tree.ckpt";

/// A directory holding one checkpoint: `state.ckpt` and `tree.ckpt` side by
/// side.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Creates a store rooted at `dir`. Nothing is touched until a save.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Path of the state file.
    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Path of the tree file.
    pub fn tree_path(&self) -> PathBuf {
        self.dir.join(TREE_FILE)
    }

    /// Returns `true` if both files are present.
    pub fn exists(&self) -> bool {
        self.state_path().is_file() && self.tree_path().is_file()
    }

    /// Writes the record and the tree bytes, replacing any earlier checkpoint.
    pub fn save(&self, record: &CheckpointRecord, tree: &[u8]) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CheckpointError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        let tree_bytes = envelope::seal(PayloadKind::Tree, tree, &record.compiler_version)?;
        write(&self.tree_path(), &tree_bytes)?;
        write(&self.state_path(), &record.encode()?)?;
        tracing::debug!(dir = %self.dir.display(), tree_len = tree.len(), "checkpoint saved");
        Ok(())
    }

    /// Reads and validates both files.
    pub fn load(&self) -> Result<(CheckpointRecord, Vec<u8>), CheckpointError> {
        let record = CheckpointRecord::decode(&read(&self.state_path())?)?;
        let raw_tree = read(&self.tree_path())?;
        let (_, tree) = envelope::open(&raw_tree, PayloadKind::Tree)?;
        Ok((record, tree.to_vec()))
    }
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), CheckpointError> {
    std::fs::write(path, bytes).map_err(|e| CheckpointError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read(path: &Path) -> Result<Vec<u8>, CheckpointError> {
    std::fs::read(path).map_err(|e| CheckpointError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
