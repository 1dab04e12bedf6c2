//! Error types for checkpoint encoding and storage.

use std::path::PathBuf;

/// Errors that can occur while writing or reading a checkpoint.
///
/// Unlike a cache miss, a bad checkpoint is never silently ignored: resuming
/// from the wrong state would corrupt the build.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// An I/O error occurred while reading or writing checkpoint files.
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The envelope is truncated, foreign, or carries the wrong payload kind.
    #[error("invalid checkpoint header: {reason}")]
    InvalidHeader {
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the payload.
    #[error("checkpoint checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The checksum recorded in the header.
        expected: String,
        /// The checksum computed from the payload.
        actual: String,
    },

    /// The envelope format version is not the one this build writes.
    #[error("checkpoint format version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The supported format version.
        expected: u32,
        /// The version found in the file.
        actual: u32,
    },

    /// The record schema version is not the one this build writes.
    #[error("checkpoint schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch {
        /// The supported schema version.
        expected: u32,
        /// The schema version found in the record.
        actual: u32,
    },

    /// A serialization or deserialization error occurred.
    #[error("checkpoint serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}
