//! Checkpoint format: a versioned state record, a checksummed binary
//! envelope, and an on-disk store.
//!
//! A checkpoint lets a build stop after one stage and resume in another
//! process. The orchestrator state travels as a [`CheckpointRecord`] with
//! named fields; the program tree travels separately as opaque bytes produced
//! by the front end's codec. Both are wrapped in an [envelope](crate::envelope) that
//! detects foreign, stale or corrupted files.

#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod record;
pub mod store;

pub use envelope::{open, seal, EnvelopeHeader, PayloadKind};
pub use error::CheckpointError;
pub use record::{ChunkRecord, CheckpointRecord, CHECKPOINT_SCHEMA_VERSION};
pub use store::CheckpointStore;
