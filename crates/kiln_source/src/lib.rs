//! Input files, stable input ids and source loading for a compilation session.
//!
//! This crate provides the [`SourceDb`] that owns every input file's text,
//! [`FileId`] and [`Span`] types for source locations, [`InputId`] for the
//! stable, path-derived identity of an input, and the [`SourceLoader`]
//! capability through which file content is read.

#![warn(missing_docs)]

pub mod file_id;
pub mod input_id;
pub mod loader;
pub mod source_db;
pub mod source_file;
pub mod span;

pub use file_id::FileId;
pub use input_id::InputId;
pub use loader::{FsLoader, MemoryLoader, SourceLoader};
pub use source_db::SourceDb;
pub use source_file::{LoadError, SourceFile};
pub use span::Span;
