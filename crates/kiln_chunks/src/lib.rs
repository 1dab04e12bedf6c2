//! Input units, chunks, and the chunk dependency graph.
//!
//! The [`InputCatalog`] registers and deduplicates input units and moves them
//! between chunks and the extern list. The [`ChunkGraph`] validates declared
//! chunk dependencies, computes a stable topological order and owns chunk
//! membership. [`manage_dependencies`] sorts or prunes the graph to what a set
//! of entry points reaches.

#![warn(missing_docs)]

pub mod catalog;
pub mod chunk;
pub mod deps;
pub mod errors;
pub mod graph;
pub mod unit;

pub use catalog::{DuplicateInput, InputCatalog};
pub use chunk::{Chunk, ChunkDecl, ChunkId, ChunkSpec, STRONG_CHUNK_NAME, WEAK_CHUNK_NAME};
pub use deps::{manage_dependencies, DependencyError, DependencyOptions, EntryPoint, PruneSummary};
pub use graph::{ChunkGraph, GraphError};
pub use unit::{DependencyInfo, ModuleKind, Unit, UnitId, UnitSource, UnitSpec};
