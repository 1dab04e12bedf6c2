//! Chunks: named, ordered groups of units compiled and emitted together.

use kiln_common::define_id;

use crate::unit::{UnitId, UnitSpec};

define_id!(
    /// Identifies a chunk within its [`ChunkGraph`](crate::ChunkGraph).
    ChunkId
);

/// Name of the default chunk used when the caller supplies a flat source list.
pub const STRONG_CHUNK_NAME: &str = "$strong$";

/// Name of the sink chunk that receives weak units.
pub const WEAK_CHUNK_NAME: &str = "$weak$";

/// A chunk and its current members.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// The chunk name, unique within the graph.
    pub name: String,
    /// Direct dependencies, in declaration order.
    pub deps: Vec<ChunkId>,
    /// Member units, in compilation order.
    pub units: Vec<UnitId>,
}

impl Chunk {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            deps: Vec::new(),
            units: Vec::new(),
        }
    }

    /// Returns `true` if this is the weak sentinel chunk.
    pub fn is_weak(&self) -> bool {
        self.name == WEAK_CHUNK_NAME
    }
}

/// A chunk declaration without members: a name and the names it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDecl {
    /// The chunk name.
    pub name: String,
    /// Names of the chunks this one depends on.
    pub deps: Vec<String>,
}

impl ChunkDecl {
    /// Declares a chunk.
    pub fn new(name: impl Into<String>, deps: &[&str]) -> Self {
        Self {
            name: name.into(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// A chunk declaration together with the inputs to register into it.
#[derive(Debug, Clone)]
pub struct ChunkSpec {
    /// Name and dependencies.
    pub decl: ChunkDecl,
    /// Inputs, in the caller's order.
    pub inputs: Vec<UnitSpec>,
}

impl ChunkSpec {
    /// A chunk with the given name and dependency names.
    pub fn new(name: impl Into<String>, deps: &[&str], inputs: Vec<UnitSpec>) -> Self {
        Self {
            decl: ChunkDecl::new(name, deps),
            inputs,
        }
    }

    /// The single default chunk holding a flat list of inputs.
    pub fn strong(inputs: Vec<UnitSpec>) -> Self {
        Self::new(STRONG_CHUNK_NAME, &[], inputs)
    }
}
