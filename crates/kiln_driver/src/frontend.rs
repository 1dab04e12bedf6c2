//! Capabilities the orchestrator needs from a language front end.

use kiln_chunks::{DependencyInfo, UnitId};
use kiln_common::Interner;
use kiln_diagnostics::DiagnosticSink;
use kiln_source::InputId;
use std::collections::HashMap;

use crate::program::Program;

/// Scans and parses units.
///
/// Both methods are called from parse workers, concurrently for different
/// units.
pub trait Frontend: Send + Sync + 'static {
    /// The front end's tree for one unit.
    type Ast: Send + Sync + 'static;

    /// Extracts the dependency summary with a cheap pre-parse.
    fn scan(&self, input: &InputId, text: &str, interner: &Interner) -> DependencyInfo;

    /// Parses one unit. Syntax errors go to `sink`; a tree is returned anyway.
    fn parse(&self, input: &InputId, text: &str, sink: &DiagnosticSink) -> Self::Ast;
}

/// Maps input ids to units for a codec rebuilding a program.
pub type UnitIndex = HashMap<InputId, UnitId>;

/// A codec error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tree codec error: {0}")]
pub struct CodecError(pub String);

/// Serializes the program tree for checkpoints.
pub trait TreeCodec<A> {
    /// Encodes the whole program.
    fn serialize(&self, program: &Program<A>) -> Result<Vec<u8>, CodecError>;

    /// Decodes a program, resolving its scripts' units through `index`.
    fn deserialize(&self, bytes: &[u8], index: &UnitIndex) -> Result<Program<A>, CodecError>;
}
