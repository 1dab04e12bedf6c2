//! The program tree handed to passes.

use kiln_chunks::UnitId;
use kiln_source::InputId;
use serde::{Deserialize, Serialize};

/// One parsed unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script<A> {
    /// Stable id of the unit.
    pub input_id: InputId,
    /// The unit in the catalog.
    pub unit: UnitId,
    /// The front end's tree for this unit.
    pub ast: A,
}

/// Where a script sits in a [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPos {
    /// Index into [`Program::externs`].
    Extern(usize),
    /// Index into [`Program::sources`].
    Source(usize),
}

/// Extern scripts and source scripts.
///
/// Sources are ordered by chunk topological order, then by unit order within
/// each chunk. Passes may rewrite scripts but not move units between chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program<A> {
    /// Extern scripts, in extern list order.
    pub externs: Vec<Script<A>>,
    /// Source scripts, in compilation order.
    pub sources: Vec<Script<A>>,
}

impl<A> Program<A> {
    /// An empty program.
    pub fn new() -> Self {
        Self {
            externs: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Total number of scripts.
    pub fn len(&self) -> usize {
        self.externs.len() + self.sources.len()
    }

    /// Returns `true` if there are no scripts at all.
    pub fn is_empty(&self) -> bool {
        self.externs.is_empty() && self.sources.is_empty()
    }

    /// Every script, externs first.
    pub fn scripts(&self) -> impl Iterator<Item = &Script<A>> {
        self.externs.iter().chain(self.sources.iter())
    }

    /// Returns the script at `pos`.
    pub fn get(&self, pos: ScriptPos) -> Option<&Script<A>> {
        match pos {
            ScriptPos::Extern(i) => self.externs.get(i),
            ScriptPos::Source(i) => self.sources.get(i),
        }
    }

    /// Positions of every script, keyed by input id.
    pub(crate) fn positions(&self) -> impl Iterator<Item = (InputId, ScriptPos)> + '_ {
        let externs = self
            .externs
            .iter()
            .enumerate()
            .map(|(i, s)| (s.input_id.clone(), ScriptPos::Extern(i)));
        let sources = self
            .sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.input_id.clone(), ScriptPos::Source(i)));
        externs.chain(sources)
    }
}

impl<A> Default for Program<A> {
    fn default() -> Self {
        Self::new()
    }
}
