//! Pipeline stages and the transitions between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How far compilation has progressed. States only move forward.
///
/// ```text
/// uninitialized -> parsed -> checked -> transpiled_optimized -> finalized
///                     \
///                      -> instrumented
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing has run, or only `init`.
    #[default]
    Uninitialized,
    /// Inputs are loaded, ordered and parsed.
    Parsed,
    /// Check passes have run.
    Checked,
    /// Transpilation and optimization passes have run.
    TranspiledOptimized,
    /// Finalization passes have run.
    Finalized,
    /// Coverage instrumentation has run. Terminal.
    Instrumented,
}

impl PipelineState {
    /// All states, in declaration order.
    pub const ALL: [PipelineState; 6] = [
        PipelineState::Uninitialized,
        PipelineState::Parsed,
        PipelineState::Checked,
        PipelineState::TranspiledOptimized,
        PipelineState::Finalized,
        PipelineState::Instrumented,
    ];

    /// The stable name written into checkpoints.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::Parsed => "parsed",
            PipelineState::Checked => "checked",
            PipelineState::TranspiledOptimized => "transpiled_optimized",
            PipelineState::Finalized => "finalized",
            PipelineState::Instrumented => "instrumented",
        }
    }

    /// Parses a name produced by [`as_str`](Self::as_str).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Returns `true` if a stage may move the pipeline from `self` to `next`.
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Uninitialized, Parsed)
                | (Parsed, Checked)
                | (Checked, TranspiledOptimized)
                | (TranspiledOptimized, Finalized)
                | (Parsed, Instrumented)
        )
    }

    /// Returns `true` if no stage can follow.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Finalized | PipelineState::Instrumented)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for state in PipelineState::ALL {
            assert_eq!(PipelineState::from_name(state.as_str()), Some(state));
        }
        assert_eq!(PipelineState::from_name("optimized"), None);
    }

    #[test]
    fn main_line_advances() {
        use PipelineState::*;
        let line = [Uninitialized, Parsed, Checked, TranspiledOptimized, Finalized];
        for pair in line.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]));
            assert!(!pair[1].can_advance_to(pair[0]));
        }
    }

    #[test]
    fn instrumentation_branches_from_parsed_only() {
        use PipelineState::*;
        assert!(Parsed.can_advance_to(Instrumented));
        assert!(!Checked.can_advance_to(Instrumented));
        assert!(!Instrumented.can_advance_to(Checked));
        assert!(Instrumented.is_terminal());
    }

    #[test]
    fn serialized_names_match_checkpoint_names() {
        for state in PipelineState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }

    #[test]
    fn no_skipping_or_revisiting() {
        use PipelineState::*;
        assert!(!Uninitialized.can_advance_to(Checked));
        assert!(!Parsed.can_advance_to(Parsed));
        assert!(!Parsed.can_advance_to(TranspiledOptimized));
    }
}
