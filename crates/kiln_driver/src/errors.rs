//! Diagnostic codes and helper functions for pipeline problems.
//!
//! `E105` is a halting input error. `W102` and `W103` report fixed-point pass
//! groups that hit their iteration cap; the best-effort result is kept.

use kiln_diagnostics::{Category, Diagnostic, DiagnosticCode};
use kiln_source::Span;

/// An input could not be read by the source loader.
pub const E105: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 105,
};

/// A fixed-point group in the optimize stage hit its iteration cap.
pub const W102: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 102,
};

/// A fixed-point group in the finalize stage hit its iteration cap.
pub const W103: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 103,
};

/// Creates a diagnostic for an input whose content could not be loaded.
pub fn error_unreadable_input(id: &str, reason: &str, span: Span) -> Diagnostic {
    Diagnostic::error(E105, format!("cannot read input `{id}`: {reason}"), span)
}

/// Creates a diagnostic for an optimize-stage loop that did not converge.
pub fn warning_optimize_loop(group: &str, iterations: u32) -> Diagnostic {
    Diagnostic::warning(
        W102,
        format!("exceeded max number of optimization iterations: {iterations}"),
        Span::DUMMY,
    )
    .with_note(format!("loop group: {group}"))
}

/// Creates a diagnostic for a finalize-stage loop that did not converge.
pub fn warning_motion_iterations(group: &str, iterations: u32) -> Diagnostic {
    Diagnostic::warning(
        W103,
        format!("exceeded max number of code motion iterations: {iterations}"),
        Span::DUMMY,
    )
    .with_note(format!("loop group: {group}"))
}
