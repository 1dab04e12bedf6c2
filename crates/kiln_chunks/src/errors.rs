//! Diagnostic codes and helper functions for input and chunk graph problems.
//!
//! Error codes `E100`--`E104` are halting configuration errors. Warning codes
//! `W100`--`W101` report duplicate inputs; the first registration is kept.

use kiln_diagnostics::{Category, Diagnostic, DiagnosticCode, Label};
use kiln_source::Span;

/// No chunks were supplied.
pub const E100: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 100,
};

/// The first chunk is empty while others exist.
pub const E101: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 101,
};

/// A declared chunk dependency is unknown, cyclic, or targets the weak chunk.
pub const E102: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 102,
};

/// An entry point resolves to no input.
pub const E103: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 103,
};

/// An entry point names an unknown chunk.
pub const E104: DiagnosticCode = DiagnosticCode {
    category: Category::Error,
    number: 104,
};

/// A source input was registered twice.
pub const W100: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 100,
};

/// An extern input was registered twice.
pub const W101: DiagnosticCode = DiagnosticCode {
    category: Category::Warning,
    number: 101,
};

/// Creates a diagnostic for an empty chunk list.
pub fn error_empty_module_list() -> Diagnostic {
    Diagnostic::error(E100, "at least one chunk must be provided", Span::DUMMY)
}

/// Creates a diagnostic for an empty root chunk.
pub fn error_empty_root_module(name: &str) -> Diagnostic {
    Diagnostic::error(
        E101,
        format!("root chunk `{name}` must contain at least one input"),
        Span::DUMMY,
    )
}

/// Creates a diagnostic for a bad chunk dependency.
pub fn error_module_dependency(from: &str, to: &str) -> Diagnostic {
    Diagnostic::error(E102, format!("bad dependency: `{from}` -> `{to}`"), Span::DUMMY)
        .with_note("chunk dependencies must name declared chunks and must not form a cycle")
}

/// Creates a diagnostic for an entry point nothing provides.
pub fn error_missing_entry_point(name: &str) -> Diagnostic {
    Diagnostic::error(
        E103,
        format!("required entry point `{name}` never provided"),
        Span::DUMMY,
    )
}

/// Creates a diagnostic for an entry point naming an unknown chunk.
pub fn error_missing_chunk(name: &str) -> Diagnostic {
    Diagnostic::error(
        E104,
        format!("unknown chunk `{name}` specified in entry point"),
        Span::DUMMY,
    )
}

/// Creates a diagnostic for a duplicate source input.
pub fn warning_duplicate_input(id: &str, span: Span, first: Span) -> Diagnostic {
    Diagnostic::warning(W100, format!("duplicate input `{id}`"), span)
        .with_label(Label::secondary(first, "first registered here"))
}

/// Creates a diagnostic for a duplicate extern input.
pub fn warning_duplicate_extern_input(id: &str, span: Span, first: Span) -> Diagnostic {
    Diagnostic::warning(W101, format!("duplicate extern input `{id}`"), span)
        .with_label(Label::secondary(first, "first registered here"))
}
