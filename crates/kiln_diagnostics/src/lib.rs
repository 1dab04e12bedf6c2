//! Structured diagnostics and the per-session diagnostic sink.
//!
//! This crate provides [`Diagnostic`] messages with severity levels, stable
//! codes and source labels. The thread-safe [`DiagnosticSink`] accumulates
//! diagnostics for one compiler instance; parse workers and passes report into
//! it, and the pipeline consults it to decide whether later stages may run.
//! Formatting diagnostics for people is left to the embedding tool.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod label;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use label::{Label, LabelStyle};
pub use severity::Severity;
pub use sink::DiagnosticSink;
