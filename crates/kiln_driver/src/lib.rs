//! Build orchestration for the Kiln optimizing compiler.
//!
//! A [`Compiler`] takes extern units and a list of chunks, loads and parses
//! every unit in parallel through a pluggable [`Frontend`], orders and prunes
//! the units by their declared dependencies, and then runs the configured
//! [`PassConfig`] stage by stage:
//!
//! ```text
//! init -> parse -> checks -> transpile/optimize -> finalize
//!              \-> instrument (coverage only)
//! ```
//!
//! Stage calls run on a dedicated large-stack thread with an optional
//! timeout. Between stages the state can be captured as a [`Snapshot`] and
//! restored into a fresh compiler given the same inputs.

#![warn(missing_docs)]

pub mod change;
pub mod checkpoint;
pub mod compiler;
pub mod errors;
pub mod executor;
pub mod frontend;
pub mod pass;
pub mod pipeline;
mod prepare;
pub mod program;
pub mod session;

pub use change::{ChangeTracker, ScopeRef};
pub use checkpoint::{Snapshot, COMPILER_VERSION};
pub use compiler::{CompileResult, Compiler};
pub use executor::{Executor, ExecutorError};
pub use frontend::{CodecError, Frontend, TreeCodec, UnitIndex};
pub use pass::{Pass, PassConfig, PassContext, PassFactory};
pub use pipeline::PipelineState;
pub use program::{Program, Script, ScriptPos};
pub use session::SessionState;
