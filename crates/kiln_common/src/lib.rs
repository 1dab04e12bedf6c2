//! Shared foundational types used across the Kiln build orchestrator.
//!
//! This crate provides content hashing, interned namespace identifiers, dense
//! ID-indexed arenas, and the internal-error result type used to signal
//! contract violations.

#![warn(missing_docs)]

pub mod arena;
pub mod hash;
pub mod ident;
pub mod result;

pub use arena::{Arena, ArenaId};
pub use hash::ContentHash;
pub use ident::{Ident, Interner};
pub use result::{InternalError, KilnResult};
