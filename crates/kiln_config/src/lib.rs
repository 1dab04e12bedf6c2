//! Parsing and validation of `kiln.toml` compiler options.
//!
//! This crate reads the build configuration file and produces strongly-typed
//! [`CompilerOptions`]: dependency management mode and entry points, module
//! handling, optimization switches, iteration caps and executor settings.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
