//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{CompilerOptions, DependencyMode};
use std::path::Path;

/// The configuration file name looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<CompilerOptions, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<CompilerOptions, ConfigError> {
    let config: CompilerOptions =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and values are consistent.
pub fn validate_config(config: &CompilerOptions) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.executor.threads == 0 {
        return Err(ConfigError::ValidationError(
            "executor.threads must be at least 1".to_string(),
        ));
    }
    if config.executor.stack_size_mib == 0 {
        return Err(ConfigError::ValidationError(
            "executor.stack_size_mib must be at least 1".to_string(),
        ));
    }
    if config.dependencies.mode == DependencyMode::Prune
        && config.dependencies.entry_points.is_empty()
    {
        return Err(ConfigError::ValidationError(
            "dependencies.mode = \"prune\" requires at least one entry point".to_string(),
        ));
    }
    if config.limits.max_optimize_iterations == 0 || config.limits.max_motion_iterations == 0 {
        return Err(ConfigError::ValidationError(
            "iteration limits must be at least 1".to_string(),
        ));
    }
    Ok(())
}
