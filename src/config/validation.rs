//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("engine.prefix must not be empty")]
    EmptyPrefix,
    #[error("engine.prefix must not contain whitespace, got {0:?}")]
    WhitespaceInPrefix(String),
    #[error("engine.typing_interval_ms must be greater than zero")]
    ZeroTypingInterval,
    #[error("plugins.autoload path does not exist: {0}")]
    AutoloadNotFound(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let prefix = &config.engine.prefix;
    if prefix.is_empty() {
        errors.push(ValidationError::EmptyPrefix);
    } else if prefix.chars().any(char::is_whitespace) {
        errors.push(ValidationError::WhitespaceInPrefix(prefix.clone()));
    }

    if config.engine.typing_interval_ms == 0 {
        errors.push(ValidationError::ZeroTypingInterval);
    }

    for archive in &config.plugins.autoload {
        if !Path::new(&archive.path).exists() {
            errors.push(ValidationError::AutoloadNotFound(archive.path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
