//! Unified error handling for cogwork.
//!
//! Registration and indexing errors are returned synchronously to whoever
//! asked for the load. Bind-time and run-time errors never leave the engine;
//! they reach the caller through the completion callback as a
//! [`CommandError`].

use crate::args::ArgType;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Registry Errors (registration, indexing, archive loading)
// ============================================================================

/// Errors raised while registering commands.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot register command {0}; the trigger has already been registered")]
    DuplicateCommand(String),

    #[error("command {command} has an ambiguous handler shape: {reason}")]
    AmbiguousHandlerShape { command: String, reason: String },

    #[error("failed to load plugin archive {}: {source}", path.display())]
    ArchiveLoad {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },
}

impl RegistryError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateCommand(_) => "duplicate_command",
            Self::AmbiguousHandlerShape { .. } => "ambiguous_handler_shape",
            Self::ArchiveLoad { .. } => "archive_load",
        }
    }

    pub(crate) fn shape(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AmbiguousHandlerShape {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Archive Errors (plugin manifest + load context)
// ============================================================================

/// Errors produced by a plugin archive or its load context.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Manifest(#[from] toml::de::Error),

    #[error("invalid archive: {0}")]
    Invalid(String),

    #[error("archive {0} has been unloaded")]
    Closed(String),
}

// ============================================================================
// Command Errors (bind-time and run-time, delivered via completion)
// ============================================================================

/// Failure cause delivered to a completion callback.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("argument {parameter} expected {expected}, got {input:?}")]
    ArgumentParse {
        parameter: String,
        expected: ArgType,
        input: String,
    },

    /// The error returned by the handler itself.
    #[error(transparent)]
    Handler(anyhow::Error),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("worker pool rejected the job: {0}")]
    Rejected(String),
}

impl CommandError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ArgumentParse { .. } => "argument_parse",
            Self::Handler(_) => "handler_error",
            Self::Panicked(_) => "handler_panic",
            Self::Rejected(_) => "pool_rejected",
        }
    }

    /// The underlying handler error, if this failure came from one.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Handler(e) => Some(e),
            _ => None,
        }
    }

    /// Build a `Panicked` cause from a panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

/// Outcome of one command invocation.
pub type Outcome = Result<(), CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_codes() {
        assert_eq!(
            RegistryError::DuplicateCommand("ping".into()).error_code(),
            "duplicate_command"
        );
        assert_eq!(
            RegistryError::shape("echo", "greedy parameter is not last").error_code(),
            "ambiguous_handler_shape"
        );
    }

    #[test]
    fn test_duplicate_message_names_trigger() {
        let err = RegistryError::DuplicateCommand("ping".into());
        assert!(err.to_string().contains("ping"));
    }

    #[test]
    fn test_handler_error_is_transparent() {
        let err = CommandError::Handler(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.error_code(), "handler_error");
        assert!(err.handler_error().is_some());
    }

    #[test]
    fn test_panic_payload_is_unwrapped() {
        let err = CommandError::from_panic(Box::new("kaboom"));
        assert!(matches!(err, CommandError::Panicked(ref m) if m == "kaboom"));

        let err = CommandError::from_panic(Box::new(String::from("owned")));
        assert!(matches!(err, CommandError::Panicked(ref m) if m == "owned"));

        let err = CommandError::from_panic(Box::new(42u32));
        assert_eq!(err.error_code(), "handler_panic");
    }

    #[test]
    fn test_argument_parse_names_parameter() {
        let err = CommandError::ArgumentParse {
            parameter: "target".into(),
            expected: ArgType::Snowflake,
            input: "nope".into(),
        };
        let text = err.to_string();
        assert!(text.contains("target"));
        assert!(text.contains("snowflake"));
    }
}
