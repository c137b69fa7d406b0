//! Telemetry utilities for command timing and span construction.

use std::time::Instant;
use tracing::debug;

/// Guard for timing command execution.
///
/// Logs the elapsed time when dropped, so early returns and unwinding are
/// covered.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        debug!(command = %self.command, elapsed_ms = self.elapsed_ms(), "Command finished");
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};
    use uuid::Uuid;

    /// Create a span for one command execution.
    pub fn command(name: &str, invocation: Uuid, trigger: &str, author: u64) -> Span {
        info_span!(
            "cogwork.command",
            command = %name,
            invocation = %invocation,
            trigger = %trigger,
            author = author
        )
    }

    /// Create a span for loading one plugin archive.
    pub fn archive(path: &str, namespace: &str) -> Span {
        info_span!("cogwork.archive", path = %path, namespace = %namespace)
    }
}
