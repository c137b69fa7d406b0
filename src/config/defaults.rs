//! Default value functions for configuration.

use crate::context::DEFAULT_TYPING_INTERVAL;

// =============================================================================
// Engine Defaults
// =============================================================================

pub fn default_prefix() -> String {
    "!".to_string()
}

pub fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4)
}

pub fn default_typing_interval_ms() -> u64 {
    DEFAULT_TYPING_INTERVAL.as_millis() as u64
}

// =============================================================================
// Plugin Defaults
// =============================================================================

pub fn default_plugin_directory() -> Option<String> {
    Some("plugins".to_string())
}

// =============================================================================
// Logging / Namespace Defaults
// =============================================================================

pub fn default_log_filter() -> String {
    "info".to_string()
}

pub fn default_namespaces() -> Vec<String> {
    vec![crate::builtin::NAMESPACE.to_string()]
}
