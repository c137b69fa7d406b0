//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: config struct definitions and loading
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup checks, reporting every problem at once

mod defaults;
mod types;
mod validation;

pub use types::{ArchiveSpec, Config, ConfigError, EngineConfig, LogConfig, PluginsConfig};
pub use validation::{ValidationError, validate};
