//! Core configuration types and loading.

use super::defaults::*;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Host configuration. Every section is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Local namespaces registered at startup.
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            plugins: PluginsConfig::default(),
            log: LogConfig::default(),
            namespaces: default_namespaces(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Dispatch and execution settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Trigger prefix recognised by the console dispatcher.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Worker threads for blocking handlers. 0 uses the runtime's blocking pool.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    #[serde(default = "default_typing_interval_ms")]
    pub typing_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            worker_threads: default_worker_threads(),
            typing_interval_ms: default_typing_interval_ms(),
        }
    }
}

impl EngineConfig {
    pub fn typing_interval(&self) -> Duration {
        Duration::from_millis(self.typing_interval_ms)
    }
}

/// Plugin archive loading.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginsConfig {
    /// Every `<directory>/*/plugin.toml` is loaded at startup. Missing
    /// directories are skipped.
    #[serde(default = "default_plugin_directory")]
    pub directory: Option<String>,
    /// Archives loaded individually, each with its own namespace filter.
    #[serde(default)]
    pub autoload: Vec<ArchiveSpec>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_directory(),
            autoload: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSpec {
    pub path: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.prefix, "!");
        assert_eq!(config.engine.typing_interval_ms, 5000);
        assert_eq!(config.plugins.directory.as_deref(), Some("plugins"));
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.namespaces, [crate::builtin::NAMESPACE]);
    }

    #[test]
    fn test_parses_all_sections() {
        let config: Config = toml::from_str(
            r#"
namespaces = ["app"]

[engine]
prefix = "?"
worker_threads = 0
typing_interval_ms = 250

[plugins]
directory = "ext"
autoload = [{ path = "extra/dice", namespace = "fun" }]

[log]
filter = "cogwork=debug"
"#,
        )
        .unwrap();
        assert_eq!(config.engine.prefix, "?");
        assert_eq!(config.engine.worker_threads, 0);
        assert_eq!(config.engine.typing_interval(), Duration::from_millis(250));
        assert_eq!(config.plugins.autoload[0].namespace, "fun");
        assert_eq!(config.log.filter, "cogwork=debug");
        assert_eq!(config.namespaces, ["app"]);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
