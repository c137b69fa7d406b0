//! `plugin.toml` schema.

use crate::error::ArchiveError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// File name of an archive manifest inside an archive directory.
pub const MANIFEST_FILE: &str = "plugin.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub archive: ArchiveSection,
    #[serde(default)]
    pub cogs: Vec<CogManifest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSection {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Added to the environment of every process the archive starts.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CogManifest {
    pub name: String,
    /// Dotted namespace path; scanned by `load_from_archive`.
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub commands: Vec<CommandManifest>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Blocking,
    #[default]
    Suspending,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandManifest {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mode: Mode,
    /// Relative paths resolve against the archive root.
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub params: Vec<ParamManifest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub optional: bool,
    /// Raw text, parsed by the parameter's parser when needed.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub greedy: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ArchiveError> {
        let manifest: Manifest = toml::from_str(content)?;
        manifest.check()?;
        Ok(manifest)
    }

    /// Archive-level structure only; command shapes are checked by the
    /// indexer.
    fn check(&self) -> Result<(), ArchiveError> {
        if self.archive.name.trim().is_empty() {
            return Err(ArchiveError::Invalid("archive name is empty".into()));
        }
        let mut seen = Vec::new();
        for cog in &self.cogs {
            if cog.name.trim().is_empty() {
                return Err(ArchiveError::Invalid("cog name is empty".into()));
            }
            if seen.contains(&cog.name.as_str()) {
                return Err(ArchiveError::Invalid(format!(
                    "cog {} is declared twice",
                    cog.name
                )));
            }
            seen.push(cog.name.as_str());
            if let Some(cmd) = cog.commands.iter().find(|c| c.program.trim().is_empty()) {
                return Err(ArchiveError::Invalid(format!(
                    "command {} in cog {} has no program",
                    cmd.name, cog.name
                )));
            }
        }
        Ok(())
    }
}
