//! Plugin archives and their load contexts.

use super::bridge::ProcessCommand;
use super::manifest::{CogManifest, CommandManifest, MANIFEST_FILE, Manifest, Mode};
use crate::args::{ArgSpec, ArgType};
use crate::commands::{Cog, CommandSpec, namespace_matches};
use crate::error::ArchiveError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything an archive's handlers run inside: working directory,
/// environment and a cancellation token tied to the archive's lifetime.
#[derive(Debug)]
pub struct LoadContext {
    root: PathBuf,
    env: HashMap<String, String>,
    token: CancellationToken,
    closed: AtomicBool,
    releases: AtomicUsize,
}

impl LoadContext {
    fn new(root: PathBuf, env: HashMap<String, String>) -> Self {
        Self {
            root,
            env,
            token: CancellationToken::new(),
            closed: AtomicBool::new(false),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Cancelled when the archive is closed.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolve a manifest `program`. Bare names are left for `PATH` lookup;
    /// other relative paths are joined to the archive root.
    pub fn resolve_program(&self, program: &str) -> PathBuf {
        let path = Path::new(program);
        if path.is_absolute() || path.components().count() == 1 {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// One externally loaded code unit.
///
/// Created by [`PluginArchive::open`]. Its load context is released exactly
/// once, by [`PluginArchive::close`]; after that every handler it produced
/// fails with [`ArchiveError::Closed`].
#[derive(Debug)]
pub struct PluginArchive {
    path: PathBuf,
    manifest: Manifest,
    context: LoadContext,
}

impl PluginArchive {
    /// Open an archive directory (containing `plugin.toml`) or a manifest
    /// file directly.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>, ArchiveError> {
        let path = path.as_ref();
        let manifest_path = if path.is_dir() {
            path.join(MANIFEST_FILE)
        } else {
            path.to_path_buf()
        };
        let root = manifest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let manifest = Manifest::load(&manifest_path)?;
        let context = LoadContext::new(root, manifest.archive.env.clone());

        info!(
            archive = %manifest.archive.name,
            version = %manifest.archive.version,
            path = %manifest_path.display(),
            cogs = manifest.cogs.len(),
            "Plugin archive opened"
        );

        Ok(Arc::new(Self {
            path: manifest_path,
            manifest,
            context,
        }))
    }

    pub fn name(&self) -> &str {
        &self.manifest.archive.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.archive.version
    }

    /// Path of the manifest this archive was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Path {
        self.context.root()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn context(&self) -> &LoadContext {
        &self.context
    }

    pub fn is_closed(&self) -> bool {
        self.context.closed.load(Ordering::SeqCst)
    }

    /// How many times the load context has been released. Never above one.
    pub fn release_count(&self) -> usize {
        self.context.releases.load(Ordering::SeqCst)
    }

    /// Release the load context. Returns `true` only for the call that
    /// actually released it.
    pub fn close(&self) -> bool {
        if self.context.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.context.releases.fetch_add(1, Ordering::SeqCst);
        self.context.token.cancel();
        info!(archive = %self.name(), "Plugin archive closed");
        true
    }

    pub(crate) fn ensure_open(&self) -> Result<(), ArchiveError> {
        if self.is_closed() {
            Err(ArchiveError::Closed(self.name().to_string()))
        } else {
            Ok(())
        }
    }

    /// Instantiate every cog declared at or beneath `namespace`, inside this
    /// archive's load context.
    pub fn instantiate_cogs(
        self: &Arc<Self>,
        namespace: &str,
    ) -> Result<Vec<Arc<dyn Cog>>, ArchiveError> {
        self.ensure_open()?;
        Ok(self
            .manifest
            .cogs
            .iter()
            .filter(|cog| namespace_matches(namespace, &cog.namespace))
            .map(|cog| {
                Arc::new(ArchiveCog {
                    archive: Arc::clone(self),
                    manifest: cog.clone(),
                }) as Arc<dyn Cog>
            })
            .collect())
    }
}

/// A cog declared by an archive manifest. Its handlers run the declared
/// programs through the process bridge.
pub struct ArchiveCog {
    archive: Arc<PluginArchive>,
    manifest: CogManifest,
}

impl ArchiveCog {
    pub fn archive(&self) -> &Arc<PluginArchive> {
        &self.archive
    }

    fn command_spec(&self, command: &CommandManifest) -> CommandSpec {
        let mut spec = CommandSpec::new(command.name.clone())
            .name(command.name.clone())
            .aliases(command.aliases.iter().cloned());
        if let Some(description) = &command.description {
            spec = spec.description(description.clone());
        }
        for param in &command.params {
            let ty: ArgType = param.ty.parse().unwrap_or_else(|never| match never {});
            let mut arg = if param.optional {
                ArgSpec::optional(param.name.clone(), ty)
            } else {
                ArgSpec::required(param.name.clone(), ty)
            };
            if let Some(raw) = &param.default {
                arg = arg.with_raw_default(raw.clone());
            }
            if param.greedy {
                arg = arg.greedy();
            }
            if let Some(description) = &param.description {
                arg = arg.describe(description.clone());
            }
            spec = spec.arg(arg);
        }

        let bridge = Arc::new(ProcessCommand::new(
            Arc::clone(&self.archive),
            &self.manifest.name,
            command,
        ));
        match command.mode {
            Mode::Blocking => spec.blocking(move |ctx, args| bridge.run_blocking(ctx, args)),
            Mode::Suspending => spec.suspending(move |ctx, args| {
                let bridge = Arc::clone(&bridge);
                async move { bridge.run(ctx, args).await }
            }),
        }
    }
}

impl Cog for ArchiveCog {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn description(&self) -> Option<&str> {
        self.manifest.description.as_deref()
    }

    fn commands(self: Arc<Self>) -> Vec<CommandSpec> {
        self.manifest
            .commands
            .iter()
            .map(|command| self.command_spec(command))
            .collect()
    }
}
