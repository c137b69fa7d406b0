//! The command registry.
//!
//! Owns every [`Executable`], resolves triggers and coordinates plugin
//! archive teardown. All state sits behind one `RwLock`: lookups share the
//! read lock, and every structural change (including the check whether an
//! archive is still referenced, and its release) happens under the write
//! lock.

use super::{Cog, Executable, Indexer, NamespaceCatalog};
use crate::args::ParserSet;
use crate::error::{ArchiveError, RegistryError};
use crate::plugin::{MANIFEST_FILE, PluginArchive};
use crate::telemetry::spans;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Entry {
    /// Registration order; alias ties go to the lowest.
    seq: u64,
    command: Arc<Executable>,
}

#[derive(Default)]
struct Inner {
    commands: HashMap<String, Entry>,
    next_seq: u64,
}

impl Inner {
    fn ordered(&self) -> Vec<&Entry> {
        let mut entries: Vec<_> = self.commands.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }

    fn references(&self, archive: &Arc<PluginArchive>) -> bool {
        self.commands
            .values()
            .any(|e| e.command.from_archive(archive))
    }

    fn remove_where(&mut self, pred: impl Fn(&Executable) -> bool) -> Vec<Arc<Executable>> {
        let names: Vec<String> = self
            .commands
            .iter()
            .filter(|(_, e)| pred(&e.command))
            .map(|(name, _)| name.clone())
            .collect();
        let mut removed: Vec<Entry> = names
            .iter()
            .filter_map(|name| self.commands.remove(name))
            .collect();
        removed.sort_by_key(|e| e.seq);
        removed.into_iter().map(|e| e.command).collect()
    }

    /// Release every archive referenced by `removed` that nothing left in the
    /// registry references.
    fn release_unreferenced(&self, removed: &[Arc<Executable>]) {
        let mut checked: Vec<&Arc<PluginArchive>> = Vec::new();
        for archive in removed.iter().filter_map(|c| c.archive()) {
            if checked.iter().any(|a| Arc::ptr_eq(a, archive)) {
                continue;
            }
            checked.push(archive);
            if !self.references(archive) {
                archive.close();
            }
        }
    }
}

/// Mapping from command name to descriptor.
pub struct CommandRegistry {
    inner: RwLock<Inner>,
    parsers: Arc<ParserSet>,
    catalog: NamespaceCatalog,
}

impl CommandRegistry {
    /// An empty registry with no local namespaces.
    pub fn new(parsers: Arc<ParserSet>) -> Self {
        Self::with_catalog(parsers, NamespaceCatalog::new())
    }

    pub fn with_catalog(parsers: Arc<ParserSet>, catalog: NamespaceCatalog) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            parsers,
            catalog,
        }
    }

    pub fn parsers(&self) -> &Arc<ParserSet> {
        &self.parsers
    }

    pub fn catalog(&self) -> &NamespaceCatalog {
        &self.catalog
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Insert one descriptor. Fails if its name is taken.
    pub fn register(&self, command: Executable) -> Result<Arc<Executable>, RegistryError> {
        let mut inserted = self.insert_batch(vec![command])?;
        Ok(inserted.remove(0))
    }

    /// Index and register one caller-supplied cog, all or nothing.
    pub fn register_cog(
        &self,
        cog: Arc<dyn Cog>,
    ) -> Result<Vec<Arc<Executable>>, RegistryError> {
        let found = Indexer::new(&self.parsers).index_cog(cog, None)?;
        self.insert_batch(found)
    }

    /// Register every cog the catalog holds at or beneath `path`. The whole
    /// namespace registers or nothing does.
    pub fn load_from_namespace(&self, path: &str) -> Result<Vec<Arc<Executable>>, RegistryError> {
        let indexer = Indexer::new(&self.parsers);
        let mut found = Vec::new();
        for cog in self.catalog.cogs_in(path) {
            found.extend(indexer.index_cog(cog, None)?);
        }
        let inserted = self.insert_batch(found)?;
        info!(namespace = %path, commands = inserted.len(), "Loaded namespace");
        Ok(inserted)
    }

    /// Open the archive at `path`, index the cogs at or beneath `namespace`
    /// inside its load context and register them, all or nothing.
    ///
    /// On any failure the archive is closed before the error is returned. An
    /// archive that contributes no commands is closed too, since nothing
    /// would reference it.
    pub fn load_from_archive(
        &self,
        path: impl AsRef<Path>,
        namespace: &str,
    ) -> Result<Arc<PluginArchive>, RegistryError> {
        let path = path.as_ref();
        let _span = spans::archive(&path.display().to_string(), namespace).entered();

        let archive = PluginArchive::open(path).map_err(|source| RegistryError::ArchiveLoad {
            path: path.to_path_buf(),
            source,
        })?;

        let inserted = Indexer::new(&self.parsers)
            .index_archive(&archive, namespace)
            .and_then(|found| self.insert_batch(found));
        match inserted {
            Ok(commands) if commands.is_empty() => {
                warn!(archive = %archive.name(), "Archive contributed no commands");
                archive.close();
                Ok(archive)
            }
            Ok(commands) => {
                info!(
                    archive = %archive.name(),
                    version = %archive.version(),
                    commands = commands.len(),
                    "Loaded plugin archive"
                );
                Ok(archive)
            }
            Err(e) => {
                archive.close();
                warn!(archive = %archive.name(), error = %e, code = e.error_code(), "Archive load failed");
                Err(e)
            }
        }
    }

    /// Load every `<dir>/*/plugin.toml`, each archive on its own.
    pub fn load_from_directory(
        &self,
        dir: impl AsRef<Path>,
    ) -> Vec<Result<Arc<PluginArchive>, RegistryError>> {
        let dir = dir.as_ref();
        let pattern = format!(
            "{}/*/{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            MANIFEST_FILE
        );
        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                return vec![Err(RegistryError::ArchiveLoad {
                    path: dir.to_path_buf(),
                    source: ArchiveError::Invalid(e.to_string()),
                })];
            }
        };

        let mut manifests: Vec<_> = paths.filter_map(Result::ok).collect();
        manifests.sort();
        debug!(dir = %dir.display(), found = manifests.len(), "Scanning plugin directory");
        manifests
            .into_iter()
            .map(|manifest| self.load_from_archive(manifest, ""))
            .collect()
    }

    fn insert_batch(&self, batch: Vec<Executable>) -> Result<Vec<Arc<Executable>>, RegistryError> {
        let mut inner = self.inner.write();

        let mut names = Vec::with_capacity(batch.len());
        for command in &batch {
            let name = command.name();
            if inner.commands.contains_key(name) || names.contains(&name) {
                debug!(command = %name, "Rejected duplicate command");
                return Err(RegistryError::DuplicateCommand(name.to_string()));
            }
            names.push(name);
        }

        let mut inserted = Vec::with_capacity(batch.len());
        for command in batch {
            let command = Arc::new(command);
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.commands.insert(
                command.name().to_string(),
                Entry {
                    seq,
                    command: Arc::clone(&command),
                },
            );
            inserted.push(command);
        }
        Ok(inserted)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn find_by_name(&self, name: &str) -> Option<Arc<Executable>> {
        self.inner
            .read()
            .commands
            .get(name)
            .map(|e| Arc::clone(&e.command))
    }

    /// The earliest-registered command carrying `alias`.
    pub fn find_by_alias(&self, alias: &str) -> Option<Arc<Executable>> {
        self.inner
            .read()
            .commands
            .values()
            .filter(|e| e.command.has_alias(alias))
            .min_by_key(|e| e.seq)
            .map(|e| Arc::clone(&e.command))
    }

    /// Name first, then alias.
    pub fn resolve(&self, trigger: &str) -> Option<Arc<Executable>> {
        self.find_by_name(trigger)
            .or_else(|| self.find_by_alias(trigger))
    }

    /// A registered cog whose name is `name`.
    pub fn find_module_by_name(&self, name: &str) -> Option<Arc<dyn Cog>> {
        self.inner
            .read()
            .ordered()
            .into_iter()
            .find(|e| e.command.cog().name() == name)
            .map(|e| Arc::clone(e.command.cog()))
    }

    pub fn commands_of_module(&self, cog: &Arc<dyn Cog>) -> Vec<Arc<Executable>> {
        self.inner
            .read()
            .ordered()
            .into_iter()
            .filter(|e| e.command.owned_by(cog))
            .map(|e| Arc::clone(&e.command))
            .collect()
    }

    /// Every command, in registration order.
    pub fn commands(&self) -> Vec<Arc<Executable>> {
        self.inner
            .read()
            .ordered()
            .into_iter()
            .map(|e| Arc::clone(&e.command))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .ordered()
            .into_iter()
            .map(|e| e.command.name().to_string())
            .collect()
    }

    /// Distinct cogs owning at least one command.
    pub fn modules(&self) -> Vec<Arc<dyn Cog>> {
        let mut cogs: Vec<Arc<dyn Cog>> = Vec::new();
        for command in self.commands() {
            if !cogs.iter().any(|c| command.owned_by(c)) {
                cogs.push(Arc::clone(command.cog()));
            }
        }
        cogs
    }

    /// Distinct archives referenced by at least one command.
    pub fn archives(&self) -> Vec<Arc<PluginArchive>> {
        let mut archives: Vec<Arc<PluginArchive>> = Vec::new();
        for command in self.commands() {
            if let Some(archive) = command.archive()
                && !archives.iter().any(|a| Arc::ptr_eq(a, archive))
            {
                archives.push(Arc::clone(archive));
            }
        }
        archives
    }

    pub fn find_archive_by_name(&self, name: &str) -> Option<Arc<PluginArchive>> {
        self.archives().into_iter().find(|a| a.name() == name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().commands.is_empty()
    }

    /// Get command usage statistics, busiest first, skipping unused commands.
    pub fn command_stats(&self) -> Vec<(String, u64)> {
        let mut stats: Vec<_> = self
            .inner
            .read()
            .commands
            .values()
            .map(|e| (e.command.name().to_string(), e.command.invocations()))
            .filter(|(_, count)| *count > 0)
            .collect();

        stats.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove one command. Its archive is released if nothing else
    /// references it.
    pub fn unregister_command(&self, name: &str) -> Option<Arc<Executable>> {
        let mut inner = self.inner.write();
        let removed = inner.commands.remove(name)?.command;
        inner.release_unreferenced(std::slice::from_ref(&removed));
        info!(command = %name, "Unregistered command");
        Some(removed)
    }

    /// Remove every command owned by `cog`, releasing archives left without
    /// references.
    pub fn unregister_module(&self, cog: &Arc<dyn Cog>) -> Vec<Arc<Executable>> {
        let mut inner = self.inner.write();
        let removed = inner.remove_where(|c| c.owned_by(cog));
        inner.release_unreferenced(&removed);
        info!(cog = %cog.name(), commands = removed.len(), "Unregistered cog");
        removed
    }

    /// Remove every command from `archive` and release it unconditionally.
    pub fn unregister_archive(&self, archive: &Arc<PluginArchive>) -> Vec<Arc<Executable>> {
        let mut inner = self.inner.write();
        let removed = inner.remove_where(|c| c.from_archive(archive));
        archive.close();
        info!(archive = %archive.name(), commands = removed.len(), "Unregistered archive");
        removed
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish_non_exhaustive()
    }
}
