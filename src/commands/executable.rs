//! Command descriptors.

use super::Cog;
use crate::args::{ArgSpec, Arguments};
use crate::context::{Context, Reply};
use crate::plugin::PluginArchive;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A handler that runs to completion on the calling (or a pool) thread.
pub type BlockingHandler =
    Arc<dyn Fn(&Context, &Arguments) -> anyhow::Result<Reply> + Send + Sync>;

/// A handler that returns a future for the async runtime to drive.
pub type SuspendingHandler =
    Arc<dyn Fn(Context, Arguments) -> BoxFuture<'static, anyhow::Result<Reply>> + Send + Sync>;

/// Invocation strategy of a handler.
#[derive(Clone)]
pub enum Handler {
    Blocking(BlockingHandler),
    Suspending(SuspendingHandler),
}

impl Handler {
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Blocking(_) => Strategy::Blocking,
            Self::Suspending(_) => Strategy::Suspending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Blocking,
    Suspending,
}

/// One invocable command: metadata, owner references and the handler.
pub struct Executable {
    name: String,
    aliases: Vec<String>,
    description: Option<String>,
    arguments: Vec<ArgSpec>,
    cog: Arc<dyn Cog>,
    archive: Option<Arc<PluginArchive>>,
    handler: Handler,
    invocations: AtomicU64,
}

impl Executable {
    pub(crate) fn new(
        name: String,
        aliases: Vec<String>,
        description: Option<String>,
        arguments: Vec<ArgSpec>,
        cog: Arc<dyn Cog>,
        archive: Option<Arc<PluginArchive>>,
        handler: Handler,
    ) -> Self {
        Self {
            name,
            aliases,
            description,
            arguments,
            cog,
            archive,
            handler,
            invocations: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn arguments(&self) -> &[ArgSpec] {
        &self.arguments
    }

    pub fn cog(&self) -> &Arc<dyn Cog> {
        &self.cog
    }

    pub fn archive(&self) -> Option<&Arc<PluginArchive>> {
        self.archive.as_ref()
    }

    pub(crate) fn from_archive(&self, archive: &Arc<PluginArchive>) -> bool {
        self.archive
            .as_ref()
            .is_some_and(|own| Arc::ptr_eq(own, archive))
    }

    pub(crate) fn owned_by(&self, cog: &Arc<dyn Cog>) -> bool {
        Arc::ptr_eq(&self.cog, cog)
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn strategy(&self) -> Strategy {
        self.handler.strategy()
    }

    /// `name <arg> [arg]` usage line.
    pub fn usage(&self) -> String {
        std::iter::once(self.name.clone())
            .chain(self.arguments.iter().map(ArgSpec::usage))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Executable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executable")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("cog", &self.cog.name())
            .field("archive", &self.archive.as_ref().map(|a| a.name()))
            .field("strategy", &self.strategy())
            .finish()
    }
}
