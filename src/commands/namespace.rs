//! Static table of local cogs, keyed by namespace path.

use super::Cog;
use std::sync::Arc;

type CogFactory = Arc<dyn Fn() -> Arc<dyn Cog> + Send + Sync>;

/// Whether `path` selects `namespace`: equal, a dotted parent of it, or empty.
pub(crate) fn namespace_matches(path: &str, namespace: &str) -> bool {
    path.is_empty()
        || namespace == path
        || namespace
            .strip_prefix(path)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Namespaces the host can load cogs from.
///
/// Each entry pairs a dotted namespace path with a factory. Scanning a path
/// builds a fresh cog for every entry at or beneath it.
#[derive(Clone, Default)]
pub struct NamespaceCatalog {
    entries: Vec<(String, CogFactory)>,
}

impl NamespaceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C, F>(&mut self, namespace: impl Into<String>, factory: F)
    where
        C: Cog,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let factory: CogFactory = Arc::new(move || Arc::new(factory()) as Arc<dyn Cog>);
        self.entries.push((namespace.into(), factory));
    }

    /// Builder form of [`NamespaceCatalog::register`].
    pub fn with<C, F>(mut self, namespace: impl Into<String>, factory: F) -> Self
    where
        C: Cog,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.register(namespace, factory);
        self
    }

    /// Instantiate every cog registered at or beneath `path`, in
    /// registration order.
    pub fn cogs_in(&self, path: &str) -> Vec<Arc<dyn Cog>> {
        self.entries
            .iter()
            .filter(|(namespace, _)| namespace_matches(path, namespace))
            .map(|(_, factory)| factory())
            .collect()
    }

    /// Distinct namespace paths, in registration order.
    pub fn namespaces(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for (namespace, _) in &self.entries {
            if !seen.contains(&namespace.as_str()) {
                seen.push(namespace.as_str());
            }
        }
        seen
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
