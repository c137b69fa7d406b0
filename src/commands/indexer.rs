//! Turns cog declarations into validated command descriptors.

use super::cog::SpecParts;
use super::{Cog, Executable};
use crate::args::{ArgType, ParserSet, parse_literal};
use crate::error::RegistryError;
use crate::plugin::PluginArchive;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Validates the handler shapes a cog declares.
pub struct Indexer<'a> {
    parsers: &'a ParserSet,
}

impl<'a> Indexer<'a> {
    pub fn new(parsers: &'a ParserSet) -> Self {
        Self { parsers }
    }

    /// Build one descriptor per declared handler of `cog`.
    ///
    /// A cog that declares nothing yields an empty list. Any malformed
    /// declaration fails the whole cog; names repeated within the cog fail
    /// with [`RegistryError::DuplicateCommand`].
    pub fn index_cog(
        &self,
        cog: Arc<dyn Cog>,
        archive: Option<&Arc<PluginArchive>>,
    ) -> Result<Vec<Executable>, RegistryError> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for spec in Arc::clone(&cog).commands() {
            let parts = spec.into_parts();
            self.validate(&parts)?;
            if !seen.insert(parts.name.clone()) {
                return Err(RegistryError::DuplicateCommand(parts.name));
            }

            let SpecParts {
                name,
                aliases,
                description,
                arguments,
                mut handlers,
            } = parts;
            let Some(handler) = handlers.pop() else {
                return Err(RegistryError::shape(name, "no handler declared"));
            };

            debug!(command = %name, cog = %cog.name(), strategy = ?handler.strategy(), "Indexed command");
            found.push(Executable::new(
                name,
                aliases,
                description,
                arguments,
                Arc::clone(&cog),
                archive.cloned(),
                handler,
            ));
        }

        Ok(found)
    }

    /// Instantiate and index every cog at or beneath `namespace` inside the
    /// archive's load context.
    pub fn index_archive(
        &self,
        archive: &Arc<PluginArchive>,
        namespace: &str,
    ) -> Result<Vec<Executable>, RegistryError> {
        let cogs = archive
            .instantiate_cogs(namespace)
            .map_err(|source| RegistryError::ArchiveLoad {
                path: archive.path().to_path_buf(),
                source,
            })?;
        let mut found = Vec::new();
        for cog in cogs {
            found.extend(self.index_cog(cog, Some(archive))?);
        }
        Ok(found)
    }

    fn validate(&self, parts: &SpecParts) -> Result<(), RegistryError> {
        let name = &parts.name;
        let fail = |reason: String| Err(RegistryError::shape(name.clone(), reason));

        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return fail(format!("invalid command name {name:?}"));
        }
        if let Some(alias) = parts
            .aliases
            .iter()
            .find(|a| a.is_empty() || a.chars().any(char::is_whitespace))
        {
            return fail(format!("invalid alias {alias:?}"));
        }
        match parts.handlers.len() {
            0 => return fail("no handler declared".into()),
            1 => {}
            n => return fail(format!("{n} handlers declared")),
        }

        let mut params = HashSet::new();
        let last = parts.arguments.len().saturating_sub(1);
        for (index, arg) in parts.arguments.iter().enumerate() {
            if arg.name().is_empty() {
                return fail(format!("parameter {index} has no name"));
            }
            if !params.insert(arg.name()) {
                return fail(format!("parameter {} declared twice", arg.name()));
            }
            if !self.parsers.supports(arg.ty()) {
                return fail(format!(
                    "parameter {} has unresolvable type {}",
                    arg.name(),
                    arg.ty()
                ));
            }
            if arg.is_greedy() && index != last {
                return fail(format!("greedy parameter {} is not last", arg.name()));
            }
            if let Some(raw) = arg.raw_default() {
                let builtin = !matches!(arg.ty(), ArgType::Custom(_));
                if builtin && parse_literal(arg.ty(), raw).is_none() {
                    return fail(format!(
                        "default {raw:?} of parameter {} is not a valid {}",
                        arg.name(),
                        arg.ty()
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ArgSpec;
    use crate::commands::{CommandSpec, Strategy};

    struct Fixture(Vec<CommandSpec>);

    impl Cog for Fixture {
        fn name(&self) -> &str {
            "Fixture"
        }

        fn commands(self: Arc<Self>) -> Vec<CommandSpec> {
            self.0.clone()
        }
    }

    fn index(specs: Vec<CommandSpec>) -> Result<Vec<Executable>, RegistryError> {
        let parsers = ParserSet::with_defaults();
        Indexer::new(&parsers).index_cog(Arc::new(Fixture(specs)), None)
    }

    fn ok(name: &str) -> CommandSpec {
        CommandSpec::new(name).blocking(|_ctx, _args| Ok(()))
    }

    fn shape_reason(result: Result<Vec<Executable>, RegistryError>) -> String {
        match result {
            Err(RegistryError::AmbiguousHandlerShape { reason, .. }) => reason,
            other => panic!("expected shape error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_cog_registers_nothing() {
        assert!(index(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_builds_descriptors() {
        let found = index(vec![
            ok("Ping").alias("p"),
            CommandSpec::new("Wait").suspending(|_ctx, _args| async { anyhow::Ok(()) }),
        ])
        .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name(), "ping");
        assert!(found[0].has_alias("p"));
        assert_eq!(found[0].cog().name(), "Fixture");
        assert!(found[0].archive().is_none());
        assert_eq!(found[1].strategy(), Strategy::Suspending);
    }

    #[test]
    fn test_greedy_must_be_last() {
        let reason = shape_reason(index(vec![
            ok("say")
                .arg(ArgSpec::required("text", ArgType::String).greedy())
                .arg(ArgSpec::required("n", ArgType::Int)),
        ]));
        assert!(reason.contains("greedy"), "{reason}");
    }

    #[test]
    fn test_rejects_unresolvable_type_and_duplicate_params() {
        let reason = shape_reason(index(vec![
            ok("wait").arg(ArgSpec::required("d", ArgType::Custom("duration".into()))),
        ]));
        assert!(reason.contains("unresolvable"), "{reason}");

        let reason = shape_reason(index(vec![
            ok("pair")
                .arg(ArgSpec::required("x", ArgType::Int))
                .arg(ArgSpec::required("x", ArgType::Int)),
        ]));
        assert!(reason.contains("twice"), "{reason}");
    }

    #[test]
    fn test_rejects_missing_or_extra_handlers() {
        shape_reason(index(vec![CommandSpec::new("nothing")]));
        shape_reason(index(vec![ok("both").blocking(|_ctx, _args| Ok(()))]));
        shape_reason(index(vec![ok("bad name")]));
    }

    #[test]
    fn test_rejects_unparseable_builtin_default() {
        let reason = shape_reason(index(vec![
            ok("roll").arg(ArgSpec::optional("sides", ArgType::Int).with_raw_default("six")),
        ]));
        assert!(reason.contains("six"), "{reason}");
        assert!(index(vec![
            ok("roll").arg(ArgSpec::optional("sides", ArgType::Int).with_raw_default("6")),
        ])
        .is_ok());
    }

    #[test]
    fn test_duplicate_names_within_cog() {
        let err = index(vec![ok("Ping"), ok("ping")]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCommand(ref n) if n == "ping"));
    }
}
