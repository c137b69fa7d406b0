//! Cogs shipped with the binary.
//!
//! - `meta`: ping, echo, help, stats, sleep
//! - `plugins`: load, unload, unloadarchive, cogs

use crate::args::{ArgSpec, ArgType, ArgValue};
use crate::commands::{Cog, CommandSpec, NamespaceCatalog};
use crate::context::Context;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Namespace holding every built-in cog.
pub const NAMESPACE: &str = "cogwork.builtin";

/// Catalog of the built-in cogs.
pub fn catalog() -> NamespaceCatalog {
    NamespaceCatalog::new()
        .with(format!("{NAMESPACE}.meta"), || MetaCog)
        .with(format!("{NAMESPACE}.plugins"), || PluginsCog)
}

pub struct MetaCog;

impl MetaCog {
    fn help(ctx: &Context, topic: Option<&str>) -> String {
        let Some(topic) = topic else {
            let mut out = String::from("Commands:");
            for cmd in ctx.registry.commands() {
                let _ = write!(out, "\n  {}", cmd.usage());
                if let Some(description) = cmd.description() {
                    let _ = write!(out, "  - {description}");
                }
            }
            return out;
        };

        match ctx.registry.resolve(topic) {
            Some(cmd) => {
                let mut out = format!("Usage: {}", cmd.usage());
                if let Some(description) = cmd.description() {
                    let _ = write!(out, "\n{description}");
                }
                if !cmd.aliases().is_empty() {
                    let _ = write!(out, "\nAliases: {}", cmd.aliases().join(", "));
                }
                for arg in cmd.arguments() {
                    if let Some(description) = arg.description() {
                        let _ = write!(out, "\n  {} ({}): {description}", arg.name(), arg.ty());
                    }
                }
                let _ = write!(out, "\nCog: {}", cmd.cog().name());
                out
            }
            None => format!("No command named {topic}"),
        }
    }
}

impl Cog for MetaCog {
    fn name(&self) -> &str {
        "Meta"
    }

    fn description(&self) -> Option<&str> {
        Some("Introspection and diagnostics")
    }

    fn commands(self: Arc<Self>) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("Ping")
                .description("Check that commands are being handled")
                .blocking(|ctx, _args| Ok(ctx.reply("Pong!"))),
            CommandSpec::new("Echo")
                .alias("say")
                .description("Repeat the given text")
                .arg(ArgSpec::required("text", ArgType::String).greedy())
                .blocking(|ctx, args| Ok(ctx.reply(args.str("text").unwrap_or_default()))),
            CommandSpec::new("Help")
                .alias("h")
                .description("List commands or describe one")
                .arg(ArgSpec::optional("command", ArgType::String))
                .blocking(|ctx, args| Ok(ctx.reply(Self::help(ctx, args.str("command"))))),
            CommandSpec::new("Stats")
                .description("Invocation counts per command")
                .blocking(|ctx, _args| {
                    let stats = ctx.registry.command_stats();
                    let text = if stats.is_empty() {
                        "No commands used yet".to_string()
                    } else {
                        stats
                            .iter()
                            .map(|(name, count)| format!("{name}: {count}"))
                            .collect::<Vec<_>>()
                            .join("\n")
                    };
                    Ok(ctx.reply(text))
                }),
            CommandSpec::new("Sleep")
                .description("Wait while showing the typing indicator")
                .arg(
                    ArgSpec::optional("millis", ArgType::Int)
                        .with_default(ArgValue::Int(1000))
                        .describe("How long to wait"),
                )
                .suspending(|ctx: Context, args| async move {
                    let millis = args.int("millis").unwrap_or(1000).clamp(0, 60_000) as u64;
                    ctx.typing_async(tokio::time::sleep(Duration::from_millis(millis)))
                        .await;
                    anyhow::Ok(ctx.reply(format!("Slept for {millis}ms")))
                }),
        ]
    }
}

pub struct PluginsCog;

impl Cog for PluginsCog {
    fn name(&self) -> &str {
        "Plugins"
    }

    fn description(&self) -> Option<&str> {
        Some("Load and unload plugin archives")
    }

    fn commands(self: Arc<Self>) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("Load")
                .description("Load a plugin archive")
                .arg(ArgSpec::required("path", ArgType::String))
                .arg(
                    ArgSpec::optional("namespace", ArgType::String)
                        .describe("Only cogs at or beneath this namespace"),
                )
                .blocking(|ctx, args| {
                    let path = args.str("path").unwrap_or_default();
                    let namespace = args.str("namespace").unwrap_or_default();
                    let archive = ctx.registry.load_from_archive(path, namespace)?;
                    let count = ctx
                        .registry
                        .commands()
                        .iter()
                        .filter(|c| c.from_archive(&archive))
                        .count();
                    Ok(ctx.reply(format!(
                        "Loaded {} {} ({count} commands)",
                        archive.name(),
                        archive.version()
                    )))
                }),
            CommandSpec::new("Unload")
                .description("Unload a cog and its commands")
                .arg(ArgSpec::required("cog", ArgType::String))
                .blocking(|ctx, args| {
                    let name = args.str("cog").unwrap_or_default();
                    let text = match ctx.registry.find_module_by_name(name) {
                        Some(cog) => {
                            let removed = ctx.registry.unregister_module(&cog);
                            format!("Unloaded {name} ({} commands)", removed.len())
                        }
                        None => format!("No cog named {name}"),
                    };
                    Ok(ctx.reply(text))
                }),
            CommandSpec::new("UnloadArchive")
                .description("Unload every command from a plugin archive")
                .arg(ArgSpec::required("archive", ArgType::String))
                .blocking(|ctx, args| {
                    let name = args.str("archive").unwrap_or_default();
                    let text = match ctx.registry.find_archive_by_name(name) {
                        Some(archive) => {
                            let removed = ctx.registry.unregister_archive(&archive);
                            format!("Unloaded archive {name} ({} commands)", removed.len())
                        }
                        None => format!("No archive named {name}"),
                    };
                    Ok(ctx.reply(text))
                }),
            CommandSpec::new("Cogs")
                .description("List loaded cogs")
                .blocking(|ctx, _args| {
                    let mut out = String::from("Cogs:");
                    for cog in ctx.registry.modules() {
                        let commands = ctx.registry.commands_of_module(&cog);
                        let origin = commands
                            .first()
                            .and_then(|c| c.archive())
                            .map(|a| format!(" [{}]", a.name()))
                            .unwrap_or_default();
                        let _ = write!(out, "\n  {}{origin}: ", cog.name());
                        out.push_str(
                            &commands
                                .iter()
                                .map(|c| c.name())
                                .collect::<Vec<_>>()
                                .join(", "),
                        );
                    }
                    Ok(ctx.reply(out))
                }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ParserSet;
    use crate::commands::CommandRegistry;

    fn registry() -> CommandRegistry {
        let registry = CommandRegistry::with_catalog(Arc::new(ParserSet::with_defaults()), catalog());
        registry.load_from_namespace(NAMESPACE).unwrap();
        registry
    }

    #[test]
    fn test_builtin_namespace_registers_both_cogs() {
        let registry = registry();
        for name in ["ping", "echo", "help", "stats", "sleep", "load", "unload", "unloadarchive", "cogs"] {
            assert!(registry.find_by_name(name).is_some(), "missing {name}");
        }
        assert_eq!(registry.find_by_alias("say").unwrap().name(), "echo");
        assert_eq!(registry.modules().len(), 2);
    }

    #[test]
    fn test_subnamespace_loads_one_cog() {
        let registry = CommandRegistry::with_catalog(Arc::new(ParserSet::with_defaults()), catalog());
        registry
            .load_from_namespace(&format!("{NAMESPACE}.meta"))
            .unwrap();
        assert!(registry.find_by_name("ping").is_some());
        assert!(registry.find_by_name("load").is_none());
    }
}
