//! cogwork - command registry and execution engine for chat bots.
//!
//! Commands are grouped into cogs, discovered through a namespace catalog or
//! loaded from plugin archives at runtime, bound against typed parameter
//! lists and executed inline, on a worker pool or as async tasks.
//!
//! ```ignore
//! let parsers = Arc::new(ParserSet::with_defaults());
//! let registry = Arc::new(CommandRegistry::with_catalog(parsers.clone(), builtin::catalog()));
//! registry.load_from_namespace(builtin::NAMESPACE)?;
//!
//! let engine = Engine::new(Handle::current(), parsers);
//! let cmd = registry.resolve("echo").expect("registered");
//! let outcome = engine.submit(cmd, ctx, "hello world", None).await?;
//! ```

pub mod args;
pub mod builtin;
pub mod commands;
pub mod config;
pub mod console;
pub mod context;
pub mod engine;
pub mod error;
pub mod plugin;
pub mod scheduler;
pub mod telemetry;

pub use args::{ArgSpec, ArgType, ArgValue, Arguments, Parser, ParserSet, Snowflake};
pub use commands::{Cog, CommandRegistry, CommandSpec, Executable, NamespaceCatalog};
pub use context::{Context, PendingAction, Reply, Responder};
pub use engine::{Completion, Engine, WorkerPool};
pub use error::{ArchiveError, CommandError, Outcome, RegistryError};
pub use plugin::PluginArchive;
pub use scheduler::{CancelableTask, Scheduler};
