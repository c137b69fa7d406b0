//! Command discovery and registration.
//!
//! ## Discovery Protocol
//!
//! Rust has no runtime reflection, so a module of commands (a [`Cog`])
//! describes its handlers structurally: [`Cog::commands`] returns one
//! [`CommandSpec`] per handler, carrying the name, aliases, parameter list and
//! invocation strategy. The [`Indexer`] validates those specs and turns them
//! into [`Executable`] descriptors, which the [`CommandRegistry`] owns.
//!
//! Local cogs are found through a [`NamespaceCatalog`], a static table of
//! namespace paths and cog factories. Cogs from plugin archives are
//! instantiated inside the archive's load context (see [`crate::plugin`]).

mod cog;
mod executable;
mod indexer;
mod namespace;
mod registry;

pub use cog::{Cog, CommandSpec};
pub use executable::{BlockingHandler, Executable, Handler, Strategy, SuspendingHandler};
pub use indexer::Indexer;
pub use namespace::NamespaceCatalog;
pub use registry::CommandRegistry;

pub(crate) use namespace::namespace_matches;
