//! The `Cog` trait and the structural command declaration.

use super::{BlockingHandler, Handler, SuspendingHandler};
use crate::args::{ArgSpec, Arguments};
use crate::context::{Context, Reply};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// A logical group of commands.
///
/// Implementations describe their handlers in [`Cog::commands`]. Handlers
/// usually capture the `Arc<Self>` they are given so they can reach cog
/// state.
pub trait Cog: Send + Sync + 'static {
    /// Display name, used by `find_module_by_name` and in logs.
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// One declaration per handler. Returning nothing is valid.
    fn commands(self: Arc<Self>) -> Vec<CommandSpec>;
}

/// Declaration of one handler, as returned by [`Cog::commands`].
///
/// ```ignore
/// CommandSpec::new("Ping")
///     .alias("p")
///     .blocking(|ctx, _args| Ok(ctx.reply("pong")))
/// ```
#[derive(Clone)]
pub struct CommandSpec {
    ident: String,
    name: Option<String>,
    aliases: Vec<String>,
    description: Option<String>,
    arguments: Vec<ArgSpec>,
    handlers: Vec<Handler>,
}

impl CommandSpec {
    /// Start a declaration for the handler identified by `ident`. Unless
    /// [`CommandSpec::name`] is given, the command name is `ident`
    /// lowercased.
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            name: None,
            aliases: Vec::new(),
            description: None,
            arguments: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.arguments.push(spec);
        self
    }

    /// Handler that runs to completion on the calling or pool thread.
    pub fn blocking<F, R>(self, handler: F) -> Self
    where
        F: Fn(&Context, &Arguments) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        let handler: BlockingHandler =
            Arc::new(move |ctx: &Context, args: &Arguments| handler(ctx, args).map(Into::into));
        self.handler(Handler::Blocking(handler))
    }

    /// Handler driven by the async runtime.
    pub fn suspending<F, Fut, R>(self, handler: F) -> Self
    where
        F: Fn(Context, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Into<Reply>,
    {
        let handler: SuspendingHandler = Arc::new(
            move |ctx: Context, args: Arguments| -> BoxFuture<'static, anyhow::Result<Reply>> {
                let fut = handler(ctx, args);
                Box::pin(async move { fut.await.map(Into::into) })
            },
        );
        self.handler(Handler::Suspending(handler))
    }

    /// Attach an already-built handler. Declaring more than one handler makes
    /// the shape ambiguous and the indexer rejects it.
    pub fn handler(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    /// Explicit name, or the identifier lowercased.
    pub fn resolved_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.ident.to_lowercase())
    }

    pub(crate) fn into_parts(self) -> SpecParts {
        SpecParts {
            name: self.resolved_name(),
            aliases: self.aliases,
            description: self.description,
            arguments: self.arguments,
            handlers: self.handlers,
        }
    }
}

pub(crate) struct SpecParts {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: Option<String>,
    pub arguments: Vec<ArgSpec>,
    pub handlers: Vec<Handler>,
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("ident", &self.ident)
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("arguments", &self.arguments)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
