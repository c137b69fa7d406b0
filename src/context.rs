//! Per-invocation context and deferred outbound actions.
//!
//! The chat client itself lives outside this crate. Handlers only see it
//! through [`Responder`], whose methods build [`PendingAction`]s: requests
//! that do nothing until they are queued or submitted.

use crate::args::Snowflake;
use crate::commands::CommandRegistry;
use crate::scheduler::{CancelableTask, Scheduler};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// How often the "still working" signal is repeated by default.
pub const DEFAULT_TYPING_INTERVAL: Duration = Duration::from_millis(5000);

type ActionFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A constructed but not yet executed outbound request.
///
/// Dropping a `PendingAction` without queueing or submitting it sends
/// nothing.
#[must_use = "a pending action does nothing until it is queued or submitted"]
pub struct PendingAction {
    label: String,
    start: Box<dyn FnOnce() -> ActionFuture + Send>,
}

impl PendingAction {
    pub fn new<F, Fut>(label: impl Into<String>, start: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            start: Box::new(move || Box::pin(start())),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Fire and forget. Failures are logged.
    pub fn queue(self, runtime: &Handle) -> JoinHandle<()> {
        let label = self.label;
        let request = (self.start)();
        runtime.spawn(async move {
            if let Err(e) = request.await {
                warn!(action = %label, error = %e, "Queued action failed");
            }
        })
    }

    /// Execute and wait for the result.
    pub async fn submit(self) -> anyhow::Result<()> {
        (self.start)().await
    }
}

impl std::fmt::Debug for PendingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// What a handler hands back to the engine.
#[derive(Debug)]
pub enum Reply {
    Done,
    /// An outbound request the engine must queue before reporting completion.
    Action(PendingAction),
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Done
    }
}

impl From<PendingAction> for Reply {
    fn from(action: PendingAction) -> Self {
        Reply::Action(action)
    }
}

impl From<Option<PendingAction>> for Reply {
    fn from(action: Option<PendingAction>) -> Self {
        action.map_or(Reply::Done, Reply::Action)
    }
}

/// Outbound side of the chat platform.
pub trait Responder: Send + Sync {
    fn send(&self, channel: Snowflake, content: String) -> PendingAction;

    fn send_typing(&self, channel: Snowflake) -> PendingAction;
}

/// Context value handed to every handler as its first argument.
#[derive(Clone)]
pub struct Context {
    /// Unique id of this invocation, used in log spans.
    pub invocation: Uuid,
    /// The token the user typed to reach the command (name or alias).
    pub trigger: String,
    /// Canonical name of the invoked command.
    pub command: String,
    pub author: Snowflake,
    pub channel: Snowflake,
    pub guild: Option<Snowflake>,
    /// Full message content, including the trigger.
    pub content: String,
    pub responder: Arc<dyn Responder>,
    pub registry: Arc<CommandRegistry>,
    pub scheduler: Scheduler,
    pub typing_interval: Duration,
}

impl Context {
    pub fn new(
        responder: Arc<dyn Responder>,
        registry: Arc<CommandRegistry>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            invocation: Uuid::new_v4(),
            trigger: String::new(),
            command: String::new(),
            author: Snowflake::default(),
            channel: Snowflake::default(),
            guild: None,
            content: String::new(),
            responder,
            registry,
            scheduler,
            typing_interval: DEFAULT_TYPING_INTERVAL,
        }
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>, command: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self.command = command.into();
        self
    }

    pub fn with_author(mut self, author: Snowflake) -> Self {
        self.author = author;
        self
    }

    pub fn with_channel(mut self, channel: Snowflake) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_guild(mut self, guild: Option<Snowflake>) -> Self {
        self.guild = guild;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_typing_interval(mut self, interval: Duration) -> Self {
        self.typing_interval = interval;
        self
    }

    /// Build a message to the invoking channel. Nothing is sent until the
    /// action is queued, submitted or returned from the handler.
    pub fn reply(&self, content: impl Into<String>) -> PendingAction {
        self.responder.send(self.channel, content.into())
    }

    /// Show a typing status while `body` runs on this thread.
    pub fn typing<T>(&self, body: impl FnOnce() -> T) -> T {
        drop(
            self.responder
                .send_typing(self.channel)
                .queue(self.scheduler.runtime()),
        );
        let _typing = self.repeat_typing().guard();
        body()
    }

    /// Show a typing status until `body` completes.
    ///
    /// The repeating signal is cancelled when this future finishes, fails or
    /// is dropped.
    pub async fn typing_async<F: Future>(&self, body: F) -> F::Output {
        if let Err(e) = self.responder.send_typing(self.channel).submit().await {
            debug!(channel = %self.channel, error = %e, "Initial typing signal failed");
        }
        let _typing = self.repeat_typing().guard();
        body.await
    }

    fn repeat_typing(&self) -> CancelableTask {
        let responder = Arc::clone(&self.responder);
        let channel = self.channel;
        let runtime = self.scheduler.runtime().clone();
        self.scheduler.every(self.typing_interval, move || {
            drop(responder.send_typing(channel).queue(&runtime));
        })
    }
}
