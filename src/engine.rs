//! Execution engine.
//!
//! Invokes a resolved [`Executable`] with bound arguments and reports the
//! outcome through a completion callback. Blocking handlers run inline or
//! on a [`WorkerPool`]; suspending handlers run as tasks on the runtime.
//! Every path calls the completion exactly once: a job the pool drops
//! without running reports [`CommandError::Rejected`].

use crate::args::{Arguments, ParserSet, bind, tokenize};
use crate::commands::{Executable, Handler};
use crate::context::{Context, Reply};
use crate::error::{CommandError, Outcome};
use crate::telemetry::{CommandTimer, spans};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{Instrument, debug};

/// Callback receiving the outcome of one invocation.
pub type Completion = Box<dyn FnOnce(Outcome) + Send>;

/// Unit of work handed to a [`WorkerPool`].
pub type Job = Box<dyn FnOnce() + Send>;

/// Somewhere blocking handlers can run off the caller's thread.
///
/// A pool that drops a job without running it (for example while shutting
/// down) causes the invocation to complete with [`CommandError::Rejected`].
pub trait WorkerPool: Send + Sync {
    fn execute(&self, job: Job);
}

impl WorkerPool for rayon::ThreadPool {
    fn execute(&self, job: Job) {
        self.spawn(job);
    }
}

impl WorkerPool for Handle {
    fn execute(&self, job: Job) {
        drop(self.spawn_blocking(job));
    }
}

/// Build the rayon pool used for blocking handlers.
pub fn worker_pool(threads: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("cogwork-worker-{i}"))
        .build()
}

/// Holds the completion until an outcome is reported. Dropping it unreported
/// reports a rejection.
struct CompletionGuard {
    command: String,
    completion: Option<Completion>,
}

impl CompletionGuard {
    fn new(command: &str, completion: Completion) -> Self {
        Self {
            command: command.to_string(),
            completion: Some(completion),
        }
    }

    fn complete(mut self, outcome: Outcome) {
        self.fire(outcome);
    }

    fn fire(&mut self, outcome: Outcome) {
        let Some(completion) = self.completion.take() else {
            return;
        };
        if let Err(e) = &outcome {
            debug!(command = %self.command, error = %e, code = e.error_code(), "Command failed");
        }
        completion(outcome);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.fire(Err(CommandError::Rejected(
            "job was dropped before it ran".into(),
        )));
    }
}

pub struct Engine {
    runtime: Handle,
    parsers: Arc<ParserSet>,
}

impl Engine {
    pub fn new(runtime: Handle, parsers: Arc<ParserSet>) -> Self {
        Self { runtime, parsers }
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn parsers(&self) -> &Arc<ParserSet> {
        &self.parsers
    }

    /// Tokenize `raw`, bind it against the command's parameters and execute.
    /// A binding failure goes to `completion`.
    pub fn dispatch(
        &self,
        cmd: Arc<Executable>,
        ctx: Context,
        raw: &str,
        completion: Completion,
        pool: Option<&dyn WorkerPool>,
    ) {
        let tokens = tokenize(raw);
        match bind(&ctx, cmd.arguments(), &tokens, &self.parsers) {
            Ok(args) => self.execute(cmd, ctx, args, completion, pool),
            Err(e) => CompletionGuard::new(cmd.name(), completion).complete(Err(e)),
        }
    }

    /// [`Engine::dispatch`] with the outcome delivered through a channel.
    pub fn submit(
        &self,
        cmd: Arc<Executable>,
        ctx: Context,
        raw: &str,
        pool: Option<&dyn WorkerPool>,
    ) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        let completion: Completion = Box::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        self.dispatch(cmd, ctx, raw, completion, pool);
        rx
    }

    /// Invoke the handler with already-bound arguments.
    ///
    /// Never panics on handler failure; every failure reaches `completion`.
    pub fn execute(
        &self,
        cmd: Arc<Executable>,
        ctx: Context,
        args: Arguments,
        completion: Completion,
        pool: Option<&dyn WorkerPool>,
    ) {
        cmd.record_invocation();
        let span = spans::command(cmd.name(), ctx.invocation, &ctx.trigger, ctx.author.0);
        let guard = CompletionGuard::new(cmd.name(), completion);

        match cmd.handler().clone() {
            Handler::Blocking(handler) => {
                let runtime = self.runtime.clone();
                let name = cmd.name().to_string();
                let job = move || {
                    let _enter = span.enter();
                    let _timer = CommandTimer::new(name);
                    let result = catch_unwind(AssertUnwindSafe(|| handler(&ctx, &args)));
                    guard.complete(settle(result.map_err(CommandError::from_panic), &runtime));
                };
                match pool {
                    Some(pool) => pool.execute(Box::new(job)),
                    None => job(),
                }
            }
            Handler::Suspending(handler) => {
                let runtime = self.runtime.clone();
                let name = cmd.name().to_string();
                // The handler is called inside the task so a panic before its
                // future exists still surfaces as a JoinError.
                let task = self
                    .runtime
                    .spawn(async move { handler(ctx, args).await }.instrument(span.clone()));
                self.runtime.spawn(
                    async move {
                        let _timer = CommandTimer::new(name);
                        let result = task.await.map_err(|e| {
                            if e.is_panic() {
                                CommandError::from_panic(e.into_panic())
                            } else {
                                CommandError::Rejected("task was cancelled".into())
                            }
                        });
                        guard.complete(settle(result, &runtime));
                    }
                    .instrument(span),
                );
            }
        }
    }
}

/// Turn a handler result into an outcome, queueing a returned action first.
fn settle(result: Result<anyhow::Result<Reply>, CommandError>, runtime: &Handle) -> Outcome {
    match result? {
        Ok(Reply::Done) => Ok(()),
        Ok(Reply::Action(action)) => {
            drop(action.queue(runtime));
            Ok(())
        }
        Err(e) => Err(CommandError::Handler(e)),
    }
}
