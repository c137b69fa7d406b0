//! Line-oriented dispatcher used by the binary.
//!
//! Reads `<prefix><trigger> args...` lines, resolves the trigger through the
//! registry (name first, then alias) and hands the rest of the line to the
//! engine. Replies are written to the console output.

use crate::args::Snowflake;
use crate::commands::CommandRegistry;
use crate::context::{Context, PendingAction, Responder};
use crate::engine::{Completion, Engine, WorkerPool};
use crate::error::{CommandError, Outcome};
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Author id used for console invocations.
pub const CONSOLE_USER: Snowflake = Snowflake(1);
/// Channel id used for console invocations.
pub const CONSOLE_CHANNEL: Snowflake = Snowflake(1);

/// Responder writing each message as one line to a shared writer.
pub struct ConsoleResponder {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ConsoleResponder {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl Responder for ConsoleResponder {
    fn send(&self, channel: Snowflake, content: String) -> PendingAction {
        let out = Arc::clone(&self.out);
        PendingAction::new(format!("send:{channel}"), move || async move {
            let mut out = out.lock();
            writeln!(out, "{content}")?;
            out.flush()?;
            Ok(())
        })
    }

    fn send_typing(&self, channel: Snowflake) -> PendingAction {
        PendingAction::new(format!("typing:{channel}"), move || async move {
            debug!(channel = %channel, "Typing");
            Ok(())
        })
    }
}

pub struct Console {
    registry: Arc<CommandRegistry>,
    engine: Arc<Engine>,
    pool: Arc<dyn WorkerPool>,
    responder: Arc<dyn Responder>,
    scheduler: Scheduler,
    prefix: String,
    typing_interval: Duration,
}

impl Console {
    pub fn new(
        registry: Arc<CommandRegistry>,
        engine: Arc<Engine>,
        responder: Arc<dyn Responder>,
        prefix: impl Into<String>,
    ) -> Self {
        let scheduler = Scheduler::new(engine.runtime().clone());
        // Blocking handlers go to the runtime's blocking pool unless a
        // dedicated pool is configured.
        let pool: Arc<dyn WorkerPool> = Arc::new(engine.runtime().clone());
        Self {
            registry,
            engine,
            pool,
            responder,
            scheduler,
            prefix: prefix.into(),
            typing_interval: crate::context::DEFAULT_TYPING_INTERVAL,
        }
    }

    /// Run blocking handlers on `pool` instead of the runtime's blocking pool.
    pub fn with_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_typing_interval(mut self, interval: Duration) -> Self {
        self.typing_interval = interval;
        self
    }

    /// Dispatch one input line. Returns `None` when the line is not a known
    /// command.
    pub fn handle_line(&self, line: &str) -> Option<oneshot::Receiver<Outcome>> {
        let body = line.trim().strip_prefix(self.prefix.as_str())?;
        let (trigger, rest) = body
            .split_once(char::is_whitespace)
            .unwrap_or((body, ""));
        if trigger.is_empty() {
            return None;
        }

        let Some(cmd) = self.registry.resolve(trigger) else {
            debug!(trigger = %trigger, "Unknown command");
            return None;
        };

        let ctx = Context::new(
            Arc::clone(&self.responder),
            Arc::clone(&self.registry),
            self.scheduler.clone(),
        )
        .with_trigger(trigger, cmd.name())
        .with_author(CONSOLE_USER)
        .with_channel(CONSOLE_CHANNEL)
        .with_content(line.trim())
        .with_typing_interval(self.typing_interval);

        let (tx, rx) = oneshot::channel();
        let responder = Arc::clone(&self.responder);
        let runtime = self.engine.runtime().clone();
        let name = cmd.name().to_string();
        let usage = cmd.usage();
        let completion: Completion = Box::new(move |outcome: Outcome| {
            if let Err(e) = &outcome {
                let message = match e {
                    CommandError::ArgumentParse { .. } => format!("{e}\nUsage: {usage}"),
                    _ => format!("Error: {e}"),
                };
                warn!(command = %name, error = %e, code = e.error_code(), "Console command failed");
                drop(responder.send(CONSOLE_CHANNEL, message).queue(&runtime));
            }
            let _ = tx.send(outcome);
        });

        self.engine
            .dispatch(cmd, ctx, rest, completion, Some(&*self.pool));
        Some(rx)
    }

    /// Read and dispatch lines until end of input. Each command runs
    /// concurrently with further reading.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, input: R) -> anyhow::Result<()> {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if self.handle_line(&line).is_none() && line.trim().starts_with(&self.prefix) {
                drop(
                    self.responder
                        .send(CONSOLE_CHANNEL, format!("Unknown command: {}", line.trim()))
                        .queue(self.engine.runtime()),
                );
            }
        }
        info!("Console input closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ParserSet;
    use crate::commands::{Cog, CommandSpec};
    use std::sync::mpsc;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    fn console(buffer: &Buffer) -> Console {
        let parsers = Arc::new(ParserSet::with_defaults());
        let registry = Arc::new(CommandRegistry::with_catalog(
            Arc::clone(&parsers),
            crate::builtin::catalog(),
        ));
        registry.load_from_namespace(crate::builtin::NAMESPACE).unwrap();
        let engine = Arc::new(Engine::new(tokio::runtime::Handle::current(), parsers));
        Console::new(
            registry,
            engine,
            Arc::new(ConsoleResponder::new(buffer.clone())),
            "!",
        )
    }

    /// Blocks until a value arrives on its channel.
    struct Waiter {
        rx: Mutex<mpsc::Receiver<&'static str>>,
    }

    impl Cog for Waiter {
        fn name(&self) -> &str {
            "Waiter"
        }

        fn commands(self: Arc<Self>) -> Vec<CommandSpec> {
            vec![CommandSpec::new("wait").blocking(move |ctx, _args| {
                let value = self.rx.lock().recv_timeout(Duration::from_secs(2))?;
                Ok(ctx.reply(value))
            })]
        }
    }

    async fn settle(buffer: &Buffer, needle: &str) {
        for _ in 0..100 {
            if buffer.text().contains(needle) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("output never contained {needle:?}: {:?}", buffer.text());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatches_by_name_and_alias() {
        let buffer = Buffer::default();
        let console = console(&buffer);

        let rx = console.handle_line("!echo hello   there").unwrap();
        assert!(rx.await.unwrap().is_ok());
        settle(&buffer, "hello there").await;

        let rx = console.handle_line("!say again").unwrap();
        assert!(rx.await.unwrap().is_ok());
        settle(&buffer, "again").await;

        assert!(console.handle_line("!nope").is_none());
        assert!(console.handle_line("echo no prefix").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_argument_errors_print_usage() {
        let buffer = Buffer::default();
        let console = console(&buffer);

        let outcome = console.handle_line("!echo").unwrap().await.unwrap();
        assert!(matches!(outcome, Err(CommandError::ArgumentParse { .. })));
        settle(&buffer, "Usage: echo <text...>").await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_reads_until_eof() {
        let buffer = Buffer::default();
        let console = console(&buffer);

        let input: &[u8] = b"!ping\n\n!missing\n";
        console.run(input).await.unwrap();
        settle(&buffer, "Pong!").await;
        settle(&buffer, "Unknown command: !missing").await;
    }

    #[tokio::test]
    async fn test_blocking_commands_do_not_run_on_the_reader() {
        let buffer = Buffer::default();
        let console = console(&buffer);
        let (tx, rx) = mpsc::channel();
        console
            .registry
            .register_cog(Arc::new(Waiter { rx: Mutex::new(rx) }))
            .unwrap();

        // On a single-threaded runtime an inline handler would still be
        // waiting here, and the send below would come too late.
        let done = console.handle_line("!wait").unwrap();
        tx.send("released").unwrap();
        assert!(done.await.unwrap().is_ok());
        settle(&buffer, "released").await;
    }
}
