//! Process bridge: runs an archive command as a child process, exchanging
//! one JSON request and one JSON response over stdin/stdout.

use super::PluginArchive;
use super::manifest::CommandManifest;
use crate::args::Arguments;
use crate::context::{Context, Reply};
use crate::error::ArchiveError;
use anyhow::{Context as _, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Protocol tag sent with every request.
pub const PROTOCOL: &str = "cogwork.plugin.v1";

const STDERR_PREVIEW_CHARS: usize = 2_000;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Serialize)]
struct Request<'a> {
    protocol: &'static str,
    archive: &'a str,
    cog: &'a str,
    command: &'a str,
    invocation: String,
    context: RequestContext<'a>,
    args: Value,
}

#[derive(Debug, Serialize)]
struct RequestContext<'a> {
    trigger: &'a str,
    author: String,
    channel: String,
    guild: Option<String>,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct Response {
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// One archive command bound to the program that implements it.
pub(crate) struct ProcessCommand {
    archive: Arc<PluginArchive>,
    cog: String,
    command: String,
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessCommand {
    pub(crate) fn new(archive: Arc<PluginArchive>, cog: &str, manifest: &CommandManifest) -> Self {
        let program = archive.context().resolve_program(&manifest.program);
        Self {
            cog: cog.to_string(),
            command: manifest.name.clone(),
            program,
            args: manifest.args.clone(),
            timeout: manifest.timeout_ms.map(Duration::from_millis),
            archive,
        }
    }

    fn request(&self, ctx: &Context, args: &Arguments) -> anyhow::Result<Vec<u8>> {
        let request = Request {
            protocol: PROTOCOL,
            archive: self.archive.name(),
            cog: &self.cog,
            command: &self.command,
            invocation: ctx.invocation.to_string(),
            context: RequestContext {
                trigger: &ctx.trigger,
                author: ctx.author.to_string(),
                channel: ctx.channel.to_string(),
                guild: ctx.guild.map(|g| g.to_string()),
                content: &ctx.content,
            },
            args: args.to_json(),
        };
        let mut line = serde_json::to_vec(&request).context("serialize plugin request")?;
        line.push(b'\n');
        Ok(line)
    }

    fn std_command(&self) -> std::process::Command {
        let context = self.archive.context();
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(context.root())
            .envs(context.env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run on the current thread, polling for exit so that a timeout or an
    /// archive close can kill the child.
    pub(crate) fn run_blocking(&self, ctx: &Context, args: &Arguments) -> anyhow::Result<Reply> {
        self.archive.ensure_open()?;
        let request = self.request(ctx, args)?;

        let mut child = self
            .std_command()
            .spawn()
            .with_context(|| format!("spawn {}", self.program.display()))?;
        debug!(archive = %self.archive.name(), command = %self.command, pid = child.id(), "Plugin process started");

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        // Fed from its own thread: a child that never reads stdin must not
        // stall the timeout and close checks.
        if let Some(mut stdin) = child.stdin.take() {
            std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(&request) {
                    debug!(error = %e, "Plugin stdin closed before request was written");
                }
            });
        }

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    reap(&mut child);
                    return Err(e).context("wait for plugin process");
                }
            }
            if self.archive.is_closed() {
                reap(&mut child);
                return Err(self.closed());
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                reap(&mut child);
                bail!("plugin command {} timed out", self.command);
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let output = Output {
            status,
            stdout: join(stdout),
            stderr: join(stderr),
        };
        self.finish(ctx, output)
    }

    /// Run on the async runtime. Closing the archive kills the child.
    pub(crate) async fn run(&self, ctx: Context, args: Arguments) -> anyhow::Result<Reply> {
        self.archive.ensure_open()?;
        let request = self.request(&ctx, &args)?;

        let mut cmd = tokio::process::Command::from(self.std_command());
        cmd.kill_on_drop(true);
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {}", self.program.display()))?;
        debug!(archive = %self.archive.name(), command = %self.command, pid = ?child.id(), "Plugin process started");

        // Stdin is fed alongside the wait so a child that never reads it is
        // still subject to the timeout and to the archive closing.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return;
            };
            if let Err(e) = stdin.write_all(&request).await {
                debug!(error = %e, "Plugin stdin closed before request was written");
                return;
            }
            let _ = stdin.shutdown().await;
        };
        let exchange = async {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output.map_err(anyhow::Error::from)
        };

        let token = self.archive.context().token().clone();
        let waiting = async {
            match self.timeout {
                Some(t) => match tokio::time::timeout(t, exchange).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("plugin command {} timed out", self.command)),
                },
                None => exchange.await,
            }
        };
        let output = tokio::select! {
            _ = token.cancelled() => return Err(self.closed()),
            result = waiting => result?,
        };
        self.finish(&ctx, output)
    }

    fn closed(&self) -> anyhow::Error {
        ArchiveError::Closed(self.archive.name().to_string()).into()
    }

    fn finish(&self, ctx: &Context, output: Output) -> anyhow::Result<Reply> {
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "plugin command {} exited with {}: {}",
                self.command,
                output.status,
                preview(&stderr, STDERR_PREVIEW_CHARS)
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let response = parse_response(&stdout)?;
        match (response.error, response.reply) {
            (Some(error), _) => Err(anyhow!(error)),
            (None, Some(reply)) => Ok(Reply::Action(ctx.reply(reply))),
            (None, None) => Ok(Reply::Done),
        }
    }
}

/// The last non-empty stdout line is the response; no output means `{}`.
fn parse_response(stdout: &str) -> anyhow::Result<Response> {
    match stdout.lines().rev().find(|line| !line.trim().is_empty()) {
        Some(line) => serde_json::from_str(line.trim())
            .with_context(|| format!("invalid plugin response: {}", preview(line, 200))),
        None => Ok(Response::default()),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn reap(child: &mut std::process::Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join(handle: Option<std::thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
