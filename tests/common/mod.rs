//! Integration test common infrastructure.
//!
//! Provides a recording responder, registry/engine builders and a writer for
//! throwaway plugin archives backed by `/bin/sh` scripts.

#![allow(dead_code)]

use cogwork::args::Snowflake;
use cogwork::context::{Context, PendingAction, Responder};
use cogwork::{CommandRegistry, Engine, ParserSet, Scheduler, builtin};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;

pub const CHANNEL: Snowflake = Snowflake(175928847299117063);
pub const AUTHOR: Snowflake = Snowflake(80351110224678912);

#[derive(Default)]
struct Recorded {
    sent: Mutex<Vec<(Snowflake, String)>>,
    typing: AtomicUsize,
}

/// Responder that records every message instead of sending it. Clones share
/// the same record.
#[derive(Clone, Default)]
pub struct RecordingResponder {
    inner: Arc<Recorded>,
}

impl RecordingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.inner.sent.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn channels(&self) -> Vec<Snowflake> {
        self.inner.sent.lock().iter().map(|(c, _)| *c).collect()
    }

    pub fn typing_count(&self) -> usize {
        self.inner.typing.load(Ordering::SeqCst)
    }

    /// Wait until a message containing `needle` has been recorded.
    pub async fn wait_for(&self, needle: &str) -> String {
        for _ in 0..200 {
            if let Some(found) = self.messages().into_iter().find(|m| m.contains(needle)) {
                return found;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no message containing {needle:?}; got {:?}", self.messages());
    }
}

impl Responder for RecordingResponder {
    fn send(&self, channel: Snowflake, content: String) -> PendingAction {
        let inner = Arc::clone(&self.inner);
        PendingAction::new("send", move || async move {
            inner.sent.lock().push((channel, content));
            Ok(())
        })
    }

    fn send_typing(&self, _channel: Snowflake) -> PendingAction {
        let inner = Arc::clone(&self.inner);
        PendingAction::new("typing", move || async move {
            inner.typing.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Registry with the built-in catalog attached but nothing loaded.
pub fn registry() -> Arc<CommandRegistry> {
    Arc::new(CommandRegistry::with_catalog(
        Arc::new(ParserSet::with_defaults()),
        builtin::catalog(),
    ))
}

pub fn engine(registry: &CommandRegistry) -> Engine {
    Engine::new(Handle::current(), Arc::clone(registry.parsers()))
}

/// Context for one invocation through `trigger`.
pub fn context(
    registry: &Arc<CommandRegistry>,
    responder: &RecordingResponder,
    trigger: &str,
) -> Context {
    let command = registry
        .resolve(trigger)
        .map(|c| c.name().to_string())
        .unwrap_or_default();
    Context::new(
        Arc::new(responder.clone()),
        Arc::clone(registry),
        Scheduler::new(Handle::current()),
    )
    .with_trigger(trigger, command)
    .with_author(AUTHOR)
    .with_channel(CHANNEL)
    .with_content(format!("!{trigger}"))
    .with_typing_interval(Duration::from_millis(20))
}

/// Write `<root>/<dir>/plugin.toml` and return the archive directory.
pub fn write_archive(root: &Path, dir: &str, manifest: &str) -> PathBuf {
    let path = root.join(dir);
    std::fs::create_dir_all(&path).expect("create archive dir");
    std::fs::write(path.join("plugin.toml"), manifest).expect("write manifest");
    path
}

/// Manifest with a blocking and a suspending command, both shell scripts.
pub fn dice_manifest(name: &str) -> String {
    format!(
        r#"
[archive]
name = "{name}"
version = "1.2.0"

[archive.env]
DICE_GREETING = "rolled"

[[cogs]]
name = "Dice"
namespace = "fun.dice"
description = "Dice games"

[[cogs.commands]]
name = "roll"
aliases = ["r"]
mode = "blocking"
program = "/bin/sh"
args = ["-c", '''read line; case "$line" in *'"sides":20'*) echo '{{"reply":"d20"}}' ;; *) echo '{{"reply":"d6"}}' ;; esac''']

[[cogs.commands.params]]
name = "sides"
type = "int"
optional = true
default = "6"

[[cogs.commands]]
name = "greet"
program = "/bin/sh"
args = ["-c", '''cat > /dev/null; echo "{{\"reply\":\"$DICE_GREETING\"}}"''']

[[cogs.commands]]
name = "fail"
program = "/bin/sh"
args = ["-c", '''cat > /dev/null; echo '{{"error":"no dice"}}' ''']

[[cogs.commands]]
name = "hang"
mode = "blocking"
program = "/bin/sh"
args = ["-c", "cat > /dev/null; exec sleep 30"]

[[cogs.commands]]
name = "slow"
program = "/bin/sh"
args = ["-c", "cat > /dev/null; exec sleep 30"]
timeout_ms = 100
"#
    )
}
