//! Integration tests for binding and executing commands through the engine.

mod common;

use cogwork::args::{ArgSpec, ArgType, ArgValue, Parser, Snowflake};
use cogwork::commands::{Cog, CommandSpec};
use cogwork::context::Context;
use cogwork::engine::{Completion, WorkerPool, worker_pool};
use cogwork::error::CommandError;
use cogwork::{Outcome, builtin};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Accepts `#rrggbb` colours.
struct ColourParser;

impl Parser for ColourParser {
    fn parse(&self, _ctx: &Context, raw: &str) -> Option<ArgValue> {
        let hex = raw.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        u32::from_str_radix(hex, 16)
            .ok()
            .map(|rgb| ArgValue::custom(raw, rgb))
    }
}

struct Paint {
    thread_names: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl Cog for Paint {
    fn name(&self) -> &str {
        "Paint"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandSpec> {
        let names = Arc::clone(&self.thread_names);
        vec![
            CommandSpec::new("Fill")
                .arg(ArgSpec::required("colour", ArgType::Custom("colour".into())))
                .arg(ArgSpec::optional("target", ArgType::Snowflake))
                .blocking(move |ctx, args| {
                    names.lock().push(
                        std::thread::current()
                            .name()
                            .unwrap_or_default()
                            .to_string(),
                    );
                    let rgb = args.custom::<u32>("colour").copied().unwrap_or_default();
                    let target = args.snowflake("target").unwrap_or(ctx.channel);
                    Ok(ctx.reply(format!("{rgb:06x} -> {target}")))
                }),
            CommandSpec::new("Explode").blocking(|_ctx, _args| -> anyhow::Result<()> {
                panic!("kaboom");
            }),
            CommandSpec::new("Refuse")
                .suspending(|_ctx: Context, _args| async move {
                    Err::<(), _>(anyhow::anyhow!("not today"))
                }),
            CommandSpec::new("Hasty").suspending(|_ctx, _args| {
                if true {
                    panic!("before future");
                }
                async { anyhow::Ok(()) }
            }),
        ]
    }
}

fn paint_registry() -> (Arc<cogwork::CommandRegistry>, Arc<parking_lot::Mutex<Vec<String>>>) {
    let registry = common::registry();
    registry
        .parsers()
        .register(ArgType::Custom("colour".into()), ColourParser);
    let names = Arc::new(parking_lot::Mutex::new(Vec::new()));
    registry
        .register_cog(Arc::new(Paint {
            thread_names: Arc::clone(&names),
        }))
        .unwrap();
    (registry, names)
}

fn counting(counter: &Arc<AtomicUsize>) -> (Completion, oneshot::Receiver<Outcome>) {
    let (tx, rx) = oneshot::channel();
    let counter = Arc::clone(counter);
    let completion: Completion = Box::new(move |outcome| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(outcome);
    });
    (completion, rx)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_custom_parser_and_reply() {
    let (registry, _) = paint_registry();
    let engine = common::engine(&registry);
    let responder = common::RecordingResponder::new();

    let cmd = registry.resolve("fill").unwrap();
    let ctx = common::context(&registry, &responder, "fill");
    let outcome = engine
        .submit(cmd, ctx, "#ff8800 <@80351110224678912>", None)
        .await
        .unwrap();
    assert!(outcome.is_ok());
    responder.wait_for("ff8800 -> 80351110224678912").await;

    // Optional snowflake that fails to parse falls back to absent.
    let cmd = registry.resolve("fill").unwrap();
    let ctx = common::context(&registry, &responder, "fill");
    engine
        .submit(cmd, ctx, "#000001 nobody", None)
        .await
        .unwrap()
        .unwrap();
    let expected = format!("000001 -> {}", common::CHANNEL);
    responder.wait_for(&expected).await;
    assert!(responder.channels().iter().all(|c| *c == common::CHANNEL));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bind_failure_reports_parameter() {
    let (registry, _) = paint_registry();
    let engine = common::engine(&registry);
    let responder = common::RecordingResponder::new();

    let cmd = registry.resolve("fill").unwrap();
    let ctx = common::context(&registry, &responder, "fill");
    let outcome = engine.submit(Arc::clone(&cmd), ctx, "red", None).await.unwrap();
    match outcome {
        Err(CommandError::ArgumentParse {
            parameter, input, ..
        }) => {
            assert_eq!(parameter, "colour");
            assert_eq!(input, "red");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(cmd.invocations(), 0);
    assert!(responder.messages().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_completion_fires_once_for_every_failure() {
    let (registry, _) = paint_registry();
    let engine = common::engine(&registry);
    let responder = common::RecordingResponder::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let (completion, rx) = counting(&counter);
    let ctx = common::context(&registry, &responder, "explode");
    engine.dispatch(registry.resolve("explode").unwrap(), ctx, "", completion, None);
    let outcome = rx.await.unwrap();
    assert!(matches!(outcome, Err(CommandError::Panicked(ref m)) if m == "kaboom"));

    let (completion, rx) = counting(&counter);
    let ctx = common::context(&registry, &responder, "refuse");
    engine.dispatch(registry.resolve("refuse").unwrap(), ctx, "", completion, None);
    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.error_code(), "handler_error");
    assert_eq!(err.handler_error().unwrap().to_string(), "not today");

    // The suspending handler panics while building its future.
    let (completion, rx) = counting(&counter);
    let ctx = common::context(&registry, &responder, "hasty");
    engine.dispatch(registry.resolve("hasty").unwrap(), ctx, "", completion, None);
    let outcome = rx.await.unwrap();
    assert!(matches!(outcome, Err(CommandError::Panicked(ref m)) if m == "before future"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_handlers_run_on_worker_pool() {
    let (registry, names) = paint_registry();
    let engine = common::engine(&registry);
    let responder = common::RecordingResponder::new();
    let threads = worker_pool(2).unwrap();
    let pool: &dyn WorkerPool = &threads;

    let mut pending = Vec::new();
    for i in 0..4 {
        let ctx = common::context(&registry, &responder, "fill");
        let cmd = registry.resolve("fill").unwrap();
        pending.push(engine.submit(cmd, ctx, &format!("#00000{i}"), Some(pool)));
    }
    for rx in pending {
        rx.await.unwrap().unwrap();
    }

    assert_eq!(registry.find_by_name("fill").unwrap().invocations(), 4);
    let names = names.lock();
    assert_eq!(names.len(), 4);
    assert!(names.iter().all(|n| n.starts_with("cogwork-worker-")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_builtin_commands_end_to_end() {
    let registry = common::registry();
    registry.load_from_namespace(builtin::NAMESPACE).unwrap();
    let engine = common::engine(&registry);
    let responder = common::RecordingResponder::new();

    for (trigger, raw) in [("ping", ""), ("say", "one  two"), ("ping", "")] {
        let cmd = registry.resolve(trigger).unwrap();
        let ctx = common::context(&registry, &responder, trigger);
        engine.submit(cmd, ctx, raw, None).await.unwrap().unwrap();
    }
    responder.wait_for("Pong!").await;
    responder.wait_for("one two").await;

    let cmd = registry.resolve("stats").unwrap();
    let ctx = common::context(&registry, &responder, "stats");
    engine.submit(cmd, ctx, "", None).await.unwrap().unwrap();
    let stats = responder.wait_for("ping: 2").await;
    assert!(stats.contains("echo: 1"));

    let cmd = registry.resolve("h").unwrap();
    let ctx = common::context(&registry, &responder, "h");
    engine.submit(cmd, ctx, "say", None).await.unwrap().unwrap();
    let help = responder.wait_for("Usage: echo <text...>").await;
    assert!(help.contains("Aliases: say"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sleep_shows_typing_and_uses_default() {
    let registry = common::registry();
    registry.load_from_namespace(builtin::NAMESPACE).unwrap();
    let engine = common::engine(&registry);
    let responder = common::RecordingResponder::new();

    let cmd = registry.resolve("sleep").unwrap();
    let ctx = common::context(&registry, &responder, "sleep");
    engine.submit(cmd, ctx, "120", None).await.unwrap().unwrap();
    responder.wait_for("Slept for 120ms").await;
    // Initial signal plus repeats every 20ms.
    assert!(responder.typing_count() >= 3);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let count = responder.typing_count();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(responder.typing_count(), count);

    let cmd = registry.resolve("sleep").unwrap();
    let ctx = common::context(&registry, &responder, "sleep").with_author(Snowflake(7));
    let outcome = engine.submit(cmd, ctx, "soon", None).await.unwrap();
    assert!(outcome.is_ok());
    responder.wait_for("Slept for 1000ms").await;
}
