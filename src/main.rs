//! cogwork - interactive command host.
//!
//! Loads the built-in cogs and any configured plugin archives, then reads
//! `<prefix>command args...` lines from stdin until EOF or Ctrl-C.

use cogwork::builtin;
use cogwork::config::{self, Config};
use cogwork::console::{Console, ConsoleResponder};
use cogwork::engine::{self, WorkerPool};
use cogwork::{CommandRegistry, Engine, ParserSet};
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::runtime::Handle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Logging needs the config's filter, so load errors are reported after init.
    let loaded = if Path::new(&config_path).exists() {
        Some(Config::load(&config_path))
    } else {
        None
    };
    let filter = match &loaded {
        Some(Ok(config)) => config.log.filter.clone(),
        _ => "info".to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(true)
        .init();

    let config = match loaded {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            error!(path = %config_path, error = %e, "Failed to load config");
            return Err(e.into());
        }
        None => {
            warn!(path = %config_path, "Config file not found, using defaults");
            Config::default()
        }
    };

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("configuration has {} error(s)", errors.len());
    }

    info!(
        prefix = %config.engine.prefix,
        workers = config.engine.worker_threads,
        "Starting cogwork"
    );

    let parsers = Arc::new(ParserSet::with_defaults());
    let registry = Arc::new(CommandRegistry::with_catalog(
        Arc::clone(&parsers),
        builtin::catalog(),
    ));
    let engine = Arc::new(Engine::new(Handle::current(), parsers));

    for namespace in &config.namespaces {
        registry.load_from_namespace(namespace).map_err(|e| {
            error!(namespace = %namespace, error = %e, code = e.error_code(), "Failed to load namespace");
            e
        })?;
    }

    for spec in &config.plugins.autoload {
        if let Err(e) = registry.load_from_archive(&spec.path, &spec.namespace) {
            error!(path = %spec.path, error = %e, code = e.error_code(), "Failed to autoload archive");
        }
    }

    if let Some(dir) = &config.plugins.directory
        && Path::new(dir).is_dir()
    {
        let results = registry.load_from_directory(dir);
        let loaded = results.iter().filter(|r| r.is_ok()).count();
        for e in results.iter().filter_map(|r| r.as_ref().err()) {
            warn!(error = %e, code = e.error_code(), "Skipped plugin archive");
        }
        info!(directory = %dir, loaded, "Scanned plugin directory");
    }

    info!(commands = registry.len(), "Registry ready");

    let mut console = Console::new(
        Arc::clone(&registry),
        engine,
        Arc::new(ConsoleResponder::stdout()),
        config.engine.prefix.clone(),
    )
    .with_typing_interval(config.engine.typing_interval());

    if config.engine.worker_threads > 0 {
        let pool: Arc<dyn WorkerPool> = Arc::new(engine::worker_pool(config.engine.worker_threads)?);
        console = console.with_pool(pool);
    }

    tokio::select! {
        result = console.run(BufReader::new(tokio::io::stdin())) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
    }

    for archive in registry.archives() {
        registry.unregister_archive(&archive);
    }
    info!("Shutdown complete");
    Ok(())
}
