use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fstream_core::{MemoryBroker, MemoryPackageCatalog, MemoryStateStore, RuntimeAdapter};
use fstream_runtime::{
    ExternalAdapter, FunctionManager, LoggingMetricsBackend, ManagerConfig, RuntimeMetrics,
    WorkerServer,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod startup;

use config::ServerConfig;

#[derive(Parser)]
#[command(
    name = "fstream",
    about = "fstream function runtime: routes topic events to external workers"
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker endpoint address, overriding the config file
    #[arg(long)]
    listen: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Validate the configuration, print a summary and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; `--check` prints its summary on stdout.
    let filter = EnvFilter::from_env("FSTREAM_LOG");
    if cli.log_json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    config.validate()?;

    if cli.check {
        println!(
            "config ok: listen {}, {} package(s), {} function(s)",
            config.listen_addr,
            config.packages.len(),
            config.functions.len()
        );
        return Ok(());
    }

    run(config).await
}

async fn run(config: ServerConfig) -> Result<()> {
    tracing::info!(listen = %config.listen_addr, "Starting fstream");

    let root = CancellationToken::new();
    let metrics = Arc::new(RuntimeMetrics::with_backend(Arc::new(LoggingMetricsBackend)));

    let catalog = Arc::new(MemoryPackageCatalog::new());
    for package in config.packages {
        catalog.register(package).await?;
    }

    let adapter = Arc::new(ExternalAdapter::with_metrics(
        config.adapter.clone(),
        Arc::clone(&metrics),
    ));
    let manager = Arc::new(FunctionManager::with_metrics(
        root.clone(),
        ManagerConfig {
            runtimes: HashMap::from([(
                config.adapter.package_type.clone(),
                Arc::clone(&adapter) as Arc<dyn RuntimeAdapter>,
            )]),
            package_catalog: catalog,
            state_store: Arc::new(MemoryStateStore::new()),
            event_broker: MemoryBroker::spawn(root.clone(), config.broker),
        },
        Arc::clone(&metrics),
    ));

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    let server = tokio::spawn(WorkerServer::new(adapter).serve(listener, root.clone()));
    let deployer = tokio::spawn(startup::deploy_configured(
        Arc::clone(&manager),
        config.functions,
        Duration::from_millis(config.deploy_retry_ms),
        root.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("Shutting down fstream");

    root.cancel();
    manager.shutdown().await;
    deployer.await?;
    server.await??;

    tracing::info!(metrics = ?metrics.snapshot(), "fstream stopped");
    Ok(())
}
