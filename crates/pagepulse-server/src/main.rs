//! Server entry point: CLI, logging, settings, store, and the axum app.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pagepulse_server::{AppState, build_router, metrics};
use pagepulse_settings::{PagepulseSettings, load_settings, load_settings_from_path};
use pagepulse_storage::AnalyticsStore;

const DB_POOL_SIZE: u32 = 8;

/// pagepulse ingestion and stats server.
#[derive(Debug, Parser)]
#[command(name = "pagepulse-server", version, about)]
struct Args {
    /// Settings file (defaults to `$PAGEPULSE_CONFIG` or `./pagepulse.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the database path.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Development mode: storage init failure degrades to an in-memory
    /// database with a warning instead of exiting.
    #[arg(long)]
    dev: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load(args: &Args) -> anyhow::Result<PagepulseSettings> {
    let mut settings = match &args.config {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => load_settings().context("loading settings")?,
    };
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(db) = &args.db {
        settings.server.db_path = db.display().to_string();
    }
    Ok(settings)
}

/// Open the store; in `--dev` a failure degrades to in-memory storage.
fn open_store(args: &Args, settings: &PagepulseSettings) -> anyhow::Result<AnalyticsStore> {
    let path = PathBuf::from(&settings.server.db_path);
    match AnalyticsStore::open(&path, DB_POOL_SIZE, settings.server.slow_query_ms) {
        Ok(store) => Ok(store),
        Err(err) if args.dev => {
            warn!(error = %err, path = %path.display(),
                "storage init failed, continuing with in-memory database (dev mode)");
            Ok(AnalyticsStore::in_memory()?)
        }
        Err(err) => Err(err).with_context(|| format!("opening database at {}", path.display())),
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = load(&args)?;
    let store = open_store(&args, &settings)?;

    let state = AppState {
        store: Arc::new(store),
        metrics: metrics::install_recorder(),
    };
    let router = build_router(state, &settings.server);

    let addr = format!("{}:{}", settings.server.bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, db = %settings.server.db_path, "pagepulse server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.json_logs);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = ?err, "fatal");
            ExitCode::FAILURE
        }
    }
}
