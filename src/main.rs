use anyhow::{Context, Result};
use clap::Parser;
use concept_server::{App, AppConfig, AppSettings, MemoryStore, RouterOptions, build_router};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Social-media concept server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Address to bind (overrides APP_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides APP_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Snapshot file to load at startup and write at shutdown (overrides DATA_FILE)
    #[arg(long)]
    data_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load application configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.data_file.is_some() {
        config.data_file = cli.data_file;
    }

    let store = match &config.data_file {
        Some(path) => {
            info!(path = %path.display(), "opening snapshot-backed store");
            MemoryStore::open(path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?
        }
        None => {
            info!("running with a memory-only store");
            MemoryStore::new()
        }
    };
    let store = Arc::new(store);

    let settings = AppSettings {
        bcrypt_cost: config.bcrypt_cost,
    };
    let app = Arc::new(App::new(store.clone(), &settings));
    let router = build_router(
        app,
        RouterOptions {
            cors_permissive: config.cors_permissive,
        },
    )
    .context("failed to build route table")?;

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, "concept server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.flush().await.context("failed to write snapshot")?;
    info!("shutdown complete");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("concept_server=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
