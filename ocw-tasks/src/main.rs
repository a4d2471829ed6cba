//! ocw-tasks - task orchestration service
//!
//! Launches transcription, agenda and decision-polling jobs on the task
//! worker and ingests their results when the worker calls back.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocw_tasks::AppState;

/// Command-line arguments for ocw-tasks
#[derive(Parser, Debug)]
#[command(name = "ocw-tasks")]
#[command(about = "Task orchestration service for transcripts")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "OCW_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the configuration file)
    #[arg(short, long, env = "OCW_PORT")]
    port: Option<u16>,

    /// SQLite database path (overrides the configuration file)
    #[arg(short, long, env = "OCW_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ocw_common::config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = &args.database {
        config.database_path = database.clone();
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ocw_tasks={0},ocw_common={0},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ocw-tasks v{}", env!("CARGO_PKG_VERSION"));
    match ocw_common::config::resolve_config_path(args.config.as_deref()) {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }
    info!("Database: {}", config.database_path.display());
    info!("Worker: {}", config.worker.base_url);

    let db = ocw_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let state = AppState::from_config(db, &config).context("Failed to initialize services")?;
    info!("Registered task types: {}", state.task_types.join(", "));
    info!("Callback base URL: {}", config.public_base_url());

    let app = ocw_tasks::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
