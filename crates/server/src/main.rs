mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relaycast_core::{
    history::{HistoryStore, SqliteHistoryStore},
    load_config,
    media::{LibraryMediaResolver, MediaResolver},
    supervisor::{EncoderLauncher, FfmpegLauncher},
    validate_config, ConcurrencyGuard, JobOrchestrator, JobStore, ProcessSupervisor,
    SchedulerLoop, SqliteJobStore, SystemClock,
};

use api::create_router;
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("RELAYCAST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.storage.database_path);
    info!("Library dir: {:?}", config.storage.library_dir);

    // Make sure the on-disk layout exists before anything opens it
    tokio::fs::create_dir_all(&config.storage.library_dir)
        .await
        .context("Failed to create library directory")?;
    tokio::fs::create_dir_all(&config.storage.work_dir)
        .await
        .context("Failed to create work directory")?;

    // Stores
    let job_store: Arc<SqliteJobStore> = Arc::new(
        SqliteJobStore::new(&config.storage.database_path)
            .context("Failed to create job store")?,
    );
    info!("Job store initialized");

    let history_store: Arc<SqliteHistoryStore> = Arc::new(
        SqliteHistoryStore::new(&config.storage.database_path)
            .context("Failed to create history store")?,
    );
    info!("History store initialized");

    // Media resolution and encoder launching
    let resolver: Arc<dyn MediaResolver> = Arc::new(LibraryMediaResolver::new(
        &config.storage.library_dir,
        &config.storage.work_dir,
    ));
    let launcher: Arc<dyn EncoderLauncher> =
        Arc::new(FfmpegLauncher::new(config.supervisor.clone()));
    info!("Encoder: {}", config.supervisor.ffmpeg_path);

    // Process supervisor
    let supervisor = ProcessSupervisor::new(
        Arc::clone(&job_store) as Arc<dyn JobStore>,
        Arc::clone(&history_store) as Arc<dyn HistoryStore>,
        resolver,
        launcher,
        config.supervisor.clone(),
    );

    // Jobs left live by a previous instance have no process anymore
    let reconciled = supervisor
        .reconcile()
        .context("Startup reconciliation failed")?;
    if reconciled > 0 {
        info!("Reconciled {} orphaned job(s)", reconciled);
    }

    // Orchestrator and scheduler
    let orchestrator = JobOrchestrator::new(
        Arc::clone(&job_store) as Arc<dyn JobStore>,
        Arc::clone(&supervisor),
    );

    let scheduler = SchedulerLoop::new(
        config.scheduler.clone(),
        Arc::clone(&orchestrator),
        Arc::new(SystemClock),
    );
    scheduler.start();

    // Upload guard
    let upload_guard = ConcurrencyGuard::new(config.uploads.max_concurrent);

    // Create app state and router
    let state = Arc::new(AppState::new(
        config.clone(),
        orchestrator,
        Arc::clone(&job_store) as Arc<dyn JobStore>,
        Arc::clone(&history_store) as Arc<dyn HistoryStore>,
        upload_guard,
    ));

    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    scheduler.stop();
    info!("Scheduler stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
