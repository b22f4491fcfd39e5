//! Offline Shell host
//!
//! Runs the offline worker in front of an upstream app server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_shell::api::{create_router, AppState};
use offline_shell::cache::{CacheStorage, MemoryCacheStorage, SystemClock};
use offline_shell::config::Config;
use offline_shell::error::OfflineError;
use offline_shell::queue::OfflineQueue;
use offline_shell::storage::{Database, DatabaseSchema, FileBackend, KvBackend, MemoryBackend};
use offline_shell::tasks::spawn_eviction_task;
use offline_shell::worker::{HttpNetwork, LifecycleController, Network};

const INSTALL_ATTEMPTS: u32 = 3;
const INSTALL_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Main entry point for the offline shell host.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the database, falling back to memory if the disk is unusable
/// 4. Install the worker, retrying failed precaches, then activate it
/// 5. Start background eviction task
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_shell=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Offline Shell");

    let config = Config::from_env();
    info!(
        "Configuration loaded: version={}, origin={}, upstream={}, port={}, max_cache_bytes={}, eviction_interval={}s",
        config.cache_version,
        config.origin,
        config.upstream_url,
        config.server_port,
        config.max_cache_bytes,
        config.eviction_interval
    );

    let worker_config = config.worker_config().context("invalid worker configuration")?;
    let (db, storage_error) = open_database(&config).await?;
    let caches: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(
        config.origin_url()?,
        config.upstream().context("invalid upstream URL")?,
    ));

    let controller = Arc::new(LifecycleController::new(
        worker_config,
        caches.clone(),
        network.clone(),
        db.clone(),
        Arc::new(SystemClock),
    ));

    install_with_retries(&controller).await;

    let eviction_handle = spawn_eviction_task(controller.clone(), config.eviction_interval);
    info!("Background eviction task started");

    let mut state =
        AppState::new(controller, caches, network, OfflineQueue::new(db)).configured(&config);
    if let Some(reason) = storage_error {
        state = state.with_storage_degraded(reason);
    }
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(eviction_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Opens the configured database. An unusable data directory degrades to an
/// in-memory database instead of taking the host down; the returned reason
/// marks the host as degraded.
async fn open_database(config: &Config) -> anyhow::Result<(Database, Option<String>)> {
    let schema = DatabaseSchema::default();

    if let Some(dir) = &config.data_dir {
        let backend: Arc<dyn KvBackend> = Arc::new(FileBackend::new(dir));
        match Database::open(backend, schema.clone()).await {
            Ok(db) => {
                info!("Database opened in {}", dir.display());
                return Ok((db, None));
            }
            Err(OfflineError::StorageUnavailable(reason)) => {
                error!(
                    "Storage unavailable ({}), continuing in memory; offline writes are refused",
                    reason
                );
                let db = Database::open(Arc::new(MemoryBackend::new()), schema).await?;
                return Ok((db, Some(reason)));
            }
            Err(e) => return Err(e.into()),
        }
    }

    let db = Database::open(Arc::new(MemoryBackend::new()), schema).await?;
    Ok((db, None))
}

/// Installs the worker, retrying a failed precache a few times. A worker
/// that never installs keeps passing requests straight to the network.
async fn install_with_retries(controller: &LifecycleController) {
    for attempt in 1..=INSTALL_ATTEMPTS {
        match controller.install().await {
            Ok(report) => {
                info!("Worker installed, {} assets precached", report.precached);
                if report.skip_waiting {
                    if let Err(e) = controller.activate().await {
                        error!("Activation failed: {}", e);
                    }
                }
                return;
            }
            Err(e) => {
                warn!("Install attempt {}/{} failed: {}", attempt, INSTALL_ATTEMPTS, e);
                if attempt < INSTALL_ATTEMPTS {
                    tokio::time::sleep(INSTALL_RETRY_DELAY).await;
                }
            }
        }
    }
    error!("Worker not installed, serving straight from the network");
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the eviction task and allows graceful shutdown.
async fn shutdown_signal(eviction_handle: tokio::task::JoinHandle<()>) {
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    eviction_handle.abort();
    warn!("Eviction task aborted");
}
