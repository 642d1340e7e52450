//! skyvaultd - Background synchronization daemon
//!
//! Wires the adapters together and drives the engine on a periodic
//! trigger:
//! - Loads and validates the YAML configuration (fatal on error).
//! - Opens the snapshot database and the drive client.
//! - Runs one cycle immediately, then one per configured interval.
//! - A trigger that fires while a cycle is still running is dropped with
//!   a warning; the engine is never reentered.
//! - SIGINT/SIGTERM cancel the token; in-flight workers drain, then the
//!   process exits with code 0.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use skyvault_core::Config;
use skyvault_remote::{DriveClient, RemoteFileSystem};
use skyvault_store::{DatabasePool, SqliteSnapshotStore};
use skyvault_sync::{EngineOptions, LocalFileSystem, SyncEngine};

/// Waits for SIGTERM or SIGINT and triggers the cancellation token.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT");
        }
        _ = terminate => {
            info!("received SIGTERM");
        }
    }

    token.cancel();
}

/// Spawns one cycle unless the previous one is still running.
fn trigger_cycle(
    cycles: &mut JoinSet<()>,
    engine: &Arc<SyncEngine>,
    running: &Arc<AtomicBool>,
    cancel: &CancellationToken,
) {
    if running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("previous cycle still running, skipping this trigger");
        return;
    }

    let engine = Arc::clone(engine);
    let running = Arc::clone(running);
    let cancel = cancel.clone();

    cycles.spawn(async move {
        info!("cycle starting");
        match engine.run_cycle(&cancel).await {
            Ok(report) => {
                info!(
                    tasks = report.tasks,
                    uploaded = report.uploaded,
                    downloaded = report.downloaded,
                    deleted = report.deleted,
                    conflicts = report.conflicts_resolved,
                    rebuilt = report.rebuilt,
                    duration_ms = report.duration_ms,
                    "cycle finished"
                );
            }
            Err(err) => {
                if cancel.is_cancelled() {
                    warn!("cycle interrupted by shutdown");
                } else {
                    error!(error = %format!("{err:#}"), "cycle failed");
                }
            }
        }
        running.store(false, Ordering::SeqCst);
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("load configuration from {}", config_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.system.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        local_dir = %config.sync.local_dir.display(),
        remote_dir = %config.sync.remote_dir,
        interval = %config.sync.interval,
        "skyvaultd starting"
    );

    // Validated at load time; re-derive the typed values here.
    let interval = config.interval().context("invalid sync interval")?;
    let conflict_policy = config.conflict_policy().context("invalid conflict strategy")?;

    let encrypt_key = if config.crypto.enable {
        info!(
            encrypt_filenames = config.crypto.encrypt_filenames,
            "content encryption enabled (AES-256)"
        );
        Some(skyvault_crypto::derive_key(&config.crypto.password))
    } else {
        info!("content encryption disabled, files are stored as-is");
        None
    };
    let name_key = config
        .crypto
        .encrypt_filenames
        .then_some(encrypt_key)
        .flatten();

    let pool = DatabasePool::open(&config.system.db_path)
        .await
        .context("open snapshot database")?;
    let store = Arc::new(SqliteSnapshotStore::new(pool.pool().clone()));

    let client = Arc::new(
        DriveClient::new(
            &config.remote.base_url,
            config.remote.access_token.clone(),
            &config.remote.user_agent,
        )
        .context("build drive client")?,
    );
    let remote = Arc::new(RemoteFileSystem::new(
        client,
        &config.sync.remote_dir,
        name_key,
    ));
    let local = Arc::new(LocalFileSystem::new(config.sync.local_dir.clone()));

    let engine = Arc::new(SyncEngine::new(
        local,
        remote,
        store,
        EngineOptions {
            encrypt_key,
            conflict_policy,
            max_workers: config.max_workers(),
        },
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let running = Arc::new(AtomicBool::new(false));
    let mut cycles = JoinSet::new();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            // The first tick fires immediately, giving one cycle at
            // startup before the periodic cadence begins.
            _ = ticker.tick() => {
                trigger_cycle(&mut cycles, &engine, &running, &shutdown);
            }
            _ = shutdown.cancelled() => {
                break;
            }
        }

        // Reap cycles that already finished so the set stays small.
        while cycles.try_join_next().is_some() {}
    }

    info!("shutting down, waiting for the in-flight cycle to drain");
    while cycles.join_next().await.is_some() {}
    info!("skyvaultd stopped");

    Ok(())
}
