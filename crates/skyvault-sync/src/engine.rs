//! Reconciliation engine
//!
//! [`SyncEngine`] runs one cycle end to end:
//!
//! 1. Scan the local tree, the remote tree, and the snapshot store
//!    concurrently; any scan failure aborts the cycle untouched.
//! 2. Walk the union of paths through the decider. Non-ignore outcomes
//!    become tasks; fuzzy-matched pairs with no base are re-associated
//!    inline (sequentially, on the driver, so snapshot writes for those
//!    keys never race a worker).
//! 3. Fill one bounded queue with every task, close it, then start the
//!    worker pool. Workers drain the queue through the transfer
//!    pipeline, checking the cancellation token between tasks.
//! 4. Wait for all workers (the cycle is a barrier), then either return
//!    a [`CycleReport`] or the aggregated error of every failed task.
//!
//! The engine itself is not reentrant; the daemon supervisor guarantees
//! that a new cycle is never requested while one is running.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use skyvault_core::config::DEFAULT_MAX_WORKERS;
use skyvault_core::domain::conflict::ConflictPolicy;
use skyvault_core::domain::op::{SyncOp, Task};
use skyvault_core::ports::{FileSystem, SnapshotStore};

use crate::diff;
use crate::rebuild;
use crate::transfer::TransferPipeline;

/// Engine construction options.
///
/// Not `Debug`: the options carry the raw content key.
#[derive(Clone, Default)]
pub struct EngineOptions {
    /// 32-byte content encryption key; `None` disables encryption.
    pub encrypt_key: Option<[u8; 32]>,
    /// Policy applied to two-sided modifications.
    pub conflict_policy: ConflictPolicy,
    /// Worker pool size; `0` falls back to the default of 3.
    pub max_workers: usize,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Tasks emitted by the decider (everything except ignores).
    pub tasks: usize,
    pub uploaded: u64,
    pub downloaded: u64,
    pub deleted: u64,
    pub conflicts_resolved: u64,
    /// Snapshot rows re-associated without transferring data.
    pub rebuilt: u64,
    pub duration_ms: u64,
}

#[derive(Default)]
struct CycleStats {
    uploaded: AtomicU64,
    downloaded: AtomicU64,
    deleted: AtomicU64,
    conflicts_resolved: AtomicU64,
}

impl CycleStats {
    fn record(&self, op: SyncOp) {
        let counter = match op {
            SyncOp::Upload => &self.uploaded,
            SyncOp::Download => &self.downloaded,
            SyncOp::DeleteRemote | SyncOp::DeleteLocal => &self.deleted,
            SyncOp::Conflict => &self.conflicts_resolved,
            SyncOp::Ignore => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Orchestrates reconciliation cycles over the two file systems and the
/// snapshot store.
pub struct SyncEngine {
    local: Arc<dyn FileSystem>,
    remote: Arc<dyn FileSystem>,
    store: Arc<dyn SnapshotStore>,
    pipeline: Arc<TransferPipeline>,
    encrypted: bool,
    max_workers: usize,
}

impl SyncEngine {
    pub fn new(
        local: Arc<dyn FileSystem>,
        remote: Arc<dyn FileSystem>,
        store: Arc<dyn SnapshotStore>,
        options: EngineOptions,
    ) -> Self {
        let max_workers = if options.max_workers == 0 {
            DEFAULT_MAX_WORKERS
        } else {
            options.max_workers
        };
        let pipeline = Arc::new(TransferPipeline::new(
            Arc::clone(&local),
            Arc::clone(&remote),
            Arc::clone(&store),
            options.encrypt_key,
            options.conflict_policy,
        ));

        Self {
            local,
            remote,
            store,
            pipeline,
            encrypted: options.encrypt_key.is_some(),
            max_workers,
        }
    }

    /// Runs one full reconciliation cycle.
    ///
    /// Returns the cycle summary, or an error when a scan failed (cycle
    /// aborted, nothing changed) or when one or more tasks failed (the
    /// others still ran; failed paths retry next cycle).
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> anyhow::Result<CycleReport> {
        let started = Instant::now();

        let (local_map, remote_map, base_map) = tokio::try_join!(
            async { self.local.list_all().await.context("scan local failed") },
            async { self.remote.list_all().await.context("scan remote failed") },
            async { self.store.list_all().await.context("scan snapshot failed") },
        )?;

        info!(
            local = local_map.len(),
            remote = remote_map.len(),
            snapshot = base_map.len(),
            "scan complete"
        );

        let mut paths = HashSet::new();
        paths.extend(local_map.keys());
        paths.extend(remote_map.keys());
        paths.extend(base_map.keys());

        let mut tasks = Vec::new();
        let mut rebuilt: u64 = 0;

        for path in paths {
            let local = local_map.get(path);
            let remote = remote_map.get(path);
            let base = base_map.get(path);

            let op = diff::compare(local, remote, base, self.encrypted);
            if op != SyncOp::Ignore {
                debug!(path = %path, op = %op, "task queued");
                tasks.push(Task {
                    op,
                    rel_path: path.clone(),
                });
                continue;
            }

            match (local, remote, base) {
                // Fuzzy match with no base: re-associate the pair now so
                // the next cycle has a baseline to compare against.
                (Some(l), Some(r), None) if !l.is_dir && !r.is_dir => {
                    info!(path = %path, "re-associating file after snapshot loss");
                    match self.store.put(&rebuild::rebuilt_state(l)).await {
                        Ok(()) => rebuilt += 1,
                        Err(err) => {
                            warn!(path = %path, error = %format!("{err:#}"), "index rebuild failed")
                        }
                    }
                }
                // Tracked path gone from both sides: the snapshot entry
                // is stale, drop it.
                (None, None, Some(_)) => {
                    debug!(path = %path, "dropping stale snapshot entry");
                    if let Err(err) = self.store.delete(path).await {
                        warn!(path = %path, error = %format!("{err:#}"), "stale entry cleanup failed");
                    }
                }
                _ => {}
            }
        }

        let task_count = tasks.len();
        info!(tasks = task_count, rebuilt, "reconciliation check complete");

        if tasks.is_empty() {
            return Ok(CycleReport {
                rebuilt,
                duration_ms: started.elapsed().as_millis() as u64,
                ..CycleReport::default()
            });
        }

        // Fill and close the queue before any worker starts; workers
        // share the receiver and drain until it is empty.
        let (tx, rx) = mpsc::channel(task_count);
        for task in tasks {
            if tx.send(task).await.is_err() {
                break;
            }
        }
        drop(tx);
        let rx = Arc::new(Mutex::new(rx));

        let stats = Arc::new(CycleStats::default());
        let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let worker_count = self.max_workers.min(task_count);
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let rx = Arc::clone(&rx);
            let pipeline = Arc::clone(&self.pipeline);
            let cancel = cancel.clone();
            let stats = Arc::clone(&stats);
            let errors = Arc::clone(&errors);

            workers.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        debug!(worker = id, "stopping on cancellation");
                        break;
                    }

                    let task = { rx.lock().await.recv().await };
                    let Some(task) = task else { break };

                    match pipeline.execute(&task).await {
                        Ok(()) => stats.record(task.op),
                        Err(err) => {
                            error!(
                                worker = id,
                                path = %task.rel_path,
                                op = %task.op,
                                error = %format!("{err:#}"),
                                "task failed"
                            );
                            errors
                                .lock()
                                .await
                                .push(format!("{} {}: {err:#}", task.op, task.rel_path));
                        }
                    }
                }
            }));
        }

        // Completion barrier: cycle N finishes before cycle N+1 starts.
        for worker in workers {
            if let Err(err) = worker.await {
                error!(error = %err, "worker panicked");
            }
        }

        let errors = errors.lock().await;
        if !errors.is_empty() {
            bail!("{} task(s) failed: {}", errors.len(), errors.join("; "));
        }

        let report = CycleReport {
            tasks: task_count,
            uploaded: stats.uploaded.load(Ordering::Relaxed),
            downloaded: stats.downloaded.load(Ordering::Relaxed),
            deleted: stats.deleted.load(Ordering::Relaxed),
            conflicts_resolved: stats.conflicts_resolved.load(Ordering::Relaxed),
            rebuilt,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            uploaded = report.uploaded,
            downloaded = report.downloaded,
            deleted = report.deleted,
            conflicts = report.conflicts_resolved,
            duration_ms = report.duration_ms,
            "cycle complete"
        );

        Ok(report)
    }
}
