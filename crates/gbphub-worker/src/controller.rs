//! Entry point of a workload: start, observe, cancel and recover batches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gbphub_core::config::WorkloadConfig;
use gbphub_core::error::AppError;
use gbphub_core::result::AppResult;
use gbphub_core::types::BatchId;
use gbphub_database::store::BatchStore;
use gbphub_entity::batch::{
    BatchCompletion, BatchFilter, BatchStatus, CreateBatchJob, Workload as WorkloadKind,
};
use gbphub_entity::item::WorkItem;

use crate::executor::BatchExecutor;
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::rate_limit::RateLimiter;
use crate::source::WorkItemSource;
use crate::workload::Workload;

/// Summary error written to batches a previous process left running.
pub const INTERRUPTED_SUMMARY: &str = "Interrupted: the process running this batch stopped";

/// Result of asking a controller to start a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// No eligible items; no batch was created.
    NothingToDo,
    /// A batch was created and is running in the background.
    Started(BatchStarted),
}

/// A newly started batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStarted {
    /// Id to poll for progress.
    pub batch_id: BatchId,
    /// Workload of the batch.
    pub workload: WorkloadKind,
    /// Items loaded.
    pub total_items: i32,
    /// Rough wall-clock estimate, rounded up to whole minutes.
    pub estimated_duration_minutes: u64,
    /// Status at creation, always `running`.
    pub status: BatchStatus,
}

struct RunningBatch {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

/// Starts and tracks batches of one workload.
pub struct BatchController<W: Workload> {
    workload: Arc<W>,
    executor: Arc<BatchExecutor<W>>,
    store: Arc<dyn BatchStore>,
    tracker: Arc<ProgressTracker>,
    config: WorkloadConfig,
    max_concurrent_tenants: usize,
    shutdown: CancellationToken,
    running: Arc<DashMap<BatchId, RunningBatch>>,
}

impl<W: Workload> std::fmt::Debug for BatchController<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchController")
            .field("workload", &self.workload.kind())
            .field("running", &self.running.len())
            .finish()
    }
}

impl<W: Workload> BatchController<W> {
    /// Create a controller and its executor.
    pub fn new(
        workload: Arc<W>,
        store: Arc<dyn BatchStore>,
        limiter: Arc<RateLimiter>,
        tracker: Arc<ProgressTracker>,
        config: WorkloadConfig,
        max_concurrent_tenants: usize,
    ) -> Self {
        let executor = Arc::new(BatchExecutor::new(
            Arc::clone(&workload),
            Arc::clone(&store),
            limiter,
            Arc::clone(&tracker),
            &config,
            max_concurrent_tenants,
        ));
        Self {
            workload,
            executor,
            store,
            tracker,
            config,
            max_concurrent_tenants: max_concurrent_tenants.max(1),
            shutdown: CancellationToken::new(),
            running: Arc::new(DashMap::new()),
        }
    }

    /// Which workload this controller runs.
    pub fn kind(&self) -> WorkloadKind {
        self.workload.kind()
    }

    /// Load eligible items and, if there are any, start a batch in the
    /// background.
    ///
    /// Fails with `Conflict` while a batch of this workload is running.
    pub async fn start(&self, filter: BatchFilter) -> AppResult<StartOutcome> {
        let kind = self.kind();
        if let Some(running) = self.store.find_running(kind).await? {
            return Err(AppError::conflict(format!(
                "A {kind} batch is already running ({})",
                running.id
            )));
        }

        let items = self.workload.source().load_batch(&filter).await?;
        if items.is_empty() {
            info!(workload = %kind, "Nothing to do");
            return Ok(StartOutcome::NothingToDo);
        }

        let total_items = i32::try_from(items.len())
            .map_err(|_| AppError::validation("Too many items for one batch"))?;
        let estimated_duration_minutes = self.estimate_minutes(&items);

        let job = self
            .store
            .create_batch_job(&CreateBatchJob {
                workload: kind,
                total_items,
                filter,
            })
            .await?;
        self.tracker.begin(&job).await;

        let cancel = self.shutdown.child_token();
        let (done_tx, done_rx) = watch::channel(false);
        self.running.insert(
            job.id,
            RunningBatch {
                cancel: cancel.clone(),
                done: done_rx,
            },
        );

        let executor = Arc::clone(&self.executor);
        let running = Arc::clone(&self.running);
        let spawned = job.clone();
        tokio::spawn(async move {
            executor.run(&spawned, items, cancel).await;
            running.remove(&spawned.id);
            let _ = done_tx.send(true);
        });

        Ok(StartOutcome::Started(BatchStarted {
            batch_id: job.id,
            workload: kind,
            total_items,
            estimated_duration_minutes,
            status: job.status,
        }))
    }

    /// Current progress of a batch of this workload.
    pub async fn status(&self, batch_id: BatchId) -> AppResult<Option<ProgressSnapshot>> {
        let snapshot = self.tracker.get(batch_id).await?;
        Ok(snapshot.filter(|s| s.workload == self.kind()))
    }

    /// Ask a running batch to stop before its next item.
    pub async fn cancel(&self, batch_id: BatchId) -> AppResult<()> {
        if let Some(running) = self.running.get(&batch_id) {
            running.cancel.cancel();
            info!(batch_id = %batch_id, workload = %self.kind(), "Batch cancellation requested");
            return Ok(());
        }

        match self.store.find_batch_job(batch_id).await? {
            Some(job) if job.workload == self.kind() && job.status.is_terminal() => Err(
                AppError::conflict(format!("Batch {batch_id} is already {}", job.status)),
            ),
            Some(job) if job.workload == self.kind() => Err(AppError::conflict(format!(
                "Batch {batch_id} is not running in this process"
            ))),
            _ => Err(AppError::not_found(format!("Batch {batch_id} not found"))),
        }
    }

    /// Wait for a batch started by this controller to finish, then return
    /// its final state.
    pub async fn wait(&self, batch_id: BatchId) -> AppResult<Option<ProgressSnapshot>> {
        let done = self.running.get(&batch_id).map(|r| r.done.clone());
        if let Some(mut done) = done {
            // A dropped sender also means the run is over.
            let _ = done.wait_for(|finished| *finished).await;
        }
        self.status(batch_id).await
    }

    /// Mark batches of this workload left running by a previous process as
    /// failed, so single-flight does not block new batches forever.
    pub async fn recover_interrupted(&self) -> AppResult<usize> {
        let mut recovered = 0;
        for job in self.store.list_running().await? {
            if job.workload != self.kind() || self.running.contains_key(&job.id) {
                continue;
            }
            let completion = BatchCompletion {
                status: BatchStatus::Failed,
                completed_at: Utc::now(),
                error_summary: Some(INTERRUPTED_SUMMARY.to_string()),
            };
            self.store.finish_batch_job(job.id, &completion).await?;
            warn!(
                batch_id = %job.id,
                workload = %job.workload,
                processed = job.processed_items,
                total = job.total_items,
                "Marked interrupted batch as failed"
            );
            recovered += 1;
        }
        Ok(recovered)
    }

    /// Cancel every running batch and wait up to `grace` for them to stop.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutdown.cancel();
        let pending: Vec<watch::Receiver<bool>> =
            self.running.iter().map(|r| r.done.clone()).collect();
        if pending.is_empty() {
            return;
        }

        info!(workload = %self.kind(), batches = pending.len(), "Waiting for batches to stop");
        let all = futures::future::join_all(pending.into_iter().map(|mut done| async move {
            let _ = done.wait_for(|finished| *finished).await;
        }));
        if tokio::time::timeout(grace, all).await.is_err() {
            warn!(workload = %self.kind(), "Batches still running after shutdown grace period");
        }
    }

    /// Items run one after another per tenant, `max_concurrent_tenants`
    /// tenants at a time.
    fn estimate_minutes<P>(&self, items: &[WorkItem<P>]) -> u64 {
        let mut per_tenant: HashMap<_, u64> = HashMap::new();
        for item in items {
            *per_tenant.entry(item.tenant_id).or_default() += 1;
        }
        let largest_group = per_tenant.values().copied().max().unwrap_or(0);
        let waves = (items.len() as u64).div_ceil(self.max_concurrent_tenants as u64);
        let sequential_items = largest_group.max(waves);

        let seconds = self.config.estimated_item_duration().as_secs_f64() * sequential_items as f64;
        ((seconds / 60.0).ceil() as u64).max(1)
    }
}
