//! Live batch progress with a fallback to stored records.
//!
//! The in-memory snapshot is a best-effort cache. The stored batch record
//! and item results stay the source of truth; a finished snapshot is
//! reconciled with the stored record and dropped after a retention window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use gbphub_core::result::AppResult;
use gbphub_core::types::BatchId;
use gbphub_database::store::BatchStore;
use gbphub_entity::batch::{BatchCompletion, BatchJob, BatchStatus, Workload as WorkloadKind};
use gbphub_entity::item::ItemResult;

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    /// Held in memory by the process running the batch.
    Live,
    /// Rebuilt from the stored batch record and item results.
    Stored,
}

/// Externally visible state of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    /// Batch id.
    pub batch_id: BatchId,
    /// Workload of the batch.
    pub workload: WorkloadKind,
    /// Current status.
    pub status: BatchStatus,
    /// Items loaded at start.
    pub total_items: i32,
    /// Items finished so far.
    pub processed_items: i32,
    /// Items that finished unsuccessfully.
    pub failed_items: i32,
    /// Completion percentage.
    pub progress_percent: f64,
    /// Label of the item most recently started.
    pub current_item: Option<String>,
    /// Rolling estimate of the time left.
    pub estimated_seconds_remaining: Option<u64>,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the batch finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Reason for a fatal failure or cancellation.
    pub error_summary: Option<String>,
    /// Per-item outcomes in completion order.
    pub results: Vec<ItemResult>,
    /// Where this snapshot came from.
    pub source: SnapshotSource,
}

impl ProgressSnapshot {
    fn from_job(job: &BatchJob, results: Vec<ItemResult>, source: SnapshotSource) -> Self {
        Self {
            batch_id: job.id,
            workload: job.workload,
            status: job.status,
            total_items: job.total_items,
            processed_items: job.processed_items,
            failed_items: job.failed_items,
            progress_percent: job.progress_percent(),
            current_item: None,
            estimated_seconds_remaining: None,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error_summary: job.error_summary.clone(),
            results,
            source,
        }
    }

    /// Whether the batch reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    fn refresh_percent(&mut self) {
        self.progress_percent = if self.total_items <= 0 {
            100.0
        } else {
            f64::from(self.processed_items) * 100.0 / f64::from(self.total_items)
        };
    }
}

/// `remaining * (elapsed / processed)`, rounded up to whole seconds.
pub fn estimate_remaining(elapsed: Duration, processed: i32, total: i32) -> Option<u64> {
    if processed <= 0 {
        return None;
    }
    let remaining = (total - processed).max(0) as f64;
    let per_item = elapsed.as_secs_f64() / f64::from(processed);
    Some((remaining * per_item).ceil() as u64)
}

#[derive(Debug)]
struct LiveBatch {
    snapshot: RwLock<ProgressSnapshot>,
    started: Instant,
    finished: RwLock<Option<Instant>>,
}

/// Holds live snapshots of the batches this process runs.
#[derive(Debug)]
pub struct ProgressTracker {
    live: DashMap<BatchId, Arc<LiveBatch>>,
    store: Arc<dyn BatchStore>,
    retention: Duration,
}

impl ProgressTracker {
    /// Create a tracker that keeps finished snapshots for `retention`.
    pub fn new(store: Arc<dyn BatchStore>, retention: Duration) -> Self {
        Self {
            live: DashMap::new(),
            store,
            retention,
        }
    }

    /// Start tracking a freshly created batch.
    pub async fn begin(&self, job: &BatchJob) {
        self.prune().await;
        let snapshot = ProgressSnapshot::from_job(job, Vec::new(), SnapshotSource::Live);
        self.live.insert(
            job.id,
            Arc::new(LiveBatch {
                snapshot: RwLock::new(snapshot),
                started: Instant::now(),
                finished: RwLock::new(None),
            }),
        );
    }

    /// Note the item a batch is working on.
    pub async fn set_current(&self, batch_id: BatchId, label: String) {
        if let Some(live) = self.entry(batch_id) {
            live.snapshot.write().await.current_item = Some(label);
        }
    }

    /// Fold one finished item into the snapshot.
    pub async fn record(&self, batch_id: BatchId, result: ItemResult) {
        let Some(live) = self.entry(batch_id) else {
            return;
        };
        let elapsed = live.started.elapsed();
        let mut snapshot = live.snapshot.write().await;
        snapshot.processed_items += 1;
        if !result.success {
            snapshot.failed_items += 1;
        }
        snapshot.results.push(result);
        snapshot.refresh_percent();
        snapshot.estimated_seconds_remaining =
            estimate_remaining(elapsed, snapshot.processed_items, snapshot.total_items);
    }

    /// Mark a batch finished, reconciling counters with the stored record
    /// when one is available.
    pub async fn finish(
        &self,
        batch_id: BatchId,
        completion: &BatchCompletion,
        stored: Option<&BatchJob>,
    ) {
        let Some(live) = self.entry(batch_id) else {
            return;
        };
        {
            let mut snapshot = live.snapshot.write().await;
            if let Some(job) = stored {
                snapshot.processed_items = job.processed_items;
                snapshot.failed_items = job.failed_items;
            }
            snapshot.status = completion.status;
            snapshot.completed_at = Some(completion.completed_at);
            snapshot.error_summary = completion.error_summary.clone();
            snapshot.current_item = None;
            snapshot.estimated_seconds_remaining = Some(0);
            snapshot.refresh_percent();
        }
        *live.finished.write().await = Some(Instant::now());
    }

    /// Current state of a batch: the live snapshot if held, else one
    /// rebuilt from the store.
    pub async fn get(&self, batch_id: BatchId) -> AppResult<Option<ProgressSnapshot>> {
        if let Some(live) = self.entry(batch_id) {
            return Ok(Some(live.snapshot.read().await.clone()));
        }

        let Some(job) = self.store.find_batch_job(batch_id).await? else {
            return Ok(None);
        };
        let results = self.store.list_item_results(batch_id).await?;
        let mut snapshot = ProgressSnapshot::from_job(&job, results, SnapshotSource::Stored);
        if job.status == BatchStatus::Running {
            let elapsed = (Utc::now() - job.started_at).to_std().unwrap_or_default();
            snapshot.estimated_seconds_remaining =
                estimate_remaining(elapsed, job.processed_items, job.total_items);
        }
        Ok(Some(snapshot))
    }

    /// Whether a snapshot for the batch is held in memory.
    pub fn is_live(&self, batch_id: BatchId) -> bool {
        self.live.contains_key(&batch_id)
    }

    /// Drop finished snapshots older than the retention window.
    pub async fn prune(&self) -> usize {
        let mut expired = Vec::new();
        let live: Vec<(BatchId, Arc<LiveBatch>)> = self
            .live
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();

        for (batch_id, batch) in live {
            let finished = *batch.finished.read().await;
            if finished.is_some_and(|at| at.elapsed() >= self.retention) {
                expired.push(batch_id);
            }
        }

        for batch_id in &expired {
            self.live.remove(batch_id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Pruned finished batch snapshots");
        }
        expired.len()
    }

    fn entry(&self, batch_id: BatchId) -> Option<Arc<LiveBatch>> {
        self.live.get(&batch_id).map(|e| Arc::clone(e.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbphub_core::types::TenantId;
    use gbphub_database::MemoryStore;
    use gbphub_entity::batch::{BatchFilter, CreateBatchJob};
    use uuid::Uuid;

    async fn setup(total: i32) -> (Arc<MemoryStore>, ProgressTracker, BatchJob) {
        let store = Arc::new(MemoryStore::new());
        let job = store
            .create_batch_job(&CreateBatchJob {
                workload: WorkloadKind::RankCheck,
                total_items: total,
                filter: BatchFilter::default(),
            })
            .await
            .unwrap();
        let tracker = ProgressTracker::new(store.clone(), Duration::from_secs(60));
        (store, tracker, job)
    }

    fn result(batch_id: BatchId, success: bool) -> ItemResult {
        ItemResult {
            batch_id,
            item_id: Uuid::new_v4(),
            tenant_id: TenantId::new(),
            success,
            value: None,
            failure: None,
            error: None,
            will_retry: false,
            attempts: 0,
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn test_estimate_remaining() {
        assert_eq!(estimate_remaining(Duration::from_secs(10), 0, 4), None);
        assert_eq!(estimate_remaining(Duration::from_secs(10), 2, 4), Some(10));
        assert_eq!(estimate_remaining(Duration::from_secs(10), 3, 4), Some(4));
        assert_eq!(estimate_remaining(Duration::from_secs(10), 4, 4), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_snapshot_tracks_counts_and_eta() {
        let (_store, tracker, job) = setup(4).await;
        tracker.begin(&job).await;
        tracker.set_current(job.id, "\"dentist\"".to_string()).await;

        tokio::time::advance(Duration::from_secs(6)).await;
        tracker.record(job.id, result(job.id, true)).await;
        tracker.record(job.id, result(job.id, false)).await;

        let snapshot = tracker.get(job.id).await.unwrap().unwrap();
        assert_eq!(snapshot.source, SnapshotSource::Live);
        assert_eq!(snapshot.processed_items, 2);
        assert_eq!(snapshot.failed_items, 1);
        assert!((snapshot.progress_percent - 50.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.estimated_seconds_remaining, Some(6));
        assert_eq!(snapshot.current_item.as_deref(), Some("\"dentist\""));
        assert_eq!(snapshot.results.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_reconciles_with_store() {
        let (store, tracker, job) = setup(2).await;
        tracker.begin(&job).await;
        tracker.record(job.id, result(job.id, true)).await;
        store.record_progress(job.id, 2, 1).await.unwrap();

        let completion = BatchCompletion {
            status: BatchStatus::Completed,
            completed_at: Utc::now(),
            error_summary: None,
        };
        let stored = store.finish_batch_job(job.id, &completion).await.unwrap();
        tracker.finish(job.id, &completion, Some(&stored)).await;

        let snapshot = tracker.get(job.id).await.unwrap().unwrap();
        assert_eq!(snapshot.status, BatchStatus::Completed);
        assert_eq!(snapshot.processed_items, 2);
        assert_eq!(snapshot.failed_items, 1);
        assert_eq!(snapshot.current_item, None);
        assert_eq!(snapshot.estimated_seconds_remaining, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pruned_snapshot_falls_back_to_store() {
        let (store, tracker, job) = setup(1).await;
        tracker.begin(&job).await;

        let item = result(job.id, true);
        store.upsert_item_result(&item).await.unwrap();
        store.record_progress(job.id, 1, 0).await.unwrap();
        tracker.record(job.id, item.clone()).await;

        let completion = BatchCompletion {
            status: BatchStatus::Completed,
            completed_at: Utc::now(),
            error_summary: None,
        };
        let stored = store.finish_batch_job(job.id, &completion).await.unwrap();
        tracker.finish(job.id, &completion, Some(&stored)).await;

        assert_eq!(tracker.prune().await, 0);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(tracker.prune().await, 1);
        assert!(!tracker.is_live(job.id));

        let snapshot = tracker.get(job.id).await.unwrap().unwrap();
        assert_eq!(snapshot.source, SnapshotSource::Stored);
        assert_eq!(snapshot.status, BatchStatus::Completed);
        assert_eq!(snapshot.processed_items, 1);
        assert_eq!(snapshot.results, vec![item]);
    }

    #[tokio::test]
    async fn test_unknown_batch_is_none() {
        let (_store, tracker, _job) = setup(1).await;
        assert!(tracker.get(BatchId::new()).await.unwrap().is_none());
    }
}
