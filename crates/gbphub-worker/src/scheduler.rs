//! Cron scheduler that starts batches and prunes finished ones.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use gbphub_core::config::worker::WorkerConfig;
use gbphub_core::error::{AppError, ErrorKind};
use gbphub_core::types::BatchId;
use gbphub_database::store::BatchStore;
use gbphub_entity::batch::{BatchFilter, Workload as WorkloadKind};

use crate::controller::StartOutcome;
use crate::progress::ProgressTracker;
use crate::registry::BatchRegistry;

/// Cron-based scheduler for periodic batches and cleanup.
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    config: WorkerConfig,
    registry: Arc<BatchRegistry>,
    store: Arc<dyn BatchStore>,
    tracker: Arc<ProgressTracker>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(
        config: WorkerConfig,
        registry: Arc<BatchRegistry>,
        store: Arc<dyn BatchStore>,
        tracker: Arc<ProgressTracker>,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            config,
            registry,
            store,
            tracker,
        })
    }

    /// Register a batch trigger per enabled workload plus the cleanup task
    pub async fn register_default_tasks(&self) -> Result<(), AppError> {
        for workload in self.registry.workloads() {
            let settings = match workload {
                WorkloadKind::RankCheck => &self.config.rank_check,
                WorkloadKind::PostPublish => &self.config.post_publish,
            };
            if !settings.enabled {
                tracing::info!("Skipped: {} batches (disabled)", workload);
                continue;
            }
            self.register_batch_trigger(workload, &settings.schedule)
                .await?;
        }
        self.register_cleanup().await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    async fn register_batch_trigger(
        &self,
        workload: WorkloadKind,
        schedule: &str,
    ) -> Result<(), AppError> {
        let registry = Arc::clone(&self.registry);
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let registry = Arc::clone(&registry);
            Box::pin(async move {
                tracing::debug!("Scheduled {} batch firing", workload);
                trigger_batch(&registry, workload).await;
            })
        })
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Invalid {} schedule '{}'", workload, schedule),
                e,
            )
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add {} schedule: {}", workload, e))
        })?;

        tracing::info!("Registered: {} batches ({})", workload, schedule);
        Ok(())
    }

    /// Drop finished batch records past retention and expired live snapshots
    async fn register_cleanup(&self) -> Result<(), AppError> {
        let store = Arc::clone(&self.store);
        let tracker = Arc::clone(&self.tracker);
        let retention_days = self.config.batch_retention_days;
        let schedule = self.config.cleanup_schedule.clone();

        let job = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let store = Arc::clone(&store);
            let tracker = Arc::clone(&tracker);
            Box::pin(async move {
                run_cleanup(store.as_ref(), &tracker, retention_days).await;
            })
        })
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Invalid cleanup schedule '{}'", schedule),
                e,
            )
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add batch_cleanup schedule: {}", e))
        })?;

        tracing::info!("Registered: batch_cleanup ({})", self.config.cleanup_schedule);
        Ok(())
    }
}

/// Start one batch of `workload` and log the outcome.
///
/// Returns the started batch, or `None` when the trigger was skipped.
pub async fn trigger_batch(registry: &BatchRegistry, workload: WorkloadKind) -> Option<BatchId> {
    let runner = match registry.get(workload) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!("Cannot trigger {} batch: {}", workload, e);
            return None;
        }
    };

    match runner.start(BatchFilter::default()).await {
        Ok(StartOutcome::Started(started)) => {
            tracing::info!(
                batch_id = %started.batch_id,
                total_items = started.total_items,
                estimated_minutes = started.estimated_duration_minutes,
                "Scheduled {} batch started",
                workload
            );
            Some(started.batch_id)
        }
        Ok(StartOutcome::NothingToDo) => {
            tracing::debug!("Scheduled {} batch found nothing to do", workload);
            None
        }
        Err(e) if e.kind == ErrorKind::Conflict => {
            tracing::info!("Scheduled {} batch skipped: {}", workload, e.message);
            None
        }
        Err(e) => {
            tracing::error!("Scheduled {} batch failed to start: {}", workload, e);
            None
        }
    }
}

/// Prune finished batches older than `retention_days` and expired snapshots.
///
/// Returns the number of batch records removed.
pub async fn run_cleanup(
    store: &dyn BatchStore,
    tracker: &ProgressTracker,
    retention_days: i64,
) -> u64 {
    let cutoff = Utc::now() - ChronoDuration::days(retention_days);
    let removed = match store.prune_finished(cutoff).await {
        Ok(removed) => {
            if removed > 0 {
                tracing::info!("Pruned {} finished batches older than {}", removed, cutoff);
            } else {
                tracing::debug!("No finished batches to prune");
            }
            removed
        }
        Err(e) => {
            tracing::error!("Failed to prune finished batches: {}", e);
            0
        }
    };

    let expired = tracker.prune().await;
    if expired > 0 {
        tracing::debug!("Dropped {} expired progress snapshots", expired);
    }
    removed
}
