//! Batch executor: drains a work list against a rate-limited external API.
//!
//! Tenant groups run concurrently up to `max_concurrent_tenants`; items in a
//! group run one after another. A failing or panicking item is recorded and
//! the batch moves on. Only a store failure aborts the batch.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use gbphub_client::RemoteError;
use gbphub_core::config::WorkloadConfig;
use gbphub_core::error::AppError;
use gbphub_core::types::BatchId;
use gbphub_database::store::BatchStore;
use gbphub_entity::batch::{BatchCompletion, BatchJob, BatchStatus};
use gbphub_entity::item::{FailureClass, ItemDisposition, ItemResult, WorkItem};

use crate::progress::ProgressTracker;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::source::{TenantGroup, group_by_tenant};
use crate::workload::{FailureRecord, ItemFailure, Workload};

/// Item error recorded when the failure could not be written back.
pub const UNRECORDED_FAILURE: &str = "item failed and its failure could not be recorded";

/// Drains work lists for one workload.
pub struct BatchExecutor<W: Workload> {
    workload: Arc<W>,
    store: Arc<dyn BatchStore>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    tracker: Arc<ProgressTracker>,
    call_timeout: Duration,
    max_concurrent_tenants: usize,
}

impl<W: Workload> std::fmt::Debug for BatchExecutor<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("workload", &self.workload.kind())
            .field("retry", &self.retry)
            .field("call_timeout", &self.call_timeout)
            .field("max_concurrent_tenants", &self.max_concurrent_tenants)
            .finish()
    }
}

/// Shared state of one run.
struct RunControl {
    token: CancellationToken,
    fatal: OnceLock<AppError>,
}

impl RunControl {
    /// Record the first fatal error and stop every group.
    fn abort(&self, err: AppError) {
        let _ = self.fatal.set(err);
        self.token.cancel();
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    processed: i32,
    failed: i32,
}

impl<W: Workload> BatchExecutor<W> {
    /// Create an executor.
    pub fn new(
        workload: Arc<W>,
        store: Arc<dyn BatchStore>,
        limiter: Arc<RateLimiter>,
        tracker: Arc<ProgressTracker>,
        config: &WorkloadConfig,
        max_concurrent_tenants: usize,
    ) -> Self {
        Self {
            workload,
            store,
            limiter,
            retry: RetryPolicy::from_config(&config.retry),
            tracker,
            call_timeout: config.call_timeout(),
            max_concurrent_tenants: max_concurrent_tenants.max(1),
        }
    }

    /// Process `items` for `job` and write the terminal state.
    ///
    /// `cancel` stops the batch before its next item.
    pub async fn run(
        &self,
        job: &BatchJob,
        items: Vec<WorkItem<W::Payload>>,
        cancel: CancellationToken,
    ) -> BatchCompletion {
        let batch_id = job.id;
        let groups = group_by_tenant(items);
        info!(
            batch_id = %batch_id,
            workload = %job.workload,
            total_items = job.total_items,
            tenants = groups.len(),
            "Batch started"
        );

        let control = RunControl {
            token: cancel.child_token(),
            fatal: OnceLock::new(),
        };

        let tallies: Vec<Tally> = stream::iter(groups)
            .map(|group| self.drain_group(batch_id, group, &control))
            .buffer_unordered(self.max_concurrent_tenants)
            .collect()
            .await;

        let total = tallies.iter().fold(Tally::default(), |acc, t| Tally {
            processed: acc.processed + t.processed,
            failed: acc.failed + t.failed,
        });

        let completion = self.completion(job, total, &control, &cancel);
        self.finish(job, &completion).await;
        completion
    }

    fn completion(
        &self,
        job: &BatchJob,
        total: Tally,
        control: &RunControl,
        cancel: &CancellationToken,
    ) -> BatchCompletion {
        let (status, error_summary) = if let Some(err) = control.fatal.get() {
            (
                BatchStatus::Failed,
                Some(format!("Batch aborted: {}", err.message)),
            )
        } else if cancel.is_cancelled() && total.processed < job.total_items {
            (
                BatchStatus::Cancelled,
                Some(format!(
                    "Cancelled after {} of {} items",
                    total.processed, job.total_items
                )),
            )
        } else if total.processed > 0 && total.failed == total.processed {
            (BatchStatus::Failed, None)
        } else {
            (BatchStatus::Completed, None)
        };

        BatchCompletion {
            status,
            completed_at: Utc::now(),
            error_summary,
        }
    }

    async fn finish(&self, job: &BatchJob, completion: &BatchCompletion) {
        let stored = match self.store.finish_batch_job(job.id, completion).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                error!(batch_id = %job.id, error = %e, "Failed to write batch completion");
                None
            }
        };
        self.tracker
            .finish(job.id, completion, stored.as_ref())
            .await;

        info!(
            batch_id = %job.id,
            workload = %job.workload,
            status = %completion.status,
            processed = stored.as_ref().map(|j| j.processed_items),
            failed = stored.as_ref().map(|j| j.failed_items),
            "Batch finished"
        );
    }

    async fn drain_group(
        &self,
        batch_id: BatchId,
        group: TenantGroup<W::Payload>,
        control: &RunControl,
    ) -> Tally {
        let mut tally = Tally::default();
        for item in &group.items {
            if control.token.is_cancelled() {
                debug!(batch_id = %batch_id, tenant_id = %group.tenant_id, "Group stopped");
                break;
            }
            match self.process_item(batch_id, item, control).await {
                Ok(Some(result)) => {
                    tally.processed += 1;
                    if !result.success {
                        tally.failed += 1;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(
                        batch_id = %batch_id,
                        item_id = %item.id,
                        error = %e,
                        "Store failure, aborting batch"
                    );
                    control.abort(e);
                    break;
                }
            }
        }
        tally
    }

    /// Process one item. `Ok(None)` means cancellation won the race against
    /// the rate limiter; `Err` is a fatal store failure.
    async fn process_item(
        &self,
        batch_id: BatchId,
        item: &WorkItem<W::Payload>,
        control: &RunControl,
    ) -> Result<Option<ItemResult>, AppError> {
        let label = item.payload.to_string();
        self.tracker.set_current(batch_id, label.clone()).await;

        let key = item.tenant_key();
        tokio::select! {
            _ = control.token.cancelled() => return Ok(None),
            _ = self.limiter.wait(&key) => {}
        }

        let context = format!("{} {}", self.workload.kind(), label);
        let outcome = AssertUnwindSafe(self.retry.execute(
            &context,
            |err| self.workload.classify(err),
            |_| self.call_with_timeout(item),
        ))
        .catch_unwind()
        .await;

        let result = match outcome {
            Ok(Ok(output)) => self.succeed(batch_id, item, &output).await?,
            Ok(Err(err)) => self.fail(batch_id, item, ItemFailure::Remote(err)).await?,
            Err(panic) => {
                let failure = ItemFailure::Internal(panic_message(panic));
                self.fail(batch_id, item, failure).await?
            }
        };

        self.store.upsert_item_result(&result).await?;
        self.store
            .record_progress(batch_id, 1, i32::from(!result.success))
            .await?;
        self.tracker.record(batch_id, result.clone()).await;
        Ok(Some(result))
    }

    async fn call_with_timeout(
        &self,
        item: &WorkItem<W::Payload>,
    ) -> Result<W::Output, RemoteError> {
        match tokio::time::timeout(self.call_timeout, self.workload.call(item)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.call_timeout)),
        }
    }

    async fn succeed(
        &self,
        batch_id: BatchId,
        item: &WorkItem<W::Payload>,
        output: &W::Output,
    ) -> Result<ItemResult, AppError> {
        let recorded = AssertUnwindSafe(self.workload.record_success(batch_id, item, output))
            .catch_unwind()
            .await;

        match recorded {
            Ok(Ok(value)) => {
                debug!(batch_id = %batch_id, item_id = %item.id, tenant_id = %item.tenant_id, "Item succeeded");
                Ok(ItemResult::succeeded(batch_id, item, value))
            }
            Ok(Err(e)) if e.is_store_failure() => Err(e),
            Ok(Err(e)) => {
                self.fail(batch_id, item, ItemFailure::Internal(e.message))
                    .await
            }
            Err(panic) => {
                self.fail(batch_id, item, ItemFailure::Internal(panic_message(panic)))
                    .await
            }
        }
    }

    async fn fail(
        &self,
        batch_id: BatchId,
        item: &WorkItem<W::Payload>,
        failure: ItemFailure,
    ) -> Result<ItemResult, AppError> {
        if let ItemFailure::Internal(detail) = &failure {
            error!(
                batch_id = %batch_id,
                item_id = %item.id,
                tenant_id = %item.tenant_id,
                detail = %detail,
                "Unexpected error while processing item"
            );
        }

        let record = FailureRecord::for_item(item, &failure);
        warn!(
            batch_id = %batch_id,
            item_id = %item.id,
            tenant_id = %item.tenant_id,
            class = %record.class,
            attempts = record.attempts,
            will_retry = record.will_retry(),
            error = %record.message,
            "Item failed"
        );

        let unrecorded = match AssertUnwindSafe(self.workload.record_failure(item, &record))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.is_store_failure() => return Err(e),
            Ok(Err(e)) => Some(e.message),
            Err(panic) => Some(panic_message(panic)),
        };

        if let Some(detail) = unrecorded {
            // The record keeps its previous counter and stays eligible.
            error!(
                batch_id = %batch_id,
                item_id = %item.id,
                class = %record.class,
                detail = %detail,
                "Failed to record item failure"
            );
            return Ok(ItemResult::failed(
                batch_id,
                item,
                FailureClass::Internal,
                UNRECORDED_FAILURE,
                ItemDisposition::RetryNextRun,
                item.attempt_count,
            ));
        }

        Ok(ItemResult::failed(
            batch_id,
            item,
            record.class,
            record.message.clone(),
            record.disposition,
            record.attempts,
        ))
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "item processing panicked".to_string())
}
