//! Batch run entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use gbphub_core::types::BatchId;

use super::filter::BatchFilter;
use super::status::{BatchStatus, Workload};

/// One run of the batch executor over a list of work items.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BatchJob {
    /// Unique batch identifier.
    pub id: BatchId,
    /// Which workload this batch drains.
    pub workload: Workload,
    /// Current status.
    pub status: BatchStatus,
    /// Number of items loaded at start.
    pub total_items: i32,
    /// Items finished so far (succeeded + failed).
    pub processed_items: i32,
    /// Items that finished unsuccessfully.
    pub failed_items: i32,
    /// Filter the batch was started with.
    pub filter: serde_json::Value,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the batch reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Reason for a fatal failure or cancellation.
    pub error_summary: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl BatchJob {
    /// Items that finished successfully.
    pub fn succeeded_items(&self) -> i32 {
        self.processed_items - self.failed_items
    }

    /// Items not yet processed.
    pub fn remaining_items(&self) -> i32 {
        (self.total_items - self.processed_items).max(0)
    }

    /// Completion percentage in `0.0..=100.0`.
    pub fn progress_percent(&self) -> f64 {
        if self.total_items <= 0 {
            return 100.0;
        }
        f64::from(self.processed_items) * 100.0 / f64::from(self.total_items)
    }
}

/// Data required to create a new batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatchJob {
    /// Workload to run.
    pub workload: Workload,
    /// Number of items loaded.
    pub total_items: i32,
    /// Filter used to load the items.
    pub filter: BatchFilter,
}

impl CreateBatchJob {
    /// Build the `Running` record a store persists for this request.
    pub fn into_running(self, now: DateTime<Utc>) -> BatchJob {
        BatchJob {
            id: BatchId::new(),
            workload: self.workload,
            status: BatchStatus::Running,
            total_items: self.total_items,
            processed_items: 0,
            failed_items: 0,
            filter: serde_json::to_value(&self.filter).unwrap_or(serde_json::Value::Null),
            started_at: now,
            completed_at: None,
            error_summary: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Terminal state written once when a batch finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCompletion {
    /// Terminal status.
    pub status: BatchStatus,
    /// When the batch finished.
    pub completed_at: DateTime<Utc>,
    /// Reason for a fatal failure or cancellation.
    pub error_summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(total: i32, processed: i32, failed: i32) -> BatchJob {
        let mut job = CreateBatchJob {
            workload: Workload::RankCheck,
            total_items: total,
            filter: BatchFilter::default(),
        }
        .into_running(Utc::now());
        job.processed_items = processed;
        job.failed_items = failed;
        job
    }

    #[test]
    fn test_counts_and_percent() {
        let job = running(8, 4, 1);
        assert_eq!(job.status, BatchStatus::Running);
        assert_eq!(job.succeeded_items(), 3);
        assert_eq!(job.remaining_items(), 4);
        assert!((job.progress_percent() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_running_record_stores_filter() {
        let tenant = gbphub_core::types::TenantId::new();
        let job = CreateBatchJob {
            workload: Workload::PostPublish,
            total_items: 1,
            filter: BatchFilter::for_tenant(tenant),
        }
        .into_running(Utc::now());

        let stored: BatchFilter = serde_json::from_value(job.filter).expect("filter json");
        assert_eq!(stored.tenant_id, Some(tenant));
    }
}
