//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gbphub_entity::batch::{BatchStatus, Workload};
use gbphub_entity::item::{FailureClass, ItemResult};
use gbphub_worker::{BatchStarted, ProgressSnapshot, SnapshotSource};

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Registered workloads.
    pub workloads: Vec<Workload>,
}

/// A batch was started.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStartedResponse {
    /// Id to poll.
    pub batch_id: Uuid,
    /// Workload of the batch.
    pub workload: Workload,
    /// Items loaded.
    pub total_items: i32,
    /// Rough duration estimate.
    pub estimated_duration_minutes: u64,
    /// Always `running`.
    pub status: BatchStatus,
}

impl From<BatchStarted> for BatchStartedResponse {
    fn from(started: BatchStarted) -> Self {
        Self {
            batch_id: started.batch_id.into_uuid(),
            workload: started.workload,
            total_items: started.total_items,
            estimated_duration_minutes: started.estimated_duration_minutes,
            status: started.status,
        }
    }
}

/// Outcome of one item as shown to dashboards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResultResponse {
    /// Keyword or post id.
    pub item_id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Whether the item succeeded.
    pub success: bool,
    /// Rank data or published post reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Classified failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureClass>,
    /// Classified failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the next batch retries the item.
    pub will_retry: bool,
    /// When the item finished.
    pub processed_at: DateTime<Utc>,
}

impl From<ItemResult> for ItemResultResponse {
    fn from(result: ItemResult) -> Self {
        Self {
            item_id: result.item_id,
            tenant_id: result.tenant_id.into_uuid(),
            success: result.success,
            value: result.value,
            failure: result.failure,
            error: result.error,
            will_retry: result.will_retry,
            processed_at: result.processed_at,
        }
    }
}

/// Progress of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusResponse {
    /// Batch id.
    pub batch_id: Uuid,
    /// Workload of the batch.
    pub workload: Workload,
    /// Current status.
    pub status: BatchStatus,
    /// Items loaded.
    pub total_items: i32,
    /// Items finished.
    pub processed_items: i32,
    /// Items that failed.
    pub failed_items: i32,
    /// Completion percentage, one decimal.
    pub progress_percent: f64,
    /// Item in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_item: Option<String>,
    /// Estimated seconds left.
    pub estimated_seconds_remaining: Option<u64>,
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the batch finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Reason for an abort or cancellation.
    pub error_summary: Option<String>,
    /// `live` or `stored`.
    pub source: SnapshotSource,
    /// Per-item outcomes.
    pub results: Vec<ItemResultResponse>,
}

impl From<ProgressSnapshot> for BatchStatusResponse {
    fn from(snapshot: ProgressSnapshot) -> Self {
        Self {
            batch_id: snapshot.batch_id.into_uuid(),
            workload: snapshot.workload,
            status: snapshot.status,
            total_items: snapshot.total_items,
            processed_items: snapshot.processed_items,
            failed_items: snapshot.failed_items,
            progress_percent: (snapshot.progress_percent * 10.0).round() / 10.0,
            current_item: snapshot.current_item,
            estimated_seconds_remaining: snapshot.estimated_seconds_remaining,
            started_at: snapshot.started_at,
            completed_at: snapshot.completed_at,
            error_summary: snapshot.error_summary,
            source: snapshot.source,
            results: snapshot.results.into_iter().map(Into::into).collect(),
        }
    }
}

/// Cancellation was requested.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    /// Batch id.
    pub batch_id: Uuid,
    /// Human-readable note.
    pub message: String,
}
