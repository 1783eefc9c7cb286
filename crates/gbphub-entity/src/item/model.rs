//! Work item and item result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use gbphub_core::types::{AccessToken, BatchId, TenantId};

use super::failure::{FailureClass, ItemDisposition};

/// One unit of external-API work loaded into a batch.
///
/// Work items are immutable once loaded; outcomes are recorded as
/// [`ItemResult`]s and on the underlying record, never on the item.
#[derive(Debug, Clone)]
pub struct WorkItem<P> {
    /// Id of the underlying record (keyword or post).
    pub id: Uuid,
    /// Owning tenant; the rate-limit key.
    pub tenant_id: TenantId,
    /// Workload-specific payload.
    pub payload: P,
    /// Failed attempts recorded on the underlying record before this batch.
    pub attempt_count: i32,
    /// Attempts allowed before the record is marked failed.
    pub max_attempts: i32,
    /// Tenant credential resolved by the source.
    pub access_token: AccessToken,
}

impl<P> WorkItem<P> {
    /// The rate-limit key of this item.
    pub fn tenant_key(&self) -> String {
        self.tenant_id.to_string()
    }
}

/// Outcome of processing one work item in one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ItemResult {
    /// Batch that produced the result.
    pub batch_id: BatchId,
    /// Id of the underlying record.
    pub item_id: Uuid,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Whether the external call succeeded.
    pub success: bool,
    /// Rank data or published post reference.
    pub value: Option<serde_json::Value>,
    /// Classified failure.
    pub failure: Option<FailureClass>,
    /// Classified failure message.
    pub error: Option<String>,
    /// Whether the next batch picks the record up again.
    pub will_retry: bool,
    /// Record attempt counter after this result.
    pub attempts: i32,
    /// When the item finished.
    pub processed_at: DateTime<Utc>,
}

impl ItemResult {
    /// Result for a successful item.
    pub fn succeeded<P>(batch_id: BatchId, item: &WorkItem<P>, value: serde_json::Value) -> Self {
        Self {
            batch_id,
            item_id: item.id,
            tenant_id: item.tenant_id,
            success: true,
            value: Some(value),
            failure: None,
            error: None,
            will_retry: false,
            attempts: 0,
            processed_at: Utc::now(),
        }
    }

    /// Result for a failed item.
    pub fn failed<P>(
        batch_id: BatchId,
        item: &WorkItem<P>,
        class: FailureClass,
        message: impl Into<String>,
        disposition: ItemDisposition,
        attempts: i32,
    ) -> Self {
        Self {
            batch_id,
            item_id: item.id,
            tenant_id: item.tenant_id,
            success: false,
            value: None,
            failure: Some(class),
            error: Some(message.into()),
            will_retry: disposition == ItemDisposition::RetryNextRun,
            attempts,
            processed_at: Utc::now(),
        }
    }
}
