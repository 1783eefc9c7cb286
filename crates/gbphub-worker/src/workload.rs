//! The seam between the generic engine and a concrete workload.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use gbphub_client::RemoteError;
use gbphub_core::result::AppResult;
use gbphub_core::types::BatchId;
use gbphub_entity::batch::Workload as WorkloadKind;
use gbphub_entity::item::{FailureClass, ItemDisposition, WorkItem};

use crate::retry::{ErrorClass, RetryError};
use crate::source::WorkItemSource;

/// One kind of batch work: where items come from, which external call
/// processes them, and how outcomes are written back.
#[async_trait]
pub trait Workload: Send + Sync + 'static {
    /// Item payload.
    type Payload: Clone + fmt::Display + Send + Sync + 'static;
    /// Value returned by a successful call.
    type Output: Serialize + Send + Sync + 'static;
    /// Loader of eligible items.
    type Source: WorkItemSource<Payload = Self::Payload>;

    /// Which workload this is.
    fn kind(&self) -> WorkloadKind;

    /// The item loader.
    fn source(&self) -> &Self::Source;

    /// Retry classification of call errors.
    fn classify(&self, err: &RemoteError) -> ErrorClass {
        ErrorClass::of(err)
    }

    /// Make the external call for one item.
    async fn call(&self, item: &WorkItem<Self::Payload>) -> Result<Self::Output, RemoteError>;

    /// Persist a successful outcome idempotently and return the value
    /// exposed in the item result.
    async fn record_success(
        &self,
        batch_id: BatchId,
        item: &WorkItem<Self::Payload>,
        output: &Self::Output,
    ) -> AppResult<serde_json::Value>;

    /// Persist a failed outcome on the underlying record.
    async fn record_failure(
        &self,
        item: &WorkItem<Self::Payload>,
        failure: &FailureRecord,
    ) -> AppResult<()>;
}

/// Why an item did not succeed.
#[derive(Debug, Error)]
pub enum ItemFailure {
    /// The external call failed for good.
    #[error(transparent)]
    Remote(#[from] RetryError<RemoteError>),
    /// Something other than the external call went wrong, including panics.
    /// The detail is logged, never shown in the item result.
    #[error("unexpected error while processing item")]
    Internal(String),
}

impl ItemFailure {
    /// Classify for the item result and the cross-batch retry decision.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Remote(err) => {
                let last = err.last_error();
                if last.is_credential() {
                    FailureClass::Credential
                } else if err.is_exhausted() || last.is_transient() {
                    FailureClass::Transient
                } else {
                    FailureClass::Permanent
                }
            }
            Self::Internal(_) => FailureClass::Internal,
        }
    }
}

/// Failure bookkeeping handed to [`Workload::record_failure`].
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// Classified failure.
    pub class: FailureClass,
    /// Classified message.
    pub message: String,
    /// Record attempt counter after counting this failure.
    pub attempts: i32,
    /// Whether the record stays eligible.
    pub disposition: ItemDisposition,
    /// When the item failed.
    pub failed_at: DateTime<Utc>,
}

impl FailureRecord {
    /// Apply the cross-batch retry policy to a failure of `item`.
    pub fn for_item<P>(item: &WorkItem<P>, failure: &ItemFailure) -> Self {
        let class = failure.class();
        let attempts = item.attempt_count + 1;
        Self {
            class,
            message: failure.to_string(),
            attempts,
            disposition: ItemDisposition::for_failure(class, attempts, item.max_attempts),
            failed_at: Utc::now(),
        }
    }

    /// Whether the next batch picks the record up again.
    pub fn will_retry(&self) -> bool {
        self.disposition == ItemDisposition::RetryNextRun
    }
}
