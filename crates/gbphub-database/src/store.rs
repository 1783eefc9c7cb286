//! Store traits the batch engine depends on.
//!
//! Every operation is a simple get/put/update. Counter updates are
//! increments, never read-modify-write from the caller.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gbphub_core::result::AppResult;
use gbphub_core::types::{BatchId, KeywordId, PostId, TenantId};
use gbphub_entity::batch::{BatchCompletion, BatchFilter, BatchJob, CreateBatchJob, Workload};
use gbphub_entity::credential::{CredentialProvider, TenantCredential};
use gbphub_entity::item::ItemResult;
use gbphub_entity::keyword::{KeywordFailure, RankHistory, TrackedKeyword};
use gbphub_entity::post::{PostFailure, ScheduledPost};

/// Batch records and their per-item results.
#[async_trait]
pub trait BatchStore: Send + Sync + fmt::Debug {
    /// Insert a `Running` batch.
    ///
    /// Fails with `Conflict` when a batch of the same workload is already
    /// running.
    async fn create_batch_job(&self, data: &CreateBatchJob) -> AppResult<BatchJob>;

    /// Find a batch by id.
    async fn find_batch_job(&self, id: BatchId) -> AppResult<Option<BatchJob>>;

    /// The running batch of a workload, if any.
    async fn find_running(&self, workload: Workload) -> AppResult<Option<BatchJob>>;

    /// Every batch still marked running.
    async fn list_running(&self) -> AppResult<Vec<BatchJob>>;

    /// Atomically add to the processed and failed counters of a running batch.
    async fn record_progress(
        &self,
        id: BatchId,
        processed_delta: i32,
        failed_delta: i32,
    ) -> AppResult<()>;

    /// Write the terminal state. Fails with `Conflict` if the batch is
    /// already terminal.
    async fn finish_batch_job(&self, id: BatchId, completion: &BatchCompletion)
    -> AppResult<BatchJob>;

    /// Insert or replace the result keyed by `(batch_id, item_id)`.
    async fn upsert_item_result(&self, result: &ItemResult) -> AppResult<()>;

    /// Results of a batch in processing order.
    async fn list_item_results(&self, batch_id: BatchId) -> AppResult<Vec<ItemResult>>;

    /// Delete terminal batches completed before `before`. Item results are kept.
    async fn prune_finished(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Tracked keywords and their rank history.
#[async_trait]
pub trait KeywordStore: Send + Sync + fmt::Debug {
    /// Eligible keywords matching the filter, oldest first.
    async fn find_eligible_keywords(&self, filter: &BatchFilter) -> AppResult<Vec<TrackedKeyword>>;

    /// Find a keyword by id.
    async fn find_keyword(&self, id: KeywordId) -> AppResult<Option<TrackedKeyword>>;

    /// Insert or replace the observation keyed by `(keyword_id, batch_id)`.
    async fn upsert_rank_history(&self, entry: &RankHistory) -> AppResult<()>;

    /// Apply a successful check to the keyword's metadata.
    async fn mark_keyword_checked(&self, id: KeywordId, entry: &RankHistory) -> AppResult<()>;

    /// Apply a failed check to the keyword's metadata.
    async fn mark_keyword_failed(&self, id: KeywordId, failure: &KeywordFailure) -> AppResult<()>;
}

/// Scheduled posts.
#[async_trait]
pub trait PostStore: Send + Sync + fmt::Debug {
    /// Posts due at `now` matching the filter, earliest schedule first.
    async fn find_due_posts(
        &self,
        now: DateTime<Utc>,
        filter: &BatchFilter,
    ) -> AppResult<Vec<ScheduledPost>>;

    /// Find a post by id.
    async fn find_post(&self, id: PostId) -> AppResult<Option<ScheduledPost>>;

    /// Mark a post published. Idempotent for the same remote name.
    async fn mark_post_published(
        &self,
        id: PostId,
        remote_post_name: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Apply a failed publication attempt.
    async fn mark_post_failed(&self, id: PostId, failure: &PostFailure) -> AppResult<()>;
}

/// Tenant credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync + fmt::Debug {
    /// The tenant's credential for a provider.
    async fn find_credential(
        &self,
        tenant_id: TenantId,
        provider: CredentialProvider,
    ) -> AppResult<Option<TenantCredential>>;
}
