//! In-memory store for single-node deployments and tests.
//!
//! Batch records sit behind one `RwLock` so the single-flight check and the
//! insert happen under the same write guard. Everything else uses `DashMap`
//! or an insertion-ordered `Vec`.

use std::collections::HashMap;
#[cfg(any(test, feature = "test-util"))]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use gbphub_core::error::AppError;
use gbphub_core::result::AppResult;
use gbphub_core::types::{BatchId, KeywordId, PostId, TenantId};
use gbphub_entity::batch::{
    BatchCompletion, BatchFilter, BatchJob, BatchStatus, CreateBatchJob, Workload,
};
use gbphub_entity::credential::{CredentialProvider, TenantCredential};
use gbphub_entity::item::ItemResult;
use gbphub_entity::keyword::{KeywordFailure, RankHistory, TrackedKeyword};
use gbphub_entity::post::{PostFailure, PostStatus, ScheduledPost};

use crate::store::{BatchStore, CredentialStore, KeywordStore, PostStore};

/// Process-local implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: RwLock<HashMap<BatchId, BatchJob>>,
    results: DashMap<(BatchId, Uuid), ItemResult>,
    keywords: RwLock<Vec<TrackedKeyword>>,
    rank_history: DashMap<(KeywordId, BatchId), RankHistory>,
    posts: RwLock<Vec<ScheduledPost>>,
    credentials: DashMap<(TenantId, CredentialProvider), TenantCredential>,
    #[cfg(any(test, feature = "test-util"))]
    result_writes_failing: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tracked keyword.
    pub async fn insert_keyword(&self, keyword: TrackedKeyword) {
        self.keywords.write().await.push(keyword);
    }

    /// Add a scheduled post.
    pub async fn insert_post(&self, post: ScheduledPost) {
        self.posts.write().await.push(post);
    }

    /// Add or replace a tenant credential.
    pub fn insert_credential(&self, credential: TenantCredential) {
        self.credentials
            .insert((credential.tenant_id, credential.provider), credential);
    }

    /// Rank observations recorded for a keyword, oldest first.
    pub fn rank_history_for(&self, keyword_id: KeywordId) -> Vec<RankHistory> {
        let mut entries: Vec<RankHistory> = self
            .rank_history
            .iter()
            .filter(|e| e.key().0 == keyword_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.checked_at);
        entries
    }

    /// Number of batch records held.
    pub async fn batch_count(&self) -> usize {
        self.batches.read().await.len()
    }

    /// Make item-result writes fail as if the store went away.
    #[cfg(any(test, feature = "test-util"))]
    pub fn set_result_writes_failing(&self, failing: bool) {
        self.result_writes_failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl BatchStore for MemoryStore {
    async fn create_batch_job(&self, data: &CreateBatchJob) -> AppResult<BatchJob> {
        let mut batches = self.batches.write().await;
        if batches
            .values()
            .any(|b| b.workload == data.workload && b.status == BatchStatus::Running)
        {
            return Err(AppError::conflict(format!(
                "A {} batch is already running",
                data.workload
            )));
        }

        let job = data.clone().into_running(Utc::now());
        batches.insert(job.id, job.clone());
        debug!(batch_id = %job.id, workload = %job.workload, "Stored batch");
        Ok(job)
    }

    async fn find_batch_job(&self, id: BatchId) -> AppResult<Option<BatchJob>> {
        Ok(self.batches.read().await.get(&id).cloned())
    }

    async fn find_running(&self, workload: Workload) -> AppResult<Option<BatchJob>> {
        Ok(self
            .batches
            .read()
            .await
            .values()
            .find(|b| b.workload == workload && b.status == BatchStatus::Running)
            .cloned())
    }

    async fn list_running(&self) -> AppResult<Vec<BatchJob>> {
        let mut running: Vec<BatchJob> = self
            .batches
            .read()
            .await
            .values()
            .filter(|b| b.status == BatchStatus::Running)
            .cloned()
            .collect();
        running.sort_by_key(|b| b.started_at);
        Ok(running)
    }

    async fn record_progress(
        &self,
        id: BatchId,
        processed_delta: i32,
        failed_delta: i32,
    ) -> AppResult<()> {
        let mut batches = self.batches.write().await;
        let job = batches
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Batch {id} not found")))?;
        if job.status == BatchStatus::Running {
            job.processed_items += processed_delta;
            job.failed_items += failed_delta;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn finish_batch_job(
        &self,
        id: BatchId,
        completion: &BatchCompletion,
    ) -> AppResult<BatchJob> {
        let mut batches = self.batches.write().await;
        let job = batches
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Batch {id} not found")))?;
        if !job.status.can_transition_to(completion.status) {
            return Err(AppError::conflict(format!(
                "Batch {id} is already {}",
                job.status
            )));
        }
        job.status = completion.status;
        job.completed_at = Some(completion.completed_at);
        job.error_summary = completion.error_summary.clone();
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn upsert_item_result(&self, result: &ItemResult) -> AppResult<()> {
        #[cfg(any(test, feature = "test-util"))]
        if self.result_writes_failing.load(Ordering::SeqCst) {
            return Err(AppError::service_unavailable("Item result store is unavailable"));
        }
        self.results
            .insert((result.batch_id, result.item_id), result.clone());
        Ok(())
    }

    async fn list_item_results(&self, batch_id: BatchId) -> AppResult<Vec<ItemResult>> {
        let mut results: Vec<ItemResult> = self
            .results
            .iter()
            .filter(|r| r.key().0 == batch_id)
            .map(|r| r.value().clone())
            .collect();
        results.sort_by(|a, b| {
            a.processed_at
                .cmp(&b.processed_at)
                .then(a.item_id.cmp(&b.item_id))
        });
        Ok(results)
    }

    async fn prune_finished(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut batches = self.batches.write().await;
        let count = batches.len();
        batches.retain(|_, b| {
            !(b.status.is_terminal() && b.completed_at.is_some_and(|at| at < before))
        });
        Ok((count - batches.len()) as u64)
    }
}

#[async_trait]
impl KeywordStore for MemoryStore {
    async fn find_eligible_keywords(&self, filter: &BatchFilter) -> AppResult<Vec<TrackedKeyword>> {
        let mut eligible: Vec<TrackedKeyword> = self
            .keywords
            .read()
            .await
            .iter()
            .filter(|k| k.is_eligible())
            .filter(|k| filter.matches(k.id.into_uuid(), k.tenant_id))
            .filter(|k| filter.matches_location(k.location.as_deref()))
            .cloned()
            .collect();
        eligible.sort_by_key(|k| k.created_at);
        Ok(eligible)
    }

    async fn find_keyword(&self, id: KeywordId) -> AppResult<Option<TrackedKeyword>> {
        Ok(self.keywords.read().await.iter().find(|k| k.id == id).cloned())
    }

    async fn upsert_rank_history(&self, entry: &RankHistory) -> AppResult<()> {
        self.rank_history
            .insert((entry.keyword_id, entry.batch_id), entry.clone());
        Ok(())
    }

    async fn mark_keyword_checked(&self, id: KeywordId, entry: &RankHistory) -> AppResult<()> {
        let mut keywords = self.keywords.write().await;
        if let Some(keyword) = keywords.iter_mut().find(|k| k.id == id) {
            if keyword.last_checked_at != Some(entry.checked_at) {
                keyword.apply_check(entry);
            }
        }
        Ok(())
    }

    async fn mark_keyword_failed(&self, id: KeywordId, failure: &KeywordFailure) -> AppResult<()> {
        let mut keywords = self.keywords.write().await;
        if let Some(keyword) = keywords.iter_mut().find(|k| k.id == id) {
            keyword.apply_failure(failure);
        }
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn find_due_posts(
        &self,
        now: DateTime<Utc>,
        filter: &BatchFilter,
    ) -> AppResult<Vec<ScheduledPost>> {
        let mut due: Vec<ScheduledPost> = self
            .posts
            .read()
            .await
            .iter()
            .filter(|p| p.is_due(now))
            .filter(|p| filter.matches(p.id.into_uuid(), p.tenant_id))
            .cloned()
            .collect();
        due.sort_by_key(|p| p.scheduled_at);
        Ok(due)
    }

    async fn find_post(&self, id: PostId) -> AppResult<Option<ScheduledPost>> {
        Ok(self.posts.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn mark_post_published(
        &self,
        id: PostId,
        remote_post_name: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut posts = self.posts.write().await;
        if let Some(post) = posts.iter_mut().find(|p| p.id == id) {
            post.apply_published(remote_post_name, at);
        }
        Ok(())
    }

    async fn mark_post_failed(&self, id: PostId, failure: &PostFailure) -> AppResult<()> {
        let mut posts = self.posts.write().await;
        if let Some(post) = posts
            .iter_mut()
            .find(|p| p.id == id && p.status != PostStatus::Published)
        {
            post.apply_failure(failure);
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_credential(
        &self,
        tenant_id: TenantId,
        provider: CredentialProvider,
    ) -> AppResult<Option<TenantCredential>> {
        Ok(self
            .credentials
            .get(&(tenant_id, provider))
            .map(|c| c.value().clone()))
    }
}
