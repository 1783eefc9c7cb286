//! Post-publish workload: publish scheduled posts whose time has come.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use gbphub_client::{ProfilePublishApi, PublishedPost, RemoteError};
use gbphub_core::result::AppResult;
use gbphub_core::types::{BatchId, PostId, TenantId};
use gbphub_database::store::{CredentialStore, PostStore};
use gbphub_entity::batch::{BatchFilter, Workload as WorkloadKind};
use gbphub_entity::credential::CredentialProvider;
use gbphub_entity::item::{ItemDisposition, PostPublishPayload, WorkItem};
use gbphub_entity::post::{PostFailure, PostStatus};

use crate::source::{CredentialGate, WorkItemSource};
use crate::workload::{FailureRecord, Workload};

/// Loads posts that are due, for tenants holding a business-profile
/// credential.
#[derive(Debug, Clone)]
pub struct DuePostSource {
    posts: Arc<dyn PostStore>,
    gate: CredentialGate,
}

impl DuePostSource {
    /// Create a source.
    pub fn new(posts: Arc<dyn PostStore>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            posts,
            gate: CredentialGate::new(credentials, CredentialProvider::BusinessProfile),
        }
    }
}

#[async_trait]
impl WorkItemSource for DuePostSource {
    type Payload = PostPublishPayload;

    async fn load_batch(&self, filter: &BatchFilter) -> AppResult<Vec<WorkItem<Self::Payload>>> {
        let posts = self.posts.find_due_posts(Utc::now(), filter).await?;
        let tenants: Vec<TenantId> = posts.iter().map(|p| p.tenant_id).collect();
        let tokens = self.gate.resolve(&tenants).await?;

        Ok(posts
            .into_iter()
            .filter_map(|post| {
                let access_token = tokens.get(&post.tenant_id)?.clone();
                Some(WorkItem {
                    id: post.id.into_uuid(),
                    tenant_id: post.tenant_id,
                    payload: post.to_payload(),
                    attempt_count: post.retry_count,
                    max_attempts: post.max_retries,
                    access_token,
                })
            })
            .collect())
    }
}

/// Publishes due posts to business locations.
#[derive(Clone)]
pub struct PostPublishWorkload {
    source: DuePostSource,
    posts: Arc<dyn PostStore>,
    api: Arc<dyn ProfilePublishApi>,
}

impl std::fmt::Debug for PostPublishWorkload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostPublishWorkload")
            .field("posts", &self.posts)
            .finish_non_exhaustive()
    }
}

impl PostPublishWorkload {
    /// Create the workload.
    pub fn new(
        posts: Arc<dyn PostStore>,
        credentials: Arc<dyn CredentialStore>,
        api: Arc<dyn ProfilePublishApi>,
    ) -> Self {
        Self {
            source: DuePostSource::new(Arc::clone(&posts), credentials),
            posts,
            api,
        }
    }
}

#[async_trait]
impl Workload for PostPublishWorkload {
    type Payload = PostPublishPayload;
    type Output = PublishedPost;
    type Source = DuePostSource;

    fn kind(&self) -> WorkloadKind {
        WorkloadKind::PostPublish
    }

    fn source(&self) -> &Self::Source {
        &self.source
    }

    async fn call(&self, item: &WorkItem<Self::Payload>) -> Result<Self::Output, RemoteError> {
        self.api.publish_post(&item.payload, &item.access_token).await
    }

    async fn record_success(
        &self,
        _batch_id: BatchId,
        item: &WorkItem<Self::Payload>,
        output: &Self::Output,
    ) -> AppResult<serde_json::Value> {
        self.posts
            .mark_post_published(PostId::from_uuid(item.id), &output.name, Utc::now())
            .await?;

        Ok(json!({
            "post_name": output.name,
            "state": output.state,
            "search_url": output.search_url,
        }))
    }

    async fn record_failure(
        &self,
        item: &WorkItem<Self::Payload>,
        failure: &FailureRecord,
    ) -> AppResult<()> {
        let status = match failure.disposition {
            ItemDisposition::RetryNextRun => PostStatus::Scheduled,
            _ => PostStatus::Failed,
        };
        self.posts
            .mark_post_failed(
                PostId::from_uuid(item.id),
                &PostFailure {
                    retry_count: failure.attempts,
                    status,
                    error: failure.message.clone(),
                    failed_at: failure.failed_at,
                },
            )
            .await
    }
}
