//! Rank-check workload: re-check tracked keywords and record positions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use gbphub_client::{RankCheckApi, RankObservation, RemoteError};
use gbphub_core::error::{AppError, ErrorKind};
use gbphub_core::result::AppResult;
use gbphub_core::types::{BatchId, KeywordId, TenantId};
use gbphub_database::store::{CredentialStore, KeywordStore};
use gbphub_entity::batch::{BatchFilter, Workload as WorkloadKind};
use gbphub_entity::credential::CredentialProvider;
use gbphub_entity::item::{ItemDisposition, KeywordCheckPayload, WorkItem};
use gbphub_entity::keyword::{CheckStatus, KeywordFailure, RankHistory};

use crate::source::{CredentialGate, WorkItemSource};
use crate::workload::{FailureRecord, Workload};

/// Loads eligible keywords of tenants holding a rank-check credential.
#[derive(Debug, Clone)]
pub struct KeywordSource {
    keywords: Arc<dyn KeywordStore>,
    gate: CredentialGate,
}

impl KeywordSource {
    /// Create a source.
    pub fn new(keywords: Arc<dyn KeywordStore>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            keywords,
            gate: CredentialGate::new(credentials, CredentialProvider::RankCheck),
        }
    }
}

#[async_trait]
impl WorkItemSource for KeywordSource {
    type Payload = KeywordCheckPayload;

    async fn load_batch(&self, filter: &BatchFilter) -> AppResult<Vec<WorkItem<Self::Payload>>> {
        let keywords = self.keywords.find_eligible_keywords(filter).await?;
        let tenants: Vec<TenantId> = keywords.iter().map(|k| k.tenant_id).collect();
        let tokens = self.gate.resolve(&tenants).await?;

        Ok(keywords
            .into_iter()
            .filter_map(|keyword| {
                let access_token = tokens.get(&keyword.tenant_id)?.clone();
                Some(WorkItem {
                    id: keyword.id.into_uuid(),
                    tenant_id: keyword.tenant_id,
                    payload: keyword.to_payload(),
                    attempt_count: keyword.failed_attempts,
                    max_attempts: keyword.max_attempts,
                    access_token,
                })
            })
            .collect())
    }
}

/// Re-checks keyword rankings.
#[derive(Clone)]
pub struct RankCheckWorkload {
    source: KeywordSource,
    keywords: Arc<dyn KeywordStore>,
    api: Arc<dyn RankCheckApi>,
}

impl std::fmt::Debug for RankCheckWorkload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankCheckWorkload")
            .field("keywords", &self.keywords)
            .finish_non_exhaustive()
    }
}

impl RankCheckWorkload {
    /// Create the workload.
    pub fn new(
        keywords: Arc<dyn KeywordStore>,
        credentials: Arc<dyn CredentialStore>,
        api: Arc<dyn RankCheckApi>,
    ) -> Self {
        Self {
            source: KeywordSource::new(Arc::clone(&keywords), credentials),
            keywords,
            api,
        }
    }
}

#[async_trait]
impl Workload for RankCheckWorkload {
    type Payload = KeywordCheckPayload;
    type Output = RankObservation;
    type Source = KeywordSource;

    fn kind(&self) -> WorkloadKind {
        WorkloadKind::RankCheck
    }

    fn source(&self) -> &Self::Source {
        &self.source
    }

    async fn call(&self, item: &WorkItem<Self::Payload>) -> Result<Self::Output, RemoteError> {
        self.api.check_rank(&item.payload, &item.access_token).await
    }

    async fn record_success(
        &self,
        batch_id: BatchId,
        item: &WorkItem<Self::Payload>,
        output: &Self::Output,
    ) -> AppResult<serde_json::Value> {
        let keyword_id = KeywordId::from_uuid(item.id);
        let entry = RankHistory {
            keyword_id,
            batch_id,
            tenant_id: item.tenant_id,
            position: output.position,
            url: output.url.clone(),
            local_pack_position: output.local_pack_position,
            checked_at: Utc::now(),
        };
        self.keywords.upsert_rank_history(&entry).await?;
        self.keywords.mark_keyword_checked(keyword_id, &entry).await?;

        serde_json::to_value(output).map_err(|e| {
            AppError::with_source(ErrorKind::Serialization, "Failed to encode rank observation", e)
        })
    }

    async fn record_failure(
        &self,
        item: &WorkItem<Self::Payload>,
        failure: &FailureRecord,
    ) -> AppResult<()> {
        let status = match failure.disposition {
            ItemDisposition::RetryNextRun => CheckStatus::Retrying,
            _ => CheckStatus::Failed,
        };
        self.keywords
            .mark_keyword_failed(
                KeywordId::from_uuid(item.id),
                &KeywordFailure {
                    attempts: failure.attempts,
                    status,
                    error: failure.message.clone(),
                    failed_at: failure.failed_at,
                },
            )
            .await
    }
}
