//! Shared test helpers for integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use gbphub_api::AppState;
use gbphub_client::{
    ProfilePublishApi, PublishedPost, RankCheckApi, RankObservation, RemoteError,
};
use gbphub_core::config::{AppConfig, RetryConfig, WorkloadConfig};
use gbphub_core::types::{AccessToken, BatchId, KeywordId, TenantId};
use gbphub_database::MemoryStore;
use gbphub_entity::credential::{CredentialProvider, TenantCredential};
use gbphub_entity::item::{KeywordCheckPayload, PostPublishPayload};
use gbphub_entity::keyword::TrackedKeyword;
use gbphub_entity::post::ScheduledPost;
use gbphub_worker::workloads::{PostPublishWorkload, RankCheckWorkload};
use gbphub_worker::{BatchController, BatchRegistry, ProgressTracker, RateLimiter};

/// Rank-check fake that always ranks the domain at position 7.
#[derive(Debug, Default)]
pub struct FixedRankApi;

#[async_trait]
impl RankCheckApi for FixedRankApi {
    async fn check_rank(
        &self,
        query: &KeywordCheckPayload,
        _token: &AccessToken,
    ) -> Result<RankObservation, RemoteError> {
        Ok(RankObservation {
            position: Some(7),
            url: Some(format!("https://{}/services", query.domain)),
            local_pack_position: Some(2),
        })
    }
}

/// Business-profile fake that accepts every post.
#[derive(Debug, Default)]
pub struct AcceptingProfileApi;

#[async_trait]
impl ProfilePublishApi for AcceptingProfileApi {
    async fn publish_post(
        &self,
        post: &PostPublishPayload,
        _token: &AccessToken,
    ) -> Result<PublishedPost, RemoteError> {
        Ok(PublishedPost {
            name: format!(
                "accounts/{}/locations/{}/localPosts/1",
                post.account_id, post.location_id
            ),
            state: Some("LIVE".to_string()),
            search_url: None,
        })
    }
}

/// Test response with parsed body
pub struct TestResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Backing store for seeding and inspection
    pub store: Arc<MemoryStore>,
    /// Runners, for waiting on batches
    pub registry: Arc<BatchRegistry>,
}

fn workload_config() -> WorkloadConfig {
    WorkloadConfig {
        min_delay_ms: 1_000,
        rate_limit_jitter_ms: 0,
        retry: RetryConfig {
            jitter_ms: 0,
            ..RetryConfig::default()
        },
        ..WorkloadConfig::rank_check()
    }
}

impl TestApp {
    /// Create a new test application over an in-memory store
    pub fn new() -> Self {
        let config = Arc::new(AppConfig::default());
        let store = Arc::new(MemoryStore::new());
        let tracker = Arc::new(ProgressTracker::new(
            store.clone(),
            config.worker.snapshot_retention(),
        ));

        let rank_check = BatchController::new(
            Arc::new(RankCheckWorkload::new(
                store.clone(),
                store.clone(),
                Arc::new(FixedRankApi),
            )),
            store.clone(),
            Arc::new(RateLimiter::from_config(&workload_config())),
            tracker.clone(),
            workload_config(),
            4,
        );
        let post_publish = BatchController::new(
            Arc::new(PostPublishWorkload::new(
                store.clone(),
                store.clone(),
                Arc::new(AcceptingProfileApi),
            )),
            store.clone(),
            Arc::new(RateLimiter::from_config(&workload_config())),
            tracker,
            workload_config(),
            4,
        );

        let mut registry = BatchRegistry::new();
        registry.register(Arc::new(rank_check));
        registry.register(Arc::new(post_publish));
        let registry = Arc::new(registry);

        let router = gbphub_api::build_router(AppState::new(config, Arc::clone(&registry)));
        Self {
            router,
            store,
            registry,
        }
    }

    /// A tenant with credentials for both providers
    pub fn tenant(&self) -> TenantId {
        let tenant_id = TenantId::new();
        for provider in [
            CredentialProvider::RankCheck,
            CredentialProvider::BusinessProfile,
        ] {
            self.store
                .insert_credential(TenantCredential::new(tenant_id, provider, "token", None));
        }
        tenant_id
    }

    /// Track a keyword
    pub async fn keyword(&self, tenant_id: TenantId, keyword: &str) -> KeywordId {
        let tracked = TrackedKeyword::new(
            tenant_id,
            keyword,
            Some("Austin, TX".to_string()),
            "example.com",
            3,
        );
        let id = tracked.id;
        self.store.insert_keyword(tracked).await;
        id
    }

    /// Schedule a post that is already due
    pub async fn due_post(&self, tenant_id: TenantId, location_id: &str) {
        self.store
            .insert_post(ScheduledPost::new(
                tenant_id,
                "1001",
                location_id,
                "Open late on Fridays",
                Utc::now() - chrono::Duration::minutes(5),
                3,
            ))
            .await;
    }

    /// Wait until a batch reaches a terminal state
    pub async fn wait(&self, workload: &str, batch_id: &str) {
        let runner = self
            .registry
            .get(workload.parse().expect("workload"))
            .expect("runner");
        let id = BatchId::from_uuid(batch_id.parse().expect("batch id"));
        runner.wait(id).await.expect("wait");
    }

    /// Make a request against the router
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
