//! Shared fixtures for batch engine tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use gbphub_client::{
    ProfilePublishApi, PublishedPost, RankCheckApi, RankObservation, RemoteError,
};
use gbphub_core::config::{RetryConfig, WorkloadConfig};
use gbphub_core::types::{AccessToken, KeywordId, PostId, TenantId};
use gbphub_database::MemoryStore;
use gbphub_entity::batch::BatchFilter;
use gbphub_entity::credential::{CredentialProvider, TenantCredential};
use gbphub_entity::item::{KeywordCheckPayload, PostPublishPayload};
use gbphub_entity::keyword::TrackedKeyword;
use gbphub_entity::post::ScheduledPost;
use gbphub_worker::workloads::{PostPublishWorkload, RankCheckWorkload};
use gbphub_worker::{
    BatchController, ProgressSnapshot, ProgressTracker, RateLimiter, StartOutcome, Workload,
};

/// Keywords starting with this prefix make the fake API panic.
pub const PANIC_PREFIX: &str = "panic";

/// Keywords starting with this prefix make the fake API hang past the
/// call timeout.
pub const SLOW_PREFIX: &str = "slow";

/// Engine settings with deterministic timing: 1s spacing, no jitter,
/// 3 attempts with 1s, 2s backoff.
pub fn workload_config() -> WorkloadConfig {
    WorkloadConfig {
        min_delay_ms: 1_000,
        rate_limit_jitter_ms: 0,
        call_timeout_seconds: 30,
        estimated_call_seconds: 1,
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            multiplier: 2.0,
            max_backoff_ms: 10_000,
            jitter_ms: 0,
            rate_limit_cooldown_ms: 0,
        },
        ..WorkloadConfig::rank_check()
    }
}

pub fn rate_limited() -> RemoteError {
    RemoteError::RateLimited { retry_after: None }
}

pub fn rejected(status: u16) -> RemoteError {
    RemoteError::Status {
        status,
        message: "rejected by fake".to_string(),
    }
}

/// Rank-check API answering from per-keyword scripts, defaulting to
/// position 3.
#[derive(Debug, Default)]
pub struct ScriptedRankApi {
    scripts: Mutex<HashMap<String, VecDeque<Result<RankObservation, RemoteError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRankApi {
    /// Queue responses for a keyword; once drained the default applies.
    pub fn script(&self, keyword: &str, responses: Vec<Result<RankObservation, RemoteError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(keyword.to_string(), responses.into());
    }

    /// Fail every call for a keyword.
    pub fn always_fail(&self, keyword: &str, err: RemoteError) {
        self.script(keyword, vec![Err(err); 50]);
    }

    pub fn calls_for(&self, keyword: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.as_str() == keyword)
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RankCheckApi for ScriptedRankApi {
    async fn check_rank(
        &self,
        query: &KeywordCheckPayload,
        _token: &AccessToken,
    ) -> Result<RankObservation, RemoteError> {
        self.calls.lock().unwrap().push(query.keyword.clone());
        if query.keyword.starts_with(PANIC_PREFIX) {
            panic!("fake rank api exploded on {}", query.keyword);
        }
        if query.keyword.starts_with(SLOW_PREFIX) {
            tokio::time::sleep(Duration::from_secs(120)).await;
        }
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&query.keyword)
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| {
            Ok(RankObservation {
                position: Some(3),
                url: Some(format!("https://{}/", query.domain)),
                local_pack_position: None,
            })
        })
    }
}

/// Rank-check engine over an in-memory store.
pub struct RankHarness {
    pub store: Arc<MemoryStore>,
    pub api: Arc<ScriptedRankApi>,
    pub tracker: Arc<ProgressTracker>,
    pub controller: BatchController<RankCheckWorkload>,
}

impl RankHarness {
    pub fn new() -> Self {
        Self::with_options(4, Duration::from_secs(600))
    }

    pub fn with_options(max_concurrent_tenants: usize, retention: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(ScriptedRankApi::default());
        let tracker = Arc::new(ProgressTracker::new(store.clone(), retention));
        let config = workload_config();
        let workload = Arc::new(RankCheckWorkload::new(
            store.clone(),
            store.clone(),
            api.clone(),
        ));
        let controller = BatchController::new(
            workload,
            store.clone(),
            Arc::new(RateLimiter::from_config(&config)),
            tracker.clone(),
            config,
            max_concurrent_tenants,
        );
        Self {
            store,
            api,
            tracker,
            controller,
        }
    }

    /// A tenant holding a rank-check credential.
    pub fn tenant(&self) -> TenantId {
        let tenant_id = TenantId::new();
        self.store.insert_credential(TenantCredential::new(
            tenant_id,
            CredentialProvider::RankCheck,
            "rank-token",
            None,
        ));
        tenant_id
    }

    /// Track a keyword for `tenant_id`.
    pub async fn keyword(&self, tenant_id: TenantId, keyword: &str) -> KeywordId {
        let tracked = TrackedKeyword::new(tenant_id, keyword, None, "example.com", 3);
        let id = tracked.id;
        self.store.insert_keyword(tracked).await;
        id
    }

    /// Start a batch over everything eligible and wait for it.
    pub async fn run(&self) -> ProgressSnapshot {
        let started = start_batch(&self.controller, BatchFilter::default()).await;
        self.controller
            .wait(started)
            .await
            .unwrap()
            .expect("batch snapshot")
    }
}

/// Start a batch and return its id, failing the test on `NothingToDo`.
pub async fn start_batch<W: Workload>(
    controller: &BatchController<W>,
    filter: BatchFilter,
) -> gbphub_core::types::BatchId {
    match controller.start(filter).await.unwrap() {
        StartOutcome::Started(started) => started.batch_id,
        StartOutcome::NothingToDo => panic!("expected a batch to start"),
    }
}

/// Business-profile API answering from per-location scripts, defaulting
/// to a published post.
#[derive(Debug, Default)]
pub struct ScriptedProfileApi {
    scripts: Mutex<HashMap<String, VecDeque<Result<PublishedPost, RemoteError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProfileApi {
    pub fn script(&self, location_id: &str, responses: Vec<Result<PublishedPost, RemoteError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(location_id.to_string(), responses.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfilePublishApi for ScriptedProfileApi {
    async fn publish_post(
        &self,
        post: &PostPublishPayload,
        _token: &AccessToken,
    ) -> Result<PublishedPost, RemoteError> {
        let call = self.calls.lock().unwrap().len();
        self.calls.lock().unwrap().push(post.location_id.clone());
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&post.location_id)
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or_else(|| {
            Ok(PublishedPost {
                name: format!(
                    "accounts/{}/locations/{}/localPosts/{}",
                    post.account_id, post.location_id, call
                ),
                state: Some("LIVE".to_string()),
                search_url: None,
            })
        })
    }
}

/// Post-publish engine over an in-memory store.
pub struct PostHarness {
    pub store: Arc<MemoryStore>,
    pub api: Arc<ScriptedProfileApi>,
    pub controller: BatchController<PostPublishWorkload>,
}

impl PostHarness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(ScriptedProfileApi::default());
        let tracker = Arc::new(ProgressTracker::new(
            store.clone(),
            Duration::from_secs(600),
        ));
        let config = WorkloadConfig {
            schedule: WorkloadConfig::post_publish().schedule,
            ..workload_config()
        };
        let workload = Arc::new(PostPublishWorkload::new(
            store.clone(),
            store.clone(),
            api.clone(),
        ));
        let controller = BatchController::new(
            workload,
            store.clone(),
            Arc::new(RateLimiter::from_config(&config)),
            tracker,
            config,
            4,
        );
        Self {
            store,
            api,
            controller,
        }
    }

    /// A tenant holding a business-profile credential.
    pub fn tenant(&self) -> TenantId {
        let tenant_id = TenantId::new();
        self.store.insert_credential(TenantCredential::new(
            tenant_id,
            CredentialProvider::BusinessProfile,
            "profile-token",
            None,
        ));
        tenant_id
    }

    /// Schedule a post on `location_id` that was due a minute ago.
    pub async fn due_post(&self, tenant_id: TenantId, location_id: &str) -> PostId {
        let post = ScheduledPost::new(
            tenant_id,
            "1001",
            location_id,
            "Spring offer: 20% off all cleanings",
            Utc::now() - chrono::Duration::minutes(1),
            3,
        );
        let id = post.id;
        self.store.insert_post(post).await;
        id
    }
}
