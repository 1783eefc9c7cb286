//! Scheduled post model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use gbphub_core::types::{PostId, TenantId};

use crate::item::payload::{CallToAction, PostPublishPayload, PostTopic};

/// Publication state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Being edited; never published automatically.
    Draft,
    /// Waiting for its scheduled time.
    Scheduled,
    /// Live on the business profile.
    Published,
    /// Gave up publishing.
    Failed,
}

/// A post a tenant scheduled for a business location.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledPost {
    /// Unique post identifier.
    pub id: PostId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Business-profile account id.
    pub account_id: String,
    /// Business-profile location id.
    pub location_id: String,
    /// Post body.
    pub summary: String,
    /// Post flavor.
    pub topic: PostTopic,
    /// Call-to-action type.
    pub cta_type: Option<String>,
    /// Call-to-action URL.
    pub cta_url: Option<String>,
    /// Already-hosted image URL.
    pub media_url: Option<String>,
    /// Publication state.
    pub status: PostStatus,
    /// When the post becomes due.
    pub scheduled_at: DateTime<Utc>,
    /// When the post went live.
    pub published_at: Option<DateTime<Utc>>,
    /// Resource name returned by the API.
    pub remote_post_name: Option<String>,
    /// Failed publication attempts.
    pub retry_count: i32,
    /// Attempts allowed before the post is marked failed.
    pub max_retries: i32,
    /// Classified message of the latest failure.
    pub last_error: Option<String>,
    /// When the post was created.
    pub created_at: DateTime<Utc>,
    /// When the post was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ScheduledPost {
    /// Create a scheduled standard post.
    pub fn new(
        tenant_id: TenantId,
        account_id: impl Into<String>,
        location_id: impl Into<String>,
        summary: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        max_retries: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PostId::new(),
            tenant_id,
            account_id: account_id.into(),
            location_id: location_id.into(),
            summary: summary.into(),
            topic: PostTopic::Standard,
            cta_type: None,
            cta_url: None,
            media_url: None,
            status: PostStatus::Scheduled,
            scheduled_at,
            published_at: None,
            remote_post_name: None,
            retry_count: 0,
            max_retries,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a publish batch started at `now` should pick this post up.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Scheduled
            && self.scheduled_at <= now
            && self.retry_count < self.max_retries
    }

    /// Payload sent to the business-profile API.
    pub fn to_payload(&self) -> PostPublishPayload {
        PostPublishPayload {
            account_id: self.account_id.clone(),
            location_id: self.location_id.clone(),
            summary: self.summary.clone(),
            topic: self.topic,
            call_to_action: self.cta_type.as_ref().map(|action_type| CallToAction {
                action_type: action_type.clone(),
                url: self.cta_url.clone(),
            }),
            media_url: self.media_url.clone(),
        }
    }

    /// Mark the post live. Re-applying the same remote name is a no-op.
    pub fn apply_published(&mut self, remote_post_name: &str, at: DateTime<Utc>) {
        if self.status == PostStatus::Published
            && self.remote_post_name.as_deref() == Some(remote_post_name)
        {
            return;
        }
        self.status = PostStatus::Published;
        self.remote_post_name = Some(remote_post_name.to_string());
        self.published_at = Some(at);
        self.last_error = None;
        self.updated_at = at;
    }

    /// Apply a failed publication attempt.
    pub fn apply_failure(&mut self, failure: &PostFailure) {
        self.retry_count = failure.retry_count;
        self.status = failure.status;
        self.last_error = Some(failure.error.clone());
        self.updated_at = failure.failed_at;
    }
}

/// Failure bookkeeping written to a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostFailure {
    /// Retry counter after this failure.
    pub retry_count: i32,
    /// `Scheduled` (retry next run) or `Failed`.
    pub status: PostStatus,
    /// Classified failure message.
    pub error: String,
    /// When the failure happened.
    pub failed_at: DateTime<Utc>,
}
