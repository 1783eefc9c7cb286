//! Tracked keyword model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use gbphub_core::types::{BatchId, KeywordId, TenantId};

use crate::item::payload::KeywordCheckPayload;

/// Outcome of the most recent rank check for a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "check_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Never checked.
    Pending,
    /// Last check succeeded.
    Ok,
    /// Last check failed; the next batch retries it.
    Retrying,
    /// Failed for good; excluded until edited.
    Failed,
}

/// A search keyword a tenant tracks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackedKeyword {
    /// Unique keyword identifier.
    pub id: KeywordId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Search phrase.
    pub keyword: String,
    /// Search location.
    pub location: Option<String>,
    /// Tracked domain.
    pub domain: String,
    /// Business name matched against the local pack.
    pub business_name: Option<String>,
    /// Whether tracking is switched on.
    pub is_active: bool,
    /// Last check outcome.
    pub check_status: CheckStatus,
    /// Consecutive failed checks.
    pub failed_attempts: i32,
    /// Failed checks allowed before the keyword is marked failed.
    pub max_attempts: i32,
    /// Organic position from the latest successful check.
    pub current_position: Option<i32>,
    /// Organic position from the check before that.
    pub previous_position: Option<i32>,
    /// Best organic position ever seen.
    pub best_position: Option<i32>,
    /// When the keyword was last checked successfully.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Classified message of the latest failure.
    pub last_error: Option<String>,
    /// When the keyword was created.
    pub created_at: DateTime<Utc>,
    /// When the keyword was last updated.
    pub updated_at: DateTime<Utc>,
}

impl TrackedKeyword {
    /// Create an active, never-checked keyword.
    pub fn new(
        tenant_id: TenantId,
        keyword: impl Into<String>,
        location: Option<String>,
        domain: impl Into<String>,
        max_attempts: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: KeywordId::new(),
            tenant_id,
            keyword: keyword.into(),
            location,
            domain: domain.into(),
            business_name: None,
            is_active: true,
            check_status: CheckStatus::Pending,
            failed_attempts: 0,
            max_attempts,
            current_position: None,
            previous_position: None,
            best_position: None,
            last_checked_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a rank-check batch should pick this keyword up.
    pub fn is_eligible(&self) -> bool {
        self.is_active
            && self.check_status != CheckStatus::Failed
            && self.failed_attempts < self.max_attempts
    }

    /// Payload sent to the rank-check service.
    pub fn to_payload(&self) -> KeywordCheckPayload {
        KeywordCheckPayload {
            keyword: self.keyword.clone(),
            location: self.location.clone(),
            domain: self.domain.clone(),
            business_name: self.business_name.clone(),
        }
    }

    /// Apply a successful check: shift positions and reset the failure counter.
    pub fn apply_check(&mut self, entry: &RankHistory) {
        self.previous_position = self.current_position;
        self.current_position = entry.position;
        self.best_position = match (self.best_position, entry.position) {
            (Some(best), Some(pos)) => Some(best.min(pos)),
            (best, pos) => best.or(pos),
        };
        self.check_status = CheckStatus::Ok;
        self.failed_attempts = 0;
        self.last_checked_at = Some(entry.checked_at);
        self.last_error = None;
        self.updated_at = Utc::now();
    }

    /// Apply a failed check.
    pub fn apply_failure(&mut self, failure: &KeywordFailure) {
        self.failed_attempts = failure.attempts;
        self.check_status = failure.status;
        self.last_error = Some(failure.error.clone());
        self.updated_at = failure.failed_at;
    }
}

/// One rank observation, keyed by `(keyword_id, batch_id)` so a re-run of
/// the same batch overwrites instead of duplicating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RankHistory {
    /// Keyword checked.
    pub keyword_id: KeywordId,
    /// Batch that produced the observation.
    pub batch_id: BatchId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Organic position, `None` when not ranked in the inspected depth.
    pub position: Option<i32>,
    /// Ranking URL.
    pub url: Option<String>,
    /// Position in the local pack.
    pub local_pack_position: Option<i32>,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
}

/// Failure bookkeeping written to a keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordFailure {
    /// Failed-attempt counter after this failure.
    pub attempts: i32,
    /// `Retrying` or `Failed`.
    pub status: CheckStatus,
    /// Classified failure message.
    pub error: String,
    /// When the failure happened.
    pub failed_at: DateTime<Utc>,
}
