//! Tracked keyword repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use gbphub_core::error::{AppError, ErrorKind};
use gbphub_core::result::AppResult;
use gbphub_core::types::KeywordId;
use gbphub_entity::batch::BatchFilter;
use gbphub_entity::keyword::{KeywordFailure, RankHistory, TrackedKeyword};

use crate::store::KeywordStore;

/// Repository for tracked keywords and rank history.
#[derive(Debug, Clone)]
pub struct KeywordRepository {
    pool: PgPool,
}

impl KeywordRepository {
    /// Create a new keyword repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeywordStore for KeywordRepository {
    async fn find_eligible_keywords(&self, filter: &BatchFilter) -> AppResult<Vec<TrackedKeyword>> {
        sqlx::query_as::<_, TrackedKeyword>(
            "SELECT * FROM tracked_keywords \
             WHERE is_active AND check_status <> 'failed' AND failed_attempts < max_attempts \
             AND (cardinality($1::uuid[]) = 0 OR id = ANY($1)) \
             AND ($2::uuid IS NULL OR tenant_id = $2) \
             AND ($3::text IS NULL OR lower(trim(location)) = lower(trim($3))) \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(&filter.item_ids)
        .bind(filter.tenant_id)
        .bind(&filter.location)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to load eligible keywords", e)
        })
    }

    async fn find_keyword(&self, id: KeywordId) -> AppResult<Option<TrackedKeyword>> {
        sqlx::query_as::<_, TrackedKeyword>("SELECT * FROM tracked_keywords WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find keyword", e))
    }

    async fn upsert_rank_history(&self, entry: &RankHistory) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO rank_history \
             (keyword_id, batch_id, tenant_id, position, url, local_pack_position, checked_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (keyword_id, batch_id) DO UPDATE SET \
             position = EXCLUDED.position, url = EXCLUDED.url, \
             local_pack_position = EXCLUDED.local_pack_position, checked_at = EXCLUDED.checked_at",
        )
        .bind(entry.keyword_id)
        .bind(entry.batch_id)
        .bind(entry.tenant_id)
        .bind(entry.position)
        .bind(&entry.url)
        .bind(entry.local_pack_position)
        .bind(entry.checked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to store rank history", e))?;
        Ok(())
    }

    async fn mark_keyword_checked(&self, id: KeywordId, entry: &RankHistory) -> AppResult<()> {
        // Re-applying the same observation leaves the positions untouched.
        sqlx::query(
            "UPDATE tracked_keywords SET \
             previous_position = current_position, \
             current_position = $2::int4, \
             best_position = CASE \
                WHEN $2::int4 IS NULL THEN best_position \
                WHEN best_position IS NULL THEN $2::int4 \
                ELSE LEAST(best_position, $2::int4) END, \
             check_status = 'ok', failed_attempts = 0, last_checked_at = $3, \
             last_error = NULL, updated_at = NOW() \
             WHERE id = $1 AND last_checked_at IS DISTINCT FROM $3",
        )
        .bind(id)
        .bind(entry.position)
        .bind(entry.checked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update keyword", e))?;
        Ok(())
    }

    async fn mark_keyword_failed(&self, id: KeywordId, failure: &KeywordFailure) -> AppResult<()> {
        sqlx::query(
            "UPDATE tracked_keywords SET failed_attempts = $2, check_status = $3, \
             last_error = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(failure.attempts)
        .bind(failure.status)
        .bind(&failure.error)
        .bind(failure.failed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update keyword", e))?;
        Ok(())
    }
}
