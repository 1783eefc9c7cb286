//! Scheduled post repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use gbphub_core::error::{AppError, ErrorKind};
use gbphub_core::result::AppResult;
use gbphub_core::types::PostId;
use gbphub_entity::batch::BatchFilter;
use gbphub_entity::post::{PostFailure, ScheduledPost};

use crate::store::PostStore;

/// Repository for scheduled posts.
#[derive(Debug, Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    /// Create a new post repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PostRepository {
    async fn find_due_posts(
        &self,
        now: DateTime<Utc>,
        filter: &BatchFilter,
    ) -> AppResult<Vec<ScheduledPost>> {
        sqlx::query_as::<_, ScheduledPost>(
            "SELECT * FROM scheduled_posts \
             WHERE status = 'scheduled' AND scheduled_at <= $1 AND retry_count < max_retries \
             AND (cardinality($2::uuid[]) = 0 OR id = ANY($2)) \
             AND ($3::uuid IS NULL OR tenant_id = $3) \
             ORDER BY scheduled_at ASC, id ASC",
        )
        .bind(now)
        .bind(&filter.item_ids)
        .bind(filter.tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load due posts", e))
    }

    async fn find_post(&self, id: PostId) -> AppResult<Option<ScheduledPost>> {
        sqlx::query_as::<_, ScheduledPost>("SELECT * FROM scheduled_posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find post", e))
    }

    async fn mark_post_published(
        &self,
        id: PostId,
        remote_post_name: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE scheduled_posts SET status = 'published', remote_post_name = $2, \
             published_at = $3, last_error = NULL, updated_at = NOW() \
             WHERE id = $1 AND (status <> 'published' OR remote_post_name IS DISTINCT FROM $2)",
        )
        .bind(id)
        .bind(remote_post_name)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to mark post published", e)
        })?;
        Ok(())
    }

    async fn mark_post_failed(&self, id: PostId, failure: &PostFailure) -> AppResult<()> {
        sqlx::query(
            "UPDATE scheduled_posts SET retry_count = $2, status = $3, last_error = $4, \
             updated_at = $5 WHERE id = $1 AND status <> 'published'",
        )
        .bind(id)
        .bind(failure.retry_count)
        .bind(failure.status)
        .bind(&failure.error)
        .bind(failure.failed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark post failed", e))?;
        Ok(())
    }
}
