//! Batch repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use gbphub_core::error::{AppError, ErrorKind};
use gbphub_core::result::AppResult;
use gbphub_core::types::BatchId;
use gbphub_entity::batch::{BatchCompletion, BatchJob, CreateBatchJob, Workload};
use gbphub_entity::item::ItemResult;

use crate::store::BatchStore;

/// Repository for batch records and item results.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: PgPool,
}

impl BatchRepository {
    /// Create a new batch repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchStore for BatchRepository {
    async fn create_batch_job(&self, data: &CreateBatchJob) -> AppResult<BatchJob> {
        let filter = serde_json::to_value(&data.filter)?;

        // `batch_jobs_one_running` is a partial unique index on
        // (workload) WHERE status = 'running'.
        sqlx::query_as::<_, BatchJob>(
            "INSERT INTO batch_jobs (id, workload, status, total_items, filter, started_at) \
             VALUES ($1, $2, 'running', $3, $4, NOW()) RETURNING *",
        )
        .bind(BatchId::new())
        .bind(data.workload)
        .bind(data.total_items)
        .bind(filter)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let already_running =
                matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
            if already_running {
                AppError::with_source(
                    ErrorKind::Conflict,
                    format!("A {} batch is already running", data.workload),
                    e,
                )
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to create batch", e)
            }
        })
    }

    async fn find_batch_job(&self, id: BatchId) -> AppResult<Option<BatchJob>> {
        sqlx::query_as::<_, BatchJob>("SELECT * FROM batch_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find batch", e))
    }

    async fn find_running(&self, workload: Workload) -> AppResult<Option<BatchJob>> {
        sqlx::query_as::<_, BatchJob>(
            "SELECT * FROM batch_jobs WHERE workload = $1 AND status = 'running' LIMIT 1",
        )
        .bind(workload)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find running batch", e)
        })
    }

    async fn list_running(&self) -> AppResult<Vec<BatchJob>> {
        sqlx::query_as::<_, BatchJob>(
            "SELECT * FROM batch_jobs WHERE status = 'running' ORDER BY started_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list running batches", e)
        })
    }

    async fn record_progress(
        &self,
        id: BatchId,
        processed_delta: i32,
        failed_delta: i32,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE batch_jobs SET processed_items = processed_items + $2, \
             failed_items = failed_items + $3, updated_at = NOW() \
             WHERE id = $1 AND status = 'running'",
        )
        .bind(id)
        .bind(processed_delta)
        .bind(failed_delta)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to record batch progress", e)
        })?;
        Ok(())
    }

    async fn finish_batch_job(
        &self,
        id: BatchId,
        completion: &BatchCompletion,
    ) -> AppResult<BatchJob> {
        let updated = sqlx::query_as::<_, BatchJob>(
            "UPDATE batch_jobs SET status = $2, completed_at = $3, error_summary = $4, \
             updated_at = NOW() \
             WHERE id = $1 AND status IN ('pending', 'running') RETURNING *",
        )
        .bind(id)
        .bind(completion.status)
        .bind(completion.completed_at)
        .bind(&completion.error_summary)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to finish batch", e))?;

        match updated {
            Some(job) => Ok(job),
            None => match self.find_batch_job(id).await? {
                Some(job) => Err(AppError::conflict(format!(
                    "Batch {id} is already {}",
                    job.status
                ))),
                None => Err(AppError::not_found(format!("Batch {id} not found"))),
            },
        }
    }

    async fn upsert_item_result(&self, result: &ItemResult) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO batch_item_results \
             (batch_id, item_id, tenant_id, success, value, failure, error, will_retry, attempts, processed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (batch_id, item_id) DO UPDATE SET \
             tenant_id = EXCLUDED.tenant_id, success = EXCLUDED.success, value = EXCLUDED.value, \
             failure = EXCLUDED.failure, error = EXCLUDED.error, will_retry = EXCLUDED.will_retry, \
             attempts = EXCLUDED.attempts, processed_at = EXCLUDED.processed_at",
        )
        .bind(result.batch_id)
        .bind(result.item_id)
        .bind(result.tenant_id)
        .bind(result.success)
        .bind(&result.value)
        .bind(result.failure)
        .bind(&result.error)
        .bind(result.will_retry)
        .bind(result.attempts)
        .bind(result.processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to store item result", e))?;
        Ok(())
    }

    async fn list_item_results(&self, batch_id: BatchId) -> AppResult<Vec<ItemResult>> {
        sqlx::query_as::<_, ItemResult>(
            "SELECT * FROM batch_item_results WHERE batch_id = $1 \
             ORDER BY processed_at ASC, item_id ASC",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list item results", e))
    }

    async fn prune_finished(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM batch_jobs \
             WHERE status IN ('completed', 'failed', 'cancelled') AND completed_at < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to prune batches", e))?;
        Ok(result.rows_affected())
    }
}
