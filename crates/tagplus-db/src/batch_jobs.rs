//! Database operations for `batch_jobs`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tagplus_core::{BatchJob, BatchJobStatus, BatchJobStore, NewBatchJob, StoreError, StoreResult};
use uuid::Uuid;

use crate::store_error;

const JOB_COLUMNS: &str = "id, job_type, status, context, result, created_by, dry_run, \
     attempts, error_message, created_at, updated_at";

/// A row from the `batch_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BatchJobRow {
    pub id: Uuid,
    pub job_type: String,
    /// One of the [`BatchJobStatus`] strings (CHECK constraint).
    pub status: String,
    pub context: Json<serde_json::Value>,
    pub result: Json<serde_json::Value>,
    pub created_by: String,
    pub dry_run: bool,
    pub attempts: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BatchJobRow> for BatchJob {
    type Error = StoreError;

    fn try_from(row: BatchJobRow) -> Result<Self, Self::Error> {
        let status = BatchJobStatus::from_str(&row.status)
            .map_err(|reason| StoreError::Backend(reason.into()))?;
        Ok(Self {
            id: row.id,
            job_type: row.job_type,
            status,
            context: row.context.0,
            result: row.result.0,
            created_by: row.created_by,
            dry_run: row.dry_run,
            attempts: row.attempts,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgBatchJobStore {
    pool: PgPool,
}

impl PgBatchJobStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn expect_one(id: Uuid, rows_affected: u64) -> StoreResult<()> {
        if rows_affected == 0 {
            return Err(StoreError::not_found("batch job", id));
        }
        Ok(())
    }
}

#[async_trait]
impl BatchJobStore for PgBatchJobStore {
    async fn create_job(&self, job: &NewBatchJob) -> StoreResult<BatchJob> {
        let row = sqlx::query_as::<_, BatchJobRow>(&format!(
            "INSERT INTO batch_jobs (id, job_type, status, context, created_by, dry_run) \
             VALUES ($1, $2, 'created', $3, $4, $5) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&job.job_type)
        .bind(Json(&job.context))
        .bind(&job.created_by)
        .bind(job.dry_run)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        row.try_into()
    }

    async fn retrieve_job(&self, id: Uuid) -> StoreResult<Option<BatchJob>> {
        let row = sqlx::query_as::<_, BatchJobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM batch_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(BatchJob::try_from).transpose()
    }

    async fn set_job_status(
        &self,
        id: Uuid,
        status: BatchJobStatus,
        error_message: Option<&str>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE batch_jobs \
             SET status = $2, error_message = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Self::expect_one(id, result.rows_affected())
    }

    async fn update_job_result(&self, id: Uuid, result: &serde_json::Value) -> StoreResult<()> {
        let outcome = sqlx::query(
            "UPDATE batch_jobs SET result = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(Json(result))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Self::expect_one(id, outcome.rows_affected())
    }

    async fn record_job_attempt(&self, id: Uuid) -> StoreResult<i32> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE batch_jobs \
             SET attempts = attempts + 1, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING attempts",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?
        .ok_or_else(|| StoreError::not_found("batch job", id))
    }

    async fn list_unfinished_jobs(&self, job_type: &str) -> StoreResult<Vec<BatchJob>> {
        let rows = sqlx::query_as::<_, BatchJobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM batch_jobs \
             WHERE job_type = $1 AND status NOT IN ('completed', 'failed') \
             ORDER BY created_at, id"
        ))
        .bind(job_type)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(BatchJob::try_from).collect()
    }
}
