//! Drives an import batch job through its lifecycle.

use std::sync::Arc;

use tagplus_core::{BatchJobStatus, BatchJobStore, IMPORT_JOB_TYPE};
use uuid::Uuid;

use crate::error::SyncError;
use crate::importer::CatalogImporter;
use crate::outcome::ImportSummary;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub struct BatchJobRunner {
    importer: Arc<CatalogImporter>,
    jobs: Arc<dyn BatchJobStore>,
    max_attempts: u32,
}

impl BatchJobRunner {
    /// `max_attempts` of zero is treated as one.
    #[must_use]
    pub fn new(
        importer: Arc<CatalogImporter>,
        jobs: Arc<dyn BatchJobStore>,
        max_attempts: u32,
    ) -> Self {
        Self {
            importer,
            jobs,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Runs the job to a terminal status and returns that status.
    ///
    /// A job that is already completed or failed is left untouched. Import
    /// errors are retried while attempts remain; the last one is stored as the
    /// job's error message and the job ends `failed`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::JobNotFound`] or [`SyncError::WrongJobType`] for a
    /// job this runner cannot handle, and [`SyncError::Store`] when the job
    /// record itself cannot be updated.
    pub async fn run(&self, job_id: Uuid) -> Result<BatchJobStatus, SyncError> {
        let job = self
            .jobs
            .retrieve_job(job_id)
            .await?
            .ok_or(SyncError::JobNotFound(job_id))?;
        if job.job_type != IMPORT_JOB_TYPE {
            return Err(SyncError::WrongJobType {
                id: job_id,
                job_type: job.job_type,
                expected: IMPORT_JOB_TYPE,
            });
        }
        if job.status.is_terminal() {
            tracing::info!(%job_id, status = job.status.as_str(), "batch job already finished");
            return Ok(job.status);
        }

        loop {
            let attempt = self.jobs.record_job_attempt(job_id).await?;
            match self.attempt(job_id).await {
                Ok(summary) => {
                    let result = serde_json::to_value(&summary)?;
                    self.jobs.update_job_result(job_id, &result).await?;
                    self.jobs
                        .set_job_status(job_id, BatchJobStatus::Completed, None)
                        .await?;
                    tracing::info!(
                        %job_id,
                        attempt,
                        skipped = summary.skipped,
                        "batch job completed"
                    );
                    return Ok(BatchJobStatus::Completed);
                }
                Err(error) => {
                    let exhausted = u32::try_from(attempt).map_or(true, |n| n >= self.max_attempts);
                    if !exhausted && self.importer.should_retry_on_processing_error(&error) {
                        tracing::warn!(
                            %job_id,
                            attempt,
                            error = %error,
                            "batch job failed; retrying"
                        );
                        continue;
                    }
                    let message = error.to_string();
                    tracing::error!(%job_id, attempt, error = %message, "batch job failed");
                    self.jobs
                        .set_job_status(job_id, BatchJobStatus::Failed, Some(&message))
                        .await?;
                    return Ok(BatchJobStatus::Failed);
                }
            }
        }
    }

    async fn attempt(&self, job_id: Uuid) -> Result<ImportSummary, SyncError> {
        self.jobs
            .set_job_status(job_id, BatchJobStatus::PreProcessed, None)
            .await?;
        self.importer.pre_process_batch_job(job_id).await?;
        self.jobs
            .set_job_status(job_id, BatchJobStatus::Processing, None)
            .await?;
        self.importer.process_job(job_id).await
    }
}
