use serde_json::json;
use tagplus_core::{BatchJob, BatchJobStore, NewBatchJob, IMPORT_JOB_TYPE};

use super::TagPlusClient;
use crate::error::ClientError;

impl TagPlusClient {
    /// Records an import job carrying the plugin options as context. The
    /// import itself runs later, when a job runner picks the job up.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the job cannot be recorded.
    pub async fn sync_products(&self, jobs: &dyn BatchJobStore) -> Result<BatchJob, ClientError> {
        let job = jobs
            .create_job(&NewBatchJob {
                job_type: IMPORT_JOB_TYPE.to_string(),
                context: json!({ "options": self.options }),
                created_by: "admin".to_string(),
                dry_run: false,
            })
            .await?;
        tracing::info!(job_id = %job.id, "TagPlus import job enqueued");
        Ok(job)
    }
}
