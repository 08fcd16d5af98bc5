//! Background job scheduler.
//!
//! When `TAGPLUS_SYNC_CRON` is set, a recurring job records an import batch
//! job and hands it to the worker, exactly like the manual sync endpoint.

use std::sync::Arc;

use tagplus_client::TagPlusClient;
use tagplus_core::BatchJobStore;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::worker::{enqueue_import, JobQueue};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    sync_cron: Option<&str>,
    client: Arc<TagPlusClient>,
    jobs: Arc<dyn BatchJobStore>,
    queue: JobQueue,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    match sync_cron {
        Some(cron) => register_sync_job(&scheduler, cron, client, jobs, queue).await?,
        None => tracing::info!("TAGPLUS_SYNC_CRON not set; scheduled sync disabled"),
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_sync_job(
    scheduler: &JobScheduler,
    cron: &str,
    client: Arc<TagPlusClient>,
    jobs: Arc<dyn BatchJobStore>,
    queue: JobQueue,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let client = Arc::clone(&client);
        let jobs = Arc::clone(&jobs);
        let queue = queue.clone();

        Box::pin(async move {
            match enqueue_import(&client, jobs.as_ref(), &queue).await {
                Ok(job) => tracing::info!(job_id = %job.id, "scheduler: TagPlus sync enqueued"),
                Err(error) => {
                    tracing::error!(error = %error, "scheduler: TagPlus sync not enqueued");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: TagPlus sync registered");
    Ok(())
}
