//! In-process job queue. A single worker task runs queued import jobs one at
//! a time.

use std::sync::Arc;

use tagplus_client::{ClientError, TagPlusClient};
use tagplus_core::{BatchJob, BatchJobStore, StoreError, IMPORT_JOB_TYPE};
use tagplus_sync::BatchJobRunner;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("job queue is closed; batch job {0} was recorded but will not run")]
    QueueClosed(Uuid),

    #[error("failed to list unfinished batch jobs: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Uuid>,
}

impl JobQueue {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// # Errors
    ///
    /// Returns [`EnqueueError::QueueClosed`] once the worker has stopped.
    pub fn push(&self, job_id: Uuid) -> Result<(), EnqueueError> {
        self.sender
            .send(job_id)
            .map_err(|_| EnqueueError::QueueClosed(job_id))
    }
}

/// Spawns the worker task. The task ends when every [`JobQueue`] clone has
/// been dropped.
pub fn spawn_worker(runner: Arc<BatchJobRunner>) -> (JobQueue, JoinHandle<()>) {
    let (queue, mut receiver) = JobQueue::channel();
    let handle = tokio::spawn(async move {
        while let Some(job_id) = receiver.recv().await {
            tracing::info!(%job_id, "worker: running batch job");
            match runner.run(job_id).await {
                Ok(status) => {
                    tracing::info!(%job_id, status = status.as_str(), "worker: batch job finished");
                }
                Err(error) => {
                    tracing::error!(%job_id, error = %error, "worker: batch job could not run");
                }
            }
        }
        tracing::info!("worker: job queue closed");
    });
    (queue, handle)
}

/// Records an import job and hands it to the worker.
///
/// # Errors
///
/// Returns [`EnqueueError::Client`] if the job cannot be recorded, or
/// [`EnqueueError::QueueClosed`] if the worker is gone.
pub async fn enqueue_import(
    client: &TagPlusClient,
    jobs: &dyn BatchJobStore,
    queue: &JobQueue,
) -> Result<BatchJob, EnqueueError> {
    let job = client.sync_products(jobs).await?;
    queue.push(job.id)?;
    Ok(job)
}

/// Queues import jobs a previous process left `created` or mid-run, oldest
/// first, and returns how many were queued.
///
/// # Errors
///
/// Returns [`EnqueueError::Store`] if the jobs cannot be listed, or
/// [`EnqueueError::QueueClosed`] if the worker is gone.
pub async fn requeue_unfinished(
    jobs: &dyn BatchJobStore,
    queue: &JobQueue,
) -> Result<usize, EnqueueError> {
    let unfinished = jobs.list_unfinished_jobs(IMPORT_JOB_TYPE).await?;
    for job in &unfinished {
        tracing::info!(
            job_id = %job.id,
            status = job.status.as_str(),
            attempts = job.attempts,
            "worker: requeueing unfinished batch job"
        );
        queue.push(job.id)?;
    }
    Ok(unfinished.len())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tagplus_core::{BatchJobStatus, NewBatchJob};
    use tagplus_sync::MemoryBatchJobs;

    use super::*;

    async fn create(jobs: &MemoryBatchJobs, job_type: &str) -> Uuid {
        jobs.create_job(&NewBatchJob {
            job_type: job_type.to_string(),
            context: json!({}),
            created_by: "admin".to_string(),
            dry_run: false,
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn unfinished_import_jobs_are_requeued_on_startup() {
        let jobs = MemoryBatchJobs::default();
        let queued = create(&jobs, IMPORT_JOB_TYPE).await;
        let interrupted = create(&jobs, IMPORT_JOB_TYPE).await;
        let completed = create(&jobs, IMPORT_JOB_TYPE).await;
        let foreign = create(&jobs, "export-orders").await;
        jobs.set_job_status(interrupted, BatchJobStatus::Processing, None).await.unwrap();
        jobs.set_job_status(completed, BatchJobStatus::Completed, None).await.unwrap();

        let (queue, mut receiver) = JobQueue::channel();
        let count = requeue_unfinished(&jobs, &queue).await.unwrap();
        drop(queue);

        let mut received = Vec::new();
        while let Some(id) = receiver.recv().await {
            received.push(id);
        }
        assert_eq!(count, 2);
        assert_eq!(received.len(), 2);
        assert!(received.contains(&queued));
        assert!(received.contains(&interrupted));
        assert!(!received.contains(&completed));
        assert!(!received.contains(&foreign));
    }

    #[tokio::test]
    async fn pushed_ids_reach_the_receiver_in_order() {
        let (queue, mut receiver) = JobQueue::channel();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        queue.push(first).unwrap();
        queue.push(second).unwrap();

        assert_eq!(receiver.recv().await, Some(first));
        assert_eq!(receiver.recv().await, Some(second));
    }

    #[test]
    fn push_fails_once_the_receiver_is_gone() {
        let (queue, receiver) = JobQueue::channel();
        drop(receiver);

        let id = Uuid::new_v4();
        assert!(matches!(queue.push(id), Err(EnqueueError::QueueClosed(got)) if got == id));
    }
}
