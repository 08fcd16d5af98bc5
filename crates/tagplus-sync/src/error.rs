use tagplus_client::ClientError;
use tagplus_core::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("TagPlus API error: {0}")]
    Vendor(#[from] ClientError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("mapping error for TagPlus record {vendor_id}: {reason}")]
    Mapping { vendor_id: i64, reason: String },

    #[error("failed to encode job result: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("batch job not found: {0}")]
    JobNotFound(Uuid),

    #[error("batch job {id} has type {job_type}, expected {expected}")]
    WrongJobType {
        id: Uuid,
        job_type: String,
        expected: &'static str,
    },
}
