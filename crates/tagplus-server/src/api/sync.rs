use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tagplus_core::BatchJob;
use uuid::Uuid;

use crate::middleware::RequestId;
use crate::worker::{enqueue_import, EnqueueError};

use super::{map_client_error, map_store_error, ApiError, ApiResponse, AppState};

/// Records an import job and queues it; the import runs in the background.
pub(super) async fn sync_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<(StatusCode, Json<ApiResponse<BatchJob>>), ApiError> {
    let job = enqueue_import(&state.client, state.jobs.as_ref(), &state.queue)
        .await
        .map_err(|e| match e {
            EnqueueError::Client(client_error) => map_client_error(req_id.0.clone(), &client_error),
            EnqueueError::QueueClosed(job_id) => {
                tracing::error!(%job_id, "job queue closed; import will not run");
                ApiError::new(req_id.0.clone(), "internal_error", "job worker is not running")
            }
            EnqueueError::Store(store_error) => map_store_error(req_id.0.clone(), &store_error),
        })?;

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::new(job, req_id.0))))
}

pub(super) async fn get_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BatchJob>>, ApiError> {
    let job = state
        .jobs
        .retrieve_job(id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(req_id.0.clone(), "not_found", format!("batch job {id} not found"))
        })?;

    Ok(Json(ApiResponse::new(job, req_id.0)))
}
