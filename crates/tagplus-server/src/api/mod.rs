mod oauth;
mod sync;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tagplus_client::{ClientError, TagPlusClient};
use tagplus_core::{BatchJobStore, StoreError};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, require_bearer_auth, AuthState, RequestId};
use crate::worker::JobQueue;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<TagPlusClient>,
    pub jobs: Arc<dyn BatchJobStore>,
    pub queue: JobQueue,
    /// `None` when running without a database (health reports it as disabled).
    pub pool: Option<PgPool>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" => StatusCode::BAD_REQUEST,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Vendor failures surface as `upstream_error`; token-store and local
/// configuration failures as `internal_error`.
pub(super) fn map_client_error(request_id: String, error: &ClientError) -> ApiError {
    match error {
        ClientError::UnexpectedState(message) => {
            tracing::warn!(error = %message, "TagPlus request failed");
            ApiError::new(request_id, "upstream_error", message.clone())
        }
        ClientError::Deserialize { .. } => {
            tracing::warn!(error = %error, "TagPlus returned an unreadable response");
            ApiError::new(request_id, "upstream_error", error.to_string())
        }
        ClientError::Store(store_error) => map_store_error(request_id, store_error),
        ClientError::InvalidUrl { .. } | ClientError::Build(_) => {
            tracing::error!(error = %error, "TagPlus client misconfigured");
            ApiError::new(request_id, "internal_error", "TagPlus client is misconfigured")
        }
    }
}

pub(super) fn map_store_error(request_id: String, error: &StoreError) -> ApiError {
    tracing::error!(error = %error, "store operation failed");
    ApiError::new(request_id, "internal_error", "store operation failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/admin/tagplus/authorize", get(oauth::authorize_redirect))
        .route("/admin/tagplus/verify", get(oauth::verify))
        .route("/admin/tagplus/refresh", get(oauth::refresh))
        .route("/admin/tagplus/sync-products", post(sync::sync_products))
        .route("/admin/tagplus/jobs/{id}", get(sync::get_job))
        .layer(axum::middleware::from_fn_with_state(
            auth,
            require_bearer_auth,
        ))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    // The vendor redirects the admin's browser here, so it cannot carry a bearer token.
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/admin/tagplus/oauth2", get(oauth::oauth_callback));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    let Some(pool) = &state.pool else {
        return (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "disabled",
                },
                meta,
            }),
        );
    };

    match tagplus_db::health_check(pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}
