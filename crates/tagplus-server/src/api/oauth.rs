use axum::{
    extract::{Query, State},
    response::Redirect,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tagplus_client::Authorization;

use crate::middleware::RequestId;

use super::{map_client_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct OAuthCallbackQuery {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CallbackData {
    ok: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshData {
    refreshed: bool,
}

/// Redirect target of the vendor consent screen.
pub(super) async fn oauth_callback(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Json<ApiResponse<CallbackData>>, ApiError> {
    let code = query
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| {
            ApiError::new(req_id.0.clone(), "bad_request", "missing authorization code")
        })?;

    state
        .client
        .authorize(code)
        .await
        .map_err(|e| map_client_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(CallbackData { ok: true }, req_id.0)))
}

pub(super) async fn authorize_redirect(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Redirect, ApiError> {
    let url = state
        .client
        .authorize_url()
        .map_err(|e| map_client_error(req_id.0, &e))?;
    Ok(Redirect::to(url.as_str()))
}

pub(super) async fn verify(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Authorization>>, ApiError> {
    let authorization = state
        .client
        .verify_authorization()
        .await
        .map_err(|e| map_client_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(authorization, req_id.0)))
}

pub(super) async fn refresh(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<RefreshData>>, ApiError> {
    let token = state
        .client
        .refresh_token()
        .await
        .map_err(|e| map_client_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        RefreshData {
            refreshed: token.is_some(),
        },
        req_id.0,
    )))
}
