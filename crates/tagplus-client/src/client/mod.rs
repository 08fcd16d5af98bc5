//! HTTP client for the TagPlus REST API.

mod auth;
mod catalog;
mod jobs;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tagplus_core::{PluginOptions, TokenStore};

use crate::error::{ClientError, DEFAULT_ERROR_MESSAGE};

const API_VERSION_HEADER: &str = "x-api-version";

/// Client for the TagPlus API.
///
/// Every catalog call goes through [`TagPlusClient::send_request`], which
/// first verifies (and if needed refreshes) the stored OAuth token. Any
/// transport failure or non-2xx response surfaces as
/// [`ClientError::UnexpectedState`]; nothing is retried here.
pub struct TagPlusClient {
    pub(super) client: Client,
    pub(super) base_url: String,
    pub(super) options: PluginOptions,
    pub(super) tokens: Arc<dyn TokenStore>,
    bearer: RwLock<Option<String>>,
}

impl TagPlusClient {
    /// Creates a client against `options.api_url` with the `Accept` and
    /// `X-Api-Version` headers fixed for its lifetime.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidUrl`] if the API version is not a valid header value.
    /// - [`ClientError::Build`] if the underlying `reqwest::Client` cannot be constructed.
    pub fn new(
        options: PluginOptions,
        tokens: Arc<dyn TokenStore>,
        timeout_secs: u64,
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let version =
            HeaderValue::from_str(&options.api_version).map_err(|e| ClientError::InvalidUrl {
                url: options.api_url.clone(),
                reason: format!("invalid API version header: {e}"),
            })?;
        headers.insert(HeaderName::from_static(API_VERSION_HEADER), version);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("tagplus-sync/0.1")
            .default_headers(headers)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            client,
            base_url: options.api_url.trim_end_matches('/').to_string(),
            options,
            tokens,
            bearer: RwLock::new(None),
        })
    }

    #[must_use]
    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    /// Issues an authenticated request against the API and decodes the JSON body.
    ///
    /// `path` is relative to the API base URL and may carry a query string.
    ///
    /// # Errors
    ///
    /// - [`ClientError::UnexpectedState`] on transport failure or a non-2xx response.
    /// - [`ClientError::Deserialize`] if the body does not decode into `T`.
    /// - [`ClientError::Store`] if the token state cannot be read or written.
    pub async fn send_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T, ClientError> {
        self.verify_authorization().await?;

        let url = self.url(path)?;
        let mut request = self.client.request(method.clone(), url);
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(headers) = headers {
            request = request.headers(headers);
        }

        tracing::debug!(%method, path, "sending TagPlus request");
        let text = execute(request).await?;
        serde_json::from_str(&text).map_err(|source| ClientError::Deserialize {
            context: format!("{method} {path}"),
            source,
        })
    }

    pub(super) fn url(&self, path: &str) -> Result<Url, ClientError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| ClientError::InvalidUrl {
            url: raw,
            reason: e.to_string(),
        })
    }

    pub(super) fn bearer(&self) -> Option<String> {
        self.bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(super) fn set_bearer(&self, token: &str) {
        *self.bearer.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    }
}

/// Sends the request and returns the body of a 2xx response.
pub(super) async fn execute(request: RequestBuilder) -> Result<String, ClientError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if status.is_success() {
        return Ok(body);
    }

    let message = vendor_message(&body)
        .unwrap_or_else(|| format!("request failed with status code {}", status.as_u16()));
    tracing::warn!(status = status.as_u16(), %message, "TagPlus request failed");
    Err(ClientError::UnexpectedState(message))
}

fn transport_error(error: reqwest::Error) -> ClientError {
    let message = error.to_string();
    if message.trim().is_empty() {
        ClientError::UnexpectedState(DEFAULT_ERROR_MESSAGE.to_string())
    } else {
        ClientError::UnexpectedState(message)
    }
}

/// Pulls the human-readable message out of a TagPlus error body.
///
/// API errors carry `message`; OAuth errors carry `error_description`.
pub(super) fn vendor_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_owned)
}

pub(super) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
