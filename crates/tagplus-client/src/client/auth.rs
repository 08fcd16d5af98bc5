//! OAuth2 token lifecycle.

use reqwest::Url;
use tagplus_core::TokenState;

use super::{execute, now_ms, TagPlusClient};
use crate::error::ClientError;
use crate::types::{Authorization, TokenResponse};

const TOKEN_PATH: &str = "/oauth2/token";

impl TagPlusClient {
    /// Exchanges an authorization code for a token pair and persists it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UnexpectedState`] if TagPlus rejects the code or
    /// is unreachable, or [`ClientError::Store`] if the tokens cannot be saved.
    pub async fn authorize(&self, code: &str) -> Result<TokenResponse, ClientError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.options.client_id.as_str()),
            ("client_secret", self.options.client_secret.as_str()),
        ];
        let token = self.request_token(&form).await?;
        self.persist_token(&token, None).await?;
        tracing::info!("TagPlus authorization code exchanged");
        Ok(token)
    }

    /// Exchanges the stored refresh token for a new token pair.
    ///
    /// Returns `Ok(None)` without touching the network when no refresh token
    /// is stored.
    ///
    /// # Errors
    ///
    /// Same as [`TagPlusClient::authorize`].
    pub async fn refresh_token(&self) -> Result<Option<TokenResponse>, ClientError> {
        let stored = self.tokens.load_tokens().await?.unwrap_or_default();
        let Some(refresh_token) = stored.refresh_token else {
            tracing::debug!("no TagPlus refresh token stored; skipping refresh");
            return Ok(None);
        };
        let (token, _) = self.refresh_with(&refresh_token).await?;
        Ok(Some(token))
    }

    /// Checks the stored token, refreshing it first when it is missing or
    /// expired and a refresh token is available.
    ///
    /// On return the client's default bearer is set to whatever access token
    /// is current.
    ///
    /// # Errors
    ///
    /// Propagates refresh and token-store failures.
    pub async fn verify_authorization(&self) -> Result<Authorization, ClientError> {
        let Some(mut state) = self.tokens.load_tokens().await? else {
            return Ok(Authorization {
                is_authorized: false,
                access_token: None,
            });
        };

        if state.needs_refresh(now_ms()) {
            if let Some(refresh_token) = state.refresh_token.clone() {
                tracing::info!("TagPlus access token missing or expired; refreshing");
                let (_, refreshed) = self.refresh_with(&refresh_token).await?;
                state = refreshed;
            }
        }

        if let Some(access_token) = &state.access_token {
            self.set_bearer(access_token);
        }

        Ok(Authorization {
            is_authorized: state.is_valid_at(now_ms()),
            access_token: state.access_token,
        })
    }

    /// Vendor consent screen URL the admin is redirected to.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the configured authorize URL does not parse.
    pub fn authorize_url(&self) -> Result<Url, ClientError> {
        Url::parse_with_params(
            &self.options.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.options.client_id.as_str()),
                ("scope", self.options.scopes.as_str()),
            ],
        )
        .map_err(|e| ClientError::InvalidUrl {
            url: self.options.authorize_url.clone(),
            reason: e.to_string(),
        })
    }

    async fn refresh_with(
        &self,
        refresh_token: &str,
    ) -> Result<(TokenResponse, TokenState), ClientError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.options.client_id.as_str()),
            ("client_secret", self.options.client_secret.as_str()),
        ];
        let token = self.request_token(&form).await?;
        let state = self.persist_token(&token, Some(refresh_token)).await?;
        Ok((token, state))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ClientError> {
        let request = self.client.post(self.url(TOKEN_PATH)?).form(form);
        let body = execute(request).await?;
        serde_json::from_str(&body).map_err(|source| ClientError::Deserialize {
            context: format!("POST {TOKEN_PATH}"),
            source,
        })
    }

    /// Stores the token with an absolute expiry. When the response omits a
    /// refresh token, `previous_refresh` is kept.
    async fn persist_token(
        &self,
        token: &TokenResponse,
        previous_refresh: Option<&str>,
    ) -> Result<TokenState, ClientError> {
        let state = TokenState {
            access_token: Some(token.access_token.clone()),
            refresh_token: token
                .refresh_token
                .clone()
                .or_else(|| previous_refresh.map(str::to_owned)),
            expires_at: Some(now_ms() + token.expires_in.saturating_mul(1000)),
        };
        self.tokens.save_tokens(&state).await?;
        self.set_bearer(&token.access_token);
        Ok(state)
    }
}
