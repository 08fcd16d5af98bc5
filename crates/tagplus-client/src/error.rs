use tagplus_core::StoreError;
use thiserror::Error;

/// Fallback message when neither the vendor nor the transport says anything useful.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred while sending the request.";

#[derive(Debug, Error)]
pub enum ClientError {
    /// Any transport failure or non-2xx response from TagPlus.
    #[error("unexpected state: {0}")]
    UnexpectedState(String),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("token store error: {0}")]
    Store(#[from] StoreError),
}
