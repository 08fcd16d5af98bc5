use serde::{Serialize, Serializer};

/// Connection settings for the TagPlus API.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginOptions {
    pub api_url: String,
    pub api_version: String,
    pub client_id: String,
    #[serde(serialize_with = "redact")]
    pub client_secret: String,
    pub scopes: String,
    pub authorize_url: String,
}

fn redact<S: Serializer>(_value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("[redacted]")
}

impl std::fmt::Debug for PluginOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginOptions")
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("scopes", &self.scopes)
            .field("authorize_url", &self.authorize_url)
            .finish()
    }
}
