use std::net::SocketAddr;

use crate::options::PluginOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub api_url: String,
    pub api_version: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: String,
    pub authorize_url: String,
    pub request_timeout_secs: u64,
    pub import_page_size: u32,
    pub job_max_attempts: u32,
    pub sync_cron: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    /// The subset of configuration handed to the vendor client and embedded
    /// in import job context.
    #[must_use]
    pub fn plugin_options(&self) -> PluginOptions {
        PluginOptions {
            api_url: self.api_url.clone(),
            api_version: self.api_version.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scopes: self.scopes.clone(),
            authorize_url: self.authorize_url.clone(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("scopes", &self.scopes)
            .field("authorize_url", &self.authorize_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("import_page_size", &self.import_page_size)
            .field("job_max_attempts", &self.job_max_attempts)
            .field("sync_cron", &self.sync_cron)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
