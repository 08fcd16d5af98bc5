use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let positive_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let value = parse_u32(var, default)?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;
    let client_id = require("TAGPLUS_CLIENT_ID")?;
    let client_secret = require("TAGPLUS_CLIENT_SECRET")?;

    let env = parse_environment(&or_default("TAGPLUS_ENV", "development"));

    let bind_addr = parse_addr("TAGPLUS_BIND_ADDR", "0.0.0.0:9000")?;
    let log_level = or_default("TAGPLUS_LOG_LEVEL", "info");

    let api_url = or_default("TAGPLUS_API_URL", "https://api.tagplus.com.br")
        .trim_end_matches('/')
        .to_string();
    let api_version = or_default("TAGPLUS_API_VERSION", "2.0");
    let scopes = or_default("TAGPLUS_SCOPES", "read:produtos read:categorias");
    let authorize_url = or_default(
        "TAGPLUS_AUTHORIZE_URL",
        "https://developers.tagplus.com.br/authorize",
    );

    let request_timeout_secs = parse_u64("TAGPLUS_REQUEST_TIMEOUT_SECS", "30")?;
    let import_page_size = positive_u32("TAGPLUS_IMPORT_PAGE_SIZE", "100")?;
    let job_max_attempts = positive_u32("TAGPLUS_JOB_MAX_ATTEMPTS", "3")?;
    let sync_cron = lookup("TAGPLUS_SYNC_CRON")
        .ok()
        .filter(|expr| !expr.trim().is_empty());

    let db_max_connections = parse_u32("TAGPLUS_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("TAGPLUS_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("TAGPLUS_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        api_url,
        api_version,
        client_id,
        client_secret,
        scopes,
        authorize_url,
        request_timeout_secs,
        import_page_size,
        job_max_attempts,
        sync_cron,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
