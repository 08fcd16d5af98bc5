//! OAuth command handlers. Tokens are read from and written to the store row.

use std::sync::Arc;

use tagplus_client::TagPlusClient;
use tagplus_core::AppConfig;
use tagplus_db::PgStoreRepository;

pub(crate) fn build_client(
    pool: &sqlx::PgPool,
    config: &AppConfig,
) -> anyhow::Result<TagPlusClient> {
    let tokens = Arc::new(PgStoreRepository::new(pool.clone()));
    Ok(TagPlusClient::new(
        config.plugin_options(),
        tokens,
        config.request_timeout_secs,
    )?)
}

pub(crate) async fn run_authorize(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    code: &str,
) -> anyhow::Result<()> {
    let client = build_client(pool, config)?;
    let token = client.authorize(code).await?;
    println!("authorized; access token expires in {}s", token.expires_in);
    Ok(())
}

pub(crate) async fn run_refresh(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let client = build_client(pool, config)?;
    match client.refresh_token().await? {
        Some(token) => println!("refreshed; access token expires in {}s", token.expires_in),
        None => println!("no refresh token stored; run `tagplus authorize <code>` first"),
    }
    Ok(())
}

pub(crate) async fn run_verify(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let client = build_client(pool, config)?;
    let authorization = client.verify_authorization().await?;
    if !authorization.is_authorized {
        println!("not authorized; open {}", client.authorize_url()?);
    }
    println!("{}", serde_json::to_string_pretty(&authorization)?);
    Ok(())
}
