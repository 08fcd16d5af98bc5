//! Store settings and the `metadata.tagplus` namespace on the `stores` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;
use tagplus_core::{
    Metadata, StoreError, StoreRecord, StoreRepository, StoreResult, TokenState, TokenStore,
};
use uuid::Uuid;

use crate::store_error;

/// A row from the `stores` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreRow {
    pub id: Uuid,
    pub name: String,
    pub default_currency_code: Option<String>,
    pub currency_codes: Vec<String>,
    pub metadata: Json<Metadata>,
}

impl From<StoreRow> for StoreRecord {
    fn from(row: StoreRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            default_currency_code: row.default_currency_code,
            currency_codes: row.currency_codes,
            metadata: row.metadata.0,
        }
    }
}

/// Postgres-backed [`StoreRepository`] and [`TokenStore`]. The oldest row in
/// `stores` is the store.
#[derive(Debug, Clone)]
pub struct PgStoreRepository {
    pool: PgPool,
}

impl PgStoreRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Shallow-merges `patch` into `metadata.tagplus` of the store row.
    async fn merge_tagplus(&self, patch: serde_json::Value) -> StoreResult<()> {
        let keys = patch_keys(&patch);
        tracing::debug!(?keys, "merging tagplus store metadata");

        let result = sqlx::query(
            "UPDATE stores \
             SET metadata = jsonb_set( \
                     metadata, '{tagplus}', \
                     COALESCE(metadata -> 'tagplus', '{}'::jsonb) || $1::jsonb), \
                 updated_at = NOW() \
             WHERE id = (SELECT id FROM stores ORDER BY created_at, id LIMIT 1)",
        )
        .bind(Json(&patch))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            tracing::warn!(?keys, "no store row to hold tagplus metadata");
            return Err(StoreError::not_found("store", "default"));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreRepository for PgStoreRepository {
    async fn retrieve_store(&self) -> StoreResult<Option<StoreRecord>> {
        let row = sqlx::query_as::<_, StoreRow>(
            "SELECT id, name, default_currency_code, currency_codes, metadata \
             FROM stores \
             ORDER BY created_at, id \
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(StoreRecord::from))
    }

    async fn default_shipping_profile(&self) -> StoreResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM shipping_profiles \
             WHERE profile_type = 'default' \
             ORDER BY created_at, id \
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)
    }

    async fn save_watermark(&self, at: DateTime<Utc>) -> StoreResult<()> {
        self.merge_tagplus(json!({ "buildTime": at })).await
    }
}

#[async_trait]
impl TokenStore for PgStoreRepository {
    async fn load_tokens(&self) -> StoreResult<Option<TokenState>> {
        Ok(self
            .retrieve_store()
            .await?
            .map(|store| store.tagplus().tokens))
    }

    async fn save_tokens(&self, tokens: &TokenState) -> StoreResult<()> {
        let patch = serde_json::to_value(tokens).map_err(|e| StoreError::Backend(Box::new(e)))?;
        self.merge_tagplus(patch).await
    }
}

/// Top-level keys of a metadata patch. Logged instead of the patch, whose
/// values include OAuth tokens.
fn patch_keys(patch: &serde_json::Value) -> Vec<&str> {
    patch
        .as_object()
        .map(|fields| fields.keys().map(String::as_str).collect())
        .unwrap_or_default()
}
