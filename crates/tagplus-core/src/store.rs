//! Persistence seams. Each consumer depends on the narrowest trait that
//! covers the operations it performs.
//!
//! Catalog traits take `&mut self` so that an implementation can be backed by
//! a single open database transaction. Obtain one through [`Catalog::begin`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{
    Collection, CollectionInput, CollectionUpdate, Product, ProductInput, ProductUpdate, Variant,
    VariantInput, VariantUpdate,
};
use crate::jobs::{BatchJob, BatchJobStatus, NewBatchJob};
use crate::metadata::{StoreRecord, TokenState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read/write access to the persisted OAuth token triple.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when no store has been provisioned yet.
    async fn load_tokens(&self) -> StoreResult<Option<TokenState>>;

    async fn save_tokens(&self, tokens: &TokenState) -> StoreResult<()>;
}

/// Store-level settings the importer reads once per pass.
#[async_trait]
pub trait StoreRepository: Send + Sync {
    async fn retrieve_store(&self) -> StoreResult<Option<StoreRecord>>;

    async fn default_shipping_profile(&self) -> StoreResult<Option<Uuid>>;

    async fn save_watermark(&self, at: DateTime<Utc>) -> StoreResult<()>;
}

#[async_trait]
pub trait CollectionStore: Send {
    async fn find_collection_by_handle(&mut self, handle: &str)
        -> StoreResult<Option<Collection>>;

    /// Match on `metadata.tagplus_id`, falling back to the legacy
    /// `metadata.prestashop_id` key.
    async fn find_collection_by_vendor_id(
        &mut self,
        vendor_id: i64,
    ) -> StoreResult<Option<Collection>>;

    async fn create_collection(&mut self, input: &CollectionInput) -> StoreResult<Collection>;

    async fn update_collection(
        &mut self,
        id: Uuid,
        update: &CollectionUpdate,
    ) -> StoreResult<Collection>;
}

#[async_trait]
pub trait ProductStore: Send {
    /// Returns the product with its options and variants loaded.
    async fn find_product_by_external_id(
        &mut self,
        external_id: &str,
    ) -> StoreResult<Option<Product>>;

    async fn retrieve_product(&mut self, id: Uuid) -> StoreResult<Product>;

    async fn create_product(&mut self, input: &ProductInput) -> StoreResult<Product>;

    async fn update_product(&mut self, id: Uuid, update: &ProductUpdate) -> StoreResult<()>;
}

#[async_trait]
pub trait VariantStore: Send {
    async fn find_variant_by_sku(&mut self, sku: &str) -> StoreResult<Option<Variant>>;

    async fn create_variant(
        &mut self,
        product_id: Uuid,
        input: &VariantInput,
    ) -> StoreResult<Variant>;

    async fn update_variant(&mut self, id: Uuid, update: &VariantUpdate) -> StoreResult<()>;
}

/// A unit of catalog writes. Dropping it without calling `commit` discards
/// everything written through it.
#[async_trait]
pub trait CatalogTransaction: CollectionStore + ProductStore + VariantStore {
    async fn commit(&mut self) -> StoreResult<()>;

    async fn rollback(&mut self) -> StoreResult<()>;
}

pub type Tx = dyn CatalogTransaction;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<Tx>>;
}

#[async_trait]
pub trait BatchJobStore: Send + Sync {
    async fn create_job(&self, job: &NewBatchJob) -> StoreResult<BatchJob>;

    async fn retrieve_job(&self, id: Uuid) -> StoreResult<Option<BatchJob>>;

    async fn set_job_status(
        &self,
        id: Uuid,
        status: BatchJobStatus,
        error_message: Option<&str>,
    ) -> StoreResult<()>;

    async fn update_job_result(&self, id: Uuid, result: &serde_json::Value) -> StoreResult<()>;

    /// Bumps the attempt counter and returns the new value.
    async fn record_job_attempt(&self, id: Uuid) -> StoreResult<i32>;

    /// Jobs of `job_type` that are not completed or failed, oldest first.
    async fn list_unfinished_jobs(&self, job_type: &str) -> StoreResult<Vec<BatchJob>>;
}
