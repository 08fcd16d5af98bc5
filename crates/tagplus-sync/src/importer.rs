//! One TagPlus → store import pass.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tagplus_client::VendorProduct;
use tagplus_core::{BatchJobStore, Catalog, StoreRepository};
use uuid::Uuid;

use crate::category::CategoryMapper;
use crate::context::ImportContext;
use crate::error::SyncError;
use crate::outcome::{ImportSummary, RecordKind, RecordOutcome};
use crate::product::ProductMapper;
use crate::transaction::atomic;
use crate::vendor::VendorCatalog;

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Pulls categories and products from TagPlus and writes them to the store
/// catalog, one transaction per record.
pub struct CatalogImporter {
    vendor: Arc<dyn VendorCatalog>,
    store: Arc<dyn StoreRepository>,
    catalog: Arc<dyn Catalog>,
    jobs: Arc<dyn BatchJobStore>,
    page_size: u32,
    categories: CategoryMapper,
    products: ProductMapper,
}

impl CatalogImporter {
    #[must_use]
    pub fn new(
        vendor: Arc<dyn VendorCatalog>,
        store: Arc<dyn StoreRepository>,
        catalog: Arc<dyn Catalog>,
        jobs: Arc<dyn BatchJobStore>,
    ) -> Self {
        Self {
            vendor,
            store,
            catalog,
            jobs,
            page_size: DEFAULT_PAGE_SIZE,
            categories: CategoryMapper,
            products: ProductMapper,
        }
    }

    /// Overrides the product page size. Zero is treated as one.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Resets the job's progress.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the job result cannot be written.
    pub async fn pre_process_batch_job(&self, job_id: Uuid) -> Result<(), SyncError> {
        self.jobs
            .update_job_result(job_id, &json!({ "progress": 0 }))
            .await?;
        Ok(())
    }

    /// Runs a full import pass.
    ///
    /// Failures of individual records are collected in the summary. The pass
    /// itself fails only when the category list or a product page cannot be
    /// fetched, or when the store cannot be read or written.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Vendor`] or [`SyncError::Store`] as above.
    pub async fn process_job(&self, job_id: Uuid) -> Result<ImportSummary, SyncError> {
        let Some(store) = self.store.retrieve_store().await? else {
            tracing::info!(%job_id, "Skipping TagPlus import since no store is created");
            return Ok(ImportSummary::skipped());
        };

        let previous_watermark = store.tagplus().build_time;
        tracing::info!(
            %job_id,
            store_id = %store.id,
            previous_watermark = ?previous_watermark,
            "starting TagPlus import"
        );
        let ctx = Arc::new(ImportContext::load(&store, self.store.as_ref()).await?);

        let mut summary = ImportSummary {
            previous_watermark,
            ..ImportSummary::default()
        };
        self.import_categories(job_id, &mut summary).await?;
        self.import_products(job_id, &ctx, &mut summary).await?;

        let watermark = Utc::now();
        self.store.save_watermark(watermark).await?;
        summary.watermark = Some(watermark);

        tracing::info!(
            %job_id,
            categories = summary.categories.total(),
            products = summary.products.total(),
            pages = summary.pages,
            failed = summary.failures.len(),
            "TagPlus import finished"
        );
        Ok(summary)
    }

    #[must_use]
    pub fn should_retry_on_processing_error(&self, _error: &SyncError) -> bool {
        true
    }

    async fn import_categories(
        &self,
        job_id: Uuid,
        summary: &mut ImportSummary,
    ) -> Result<(), SyncError> {
        let listed = self.vendor.list_categories().await?;
        tracing::info!(%job_id, count = listed.len(), "importing TagPlus categories");

        for listed_category in listed {
            let vendor_id = listed_category.id;
            let result = match self.vendor.category(vendor_id).await {
                Ok(category) => {
                    let mapper = self.categories;
                    atomic(self.catalog.as_ref(), move |tx| {
                        Box::pin(async move { mapper.create(tx, &category).await })
                    })
                    .await
                }
                Err(error) => Err(error.into()),
            };
            summary.record(RecordOutcome::from_result(RecordKind::Category, vendor_id, result));
        }
        Ok(())
    }

    async fn import_products(
        &self,
        job_id: Uuid,
        ctx: &Arc<ImportContext>,
        summary: &mut ImportSummary,
    ) -> Result<(), SyncError> {
        let mut page = 1;
        let mut processed: u64 = 0;

        loop {
            let products = self.vendor.products_page(page, self.page_size).await?;
            let fetched = products.len();
            tracing::debug!(%job_id, page, count = fetched, "fetched TagPlus product page");

            for raw in products {
                let vendor_id = raw_vendor_id(&raw);
                let result = match serde_json::from_value::<VendorProduct>(raw) {
                    Ok(product) => {
                        let mapper = self.products;
                        let ctx = Arc::clone(ctx);
                        atomic(self.catalog.as_ref(), move |tx| {
                            Box::pin(async move { mapper.create(tx, &ctx, &product).await })
                        })
                        .await
                    }
                    Err(error) => {
                        tracing::warn!(
                            %job_id,
                            vendor_id,
                            error = %error,
                            "skipping malformed TagPlus product"
                        );
                        Err(SyncError::Mapping {
                            vendor_id,
                            reason: format!("invalid product payload: {error}"),
                        })
                    }
                };
                summary.record(RecordOutcome::from_result(RecordKind::Product, vendor_id, result));
            }

            summary.pages = page;
            processed += fetched as u64;
            let progress = json!({ "progress": processed, "page": page });
            if let Err(error) = self.jobs.update_job_result(job_id, &progress).await {
                tracing::warn!(%job_id, page, error = %error, "failed to record import progress");
            }

            if fetched < self.page_size as usize {
                break;
            }
            page += 1;
        }
        Ok(())
    }
}

/// Best-effort `id` of an undecoded product, zero when absent.
fn raw_vendor_id(raw: &Value) -> i64 {
    match raw.get("id") {
        Some(Value::Number(id)) => id.as_i64().unwrap_or_default(),
        Some(Value::String(id)) => id.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}
