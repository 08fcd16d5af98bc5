//! In-process implementations of the store traits, used for dry runs and
//! tests.
//!
//! A [`MemoryTransaction`] stages a copy of the catalog and publishes it on
//! commit. Transactions are not isolated from one another: the last commit
//! wins, so callers run them one at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tagplus_core::{
    metadata_vendor_id, BatchJob, BatchJobStatus, BatchJobStore, Catalog, CatalogTransaction,
    Collection, CollectionInput, CollectionStore, CollectionUpdate, NewBatchJob, Product,
    ProductInput, ProductOption, ProductStore, ProductUpdate, StoreError, StoreRecord,
    StoreRepository, StoreResult, TagPlusMetadata, TokenState, TokenStore, Tx, Variant,
    VariantInput, VariantStore, VariantUpdate,
};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A committed catalog write, in commit order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CatalogOperation {
    CreateCollection {
        id: Uuid,
        input: CollectionInput,
    },
    UpdateCollection {
        id: Uuid,
        update: CollectionUpdate,
    },
    CreateProduct {
        id: Uuid,
        input: ProductInput,
    },
    UpdateProduct {
        id: Uuid,
        update: ProductUpdate,
    },
    CreateVariant {
        id: Uuid,
        product_id: Uuid,
        input: VariantInput,
    },
    UpdateVariant {
        id: Uuid,
        update: VariantUpdate,
    },
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    collections: Vec<Collection>,
    products: Vec<Product>,
    operations: Vec<CatalogOperation>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn collections(&self) -> Vec<Collection> {
        lock(&self.state).collections.clone()
    }

    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        lock(&self.state).products.clone()
    }

    #[must_use]
    pub fn operations(&self) -> Vec<CatalogOperation> {
        lock(&self.state).operations.clone()
    }

    /// Seeds an existing collection without recording an operation.
    pub fn insert_collection(&self, collection: Collection) {
        lock(&self.state).collections.push(collection);
    }

    /// Seeds an existing product (with its variants) without recording an operation.
    pub fn insert_product(&self, product: Product) {
        lock(&self.state).products.push(product);
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn begin(&self) -> StoreResult<Box<Tx>> {
        Ok(Box::new(MemoryTransaction {
            staged: lock(&self.state).clone(),
            target: Arc::clone(&self.state),
            open: true,
        }))
    }
}

pub struct MemoryTransaction {
    staged: CatalogState,
    target: Arc<Mutex<CatalogState>>,
    open: bool,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::Conflict("transaction already closed".to_string()))
        }
    }

    fn product_mut(&mut self, id: Uuid) -> StoreResult<&mut Product> {
        self.staged
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found("product", id))
    }
}

#[async_trait]
impl CatalogTransaction for MemoryTransaction {
    async fn commit(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        self.open = false;
        *lock(&self.target) = std::mem::take(&mut self.staged);
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        self.open = false;
        self.staged = CatalogState::default();
        Ok(())
    }
}

#[async_trait]
impl CollectionStore for MemoryTransaction {
    async fn find_collection_by_handle(
        &mut self,
        handle: &str,
    ) -> StoreResult<Option<Collection>> {
        Ok(self
            .staged
            .collections
            .iter()
            .find(|c| c.handle == handle)
            .cloned())
    }

    async fn find_collection_by_vendor_id(
        &mut self,
        vendor_id: i64,
    ) -> StoreResult<Option<Collection>> {
        Ok(self
            .staged
            .collections
            .iter()
            .find(|c| metadata_vendor_id(&c.metadata) == Some(vendor_id))
            .cloned())
    }

    async fn create_collection(&mut self, input: &CollectionInput) -> StoreResult<Collection> {
        self.ensure_open()?;
        let now = Utc::now();
        let collection = Collection {
            id: Uuid::new_v4(),
            title: input.title.clone(),
            handle: input.handle.clone(),
            metadata: input.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        self.staged.collections.push(collection.clone());
        self.staged
            .operations
            .push(CatalogOperation::CreateCollection {
                id: collection.id,
                input: input.clone(),
            });
        Ok(collection)
    }

    async fn update_collection(
        &mut self,
        id: Uuid,
        update: &CollectionUpdate,
    ) -> StoreResult<Collection> {
        self.ensure_open()?;
        let collection = self
            .staged
            .collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("collection", id))?;
        collection.apply(update);
        collection.updated_at = Utc::now();
        let updated = collection.clone();
        self.staged
            .operations
            .push(CatalogOperation::UpdateCollection {
                id,
                update: update.clone(),
            });
        Ok(updated)
    }
}

#[async_trait]
impl ProductStore for MemoryTransaction {
    async fn find_product_by_external_id(
        &mut self,
        external_id: &str,
    ) -> StoreResult<Option<Product>> {
        Ok(self
            .staged
            .products
            .iter()
            .find(|p| p.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn retrieve_product(&mut self, id: Uuid) -> StoreResult<Product> {
        self.product_mut(id).map(|p| p.clone())
    }

    async fn create_product(&mut self, input: &ProductInput) -> StoreResult<Product> {
        self.ensure_open()?;
        let product = Product {
            id: Uuid::new_v4(),
            title: input.title.clone(),
            subtitle: input.subtitle.clone(),
            description: input.description.clone(),
            handle: input.handle.clone(),
            is_giftcard: input.is_giftcard,
            discountable: input.discountable,
            weight: input.weight,
            height: input.height,
            length: input.length,
            width: input.width,
            status: input.status,
            external_id: input.external_id.clone(),
            collection_id: input.collection_id,
            profile_id: input.profile_id,
            metadata: input.metadata.clone(),
            images: input.images.clone(),
            options: input
                .options
                .iter()
                .map(|option| ProductOption {
                    id: Uuid::new_v4(),
                    title: option.title.clone(),
                    values: option.values.iter().map(|v| v.value.clone()).collect(),
                    metadata: option.metadata.clone(),
                })
                .collect(),
            variants: Vec::new(),
        };
        self.staged.products.push(product.clone());
        self.staged.operations.push(CatalogOperation::CreateProduct {
            id: product.id,
            input: input.clone(),
        });
        Ok(product)
    }

    async fn update_product(&mut self, id: Uuid, update: &ProductUpdate) -> StoreResult<()> {
        self.ensure_open()?;
        self.product_mut(id)?.apply(update);
        self.staged.operations.push(CatalogOperation::UpdateProduct {
            id,
            update: update.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl VariantStore for MemoryTransaction {
    async fn find_variant_by_sku(&mut self, sku: &str) -> StoreResult<Option<Variant>> {
        Ok(self
            .staged
            .products
            .iter()
            .flat_map(|p| p.variants.iter())
            .find(|v| v.sku.as_deref() == Some(sku))
            .cloned())
    }

    async fn create_variant(
        &mut self,
        product_id: Uuid,
        input: &VariantInput,
    ) -> StoreResult<Variant> {
        self.ensure_open()?;
        if let Some(sku) = &input.sku {
            let taken = self
                .staged
                .products
                .iter()
                .flat_map(|p| p.variants.iter())
                .any(|v| v.sku.as_ref() == Some(sku));
            if taken {
                return Err(StoreError::Conflict(format!("SKU {sku} already exists")));
            }
        }
        let variant = Variant {
            id: Uuid::new_v4(),
            product_id,
            title: input.title.clone(),
            sku: input.sku.clone(),
            barcode: input.barcode.clone(),
            ean: input.ean.clone(),
            upc: input.upc.clone(),
            prices: input.prices.clone(),
            inventory_quantity: input.inventory_quantity,
            allow_backorder: input.allow_backorder,
            manage_inventory: input.manage_inventory,
            weight: input.weight,
            options: input.options.clone(),
            metadata: input.metadata.clone(),
        };
        self.product_mut(product_id)?.variants.push(variant.clone());
        self.staged.operations.push(CatalogOperation::CreateVariant {
            id: variant.id,
            product_id,
            input: input.clone(),
        });
        Ok(variant)
    }

    async fn update_variant(&mut self, id: Uuid, update: &VariantUpdate) -> StoreResult<()> {
        self.ensure_open()?;
        let variant = self
            .staged
            .products
            .iter_mut()
            .flat_map(|p| p.variants.iter_mut())
            .find(|v| v.id == id)
            .ok_or_else(|| StoreError::not_found("variant", id))?;
        variant.apply(update);
        self.staged.operations.push(CatalogOperation::UpdateVariant {
            id,
            update: update.clone(),
        });
        Ok(())
    }
}

/// Store settings and token state held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    store: Mutex<Option<StoreRecord>>,
    shipping_profile: Option<Uuid>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(store: Option<StoreRecord>) -> Self {
        Self {
            store: Mutex::new(store),
            shipping_profile: None,
        }
    }

    #[must_use]
    pub fn with_shipping_profile(mut self, profile_id: Option<Uuid>) -> Self {
        self.shipping_profile = profile_id;
        self
    }

    #[must_use]
    pub fn store(&self) -> Option<StoreRecord> {
        lock(&self.store).clone()
    }

    fn merge(&self, patch: &serde_json::Value) -> StoreResult<()> {
        let mut guard = lock(&self.store);
        let store = guard
            .as_mut()
            .ok_or_else(|| StoreError::not_found("store", "default"))?;
        TagPlusMetadata::merge_into(&mut store.metadata, patch);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn load_tokens(&self) -> StoreResult<Option<TokenState>> {
        Ok(lock(&self.store).as_ref().map(|s| s.tagplus().tokens))
    }

    async fn save_tokens(&self, tokens: &TokenState) -> StoreResult<()> {
        let patch = serde_json::to_value(tokens).map_err(|e| StoreError::Backend(Box::new(e)))?;
        self.merge(&patch)
    }
}

#[async_trait]
impl StoreRepository for MemoryStore {
    async fn retrieve_store(&self) -> StoreResult<Option<StoreRecord>> {
        Ok(self.store())
    }

    async fn default_shipping_profile(&self) -> StoreResult<Option<Uuid>> {
        Ok(self.shipping_profile)
    }

    async fn save_watermark(&self, at: DateTime<Utc>) -> StoreResult<()> {
        self.merge(&json!({ "buildTime": at }))
    }
}

/// Batch jobs held in memory. Every result write is kept for inspection.
#[derive(Debug, Default)]
pub struct MemoryBatchJobs {
    jobs: Mutex<HashMap<Uuid, BatchJob>>,
    results: Mutex<Vec<(Uuid, serde_json::Value)>>,
}

impl MemoryBatchJobs {
    #[must_use]
    pub fn job(&self, id: Uuid) -> Option<BatchJob> {
        lock(&self.jobs).get(&id).cloned()
    }

    /// Result payloads written for `id`, oldest first.
    #[must_use]
    pub fn result_history(&self, id: Uuid) -> Vec<serde_json::Value> {
        lock(&self.results)
            .iter()
            .filter(|(job_id, _)| *job_id == id)
            .map(|(_, result)| result.clone())
            .collect()
    }

    fn with_job<T>(&self, id: Uuid, f: impl FnOnce(&mut BatchJob) -> T) -> StoreResult<T> {
        let mut jobs = lock(&self.jobs);
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("batch job", id))?;
        let value = f(job);
        job.updated_at = Utc::now();
        Ok(value)
    }
}

#[async_trait]
impl BatchJobStore for MemoryBatchJobs {
    async fn create_job(&self, job: &NewBatchJob) -> StoreResult<BatchJob> {
        let now = Utc::now();
        let created = BatchJob {
            id: Uuid::new_v4(),
            job_type: job.job_type.clone(),
            status: BatchJobStatus::Created,
            context: job.context.clone(),
            result: json!({}),
            created_by: job.created_by.clone(),
            dry_run: job.dry_run,
            attempts: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        lock(&self.jobs).insert(created.id, created.clone());
        Ok(created)
    }

    async fn retrieve_job(&self, id: Uuid) -> StoreResult<Option<BatchJob>> {
        Ok(self.job(id))
    }

    async fn set_job_status(
        &self,
        id: Uuid,
        status: BatchJobStatus,
        error_message: Option<&str>,
    ) -> StoreResult<()> {
        self.with_job(id, |job| {
            job.status = status;
            job.error_message = error_message.map(str::to_owned);
        })
    }

    async fn update_job_result(&self, id: Uuid, result: &serde_json::Value) -> StoreResult<()> {
        self.with_job(id, |job| job.result = result.clone())?;
        lock(&self.results).push((id, result.clone()));
        Ok(())
    }

    async fn record_job_attempt(&self, id: Uuid) -> StoreResult<i32> {
        self.with_job(id, |job| {
            job.attempts += 1;
            job.attempts
        })
    }

    async fn list_unfinished_jobs(&self, job_type: &str) -> StoreResult<Vec<BatchJob>> {
        let mut unfinished: Vec<BatchJob> = lock(&self.jobs)
            .values()
            .filter(|job| job.job_type == job_type && !job.status.is_terminal())
            .cloned()
            .collect();
        unfinished.sort_by_key(|job| (job.created_at, job.id));
        Ok(unfinished)
    }
}
