use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tagplus_client::{ClientError, VendorCategory};
use tagplus_core::{
    BatchJobStatus, BatchJobStore, Metadata, NewBatchJob, StoreRecord, IMPORT_JOB_TYPE,
};
use tagplus_sync::{
    BatchJobRunner, CatalogImporter, MemoryBatchJobs, MemoryCatalog, MemoryStore, RecordOutcome,
    VendorCatalog,
};
use uuid::Uuid;

#[derive(Default)]
struct FakeVendor {
    categories: Vec<i64>,
    page_sizes: Vec<usize>,
    missing_category: Option<i64>,
    failing_page: Option<u32>,
    /// Products sent with an empty list where `categoria` should be an object.
    malformed: Vec<i64>,
    /// How many times `failing_page` fails before it succeeds.
    page_failures: Mutex<u32>,
    calls: Mutex<Vec<String>>,
}

impl FakeVendor {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn category_json(id: i64) -> VendorCategory {
        serde_json::from_value(json!({ "id": id, "descricao": format!("Categoria {id}") })).unwrap()
    }
}

#[async_trait]
impl VendorCatalog for FakeVendor {
    async fn list_categories(&self) -> Result<Vec<VendorCategory>, ClientError> {
        self.calls.lock().unwrap().push("categories".to_string());
        Ok(self.categories.iter().map(|id| Self::category_json(*id)).collect())
    }

    async fn category(&self, id: i64) -> Result<VendorCategory, ClientError> {
        self.calls.lock().unwrap().push(format!("category:{id}"));
        if self.missing_category == Some(id) {
            return Err(ClientError::UnexpectedState("Categoria não encontrada".to_string()));
        }
        Ok(Self::category_json(id))
    }

    async fn products_page(
        &self,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<Value>, ClientError> {
        self.calls.lock().unwrap().push(format!("products:{page}"));
        if self.failing_page == Some(page) {
            let mut remaining = self.page_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClientError::UnexpectedState(
                    "request failed with status code 503".to_string(),
                ));
            }
        }
        let size = self
            .page_sizes
            .get(page as usize - 1)
            .copied()
            .unwrap_or(0);
        Ok((0..size)
            .map(|i| {
                let id = i64::from(page) * 1000 + i as i64;
                let mut product = json!({
                    "id": id,
                    "ativo": 1,
                    "codigo": format!("SKU-{id}"),
                    "descricao": format!("Produto {id}"),
                    "valor_venda_varejo": 10.5
                });
                if self.malformed.contains(&id) {
                    product["categoria"] = json!([]);
                }
                product
            })
            .collect())
    }
}

fn store_record() -> StoreRecord {
    StoreRecord {
        id: Uuid::new_v4(),
        name: "Loja".to_string(),
        default_currency_code: Some("brl".to_string()),
        currency_codes: vec!["brl".to_string()],
        metadata: Metadata::new(),
    }
}

struct Harness {
    vendor: Arc<FakeVendor>,
    store: Arc<MemoryStore>,
    catalog: MemoryCatalog,
    jobs: Arc<MemoryBatchJobs>,
    importer: Arc<CatalogImporter>,
}

fn harness(vendor: FakeVendor, store: Option<StoreRecord>) -> Harness {
    let vendor = Arc::new(vendor);
    let store = Arc::new(MemoryStore::new(store));
    let catalog = MemoryCatalog::default();
    let jobs = Arc::new(MemoryBatchJobs::default());
    let importer = Arc::new(CatalogImporter::new(
        vendor.clone(),
        store.clone(),
        Arc::new(catalog.clone()),
        jobs.clone(),
    ));
    Harness {
        vendor,
        store,
        catalog,
        jobs,
        importer,
    }
}

async fn new_job(jobs: &MemoryBatchJobs) -> Uuid {
    jobs.create_job(&NewBatchJob {
        job_type: IMPORT_JOB_TYPE.to_string(),
        context: json!({}),
        created_by: "admin".to_string(),
        dry_run: false,
    })
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn pagination_stops_after_a_short_page() {
    let h = harness(
        FakeVendor {
            page_sizes: vec![100, 37],
            ..FakeVendor::default()
        },
        Some(store_record()),
    );
    let job_id = new_job(&h.jobs).await;

    let summary = h.importer.process_job(job_id).await.unwrap();

    let pages: Vec<String> = h
        .vendor
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("products:"))
        .collect();
    assert_eq!(pages, vec!["products:1", "products:2"]);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.products.created, 137);
    assert_eq!(h.catalog.products().len(), 137);
    assert_eq!(
        h.jobs.result_history(job_id).last().unwrap()["progress"],
        json!(137)
    );
}

#[tokio::test]
async fn categories_are_imported_before_products() {
    let h = harness(
        FakeVendor {
            categories: vec![7, 8],
            page_sizes: vec![1],
            ..FakeVendor::default()
        },
        Some(store_record()),
    );
    let job_id = new_job(&h.jobs).await;

    let summary = h.importer.process_job(job_id).await.unwrap();

    assert_eq!(
        h.vendor.calls(),
        vec!["categories", "category:7", "category:8", "products:1"]
    );
    assert_eq!(summary.categories.created, 2);
    assert_eq!(h.catalog.collections().len(), 2);
}

#[tokio::test]
async fn missing_store_skips_the_pass() {
    let h = harness(
        FakeVendor {
            categories: vec![7],
            page_sizes: vec![3],
            ..FakeVendor::default()
        },
        None,
    );
    let job_id = new_job(&h.jobs).await;

    let summary = h.importer.process_job(job_id).await.unwrap();

    assert!(summary.skipped);
    assert!(h.vendor.calls().is_empty());
    assert!(h.catalog.operations().is_empty());
}

#[tokio::test]
async fn record_failures_are_collected_and_the_watermark_is_saved() {
    let h = harness(
        FakeVendor {
            categories: vec![7, 8],
            missing_category: Some(8),
            ..FakeVendor::default()
        },
        Some(store_record()),
    );
    let job_id = new_job(&h.jobs).await;

    let summary = h.importer.process_job(job_id).await.unwrap();

    assert_eq!(summary.categories.created, 1);
    assert_eq!(summary.categories.failed, 1);
    assert!(matches!(
        &summary.failures[0],
        RecordOutcome::Failed { vendor_id: 8, reason, .. }
            if reason.contains("Categoria não encontrada")
    ));
    let saved = h.store.store().unwrap().tagplus().build_time;
    assert!(saved.is_some());
    assert_eq!(saved, summary.watermark);
}

#[tokio::test]
async fn malformed_product_fails_alone_and_paging_continues() {
    let h = harness(
        FakeVendor {
            page_sizes: vec![100, 37],
            malformed: vec![1005],
            ..FakeVendor::default()
        },
        Some(store_record()),
    );
    let job_id = new_job(&h.jobs).await;

    let summary = h.importer.process_job(job_id).await.unwrap();

    let pages: Vec<String> = h
        .vendor
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("products:"))
        .collect();
    assert_eq!(pages, vec!["products:1", "products:2"]);
    assert_eq!(summary.products.created, 136);
    assert_eq!(summary.products.failed, 1);
    assert!(matches!(
        &summary.failures[0],
        RecordOutcome::Failed { vendor_id: 1005, reason, .. }
            if reason.contains("invalid product payload")
    ));
    assert_eq!(h.catalog.products().len(), 136);
    assert!(h.store.store().unwrap().tagplus().build_time.is_some());
}

#[tokio::test]
async fn product_page_failure_fails_the_pass() {
    let h = harness(
        FakeVendor {
            page_sizes: vec![100, 100],
            failing_page: Some(2),
            page_failures: Mutex::new(u32::MAX),
            ..FakeVendor::default()
        },
        Some(store_record()),
    );
    let job_id = new_job(&h.jobs).await;

    let result = h.importer.process_job(job_id).await;

    assert!(result.is_err());
    assert!(h.store.store().unwrap().tagplus().build_time.is_none());
}

#[tokio::test]
async fn pre_process_resets_progress() {
    let h = harness(FakeVendor::default(), Some(store_record()));
    let job_id = new_job(&h.jobs).await;

    h.importer.pre_process_batch_job(job_id).await.unwrap();

    assert_eq!(h.jobs.job(job_id).unwrap().result, json!({ "progress": 0 }));
}

#[tokio::test]
async fn runner_fails_the_job_once_attempts_are_exhausted() {
    let h = harness(
        FakeVendor {
            page_sizes: vec![1],
            failing_page: Some(1),
            page_failures: Mutex::new(u32::MAX),
            ..FakeVendor::default()
        },
        Some(store_record()),
    );
    let job_id = new_job(&h.jobs).await;
    let runner = BatchJobRunner::new(h.importer.clone(), h.jobs.clone(), 3);

    let status = runner.run(job_id).await.unwrap();

    assert_eq!(status, BatchJobStatus::Failed);
    let job = h.jobs.job(job_id).unwrap();
    assert_eq!(job.status, BatchJobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert!(job.error_message.unwrap().contains("503"));
}

#[tokio::test]
async fn runner_retries_a_transient_failure_and_completes() {
    let h = harness(
        FakeVendor {
            page_sizes: vec![2],
            failing_page: Some(1),
            page_failures: Mutex::new(1),
            ..FakeVendor::default()
        },
        Some(store_record()),
    );
    let job_id = new_job(&h.jobs).await;
    let runner = BatchJobRunner::new(h.importer.clone(), h.jobs.clone(), 3);

    let status = runner.run(job_id).await.unwrap();

    assert_eq!(status, BatchJobStatus::Completed);
    let job = h.jobs.job(job_id).unwrap();
    assert_eq!(job.attempts, 2);
    assert_eq!(job.result["products"]["created"], json!(2));
    assert!(job.error_message.is_none());

    assert_eq!(runner.run(job_id).await.unwrap(), BatchJobStatus::Completed);
    assert_eq!(h.jobs.job(job_id).unwrap().attempts, 2);
}

#[tokio::test]
async fn runner_rejects_foreign_job_types() {
    let h = harness(FakeVendor::default(), Some(store_record()));
    let job = h
        .jobs
        .create_job(&NewBatchJob {
            job_type: "export-orders".to_string(),
            context: json!({}),
            created_by: "admin".to_string(),
            dry_run: false,
        })
        .await
        .unwrap();
    let runner = BatchJobRunner::new(h.importer.clone(), h.jobs.clone(), 3);

    assert!(runner.run(job.id).await.is_err());
    assert_eq!(h.jobs.job(job.id).unwrap().attempts, 0);
}
