//! Foreground import runs.

use std::sync::Arc;

use serde_json::json;
use tagplus_core::{AppConfig, BatchJobStore, NewBatchJob, StoreRepository, IMPORT_JOB_TYPE};
use tagplus_db::{CatalogSnapshot, PgBatchJobStore, PgCatalog, PgStoreRepository};
use tagplus_sync::{BatchJobRunner, CatalogImporter, MemoryBatchJobs, MemoryCatalog, MemoryStore};

use crate::auth::build_client;

/// Runs an import pass.
///
/// Without `dry_run` the pass is recorded as a batch job and driven by the
/// job runner, retries included. With `dry_run` the store settings and the
/// current catalog are copied into memory, the pass writes to that copy, and
/// the summary plus every catalog write are printed. Token refreshes still
/// persist.
///
/// # Errors
///
/// Returns an error if the store or catalog cannot be read, the job cannot be
/// recorded, or a dry-run pass fails.
pub(crate) async fn run_sync(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    dry_run: bool,
) -> anyhow::Result<()> {
    let client = Arc::new(build_client(pool, config)?);
    let store = Arc::new(PgStoreRepository::new(pool.clone()));
    let catalog = PgCatalog::new(pool.clone());

    if dry_run {
        return run_dry(client, store.as_ref(), &catalog, config).await;
    }

    let jobs: Arc<dyn BatchJobStore> = Arc::new(PgBatchJobStore::new(pool.clone()));
    let job = client.sync_products(jobs.as_ref()).await?;
    tracing::info!(job_id = %job.id, "running TagPlus import in the foreground");

    let importer = CatalogImporter::new(client, store, Arc::new(catalog), Arc::clone(&jobs))
        .with_page_size(config.import_page_size);
    let runner =
        BatchJobRunner::new(Arc::new(importer), Arc::clone(&jobs), config.job_max_attempts);

    let status = runner.run(job.id).await?;
    let finished = jobs.retrieve_job(job.id).await?;
    println!("batch job {} finished: {}", job.id, status.as_str());
    if let Some(finished) = finished {
        if let Some(message) = &finished.error_message {
            println!("error: {message}");
        }
        println!("{}", serde_json::to_string_pretty(&finished.result)?);
    }
    Ok(())
}

async fn run_dry(
    client: Arc<tagplus_client::TagPlusClient>,
    store: &PgStoreRepository,
    catalog: &PgCatalog,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let snapshot = MemoryStore::new(store.retrieve_store().await?)
        .with_shipping_profile(store.default_shipping_profile().await?);
    let existing = catalog.snapshot().await?;
    tracing::info!(
        collections = existing.collections.len(),
        products = existing.products.len(),
        "dry run: importing into a copy of the current catalog"
    );
    let catalog = seeded_catalog(existing);

    let jobs = Arc::new(MemoryBatchJobs::default());
    let job = jobs
        .create_job(&NewBatchJob {
            job_type: IMPORT_JOB_TYPE.to_string(),
            context: json!({ "options": client.options() }),
            created_by: "cli".to_string(),
            dry_run: true,
        })
        .await?;

    let importer =
        CatalogImporter::new(client, Arc::new(snapshot), Arc::new(catalog.clone()), jobs)
            .with_page_size(config.import_page_size);

    importer.pre_process_batch_job(job.id).await?;
    let summary = importer.process_job(job.id).await?;

    let report = json!({
        "dry_run": true,
        "summary": summary,
        "operations": catalog.operations(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// An in-memory catalog holding `snapshot`, with an empty operation log.
pub(crate) fn seeded_catalog(snapshot: CatalogSnapshot) -> MemoryCatalog {
    let catalog = MemoryCatalog::default();
    for collection in snapshot.collections {
        catalog.insert_collection(collection);
    }
    for product in snapshot.products {
        catalog.insert_product(product);
    }
    catalog
}
