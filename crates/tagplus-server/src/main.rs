mod api;
mod middleware;
mod scheduler;
mod worker;

use std::sync::Arc;

use tagplus_client::TagPlusClient;
use tagplus_core::{BatchJobStore, Environment};
use tagplus_db::{PgBatchJobStore, PgCatalog, PgStoreRepository};
use tagplus_sync::{BatchJobRunner, CatalogImporter};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(tagplus_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = tagplus_db::PoolConfig::from_app_config(&config);
    let pool = tagplus_db::connect_pool(&config.database_url, pool_config).await?;
    tagplus_db::run_migrations(&pool).await?;

    let store = Arc::new(PgStoreRepository::new(pool.clone()));
    let jobs: Arc<dyn BatchJobStore> = Arc::new(PgBatchJobStore::new(pool.clone()));
    let client = Arc::new(TagPlusClient::new(
        config.plugin_options(),
        store.clone(),
        config.request_timeout_secs,
    )?);

    let importer = CatalogImporter::new(
        client.clone(),
        store,
        Arc::new(PgCatalog::new(pool.clone())),
        Arc::clone(&jobs),
    )
    .with_page_size(config.import_page_size);
    let runner =
        BatchJobRunner::new(Arc::new(importer), Arc::clone(&jobs), config.job_max_attempts);
    let (queue, worker) = worker::spawn_worker(Arc::new(runner));
    let requeued = worker::requeue_unfinished(jobs.as_ref(), &queue).await?;
    if requeued > 0 {
        tracing::info!(requeued, "resuming batch jobs left unfinished by a previous run");
    }

    let _scheduler = scheduler::build_scheduler(
        config.sync_cron.as_deref(),
        Arc::clone(&client),
        Arc::clone(&jobs),
        queue.clone(),
    )
    .await?;

    let auth = AuthState::from_env(matches!(config.env, Environment::Development))?;
    let app = build_app(
        AppState {
            client,
            jobs,
            queue,
            pool: Some(pool),
        },
        auth,
    );

    tracing::info!(bind_addr = %config.bind_addr, "tagplus-server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(error = %error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
