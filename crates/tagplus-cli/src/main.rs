mod auth;
mod sync;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tagplus")]
#[command(about = "TagPlus catalog sync command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Exchange an authorization code from the TagPlus consent screen for tokens
    Authorize {
        /// The `code` query parameter TagPlus redirected back with
        code: String,
    },
    /// Exchange the stored refresh token for a new token pair
    Refresh,
    /// Check the stored token, refreshing it when expired
    Verify,
    /// Run a full import pass in the foreground
    Sync {
        /// Import into an in-memory copy of the current catalog and print the
        /// writes a real pass would make
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = tagplus_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = tagplus_db::PoolConfig::from_app_config(&config);
    let pool = tagplus_db::connect_pool(&config.database_url, pool_config).await?;

    match cli.command {
        Commands::Migrate => {
            let applied = tagplus_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Authorize { code } => auth::run_authorize(&pool, &config, &code).await?,
        Commands::Refresh => auth::run_refresh(&pool, &config).await?,
        Commands::Verify => auth::run_verify(&pool, &config).await?,
        Commands::Sync { dry_run } => sync::run_sync(&pool, &config, dry_run).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
