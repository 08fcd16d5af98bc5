use chrono::Utc;
use clap::Parser;
use serde_json::json;
use tagplus_client::VendorCategory;
use tagplus_core::Collection;
use tagplus_db::CatalogSnapshot;
use tagplus_sync::{atomic, normalize_collection, CategoryMapper, Change};
use uuid::Uuid;

use super::*;
use crate::sync::seeded_catalog;

#[test]
fn parses_migrate_command() {
    let cli = Cli::try_parse_from(["tagplus", "migrate"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::Migrate));
}

#[test]
fn parses_authorize_with_code() {
    let cli = Cli::try_parse_from(["tagplus", "authorize", "abc123"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Authorize { ref code } if code == "abc123"
    ));
}

#[test]
fn authorize_requires_a_code() {
    assert!(Cli::try_parse_from(["tagplus", "authorize"]).is_err());
}

#[test]
fn sync_defaults_to_a_real_run() {
    let cli = Cli::try_parse_from(["tagplus", "sync"]).unwrap();
    assert!(matches!(cli.command, Commands::Sync { dry_run: false }));
}

#[test]
fn sync_dry_run_flag() {
    let cli = Cli::try_parse_from(["tagplus", "sync", "--dry-run"]).unwrap();
    assert!(matches!(cli.command, Commands::Sync { dry_run: true }));
}

#[test]
fn missing_subcommand_is_an_error() {
    assert!(Cli::try_parse_from(["tagplus"]).is_err());
}

#[tokio::test]
async fn dry_run_catalog_starts_from_existing_records() {
    let category: VendorCategory =
        serde_json::from_value(json!({ "id": 7, "descricao": "Camisetas" })).unwrap();
    let input = normalize_collection(&category);
    let existing = Collection {
        id: Uuid::new_v4(),
        title: input.title,
        handle: input.handle,
        metadata: input.metadata,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let catalog = seeded_catalog(CatalogSnapshot {
        collections: vec![existing],
        products: Vec::new(),
    });
    assert!(catalog.operations().is_empty());

    let change = atomic(&catalog, move |tx| {
        Box::pin(async move { CategoryMapper.create(tx, &category).await })
    })
    .await
    .unwrap();

    assert_eq!(change, Change::Unchanged);
    assert_eq!(catalog.collections().len(), 1);
    assert!(catalog.operations().is_empty());
}
