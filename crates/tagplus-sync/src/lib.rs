pub mod category;
pub mod context;
pub mod diff;
pub mod error;
pub mod importer;
pub mod jobs;
pub mod memory;
pub mod normalize;
pub mod outcome;
pub mod product;
pub mod transaction;
pub mod vendor;

pub use category::CategoryMapper;
pub use context::ImportContext;
pub use error::SyncError;
pub use importer::{CatalogImporter, DEFAULT_PAGE_SIZE};
pub use jobs::{BatchJobRunner, DEFAULT_MAX_ATTEMPTS};
pub use memory::{CatalogOperation, MemoryBatchJobs, MemoryCatalog, MemoryStore};
pub use normalize::{
    normalize_collection, normalize_option, normalize_product, normalize_variant, parse_price,
    remove_html_tags,
};
pub use outcome::{Change, ImportSummary, RecordKind, RecordOutcome, Tally};
pub use product::ProductMapper;
pub use transaction::atomic;
pub use vendor::VendorCatalog;
