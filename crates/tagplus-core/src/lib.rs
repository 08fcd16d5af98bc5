pub mod app_config;
pub mod catalog;
pub mod config;
pub mod jobs;
pub mod metadata;
pub mod options;
pub mod store;

pub use app_config::{AppConfig, Environment};
pub use catalog::{
    metadata_vendor_id, Collection, CollectionInput, CollectionUpdate, Metadata, MoneyAmount,
    OptionInput, OptionValueInput, Product, ProductInput, ProductOption, ProductStatus,
    ProductUpdate, Variant, VariantInput, VariantOptionValue, VariantUpdate, LEGACY_VENDOR_ID_KEY,
    VENDOR_ID_KEY,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use jobs::{BatchJob, BatchJobStatus, NewBatchJob, IMPORT_JOB_TYPE};
pub use metadata::{StoreRecord, TagPlusMetadata, TokenState, METADATA_NAMESPACE};
pub use options::PluginOptions;
pub use store::{
    BatchJobStore, Catalog, CatalogTransaction, CollectionStore, ProductStore, StoreError,
    StoreRepository, StoreResult, TokenStore, Tx, VariantStore,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
