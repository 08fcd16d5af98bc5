//! Host commerce entities the importer writes to.
//!
//! `*Input` types carry the field values for a create call. `*Update` types
//! carry only the fields that changed; `None` means "leave as is", and for
//! nullable columns `Some(None)` clears the value.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key linking a host entity to its TagPlus record.
pub const VENDOR_ID_KEY: &str = "tagplus_id";

/// Key written by the previous catalog integration; still honored on lookup.
pub const LEGACY_VENDOR_ID_KEY: &str = "prestashop_id";

/// Vendor id stored in `metadata`, preferring the current key over the
/// legacy one. Numeric strings are accepted.
#[must_use]
pub fn metadata_vendor_id(metadata: &Metadata) -> Option<i64> {
    [VENDOR_ID_KEY, LEGACY_VENDOR_ID_KEY]
        .iter()
        .find_map(|key| match metadata.get(*key)? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Draft,
    Proposed,
    Published,
    Rejected,
}

impl ProductStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Proposed => "proposed",
            Self::Published => "published",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "proposed" => Ok(Self::Proposed),
            "published" => Ok(Self::Published),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown product status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub title: String,
    pub handle: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInput {
    pub title: String,
    pub handle: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl CollectionUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.handle.is_none() && self.metadata.is_none()
    }
}

impl Collection {
    pub fn apply(&mut self, update: &CollectionUpdate) {
        if let Some(title) = &update.title {
            self.title.clone_from(title);
        }
        if let Some(handle) = &update.handle {
            self.handle.clone_from(handle);
        }
        if let Some(metadata) = &update.metadata {
            self.metadata.clone_from(metadata);
        }
    }
}

/// A price in minor units (cents) for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyAmount {
    pub currency_code: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductOption {
    pub id: Uuid,
    pub title: String,
    pub values: Vec<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionInput {
    pub title: String,
    pub values: Vec<OptionValueInput>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionValueInput {
    pub value: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOptionValue {
    pub option_id: Uuid,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub ean: Option<String>,
    pub upc: Option<String>,
    pub prices: Vec<MoneyAmount>,
    pub inventory_quantity: i64,
    pub allow_backorder: bool,
    pub manage_inventory: bool,
    pub weight: Option<f64>,
    pub options: Vec<VariantOptionValue>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantInput {
    pub title: String,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub ean: Option<String>,
    pub upc: Option<String>,
    pub prices: Vec<MoneyAmount>,
    pub inventory_quantity: i64,
    pub allow_backorder: bool,
    pub manage_inventory: bool,
    pub weight: Option<f64>,
    pub options: Vec<VariantOptionValue>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VariantUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ean: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upc: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prices: Option<Vec<MoneyAmount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_backorder: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manage_inventory: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl VariantUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Variant {
    pub fn apply(&mut self, update: &VariantUpdate) {
        if let Some(title) = &update.title {
            self.title.clone_from(title);
        }
        if let Some(sku) = &update.sku {
            self.sku.clone_from(sku);
        }
        if let Some(barcode) = &update.barcode {
            self.barcode.clone_from(barcode);
        }
        if let Some(ean) = &update.ean {
            self.ean.clone_from(ean);
        }
        if let Some(upc) = &update.upc {
            self.upc.clone_from(upc);
        }
        if let Some(prices) = &update.prices {
            self.prices.clone_from(prices);
        }
        if let Some(quantity) = update.inventory_quantity {
            self.inventory_quantity = quantity;
        }
        if let Some(allow) = update.allow_backorder {
            self.allow_backorder = allow;
        }
        if let Some(manage) = update.manage_inventory {
            self.manage_inventory = manage;
        }
        if let Some(weight) = update.weight {
            self.weight = weight;
        }
        if let Some(metadata) = &update.metadata {
            self.metadata.clone_from(metadata);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub handle: Option<String>,
    pub is_giftcard: bool,
    pub discountable: bool,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub status: ProductStatus,
    pub external_id: Option<String>,
    pub collection_id: Option<Uuid>,
    pub profile_id: Option<Uuid>,
    pub metadata: Metadata,
    pub images: Vec<String>,
    pub options: Vec<ProductOption>,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductInput {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub handle: Option<String>,
    pub is_giftcard: bool,
    pub discountable: bool,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub status: ProductStatus,
    pub external_id: Option<String>,
    pub collection_id: Option<Uuid>,
    pub profile_id: Option<Uuid>,
    pub metadata: Metadata,
    pub images: Vec<String>,
    pub options: Vec<OptionInput>,
}

/// Top-level product fields eligible for a diff update. Options and images
/// are managed separately and never appear here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_giftcard: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discountable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl ProductUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Product {
    pub fn apply(&mut self, update: &ProductUpdate) {
        if let Some(title) = &update.title {
            self.title.clone_from(title);
        }
        if let Some(subtitle) = &update.subtitle {
            self.subtitle.clone_from(subtitle);
        }
        if let Some(description) = &update.description {
            self.description.clone_from(description);
        }
        if let Some(handle) = &update.handle {
            self.handle.clone_from(handle);
        }
        if let Some(giftcard) = update.is_giftcard {
            self.is_giftcard = giftcard;
        }
        if let Some(discountable) = update.discountable {
            self.discountable = discountable;
        }
        if let Some(weight) = update.weight {
            self.weight = weight;
        }
        if let Some(height) = update.height {
            self.height = height;
        }
        if let Some(length) = update.length {
            self.length = length;
        }
        if let Some(width) = update.width {
            self.width = width;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(external_id) = &update.external_id {
            self.external_id.clone_from(external_id);
        }
        if let Some(collection_id) = update.collection_id {
            self.collection_id = Some(collection_id);
        }
        if let Some(metadata) = &update.metadata {
            self.metadata.clone_from(metadata);
        }
    }
}
