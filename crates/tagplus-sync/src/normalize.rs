//! Mapping from TagPlus records to host entity inputs.
//!
//! Everything here is pure. Store lookups (collection resolution, shipping
//! profile, currencies) happen in the mappers and are passed in or patched
//! onto the returned inputs.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;
use tagplus_client::{VendorCategory, VendorOption, VendorProduct};
use tagplus_core::{
    CollectionInput, Metadata, MoneyAmount, OptionInput, OptionValueInput, ProductInput,
    ProductStatus, VariantInput, VariantOptionValue, VENDOR_ID_KEY,
};

/// Title given to the single variant of a non-configurable product.
pub const DEFAULT_VARIANT_TITLE: &str = "Default";

fn vendor_metadata(id: i64) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(VENDOR_ID_KEY.to_string(), json!(id));
    metadata
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Normalizes a category into a collection. The handle is a slug of the
/// description, or empty when the description is blank.
#[must_use]
pub fn normalize_collection(category: &VendorCategory) -> CollectionInput {
    CollectionInput {
        title: category.description.trim().to_string(),
        handle: collection_handle(&category.description),
        metadata: vendor_metadata(category.id),
    }
}

/// Lowercase ASCII slug: accents folded, runs of anything else collapsed to `-`.
#[must_use]
pub fn collection_handle(description: &str) -> String {
    let mut handle = String::with_capacity(description.len());
    let mut pending_dash = false;
    for ch in description.chars().flat_map(char::to_lowercase) {
        let folded = fold_accent(ch);
        if folded.is_ascii_alphanumeric() {
            if pending_dash && !handle.is_empty() {
                handle.push('-');
            }
            pending_dash = false;
            handle.push(folded);
        } else {
            pending_dash = true;
        }
    }
    handle
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Normalizes a product. `collection_id` and `profile_id` are left unset.
#[must_use]
pub fn normalize_product(product: &VendorProduct) -> ProductInput {
    let mut metadata = vendor_metadata(product.id);
    if let Some(code) = non_empty(product.code.as_ref()) {
        metadata.insert("reference".to_string(), json!(code));
    }
    if let Some(supplier) = product
        .suppliers
        .first()
        .and_then(|s| non_empty(s.legal_name.as_ref()))
    {
        metadata.insert("supplier_name".to_string(), json!(supplier));
    }
    if let Some(modified_at) = non_empty(product.modified_at.as_ref()) {
        metadata.insert("date_upd".to_string(), json!(modified_at));
    }

    ProductInput {
        title: product.description.clone(),
        subtitle: non_empty(product.short_description.as_ref()),
        description: product
            .long_description
            .as_deref()
            .map(remove_html_tags)
            .filter(|text| !text.is_empty()),
        handle: None,
        is_giftcard: false,
        discountable: true,
        weight: product.weight,
        height: product.height,
        length: product.length,
        width: product.width,
        status: if product.active {
            ProductStatus::Published
        } else {
            ProductStatus::Draft
        },
        external_id: Some(product.id.to_string()),
        collection_id: None,
        profile_id: None,
        metadata,
        images: product.image_urls(),
        options: Vec::new(),
    }
}

/// Normalizes the product's own fields into a variant priced in every
/// currency of `currencies`.
///
/// The title is the vendor id; mappers override it for default variants.
#[must_use]
pub fn normalize_variant(
    product: &VendorProduct,
    currencies: &[String],
    options: Vec<VariantOptionValue>,
) -> VariantInput {
    let amount = parse_price(product.retail_price);
    let quantity = product.stock.resale_quantity;
    let barcode = non_empty(product.barcode.as_ref());
    #[allow(clippy::cast_possible_truncation)]
    let inventory_quantity = quantity.trunc() as i64;

    VariantInput {
        title: product.id.to_string(),
        sku: non_empty(product.code.as_ref()),
        ean: barcode.clone(),
        barcode,
        upc: None,
        prices: currencies
            .iter()
            .map(|currency_code| MoneyAmount {
                currency_code: currency_code.clone(),
                amount,
            })
            .collect(),
        inventory_quantity,
        allow_backorder: false,
        manage_inventory: quantity > 0.0,
        weight: Some(product.weight.unwrap_or(0.0)),
        options,
        metadata: vendor_metadata(product.id),
    }
}

/// Normalizes an option descriptor. Each value keeps its vendor id under
/// `tagplus_value`.
#[must_use]
pub fn normalize_option(option: &VendorOption) -> OptionInput {
    OptionInput {
        title: option.name.clone(),
        values: option
            .values
            .iter()
            .map(|value| {
                let mut metadata = Metadata::new();
                metadata.insert("tagplus_value".to_string(), json!(value.id));
                OptionValueInput {
                    value: value.name.clone(),
                    metadata,
                }
            })
            .collect(),
        metadata: vendor_metadata(option.id),
    }
}

/// Converts a price in reais to integer cents, truncating past the second
/// decimal place.
///
/// The float is read through its shortest decimal representation so that
/// `19.99` yields `1999` rather than `1998`. Non-finite input yields `0`.
#[must_use]
pub fn parse_price(price: f64) -> i64 {
    if !price.is_finite() {
        return 0;
    }
    let Ok(decimal) = Decimal::from_str(&price.to_string()) else {
        return 0;
    };
    (decimal.round_dp_with_strategy(2, RoundingStrategy::ToZero) * Decimal::ONE_HUNDRED)
        .to_i64()
        .unwrap_or(0)
}

/// Strips markup tags and trims the result.
#[must_use]
pub fn remove_html_tags(html: &str) -> String {
    static TAGS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<[^>]+>").expect("valid tags regex"));
    TAGS.replace_all(html, "").trim().to_string()
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
