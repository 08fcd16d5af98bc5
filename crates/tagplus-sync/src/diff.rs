//! Shallow field-by-field diffs between normalized inputs and stored entities.
//!
//! Metadata is merged rather than replaced: keys the importer does not own
//! survive, and the bag counts as changed only when a TagPlus-owned key moved.

use tagplus_core::{
    Collection, CollectionInput, CollectionUpdate, Metadata, MoneyAmount, Product, ProductInput,
    ProductUpdate, Variant, VariantInput, VariantUpdate,
};

fn changed<T: PartialEq + Clone>(incoming: &T, existing: &T) -> Option<T> {
    (incoming != existing).then(|| incoming.clone())
}

/// `existing` with every key of `incoming` written over it.
#[must_use]
pub fn merge_metadata(existing: &Metadata, incoming: &Metadata) -> Metadata {
    let mut merged = existing.clone();
    for (key, value) in incoming {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn metadata_change(incoming: &Metadata, existing: &Metadata) -> Option<Metadata> {
    changed(&merge_metadata(existing, incoming), existing)
}

fn sorted_prices(prices: &[MoneyAmount]) -> Vec<MoneyAmount> {
    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| a.currency_code.cmp(&b.currency_code));
    sorted
}

#[must_use]
pub fn collection_diff(incoming: &CollectionInput, existing: &Collection) -> CollectionUpdate {
    CollectionUpdate {
        title: changed(&incoming.title, &existing.title),
        handle: changed(&incoming.handle, &existing.handle),
        metadata: metadata_change(&incoming.metadata, &existing.metadata),
    }
}

/// Options, images and the shipping profile are never part of a product diff.
/// The collection only changes when the incoming product resolved one.
#[must_use]
pub fn product_diff(incoming: &ProductInput, existing: &Product) -> ProductUpdate {
    ProductUpdate {
        title: changed(&incoming.title, &existing.title),
        subtitle: changed(&incoming.subtitle, &existing.subtitle),
        description: changed(&incoming.description, &existing.description),
        handle: changed(&incoming.handle, &existing.handle),
        is_giftcard: changed(&incoming.is_giftcard, &existing.is_giftcard),
        discountable: changed(&incoming.discountable, &existing.discountable),
        weight: changed(&incoming.weight, &existing.weight),
        height: changed(&incoming.height, &existing.height),
        length: changed(&incoming.length, &existing.length),
        width: changed(&incoming.width, &existing.width),
        status: changed(&incoming.status, &existing.status),
        external_id: changed(&incoming.external_id, &existing.external_id),
        collection_id: incoming
            .collection_id
            .filter(|id| existing.collection_id != Some(*id)),
        metadata: metadata_change(&incoming.metadata, &existing.metadata),
    }
}

/// Option values are left alone; prices compare by currency regardless of order.
#[must_use]
pub fn variant_diff(incoming: &VariantInput, existing: &Variant) -> VariantUpdate {
    let incoming_prices = sorted_prices(&incoming.prices);
    VariantUpdate {
        title: changed(&incoming.title, &existing.title),
        sku: changed(&incoming.sku, &existing.sku),
        barcode: changed(&incoming.barcode, &existing.barcode),
        ean: changed(&incoming.ean, &existing.ean),
        upc: changed(&incoming.upc, &existing.upc),
        prices: changed(&incoming_prices, &sorted_prices(&existing.prices)),
        inventory_quantity: changed(&incoming.inventory_quantity, &existing.inventory_quantity),
        allow_backorder: changed(&incoming.allow_backorder, &existing.allow_backorder),
        manage_inventory: changed(&incoming.manage_inventory, &existing.manage_inventory),
        weight: changed(&incoming.weight, &existing.weight),
        metadata: metadata_change(&incoming.metadata, &existing.metadata),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn collection(title: &str, handle: &str, metadata: Metadata) -> Collection {
        Collection {
            id: Uuid::new_v4(),
            title: title.to_string(),
            handle: handle.to_string(),
            metadata,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn meta(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn identical_collection_produces_empty_update() {
        let incoming = CollectionInput {
            title: "Cozinha".to_string(),
            handle: "cozinha".to_string(),
            metadata: meta(json!({ "tagplus_id": 7 })),
        };
        let existing = collection("Cozinha", "cozinha", meta(json!({ "tagplus_id": 7 })));
        assert!(collection_diff(&incoming, &existing).is_empty());
    }

    #[test]
    fn foreign_metadata_keys_do_not_count_as_changes() {
        let incoming = CollectionInput {
            title: "Cozinha".to_string(),
            handle: "cozinha".to_string(),
            metadata: meta(json!({ "tagplus_id": 7 })),
        };
        let existing = collection(
            "Cozinha",
            "cozinha",
            meta(json!({ "tagplus_id": 7, "featured": true })),
        );
        assert!(collection_diff(&incoming, &existing).is_empty());
    }

    #[test]
    fn changed_metadata_is_sent_merged() {
        let incoming = CollectionInput {
            title: "Cozinha".to_string(),
            handle: "cozinha".to_string(),
            metadata: meta(json!({ "tagplus_id": 8 })),
        };
        let existing = collection(
            "Cozinha",
            "cozinha",
            meta(json!({ "tagplus_id": 7, "featured": true })),
        );

        let update = collection_diff(&incoming, &existing);

        assert_eq!(update.title, None);
        assert_eq!(
            update.metadata,
            Some(meta(json!({ "tagplus_id": 8, "featured": true })))
        );
    }

    #[test]
    fn price_order_does_not_matter() {
        let brl = MoneyAmount {
            currency_code: "brl".to_string(),
            amount: 100,
        };
        let usd = MoneyAmount {
            currency_code: "usd".to_string(),
            amount: 100,
        };
        assert_eq!(
            sorted_prices(&[usd.clone(), brl.clone()]),
            sorted_prices(&[brl, usd])
        );
    }
}
