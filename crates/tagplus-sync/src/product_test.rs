use chrono::Utc;
use serde_json::json;
use tagplus_core::{Collection, Metadata, MoneyAmount, ProductStatus, ProductUpdate};

use super::*;
use crate::memory::{CatalogOperation, MemoryCatalog};
use crate::transaction::atomic;

fn vendor_product(overrides: serde_json::Value) -> VendorProduct {
    let mut base = json!({
        "id": 1001,
        "ativo": 1,
        "sincroniza": 1,
        "codigo": "CAN-AZ-01",
        "codigo_barras": "7891234567895",
        "descricao": "Caneca Azul",
        "descricao_longa": "<p>Caneca de cerâmica</p>",
        "estoque": { "qtd_revenda": 12 },
        "categoria": { "id": 7, "descricao": "Cozinha" },
        "imagens": ["https://cdn.example/caneca.jpg"],
        "peso": 0.4,
        "valor_venda_varejo": 39.9
    });
    if let (Some(target), Some(patch)) = (base.as_object_mut(), overrides.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(base).unwrap()
}

fn context() -> ImportContext {
    ImportContext {
        currencies: vec!["brl".to_string(), "usd".to_string()],
        shipping_profile_id: Some(Uuid::from_u128(42)),
    }
}

fn meta(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

async fn import(catalog: &MemoryCatalog, product: VendorProduct) -> Change {
    let ctx = context();
    atomic(catalog, move |tx| {
        Box::pin(async move { ProductMapper.create(tx, &ctx, &product).await })
    })
    .await
    .unwrap()
}

fn stored_product(external_id: &str, sku: &str) -> Product {
    let product_id = Uuid::new_v4();
    Product {
        id: product_id,
        title: "Caneca antiga".to_string(),
        subtitle: None,
        description: None,
        handle: None,
        is_giftcard: false,
        discountable: true,
        weight: None,
        height: None,
        length: None,
        width: None,
        status: ProductStatus::Published,
        external_id: Some(external_id.to_string()),
        collection_id: None,
        profile_id: None,
        metadata: Metadata::new(),
        images: Vec::new(),
        options: Vec::new(),
        variants: vec![Variant {
            id: Uuid::new_v4(),
            product_id,
            title: "Default".to_string(),
            sku: Some(sku.to_string()),
            barcode: None,
            ean: None,
            upc: None,
            prices: vec![MoneyAmount {
                currency_code: "brl".to_string(),
                amount: 2500,
            }],
            inventory_quantity: 1,
            allow_backorder: false,
            manage_inventory: true,
            weight: None,
            options: Vec::new(),
            metadata: Metadata::new(),
        }],
    }
}

#[tokio::test]
async fn simple_product_gets_one_default_variant() {
    let catalog = MemoryCatalog::default();

    assert_eq!(import(&catalog, vendor_product(json!({}))).await, Change::Created);

    let products = catalog.products();
    assert_eq!(products.len(), 1);
    let product = &products[0];
    assert_eq!(product.title, "Caneca Azul");
    assert_eq!(product.external_id.as_deref(), Some("1001"));
    assert_eq!(product.profile_id, Some(Uuid::from_u128(42)));
    assert_eq!(product.description.as_deref(), Some("Caneca de cerâmica"));

    assert_eq!(product.variants.len(), 1);
    let variant = &product.variants[0];
    assert_eq!(variant.title, "Default");
    assert_eq!(variant.sku.as_deref(), Some("CAN-AZ-01"));
    assert_eq!(variant.ean.as_deref(), Some("7891234567895"));
    assert_eq!(variant.inventory_quantity, 12);
    assert!(variant.manage_inventory);
    let amounts: Vec<(&str, i64)> = variant
        .prices
        .iter()
        .map(|p| (p.currency_code.as_str(), p.amount))
        .collect();
    assert_eq!(amounts, vec![("brl", 3990), ("usd", 3990)]);
}

#[tokio::test]
async fn reimporting_an_unchanged_product_writes_nothing() {
    let catalog = MemoryCatalog::default();
    import(&catalog, vendor_product(json!({}))).await;
    let writes = catalog.operations().len();

    assert_eq!(import(&catalog, vendor_product(json!({}))).await, Change::Unchanged);
    assert_eq!(catalog.operations().len(), writes);
}

#[tokio::test]
async fn existing_sku_routes_to_a_variant_update() {
    let catalog = MemoryCatalog::default();
    catalog.insert_product(stored_product("legacy-9", "CAN-AZ-01"));

    assert_eq!(import(&catalog, vendor_product(json!({}))).await, Change::Updated);

    let operations = catalog.operations();
    assert_eq!(operations.len(), 1);
    assert!(matches!(operations[0], CatalogOperation::UpdateVariant { .. }));
    assert_eq!(catalog.products().len(), 1);
    assert_eq!(catalog.products()[0].variants[0].inventory_quantity, 12);
}

#[tokio::test]
async fn description_change_sends_only_the_description() {
    let catalog = MemoryCatalog::default();
    import(&catalog, vendor_product(json!({}))).await;

    let changed = vendor_product(json!({ "descricao_longa": "<p>Nova descrição</p>" }));
    assert_eq!(import(&catalog, changed).await, Change::Updated);

    let last = catalog.operations().pop().unwrap();
    match last {
        CatalogOperation::UpdateProduct { update, .. } => assert_eq!(
            update,
            ProductUpdate {
                description: Some(Some("Nova descrição".to_string())),
                ..ProductUpdate::default()
            }
        ),
        other => panic!("expected product update, got {other:?}"),
    }
}

#[tokio::test]
async fn product_with_linked_items_is_created_without_variants() {
    let catalog = MemoryCatalog::default();
    let product = vendor_product(json!({ "itens_vinculados": [{ "id": 5, "qtd": 1 }] }));

    assert_eq!(import(&catalog, product).await, Change::Created);

    assert!(catalog.products()[0].variants.is_empty());
    assert!(!catalog
        .operations()
        .iter()
        .any(|op| matches!(op, CatalogOperation::CreateVariant { .. })));
}

#[tokio::test]
async fn collection_is_resolved_through_the_category_id() {
    let catalog = MemoryCatalog::default();
    let collection_id = Uuid::new_v4();
    catalog.insert_collection(Collection {
        id: collection_id,
        title: "Cozinha".to_string(),
        handle: "cozinha".to_string(),
        metadata: meta(json!({ "tagplus_id": 7 })),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    });

    import(&catalog, vendor_product(json!({}))).await;

    assert_eq!(catalog.products()[0].collection_id, Some(collection_id));
}

#[tokio::test]
async fn legacy_metadata_key_still_links_the_collection() {
    let catalog = MemoryCatalog::default();
    let collection_id = Uuid::new_v4();
    catalog.insert_collection(Collection {
        id: collection_id,
        title: "Cozinha".to_string(),
        handle: "cozinha".to_string(),
        metadata: meta(json!({ "prestashop_id": "7" })),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    });

    import(&catalog, vendor_product(json!({}))).await;

    assert_eq!(catalog.products()[0].collection_id, Some(collection_id));
}

#[test]
fn variant_match_prefers_sku_over_sole_variant() {
    let product = stored_product("1001", "OTHER");
    let mut incoming = default_variant(&context(), &vendor_product(json!({})));
    assert_eq!(
        matching_variant(&product.variants, &incoming).map(|v| v.id),
        Some(product.variants[0].id)
    );

    let mut two = product.variants.clone();
    let mut second = two[0].clone();
    second.id = Uuid::new_v4();
    second.sku = Some("CAN-AZ-01".to_string());
    two.push(second.clone());
    assert_eq!(matching_variant(&two, &incoming).map(|v| v.id), Some(second.id));

    incoming.sku = None;
    incoming.metadata = Metadata::new();
    assert!(matching_variant(&two, &incoming).is_none());
}
