//! Product → product + variant mapping.
//!
//! A simple TagPlus product becomes one host product with a single
//! `"Default"` variant. Products with linked items are created without
//! variants; their option ids are reconciled but combinations are not
//! generated.

use tagplus_client::VendorProduct;
use tagplus_core::{
    metadata_vendor_id, CollectionStore, OptionInput, Product, ProductStore, Variant, VariantInput,
    VariantStore,
};
use uuid::Uuid;

use crate::context::ImportContext;
use crate::diff::{product_diff, variant_diff};
use crate::error::SyncError;
use crate::normalize::{normalize_product, normalize_variant, DEFAULT_VARIANT_TITLE};
use crate::outcome::Change;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProductMapper;

impl ProductMapper {
    /// Creates the host product for `product`, or routes to an update when it
    /// is already known by external id or by SKU.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] on persistence failure or
    /// [`SyncError::Mapping`] when created options cannot be reconciled.
    pub async fn create<S>(
        &self,
        store: &mut S,
        ctx: &ImportContext,
        product: &VendorProduct,
    ) -> Result<Change, SyncError>
    where
        S: ProductStore + VariantStore + CollectionStore + ?Sized,
    {
        let external_id = product.id.to_string();
        if let Some(existing) = store.find_product_by_external_id(&external_id).await? {
            return self.update(store, ctx, product, &existing).await;
        }

        if let Some(sku) = product.code.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if let Some(variant) = store.find_variant_by_sku(sku).await? {
                tracing::debug!(
                    vendor_id = product.id,
                    sku,
                    "no product with this external id, but the SKU exists; updating variant"
                );
                return self.update_variant(store, ctx, product, &variant).await;
            }
        }

        let mut input = normalize_product(product);
        input.profile_id = ctx.shipping_profile_id;
        input.collection_id = resolve_collection(store, product).await;
        let created = store.create_product(&input).await?;

        if product.is_configurable() {
            let reloaded = store.retrieve_product(created.id).await?;
            let options = attach_option_ids(product.id, &input.options, &reloaded)?;
            tracing::debug!(
                vendor_id = product.id,
                product_id = %created.id,
                linked_items = product.linked_items.len(),
                options = options.len(),
                "configurable product created without variants"
            );
            return Ok(Change::Created);
        }

        store
            .create_variant(created.id, &default_variant(ctx, product))
            .await?;
        tracing::debug!(vendor_id = product.id, product_id = %created.id, "product created");
        Ok(Change::Created)
    }

    /// Refreshes the product's variant and top-level fields.
    ///
    /// The variant updated is the one matching the product's SKU or vendor id,
    /// else the sole variant. When neither exists a new default variant is
    /// created.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] on persistence failure.
    pub async fn update<S>(
        &self,
        store: &mut S,
        ctx: &ImportContext,
        product: &VendorProduct,
        existing: &Product,
    ) -> Result<Change, SyncError>
    where
        S: ProductStore + VariantStore + CollectionStore + ?Sized,
    {
        let mut input = normalize_product(product);
        input.collection_id = resolve_collection(store, product).await;
        let variant = default_variant(ctx, product);
        let mut change = Change::Unchanged;

        match matching_variant(&existing.variants, &variant) {
            Some(current) => {
                let update = variant_diff(&variant, current);
                if !update.is_empty() {
                    store.update_variant(current.id, &update).await?;
                    change = Change::Updated;
                }
            }
            None => {
                store.create_variant(existing.id, &variant).await?;
                change = Change::Updated;
            }
        }

        let update = product_diff(&input, existing);
        if !update.is_empty() {
            store.update_product(existing.id, &update).await?;
            change = Change::Updated;
        }

        if change == Change::Updated {
            tracing::debug!(vendor_id = product.id, product_id = %existing.id, "product updated");
        }
        Ok(change)
    }

    /// Diff-updates a variant found by SKU.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] on persistence failure.
    pub async fn update_variant<S>(
        &self,
        store: &mut S,
        ctx: &ImportContext,
        product: &VendorProduct,
        existing: &Variant,
    ) -> Result<Change, SyncError>
    where
        S: VariantStore + ?Sized,
    {
        let update = variant_diff(&default_variant(ctx, product), existing);
        if update.is_empty() {
            return Ok(Change::Unchanged);
        }
        store.update_variant(existing.id, &update).await?;
        tracing::debug!(vendor_id = product.id, variant_id = %existing.id, "variant updated");
        Ok(Change::Updated)
    }
}

fn default_variant(ctx: &ImportContext, product: &VendorProduct) -> VariantInput {
    let mut variant = normalize_variant(product, &ctx.currencies, Vec::new());
    variant.title = DEFAULT_VARIANT_TITLE.to_string();
    variant
}

fn matching_variant<'a>(variants: &'a [Variant], incoming: &VariantInput) -> Option<&'a Variant> {
    let by_sku = || {
        incoming
            .sku
            .as_ref()
            .and_then(|sku| variants.iter().find(|v| v.sku.as_ref() == Some(sku)))
    };
    let by_vendor_id = || {
        metadata_vendor_id(&incoming.metadata).and_then(|id| {
            variants
                .iter()
                .find(|v| metadata_vendor_id(&v.metadata) == Some(id))
        })
    };
    let sole = || match variants {
        [only] => Some(only),
        _ => None,
    };
    by_sku().or_else(by_vendor_id).or_else(sole)
}

/// Collection whose metadata links to the product's category. Lookup
/// failures are logged and treated as "no collection".
async fn resolve_collection<S>(store: &mut S, product: &VendorProduct) -> Option<Uuid>
where
    S: CollectionStore + ?Sized,
{
    let category_id = product.category.as_ref()?.id;
    match store.find_collection_by_vendor_id(category_id).await {
        Ok(Some(collection)) => Some(collection.id),
        Ok(None) => {
            tracing::debug!(vendor_id = product.id, category_id, "no collection for category");
            None
        }
        Err(error) => {
            tracing::warn!(
                vendor_id = product.id,
                category_id,
                error = %error,
                "collection lookup failed"
            );
            None
        }
    }
}

/// Pairs each normalized option with the id the store assigned to the
/// option of the same title.
fn attach_option_ids(
    vendor_id: i64,
    options: &[OptionInput],
    product: &Product,
) -> Result<Vec<(Uuid, OptionInput)>, SyncError> {
    options
        .iter()
        .map(|option| {
            product
                .options
                .iter()
                .find(|created| created.title == option.title)
                .map(|created| (created.id, option.clone()))
                .ok_or_else(|| SyncError::Mapping {
                    vendor_id,
                    reason: format!("created product has no option titled {:?}", option.title),
                })
        })
        .collect()
}

#[cfg(test)]
#[path = "product_test.rs"]
mod tests;
