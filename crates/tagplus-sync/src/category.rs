//! Category → collection mapping.

use tagplus_client::VendorCategory;
use tagplus_core::{Collection, CollectionStore};

use crate::diff::collection_diff;
use crate::error::SyncError;
use crate::normalize::normalize_collection;
use crate::outcome::Change;

#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryMapper;

impl CategoryMapper {
    /// Creates the collection for `category`, or diff-updates the collection
    /// that already carries its handle.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if a lookup or write fails.
    pub async fn create<S>(
        &self,
        store: &mut S,
        category: &VendorCategory,
    ) -> Result<Change, SyncError>
    where
        S: CollectionStore + ?Sized,
    {
        let normalized = normalize_collection(category);
        if normalized.handle.is_empty() {
            tracing::warn!(
                vendor_id = category.id,
                "category has no description; collection handle is empty"
            );
        }

        if let Some(existing) = store.find_collection_by_handle(&normalized.handle).await? {
            return self.update(store, category, &existing).await;
        }

        let created = store.create_collection(&normalized).await?;
        tracing::debug!(vendor_id = category.id, collection_id = %created.id, "collection created");
        Ok(Change::Created)
    }

    /// Sends only the fields of `existing` that differ from `category`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the update fails.
    pub async fn update<S>(
        &self,
        store: &mut S,
        category: &VendorCategory,
        existing: &Collection,
    ) -> Result<Change, SyncError>
    where
        S: CollectionStore + ?Sized,
    {
        let update = collection_diff(&normalize_collection(category), existing);
        if update.is_empty() {
            return Ok(Change::Unchanged);
        }
        store.update_collection(existing.id, &update).await?;
        tracing::debug!(
            vendor_id = category.id,
            collection_id = %existing.id,
            "collection updated"
        );
        Ok(Change::Updated)
    }
}
