use std::collections::BTreeSet;

use tagplus_core::{StoreRecord, StoreRepository};
use uuid::Uuid;

use crate::error::SyncError;

/// Store settings read once at the start of an import pass and passed to
/// every mapper call of that pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportContext {
    /// Currency codes to price variants in. Sorted and deduplicated.
    pub currencies: Vec<String>,
    pub shipping_profile_id: Option<Uuid>,
}

impl ImportContext {
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the shipping profile lookup fails.
    pub async fn load(
        store: &StoreRecord,
        repository: &dyn StoreRepository,
    ) -> Result<Self, SyncError> {
        let shipping_profile_id = repository.default_shipping_profile().await?;
        if shipping_profile_id.is_none() {
            tracing::warn!("no default shipping profile; products will be created without one");
        }
        Ok(Self::from_store(store, shipping_profile_id))
    }

    #[must_use]
    pub fn from_store(store: &StoreRecord, shipping_profile_id: Option<Uuid>) -> Self {
        let currencies: BTreeSet<String> = store
            .currency_codes
            .iter()
            .chain(store.default_currency_code.iter())
            .map(|code| code.trim().to_lowercase())
            .filter(|code| !code.is_empty())
            .collect();
        Self {
            currencies: currencies.into_iter().collect(),
            shipping_profile_id,
        }
    }
}
