use async_trait::async_trait;
use tagplus_client::{ClientError, TagPlusClient, VendorCategory};

/// Catalog reads the importer needs from TagPlus.
#[async_trait]
pub trait VendorCatalog: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<VendorCategory>, ClientError>;

    async fn category(&self, id: i64) -> Result<VendorCategory, ClientError>;

    /// One undecoded product page. Products are decoded one by one so a
    /// malformed record fails alone.
    async fn products_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<serde_json::Value>, ClientError>;
}

#[async_trait]
impl VendorCatalog for TagPlusClient {
    async fn list_categories(&self) -> Result<Vec<VendorCategory>, ClientError> {
        self.retrieve_categories().await
    }

    async fn category(&self, id: i64) -> Result<VendorCategory, ClientError> {
        self.retrieve_category(id).await
    }

    async fn products_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<serde_json::Value>, ClientError> {
        self.retrieve_product_page(page, per_page).await
    }
}
