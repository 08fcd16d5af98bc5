use reqwest::Method;

use super::TagPlusClient;
use crate::error::ClientError;
use crate::types::{ProductImage, VendorCategory, VendorProduct};

/// Fields requested from `/produtos`. Keeping the list fixed bounds the
/// payload size of large catalogs.
pub const PRODUCT_FIELDS: &[&str] = &[
    "id",
    "ativo",
    "sincroniza",
    "codigo",
    "codigo_grade",
    "codigo_barras",
    "descricao",
    "descricao_curta",
    "descricao_longa",
    "estoque",
    "categoria",
    "data_alteracao",
    "data_validade",
    "imagem_principal",
    "imagens",
    "peso",
    "largura",
    "altura",
    "comprimento",
    "valores_venda",
    "valor_venda_varejo",
    "itens_vinculados",
    "fornecedores",
];

impl TagPlusClient {
    /// One page of active, sync-enabled products, newest changes first.
    ///
    /// # Errors
    ///
    /// See [`TagPlusClient::send_request`].
    pub async fn retrieve_products(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<VendorProduct>, ClientError> {
        let path = Self::products_path(page, per_page);
        self.send_request(Method::GET, &path, None, None).await
    }

    /// The same page as [`TagPlusClient::retrieve_products`], left undecoded
    /// so one malformed product does not cost the rest of the page.
    ///
    /// # Errors
    ///
    /// See [`TagPlusClient::send_request`].
    pub async fn retrieve_product_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<serde_json::Value>, ClientError> {
        let path = Self::products_path(page, per_page);
        self.send_request(Method::GET, &path, None, None).await
    }

    /// # Errors
    ///
    /// See [`TagPlusClient::send_request`].
    pub async fn retrieve_product(&self, id: i64) -> Result<VendorProduct, ClientError> {
        self.send_request(Method::GET, &format!("/produtos/{id}"), None, None)
            .await
    }

    /// # Errors
    ///
    /// See [`TagPlusClient::send_request`].
    pub async fn retrieve_categories(&self) -> Result<Vec<VendorCategory>, ClientError> {
        self.send_request(Method::GET, "/categorias", None, None)
            .await
    }

    /// # Errors
    ///
    /// See [`TagPlusClient::send_request`].
    pub async fn retrieve_category(&self, id: i64) -> Result<VendorCategory, ClientError> {
        self.send_request(Method::GET, &format!("/categorias/{id}"), None, None)
            .await
    }

    /// # Errors
    ///
    /// See [`TagPlusClient::send_request`].
    pub async fn retrieve_product_images(
        &self,
        product_id: i64,
    ) -> Result<Vec<ProductImage>, ClientError> {
        self.send_request(
            Method::GET,
            &format!("/produtos/imagens/{product_id}"),
            None,
            None,
        )
        .await
    }

    pub(super) fn products_path(page: u32, per_page: u32) -> String {
        format!(
            "/produtos?page={page}&per_page={per_page}&fields={}&ativo=1&sincroniza=1&sort=-data_alteracao",
            PRODUCT_FIELDS.join(",")
        )
    }
}
