//! TagPlus API v2 response types.
//!
//! ## Observed shape
//!
//! ### Flags
//! `ativo`, `sincroniza` and `padrao` arrive as `1`/`0` on most accounts but
//! as JSON booleans on others. [`de::flag`] accepts either, plus `"1"`.
//!
//! ### Nulls
//! Optional text fields (`descricao_curta`, `descricao_longa`, `codigo_barras`)
//! are explicit `null` rather than omitted. Lists such as `imagens` and
//! `fornecedores` may also be `null` on freshly created products.
//!
//! ### Numbers
//! Prices, dimensions and stock counts are JSON numbers, but older accounts
//! return decimal strings (`"19.90"`). Both are accepted.
//!
//! ### `imagens`
//! Usually a list of URL strings. Some accounts return objects with a `url`
//! key instead; [`VendorProduct::image_urls`] flattens both.

use serde::{Deserialize, Serialize};

/// A product from `GET /produtos` or `GET /produtos/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VendorProduct {
    pub id: i64,

    #[serde(rename = "ativo", default, deserialize_with = "de::flag")]
    pub active: bool,

    #[serde(rename = "sincroniza", default, deserialize_with = "de::flag")]
    pub syncs: bool,

    /// SKU-like product code.
    #[serde(rename = "codigo", default)]
    pub code: Option<String>,

    #[serde(rename = "codigo_grade", default)]
    pub grid_code: Option<String>,

    #[serde(rename = "codigo_barras", default)]
    pub barcode: Option<String>,

    #[serde(rename = "descricao", default, deserialize_with = "de::null_default")]
    pub description: String,

    #[serde(rename = "descricao_curta", default)]
    pub short_description: Option<String>,

    #[serde(rename = "descricao_longa", default)]
    pub long_description: Option<String>,

    #[serde(rename = "estoque", default, deserialize_with = "de::null_default")]
    pub stock: Stock,

    #[serde(rename = "categoria", default)]
    pub category: Option<CategoryRef>,

    /// Last-modified timestamp as sent by TagPlus (`YYYY-MM-DD HH:MM:SS`).
    #[serde(rename = "data_alteracao", default)]
    pub modified_at: Option<String>,

    #[serde(rename = "data_validade", default)]
    pub expires_on: Option<String>,

    #[serde(rename = "imagem_principal", default)]
    pub main_image: Option<MainImage>,

    #[serde(rename = "imagens", default, deserialize_with = "de::null_default")]
    pub images: Vec<serde_json::Value>,

    #[serde(rename = "peso", default, deserialize_with = "de::opt_number")]
    pub weight: Option<f64>,

    #[serde(rename = "largura", default, deserialize_with = "de::opt_number")]
    pub width: Option<f64>,

    #[serde(rename = "altura", default, deserialize_with = "de::opt_number")]
    pub height: Option<f64>,

    #[serde(rename = "comprimento", default, deserialize_with = "de::opt_number")]
    pub length: Option<f64>,

    #[serde(rename = "valores_venda", default, deserialize_with = "de::null_default")]
    pub sell_values: Vec<SellValue>,

    /// Retail price in reais.
    #[serde(rename = "valor_venda_varejo", default, deserialize_with = "de::number")]
    pub retail_price: f64,

    /// Linked sub-items; non-empty for configurable products. The payload is
    /// kept opaque since no import path expands it.
    #[serde(rename = "itens_vinculados", default, deserialize_with = "de::null_default")]
    pub linked_items: Vec<serde_json::Value>,

    #[serde(rename = "fornecedores", default, deserialize_with = "de::null_default")]
    pub suppliers: Vec<Supplier>,
}

impl VendorProduct {
    /// Image URLs from `imagens`, in vendor order.
    #[must_use]
    pub fn image_urls(&self) -> Vec<String> {
        self.images
            .iter()
            .filter_map(|image| match image {
                serde_json::Value::String(url) => Some(url.clone()),
                serde_json::Value::Object(fields) => fields
                    .get("url")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned),
                _ => None,
            })
            .filter(|url| !url.trim().is_empty())
            .collect()
    }

    #[must_use]
    pub fn is_configurable(&self) -> bool {
        !self.linked_items.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Stock {
    #[serde(rename = "qtd_revenda", default, deserialize_with = "de::number")]
    pub resale_quantity: f64,
    #[serde(rename = "qtd_min", default, deserialize_with = "de::number")]
    pub minimum: f64,
    #[serde(rename = "qtd_max", default, deserialize_with = "de::number")]
    pub maximum: f64,
    #[serde(rename = "qtd_consumo", default, deserialize_with = "de::number")]
    pub consumption: f64,
    #[serde(rename = "qtd_imobilizado", default, deserialize_with = "de::number")]
    pub fixed_assets: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryRef {
    pub id: i64,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MainImage {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "principal", default, deserialize_with = "de::flag")]
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SellValue {
    pub id: i64,
    #[serde(rename = "tipo_valor_venda", default)]
    pub kind: Option<SellValueKind>,
    #[serde(rename = "valor_venda", default, deserialize_with = "de::number")]
    pub price: f64,
    #[serde(rename = "lucro_utilizado", default, deserialize_with = "de::number")]
    pub margin_used: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SellValueKind {
    pub id: i64,
    #[serde(rename = "nome", default, deserialize_with = "de::null_default")]
    pub name: String,
    #[serde(rename = "padrao", default, deserialize_with = "de::flag")]
    pub is_default: bool,
    #[serde(rename = "lucro", default, deserialize_with = "de::number")]
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Supplier {
    pub id: i64,
    #[serde(rename = "razao_social", default)]
    pub legal_name: Option<String>,
    #[serde(rename = "nome_fantasia", default)]
    pub trade_name: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub cnpj: Option<String>,
    #[serde(rename = "ativo", default, deserialize_with = "de::flag")]
    pub active: bool,
}

/// A category from `GET /categorias` or `GET /categorias/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VendorCategory {
    pub id: i64,
    #[serde(rename = "descricao", default, deserialize_with = "de::null_default")]
    pub description: String,
    #[serde(rename = "localizacao", default)]
    pub location: Option<String>,
    #[serde(rename = "tipo", default)]
    pub kind: Option<String>,
    #[serde(rename = "categoria_mae", default)]
    pub parent: Option<ParentCategory>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParentCategory {
    pub id: i64,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "localizacao", default)]
    pub location: Option<String>,
}

/// An image from `GET /produtos/imagens/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductImage {
    #[serde(deserialize_with = "de::id_string")]
    pub id: String,
    #[serde(rename = "principal", default, deserialize_with = "de::flag")]
    pub primary: bool,
    #[serde(rename = "extensao", default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub base64: Option<String>,
}

/// Option descriptor for configurable products (e.g. "Tamanho" with P/M/G).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VendorOption {
    pub id: i64,
    #[serde(rename = "descricao", default, deserialize_with = "de::null_default")]
    pub name: String,
    #[serde(rename = "valores", default, deserialize_with = "de::null_default")]
    pub values: Vec<VendorOptionValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VendorOptionValue {
    pub id: i64,
    #[serde(rename = "descricao", default, deserialize_with = "de::null_default")]
    pub name: String,
}

/// Payload of `POST /oauth2/token`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(deserialize_with = "de::integer")]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Result of checking (and possibly refreshing) the stored token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub is_authorized: bool,
    pub access_token: Option<String>,
}

pub(crate) mod de {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
    }

    fn parse_decimal_text<E: Error>(text: &str) -> Result<f64, E> {
        text.trim()
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|e| E::custom(format!("invalid number {text:?}: {e}")))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Option::<Loose>::deserialize(d)? {
            Some(Loose::Bool(value)) => value,
            Some(Loose::Int(value)) => value != 0,
            Some(Loose::Float(value)) => value.abs() > f64::EPSILON,
            Some(Loose::Text(value)) => matches!(value.trim(), "1" | "true" | "S"),
            None => false,
        })
    }

    pub fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Option::<Loose>::deserialize(d)? {
            #[allow(clippy::cast_precision_loss)]
            Some(Loose::Int(value)) => Ok(Some(value as f64)),
            Some(Loose::Float(value)) => Ok(Some(value)),
            Some(Loose::Text(value)) if value.trim().is_empty() => Ok(None),
            Some(Loose::Text(value)) => parse_decimal_text(&value).map(Some),
            Some(Loose::Bool(_)) => Err(D::Error::custom("expected a number, got a boolean")),
            None => Ok(None),
        }
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        opt_number(d).map(Option::unwrap_or_default)
    }

    pub fn integer<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match Loose::deserialize(d)? {
            Loose::Int(value) => Ok(value),
            #[allow(clippy::cast_possible_truncation)]
            Loose::Float(value) => Ok(value as i64),
            Loose::Text(value) => value
                .trim()
                .parse::<i64>()
                .map_err(|e| D::Error::custom(format!("invalid integer {value:?}: {e}"))),
            Loose::Bool(_) => Err(D::Error::custom("expected an integer, got a boolean")),
        }
    }

    pub fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        match Loose::deserialize(d)? {
            Loose::Int(value) => Ok(value.to_string()),
            Loose::Text(value) => Ok(value),
            Loose::Float(_) | Loose::Bool(_) => Err(D::Error::custom("expected an id")),
        }
    }

    pub fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Option::<T>::deserialize(d).map(Option::unwrap_or_default)
    }
}
