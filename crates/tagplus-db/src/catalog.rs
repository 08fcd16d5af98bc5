//! Postgres-backed catalog: collections, products, options, variants and
//! variant prices. Every write goes through one [`PgCatalogTransaction`].

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tagplus_core::{
    Catalog, CatalogTransaction, Collection, CollectionInput, CollectionStore, CollectionUpdate,
    Metadata, MoneyAmount, OptionValueInput, Product, ProductInput, ProductOption, ProductStatus,
    ProductStore, ProductUpdate, StoreError, StoreResult, Tx, Variant, VariantInput,
    VariantOptionValue, VariantStore, VariantUpdate, LEGACY_VENDOR_ID_KEY, VENDOR_ID_KEY,
};
use uuid::Uuid;

use crate::store_error;

const COLLECTION_COLUMNS: &str = "id, title, handle, metadata, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, title, subtitle, description, handle, is_giftcard, \
     discountable, weight, height, length, width, status, external_id, collection_id, \
     profile_id, metadata, images";

const VARIANT_COLUMNS: &str = "id, product_id, title, sku, barcode, ean, upc, \
     inventory_quantity, allow_backorder, manage_inventory, weight, options, metadata";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
struct CollectionRow {
    id: Uuid,
    title: String,
    handle: String,
    metadata: Json<Metadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CollectionRow> for Collection {
    fn from(row: CollectionRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            handle: row.handle,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    title: String,
    subtitle: Option<String>,
    description: Option<String>,
    handle: Option<String>,
    is_giftcard: bool,
    discountable: bool,
    weight: Option<f64>,
    height: Option<f64>,
    length: Option<f64>,
    width: Option<f64>,
    /// `draft`, `proposed`, `published` or `rejected` (CHECK constraint).
    status: String,
    external_id: Option<String>,
    collection_id: Option<Uuid>,
    profile_id: Option<Uuid>,
    metadata: Json<Metadata>,
    images: Vec<String>,
}

impl ProductRow {
    fn into_product(
        self,
        options: Vec<ProductOption>,
        variants: Vec<Variant>,
    ) -> StoreResult<Product> {
        let status = ProductStatus::from_str(&self.status)
            .map_err(|reason| StoreError::Backend(reason.into()))?;
        Ok(Product {
            id: self.id,
            title: self.title,
            subtitle: self.subtitle,
            description: self.description,
            handle: self.handle,
            is_giftcard: self.is_giftcard,
            discountable: self.discountable,
            weight: self.weight,
            height: self.height,
            length: self.length,
            width: self.width,
            status,
            external_id: self.external_id,
            collection_id: self.collection_id,
            profile_id: self.profile_id,
            metadata: self.metadata.0,
            images: self.images,
            options,
            variants,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct OptionRow {
    id: Uuid,
    title: String,
    option_values: Json<Vec<OptionValueInput>>,
    metadata: Json<Metadata>,
}

impl From<OptionRow> for ProductOption {
    fn from(row: OptionRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            values: row.option_values.0.into_iter().map(|v| v.value).collect(),
            metadata: row.metadata.0,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct VariantRow {
    id: Uuid,
    product_id: Uuid,
    title: String,
    sku: Option<String>,
    barcode: Option<String>,
    ean: Option<String>,
    upc: Option<String>,
    inventory_quantity: i64,
    allow_backorder: bool,
    manage_inventory: bool,
    weight: Option<f64>,
    options: Json<Vec<VariantOptionValue>>,
    metadata: Json<Metadata>,
}

impl VariantRow {
    fn into_variant(self, prices: Vec<MoneyAmount>) -> Variant {
        Variant {
            id: self.id,
            product_id: self.product_id,
            title: self.title,
            sku: self.sku,
            barcode: self.barcode,
            ean: self.ean,
            upc: self.upc,
            prices,
            inventory_quantity: self.inventory_quantity,
            allow_backorder: self.allow_backorder,
            manage_inventory: self.manage_inventory,
            weight: self.weight,
            options: self.options.0,
            metadata: self.metadata.0,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct PriceRow {
    variant_id: Uuid,
    currency_code: String,
    amount: i64,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

/// Every collection and product in the catalog, as read outside a transaction.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub collections: Vec<Collection>,
    pub products: Vec<Product>,
}

impl PgCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reads all collections and all products with their options, variants
    /// and prices, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if any query fails.
    pub async fn snapshot(&self) -> StoreResult<CatalogSnapshot> {
        let mut conn = self.pool.acquire().await.map_err(store_error)?;

        let collections: Vec<Collection> = sqlx::query_as::<_, CollectionRow>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections ORDER BY created_at, id"
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(Collection::from)
        .collect();

        let product_ids =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM products ORDER BY created_at, id")
                .fetch_all(&mut *conn)
                .await
                .map_err(store_error)?;
        let mut products = Vec::with_capacity(product_ids.len());
        for id in product_ids {
            if let Some(product) = load_product(&mut *conn, id).await? {
                products.push(product);
            }
        }

        tracing::debug!(
            collections = collections.len(),
            products = products.len(),
            "catalog snapshot loaded"
        );
        Ok(CatalogSnapshot {
            collections,
            products,
        })
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn begin(&self) -> StoreResult<Box<Tx>> {
        let tx = self.pool.begin().await.map_err(store_error)?;
        Ok(Box::new(PgCatalogTransaction { tx: Some(tx) }))
    }
}

/// An open Postgres transaction. Dropping it without `commit` rolls back.
pub struct PgCatalogTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgCatalogTransaction {
    fn conn(&mut self) -> StoreResult<&mut PgConnection> {
        self.tx.as_deref_mut().ok_or_else(closed)
    }
}

fn closed() -> StoreError {
    StoreError::Conflict("transaction already closed".to_string())
}

#[async_trait]
impl CatalogTransaction for PgCatalogTransaction {
    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or_else(closed)?;
        tx.commit().await.map_err(store_error)
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or_else(closed)?;
        tx.rollback().await.map_err(store_error)
    }
}

// ---------------------------------------------------------------------------
// collections
// ---------------------------------------------------------------------------

#[async_trait]
impl CollectionStore for PgCatalogTransaction {
    async fn find_collection_by_handle(
        &mut self,
        handle: &str,
    ) -> StoreResult<Option<Collection>> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections \
             WHERE handle = $1 \
             ORDER BY created_at, id \
             LIMIT 1"
        ))
        .bind(handle)
        .fetch_optional(&mut *conn)
        .await
        .map_err(store_error)?;

        Ok(row.map(Collection::from))
    }

    async fn find_collection_by_vendor_id(
        &mut self,
        vendor_id: i64,
    ) -> StoreResult<Option<Collection>> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections \
             WHERE metadata ->> $2 = $1 \
                OR (metadata -> $2 IS NULL AND metadata ->> $3 = $1) \
             ORDER BY created_at, id \
             LIMIT 1"
        ))
        .bind(vendor_id.to_string())
        .bind(VENDOR_ID_KEY)
        .bind(LEGACY_VENDOR_ID_KEY)
        .fetch_optional(&mut *conn)
        .await
        .map_err(store_error)?;

        Ok(row.map(Collection::from))
    }

    async fn create_collection(&mut self, input: &CollectionInput) -> StoreResult<Collection> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "INSERT INTO collections (id, title, handle, metadata) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLLECTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&input.title)
        .bind(&input.handle)
        .bind(Json(&input.metadata))
        .fetch_one(&mut *conn)
        .await
        .map_err(store_error)?;

        Ok(row.into())
    }

    async fn update_collection(
        &mut self,
        id: Uuid,
        update: &CollectionUpdate,
    ) -> StoreResult<Collection> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "UPDATE collections \
             SET title    = COALESCE($2, title), \
                 handle   = COALESCE($3, handle), \
                 metadata = COALESCE($4, metadata), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLLECTION_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.handle)
        .bind(update.metadata.as_ref().map(Json))
        .fetch_optional(&mut *conn)
        .await
        .map_err(store_error)?
        .ok_or_else(|| StoreError::not_found("collection", id))?;

        Ok(row.into())
    }
}

// ---------------------------------------------------------------------------
// products
// ---------------------------------------------------------------------------

async fn load_product(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Product>> {
    let Some(row) = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(store_error)?
    else {
        return Ok(None);
    };

    let options = sqlx::query_as::<_, OptionRow>(
        "SELECT id, title, option_values, metadata \
         FROM product_options \
         WHERE product_id = $1 \
         ORDER BY position, id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(store_error)?
    .into_iter()
    .map(ProductOption::from)
    .collect();

    let variant_rows = sqlx::query_as::<_, VariantRow>(&format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants \
         WHERE product_id = $1 \
         ORDER BY created_at, id"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(store_error)?;
    let variants = with_prices(conn, variant_rows).await?;

    row.into_product(options, variants).map(Some)
}

#[async_trait]
impl ProductStore for PgCatalogTransaction {
    async fn find_product_by_external_id(
        &mut self,
        external_id: &str,
    ) -> StoreResult<Option<Product>> {
        let conn = self.conn()?;
        let id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM products \
             WHERE external_id = $1 \
             ORDER BY created_at, id \
             LIMIT 1",
        )
        .bind(external_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(store_error)?;

        match id {
            Some(id) => load_product(conn, id).await,
            None => Ok(None),
        }
    }

    async fn retrieve_product(&mut self, id: Uuid) -> StoreResult<Product> {
        let conn = self.conn()?;
        load_product(conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    async fn create_product(&mut self, input: &ProductInput) -> StoreResult<Product> {
        let conn = self.conn()?;
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO products \
                 (id, title, subtitle, description, handle, is_giftcard, discountable, \
                  weight, height, length, width, status, external_id, collection_id, \
                  profile_id, metadata, images) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.subtitle)
        .bind(&input.description)
        .bind(&input.handle)
        .bind(input.is_giftcard)
        .bind(input.discountable)
        .bind(input.weight)
        .bind(input.height)
        .bind(input.length)
        .bind(input.width)
        .bind(input.status.as_str())
        .bind(&input.external_id)
        .bind(input.collection_id)
        .bind(input.profile_id)
        .bind(Json(&input.metadata))
        .bind(&input.images)
        .execute(&mut *conn)
        .await
        .map_err(store_error)?;

        for (position, option) in (0_i32..).zip(&input.options) {
            sqlx::query(
                "INSERT INTO product_options \
                     (id, product_id, title, option_values, metadata, position) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(&option.title)
            .bind(Json(&option.values))
            .bind(Json(&option.metadata))
            .bind(position)
            .execute(&mut *conn)
            .await
            .map_err(store_error)?;
        }

        load_product(conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    async fn update_product(&mut self, id: Uuid, update: &ProductUpdate) -> StoreResult<()> {
        let conn = self.conn()?;
        let mut product = load_product(&mut *conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found("product", id))?;
        product.apply(update);

        sqlx::query(
            "UPDATE products \
             SET title = $2, subtitle = $3, description = $4, handle = $5, \
                 is_giftcard = $6, discountable = $7, weight = $8, height = $9, \
                 length = $10, width = $11, status = $12, external_id = $13, \
                 collection_id = $14, metadata = $15, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&product.title)
        .bind(&product.subtitle)
        .bind(&product.description)
        .bind(&product.handle)
        .bind(product.is_giftcard)
        .bind(product.discountable)
        .bind(product.weight)
        .bind(product.height)
        .bind(product.length)
        .bind(product.width)
        .bind(product.status.as_str())
        .bind(&product.external_id)
        .bind(product.collection_id)
        .bind(Json(&product.metadata))
        .execute(&mut *conn)
        .await
        .map_err(store_error)?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// product_variants / variant_prices
// ---------------------------------------------------------------------------

/// Attaches prices, ordered by currency code, to each variant row.
async fn with_prices(conn: &mut PgConnection, rows: Vec<VariantRow>) -> StoreResult<Vec<Variant>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let price_rows = sqlx::query_as::<_, PriceRow>(
        "SELECT variant_id, currency_code, amount \
         FROM variant_prices \
         WHERE variant_id = ANY($1) \
         ORDER BY currency_code",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(store_error)?;

    let mut prices: HashMap<Uuid, Vec<MoneyAmount>> = HashMap::new();
    for price in price_rows {
        prices.entry(price.variant_id).or_default().push(MoneyAmount {
            currency_code: price.currency_code,
            amount: price.amount,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let variant_prices = prices.remove(&row.id).unwrap_or_default();
            row.into_variant(variant_prices)
        })
        .collect())
}

async fn load_variant(conn: &mut PgConnection, id: Uuid) -> StoreResult<Option<Variant>> {
    let rows = sqlx::query_as::<_, VariantRow>(&format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(store_error)?;

    Ok(with_prices(conn, rows).await?.into_iter().next())
}

/// Replaces the variant's price list.
async fn write_prices(
    conn: &mut PgConnection,
    variant_id: Uuid,
    prices: &[MoneyAmount],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM variant_prices WHERE variant_id = $1")
        .bind(variant_id)
        .execute(&mut *conn)
        .await
        .map_err(store_error)?;

    for price in prices {
        sqlx::query(
            "INSERT INTO variant_prices (variant_id, currency_code, amount) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (variant_id, currency_code) DO UPDATE SET amount = EXCLUDED.amount",
        )
        .bind(variant_id)
        .bind(&price.currency_code)
        .bind(price.amount)
        .execute(&mut *conn)
        .await
        .map_err(store_error)?;
    }
    Ok(())
}

#[async_trait]
impl VariantStore for PgCatalogTransaction {
    async fn find_variant_by_sku(&mut self, sku: &str) -> StoreResult<Option<Variant>> {
        let conn = self.conn()?;
        let rows = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE sku = $1"
        ))
        .bind(sku)
        .fetch_all(&mut *conn)
        .await
        .map_err(store_error)?;

        Ok(with_prices(conn, rows).await?.into_iter().next())
    }

    async fn create_variant(
        &mut self,
        product_id: Uuid,
        input: &VariantInput,
    ) -> StoreResult<Variant> {
        let conn = self.conn()?;
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO product_variants \
                 (id, product_id, title, sku, barcode, ean, upc, inventory_quantity, \
                  allow_backorder, manage_inventory, weight, options, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(id)
        .bind(product_id)
        .bind(&input.title)
        .bind(&input.sku)
        .bind(&input.barcode)
        .bind(&input.ean)
        .bind(&input.upc)
        .bind(input.inventory_quantity)
        .bind(input.allow_backorder)
        .bind(input.manage_inventory)
        .bind(input.weight)
        .bind(Json(&input.options))
        .bind(Json(&input.metadata))
        .execute(&mut *conn)
        .await
        .map_err(store_error)?;

        write_prices(&mut *conn, id, &input.prices).await?;

        load_variant(conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found("variant", id))
    }

    async fn update_variant(&mut self, id: Uuid, update: &VariantUpdate) -> StoreResult<()> {
        let conn = self.conn()?;
        let mut variant = load_variant(&mut *conn, id)
            .await?
            .ok_or_else(|| StoreError::not_found("variant", id))?;
        variant.apply(update);

        sqlx::query(
            "UPDATE product_variants \
             SET title = $2, sku = $3, barcode = $4, ean = $5, upc = $6, \
                 inventory_quantity = $7, allow_backorder = $8, manage_inventory = $9, \
                 weight = $10, metadata = $11, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&variant.title)
        .bind(&variant.sku)
        .bind(&variant.barcode)
        .bind(&variant.ean)
        .bind(&variant.upc)
        .bind(variant.inventory_quantity)
        .bind(variant.allow_backorder)
        .bind(variant.manage_inventory)
        .bind(variant.weight)
        .bind(Json(&variant.metadata))
        .execute(&mut *conn)
        .await
        .map_err(store_error)?;

        if update.prices.is_some() {
            write_prices(conn, id, &variant.prices).await?;
        }
        Ok(())
    }
}
