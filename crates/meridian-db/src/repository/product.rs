//! # Product Repository
//!
//! Product rows and online-listing resolution.
//!
//! ## Resolution Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Storefront line item: { online_product_id, quantity }                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  resolve_online_product(id)                                            │
//! │       │                                                                 │
//! │       ├── Some(ResolvedOnlineProduct) ── backing product id + the      │
//! │       │                                  listing's display metadata    │
//! │       │                                  (snapshotted onto the line)   │
//! │       │                                                                 │
//! │       └── None ── RECOVERABLE: the orchestrator reports it as an       │
//! │                   "available: 0" shortfall, never a crash              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::{OnlineProduct, Product};

/// An online listing resolved to its backing product, with the metadata
/// order lines snapshot.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResolvedOnlineProduct {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub price_cents: i64,
}

/// Repository for product rows.
///
/// Methods take an explicit connection so callers can compose them inside
/// their own transaction.
pub struct ProductRepository;

impl ProductRepository {
    /// Inserts a product.
    pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, sku, name, price_cents,
                base_unit, conversion_unit, units_per_conversion,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(&product.base_unit)
        .bind(&product.conversion_unit)
        .bind(product.units_per_conversion)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts an online listing.
    pub async fn insert_online(
        conn: &mut SqliteConnection,
        listing: &OnlineProduct,
    ) -> DbResult<()> {
        debug!(id = %listing.id, product_id = %listing.product_id, "Inserting online product");

        sqlx::query(
            r#"
            INSERT INTO online_products (
                id, online_store_id, product_id, name, sku, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&listing.id)
        .bind(&listing.online_store_id)
        .bind(&listing.product_id)
        .bind(&listing.name)
        .bind(&listing.sku)
        .bind(listing.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, tenant_id, sku, name, price_cents,
                base_unit, conversion_unit, units_per_conversion,
                is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }

    /// Resolves an online listing to its backing product.
    ///
    /// `None` when either the listing or its backing product is missing or
    /// inactive; callers treat that as "unavailable", not an error.
    pub async fn resolve_online_product(
        conn: &mut SqliteConnection,
        online_product_id: &str,
    ) -> DbResult<Option<ResolvedOnlineProduct>> {
        let resolved = sqlx::query_as::<_, ResolvedOnlineProduct>(
            r#"
            SELECT
                p.id as product_id,
                op.name,
                op.sku,
                p.price_cents
            FROM online_products op
            INNER JOIN products p ON p.id = op.product_id
            WHERE op.id = ?1 AND p.is_active = 1
            "#,
        )
        .bind(online_product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(resolved)
    }
}
