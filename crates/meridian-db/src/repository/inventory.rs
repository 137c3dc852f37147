//! # Stock Conversion Service
//!
//! The legacy aggregate inventory accessor used by the in-store POS sales
//! path. Operates on ONE `inventory_records` row per (product, store)
//! rather than discrete lots, with unit-conversion bookkeeping.
//!
//! ## Two Stock Representations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Lot Ledger (online orders)        Stock Conversion (POS sales)        │
//! │  ─────────────────────────         ──────────────────────────          │
//! │  discrete purchase lots            one aggregate row                   │
//! │  per-batch cost tracking           conversion/base unit pair           │
//! │  FIFO deduction                    scalar check-and-deduct             │
//! │                                                                         │
//! │  Both must stay individually consistent. They are NOT reconciled      │
//! │  here; a separate sync job aligns them outside this workspace.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Unit Model
//! Stock is canonically held in base units. One conversion unit equals
//! `units_per_conversion` base units; `conversion_unit_stock` is
//! kept in step as `base_unit_stock / units_per_conversion`. A manual
//! adjustment overwrites both fields verbatim (operator truth wins).
//!
//! Every mutation appends a [`ConversionLog`] row (before/after on both
//! units) in the same transaction as the stock write.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::repository::product::ProductRepository;
use meridian_core::validation::{validate_quantity, validate_stock_level};
use meridian_core::{
    ConversionLog, ConversionLogType, CoreError, InventoryRecord, Product, Shortfall, StockUnit,
};

/// Unit-aware aggregate stock accessor for the POS path.
#[derive(Debug, Clone)]
pub struct StockConversionService {
    pool: SqlitePool,
}

impl StockConversionService {
    /// Creates a new StockConversionService.
    pub fn new(pool: SqlitePool) -> Self {
        StockConversionService { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Available stock in the requested unit. Zero when no record exists.
    pub async fn check_available(
        &self,
        product_id: &str,
        store_id: &str,
        unit: StockUnit,
    ) -> ServiceResult<i64> {
        let mut conn = self.pool.acquire().await?;
        let record = get_record(&mut *conn, product_id, store_id).await?;

        Ok(record.map_or(0, |r| stock_in_unit(&r, unit)))
    }

    /// Human-readable stock line for display, e.g. `"2 box 5 piece"`.
    ///
    /// Read-only; collapses to the base unit alone when the product has no
    /// pack size.
    pub async fn display_text(&self, product_id: &str, store_id: &str) -> ServiceResult<String> {
        let mut conn = self.pool.acquire().await?;
        let product = load_product(&mut *conn, product_id).await?;
        let record = get_record(&mut *conn, product_id, store_id).await?;

        let (conversion, base) =
            record.map_or((0, 0), |r| (r.conversion_unit_stock, r.base_unit_stock));

        if product.conversion_factor() <= 1 {
            return Ok(format!("{} {}", base, product.base_unit));
        }

        let loose = base - conversion * product.conversion_factor();
        Ok(format!(
            "{} {} {} {}",
            conversion, product.conversion_unit, loose, product.base_unit
        ))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Deducts stock for a POS sale.
    ///
    /// Fails with [`CoreError::InsufficientStock`] - carrying requested,
    /// available, and the unit - when the record does not cover the
    /// quantity. The stock write and its audit log commit atomically.
    pub async fn deduct(
        &self,
        product_id: &str,
        store_id: &str,
        quantity: i64,
        unit: StockUnit,
        sale_ref: Option<&str>,
    ) -> ServiceResult<(InventoryRecord, Vec<ConversionLog>)> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let product = load_product(&mut *tx, product_id).await?;
        let record = get_record(&mut *tx, product_id, store_id).await?;

        let record = match record {
            Some(r) if quantity <= stock_in_unit(&r, unit) => r,
            short => {
                let available = short.map_or(0, |r| stock_in_unit(&r, unit));
                return Err(ServiceError::Domain(CoreError::InsufficientStock {
                    shortfalls: vec![Shortfall {
                        product_id: Some(product_id.to_string()),
                        product_name: product.name.clone(),
                        requested: quantity,
                        available,
                        unit: Some(unit_name(&product, unit).to_string()),
                    }],
                }));
            }
        };

        let base_delta = to_base_units(quantity, unit, product.conversion_factor());
        let new_base = record.base_unit_stock - base_delta;
        let new_conversion = new_base / product.conversion_factor();

        let updated = write_stock(&mut *tx, &record, new_conversion, new_base).await?;
        let log = append_log(
            &mut *tx,
            &record,
            &updated,
            ConversionLogType::AutoDeduct,
            sale_ref,
            None,
        )
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            store_id = %store_id,
            quantity,
            unit = ?unit,
            "POS stock deducted"
        );

        Ok((updated, vec![log]))
    }

    /// Restores previously deducted stock.
    ///
    /// Always succeeds: restoring only increases stock, so there is no
    /// lower bound to violate. Creates the record if it has vanished.
    pub async fn restore(
        &self,
        product_id: &str,
        store_id: &str,
        quantity: i64,
        unit: StockUnit,
    ) -> ServiceResult<InventoryRecord> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let product = load_product(&mut *tx, product_id).await?;
        let record = get_or_create_record(&mut *tx, product_id, store_id).await?;

        let base_delta = to_base_units(quantity, unit, product.conversion_factor());
        let new_base = record.base_unit_stock + base_delta;
        let new_conversion = new_base / product.conversion_factor();

        let updated = write_stock(&mut *tx, &record, new_conversion, new_base).await?;
        append_log(
            &mut *tx,
            &record,
            &updated,
            ConversionLogType::AutoDeduct,
            None,
            Some("restore"),
        )
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Adds received stock: creates the record if absent, else increments.
    pub async fn add(
        &self,
        product_id: &str,
        store_id: &str,
        quantity: i64,
        unit: StockUnit,
        notes: Option<&str>,
    ) -> ServiceResult<InventoryRecord> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let product = load_product(&mut *tx, product_id).await?;
        let record = get_or_create_record(&mut *tx, product_id, store_id).await?;

        let base_delta = to_base_units(quantity, unit, product.conversion_factor());
        let new_base = record.base_unit_stock + base_delta;
        let new_conversion = new_base / product.conversion_factor();

        let updated = write_stock(&mut *tx, &record, new_conversion, new_base).await?;
        append_log(
            &mut *tx,
            &record,
            &updated,
            ConversionLogType::AutoDeduct,
            None,
            notes.or(Some("add")),
        )
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Idempotent record creation.
    ///
    /// Returns the existing record untouched when one is already present;
    /// otherwise creates it holding `initial_stock` of `unit`.
    pub async fn initialize(
        &self,
        product_id: &str,
        store_id: &str,
        initial_stock: i64,
        unit: StockUnit,
    ) -> ServiceResult<InventoryRecord> {
        validate_stock_level(initial_stock, "initial_stock")?;

        let mut tx = self.pool.begin().await?;

        let product = load_product(&mut *tx, product_id).await?;
        if let Some(existing) = get_record(&mut *tx, product_id, store_id).await? {
            return Ok(existing);
        }

        let created = get_or_create_record(&mut *tx, product_id, store_id).await?;

        if initial_stock > 0 {
            let base = to_base_units(initial_stock, unit, product.conversion_factor());
            let conversion = base / product.conversion_factor();
            let updated = write_stock(&mut *tx, &created, conversion, base).await?;
            append_log(
                &mut *tx,
                &created,
                &updated,
                ConversionLogType::AutoDeduct,
                None,
                Some("initialize"),
            )
            .await?;
            tx.commit().await?;
            return Ok(updated);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Operator stock correction: overwrites BOTH unit fields verbatim
    /// (not a delta) and records a `manual_adjust` audit entry.
    pub async fn adjust_manual(
        &self,
        product_id: &str,
        store_id: &str,
        new_conversion_stock: i64,
        new_base_stock: i64,
        reason: &str,
    ) -> ServiceResult<(InventoryRecord, ConversionLog)> {
        validate_stock_level(new_conversion_stock, "conversion_unit_stock")?;
        validate_stock_level(new_base_stock, "base_unit_stock")?;

        let mut tx = self.pool.begin().await?;

        // Product must exist even though the factor is not consulted here.
        load_product(&mut *tx, product_id).await?;
        let record = get_or_create_record(&mut *tx, product_id, store_id).await?;

        let updated = write_stock(&mut *tx, &record, new_conversion_stock, new_base_stock).await?;
        let log = append_log(
            &mut *tx,
            &record,
            &updated,
            ConversionLogType::ManualAdjust,
            None,
            Some(reason),
        )
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            store_id = %store_id,
            conversion = new_conversion_stock,
            base = new_base_stock,
            "Manual stock adjustment"
        );

        Ok((updated, log))
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

fn to_base_units(quantity: i64, unit: StockUnit, units_per_conversion: i64) -> i64 {
    match unit {
        StockUnit::Base => quantity,
        StockUnit::Conversion => quantity * units_per_conversion,
    }
}

fn stock_in_unit(record: &InventoryRecord, unit: StockUnit) -> i64 {
    match unit {
        StockUnit::Base => record.base_unit_stock,
        StockUnit::Conversion => record.conversion_unit_stock,
    }
}

fn unit_name(product: &Product, unit: StockUnit) -> &str {
    match unit {
        StockUnit::Base => &product.base_unit,
        StockUnit::Conversion => &product.conversion_unit,
    }
}

async fn load_product(conn: &mut SqliteConnection, product_id: &str) -> ServiceResult<Product> {
    ProductRepository::get_by_id(conn, product_id)
        .await?
        .ok_or_else(|| ServiceError::Domain(CoreError::ProductNotFound(product_id.to_string())))
}

async fn get_record(
    conn: &mut SqliteConnection,
    product_id: &str,
    store_id: &str,
) -> ServiceResult<Option<InventoryRecord>> {
    let record = sqlx::query_as::<_, InventoryRecord>(
        r#"
        SELECT
            id, product_id, store_id,
            conversion_unit_stock, base_unit_stock,
            created_at, updated_at
        FROM inventory_records
        WHERE product_id = ?1 AND store_id = ?2
        "#,
    )
    .bind(product_id)
    .bind(store_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(ServiceError::from)?;

    Ok(record)
}

async fn get_or_create_record(
    conn: &mut SqliteConnection,
    product_id: &str,
    store_id: &str,
) -> ServiceResult<InventoryRecord> {
    if let Some(existing) = get_record(conn, product_id, store_id).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let record = InventoryRecord {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        store_id: store_id.to_string(),
        conversion_unit_stock: 0,
        base_unit_stock: 0,
        created_at: now,
        updated_at: now,
    };

    debug!(product_id = %product_id, store_id = %store_id, "Initializing inventory record");

    sqlx::query(
        r#"
        INSERT INTO inventory_records (
            id, product_id, store_id,
            conversion_unit_stock, base_unit_stock,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&record.id)
    .bind(&record.product_id)
    .bind(&record.store_id)
    .bind(record.conversion_unit_stock)
    .bind(record.base_unit_stock)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(ServiceError::from)?;

    Ok(record)
}

async fn write_stock(
    conn: &mut SqliteConnection,
    record: &InventoryRecord,
    conversion_unit_stock: i64,
    base_unit_stock: i64,
) -> ServiceResult<InventoryRecord> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE inventory_records
        SET conversion_unit_stock = ?2, base_unit_stock = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(&record.id)
    .bind(conversion_unit_stock)
    .bind(base_unit_stock)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(ServiceError::from)?;

    Ok(InventoryRecord {
        conversion_unit_stock,
        base_unit_stock,
        updated_at: now,
        ..record.clone()
    })
}

async fn append_log(
    conn: &mut SqliteConnection,
    before: &InventoryRecord,
    after: &InventoryRecord,
    log_type: ConversionLogType,
    sale_ref: Option<&str>,
    notes: Option<&str>,
) -> ServiceResult<ConversionLog> {
    let log = ConversionLog {
        id: Uuid::new_v4().to_string(),
        product_id: before.product_id.clone(),
        store_id: before.store_id.clone(),
        log_type,
        conversion_before: before.conversion_unit_stock,
        conversion_after: after.conversion_unit_stock,
        base_before: before.base_unit_stock,
        base_after: after.base_unit_stock,
        sale_ref: sale_ref.map(str::to_string),
        notes: notes.map(str::to_string),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO conversion_logs (
            id, product_id, store_id, log_type,
            conversion_before, conversion_after,
            base_before, base_after,
            sale_ref, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&log.id)
    .bind(&log.product_id)
    .bind(&log.store_id)
    .bind(log.log_type)
    .bind(log.conversion_before)
    .bind(log.conversion_after)
    .bind(log.base_before)
    .bind(log.base_after)
    .bind(&log.sale_ref)
    .bind(&log.notes)
    .bind(log.created_at)
    .execute(&mut *conn)
    .await
    .map_err(ServiceError::from)?;

    Ok(log)
}

// =============================================================================
// Unit Tests
// =============================================================================
