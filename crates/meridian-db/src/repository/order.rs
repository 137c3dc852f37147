//! # Order Repository
//!
//! Row-level reads and writes for orders and their line items. All
//! lifecycle rules live in `meridian_core::lifecycle` and the
//! `OrderService`; this module only owns the SQL.
//!
//! ## Order Numbers
//! `ON{YYYYMMDD}{seq:04}`, sequence scoped per store per day. The sequence
//! is allocated with a single atomic upsert on `order_counters` - two
//! concurrent creations can never observe the same value, unlike the
//! count-today's-orders approach this replaces.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use meridian_core::{Order, OrderItem, OrderStatus};

/// Repository for order rows.
///
/// Methods take an explicit connection so callers can compose them inside
/// their own transaction.
pub struct OrderRepository;

impl OrderRepository {
    /// Allocates the next order number for a store.
    ///
    /// Atomic: the upsert increments-or-creates the per-(store, day)
    /// counter row and returns the new sequence in one statement.
    pub async fn next_order_number(
        conn: &mut SqliteConnection,
        store_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<String> {
        let day = now.format("%Y%m%d").to_string();

        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_counters (store_id, day, seq)
            VALUES (?1, ?2, 1)
            ON CONFLICT (store_id, day) DO UPDATE SET seq = seq + 1
            RETURNING seq
            "#,
        )
        .bind(store_id)
        .bind(&day)
        .fetch_one(&mut *conn)
        .await?;

        Ok(format!("ON{day}{seq:04}"))
    }

    /// Inserts an order header.
    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, store_id, online_store_id, order_number,
                status, payment_status, payment_method, customer_name,
                subtotal_cents, discount_cents, shipping_fee_cents, total_cents,
                shipping_carrier, tracking_number, notes,
                created_at, updated_at,
                confirmed_at, shipped_at, delivered_at, cancelled_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14, ?15,
                ?16, ?17,
                ?18, ?19, ?20, ?21
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.store_id)
        .bind(&order.online_store_id)
        .bind(&order.order_number)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.payment_method)
        .bind(&order.customer_name)
        .bind(order.subtotal_cents)
        .bind(order.discount_cents)
        .bind(order.shipping_fee_cents)
        .bind(order.total_cents)
        .bind(&order.shipping_carrier)
        .bind(&order.tracking_number)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.confirmed_at)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a line item.
    ///
    /// ## Snapshot Pattern
    /// Product details (sku, name, price) are copied onto the line item,
    /// preserving order history even if the listing changes later.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id,
                sku_snapshot, name_snapshot, unit_price_cents,
                quantity, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.sku_snapshot)
        .bind(&item.name_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets an order scoped to its store.
    ///
    /// The store scope is part of the lookup key on purpose: an order id
    /// from another tenant's store must behave exactly like a missing one.
    pub async fn get_by_id(
        conn: &mut SqliteConnection,
        order_id: &str,
        store_id: &str,
    ) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, store_id, online_store_id, order_number,
                status, payment_status, payment_method, customer_name,
                subtotal_cents, discount_cents, shipping_fee_cents, total_cents,
                shipping_carrier, tracking_number, notes,
                created_at, updated_at,
                confirmed_at, shipped_at, delivered_at, cancelled_at
            FROM orders
            WHERE id = ?1 AND store_id = ?2
            "#,
        )
        .bind(order_id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(order)
    }

    /// Gets all items for an order.
    pub async fn get_items(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT
                id, order_id, product_id,
                sku_snapshot, name_snapshot, unit_price_cents,
                quantity, line_total_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    /// Writes a validated status transition.
    ///
    /// Stamps `updated_at` and the status-specific lifecycle timestamp.
    /// The lifecycle timestamps use COALESCE so each is set exactly once
    /// and never overwritten by a later transition. Shipping metadata is
    /// only stamped on the transition into `shipped`.
    pub async fn apply_status(
        conn: &mut SqliteConnection,
        order_id: &str,
        target: OrderStatus,
        now: DateTime<Utc>,
        shipping_carrier: Option<&str>,
        tracking_number: Option<&str>,
    ) -> DbResult<()> {
        let result = if target == OrderStatus::Shipped {
            sqlx::query(
                r#"
                UPDATE orders SET
                    status = ?1,
                    updated_at = ?2,
                    shipped_at = COALESCE(shipped_at, ?2),
                    shipping_carrier = COALESCE(?3, shipping_carrier),
                    tracking_number = COALESCE(?4, tracking_number)
                WHERE id = ?5
                "#,
            )
            .bind(target)
            .bind(now)
            .bind(shipping_carrier)
            .bind(tracking_number)
            .bind(order_id)
            .execute(&mut *conn)
            .await?
        } else {
            // Timestamp column names are a closed set derived from the
            // status enum, never caller input.
            let timestamp_col = match target {
                OrderStatus::Confirmed => Some("confirmed_at"),
                OrderStatus::Delivered => Some("delivered_at"),
                OrderStatus::Cancelled => Some("cancelled_at"),
                _ => None,
            };

            let mut sql =
                String::from("UPDATE orders SET status = ?1, updated_at = ?2");
            if let Some(col) = timestamp_col {
                sql.push_str(&format!(", {col} = COALESCE({col}, ?2)"));
            }
            sql.push_str(" WHERE id = ?3");

            sqlx::query(&sql)
                .bind(target)
                .bind(now)
                .bind(order_id)
                .execute(&mut *conn)
                .await?
        };

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        Ok(())
    }

    /// Writes a validated payment transition and appends its audit line to
    /// the order's embedded note log.
    pub async fn apply_payment(
        conn: &mut SqliteConnection,
        order_id: &str,
        payment_status: meridian_core::PaymentStatus,
        now: DateTime<Utc>,
        audit_line: &str,
    ) -> DbResult<()> {
        let line = format!("[{}] {}\n", now.to_rfc3339(), audit_line);

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                payment_status = ?1,
                updated_at = ?2,
                notes = COALESCE(notes, '') || ?3
            WHERE id = ?4
            "#,
        )
        .bind(payment_status)
        .bind(now)
        .bind(&line)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        Ok(())
    }
}
