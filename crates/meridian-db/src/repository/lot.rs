//! # Lot Ledger
//!
//! The sole owner of `purchase_lots.remaining_quantity`. Tracks physical
//! stock as a sequence of FIFO-ordered purchase lots and exposes atomic
//! deduct/restore operations over them.
//!
//! ## FIFO Deduction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Lots for (product, store), oldest first:                              │
//! │                                                                         │
//! │    L1 { remaining: 10, cost: 100, day 1 }                              │
//! │    L2 { remaining:  5, cost: 120, day 2 }                              │
//! │                                                                         │
//! │  deduct_fifo(qty: 12)                                                  │
//! │       │                                                                 │
//! │       ├── L1: take 10 (drained, row kept as cost history)              │
//! │       └── L2: take 2  (remaining becomes 3)                            │
//! │                                                                         │
//! │  → [ {L1, 10, 100}, {L2, 2, 120} ]                                     │
//! │                                                                         │
//! │  No lot is partially consumed while an older lot still has stock.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Atomicity Contract
//! `deduct_fifo` mutates lots as it walks them and performs NO internal
//! rollback on failure. Callers MUST run it inside their own transaction
//! and MUST pre-check availability; the enclosing transaction is the only
//! thing that makes a failed multi-lot deduction safe.
//!
//! ## Concurrency
//! Each per-lot mutation is a guarded update
//! (`... WHERE remaining_quantity >= taken`), so two transactions that both
//! read the same lot as sufficient can never jointly over-draw it: the
//! second writer's guard fails and the operation aborts with a write
//! conflict for the caller (or its infrastructure) to retry.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceError, ServiceResult};
use meridian_core::{CoreError, LotDeduction, NewLot, PurchaseLot, Shortfall};

/// The component owning all purchase-lot mutations.
///
/// Methods take an explicit connection: orchestrators pass their open
/// transaction so every ledger mutation commits or rolls back with the
/// surrounding order/transfer write.
pub struct LotLedger;

impl LotLedger {
    /// Receives a new lot into the ledger.
    pub async fn receive(conn: &mut SqliteConnection, lot: &NewLot) -> DbResult<PurchaseLot> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(
            product_id = %lot.product_id,
            store_id = %lot.store_id,
            quantity = lot.quantity,
            unit_cost = lot.unit_cost_cents,
            "Receiving purchase lot"
        );

        sqlx::query(
            r#"
            INSERT INTO purchase_lots (
                id, product_id, store_id,
                quantity, remaining_quantity, unit_cost_cents,
                unit, received_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&id)
        .bind(&lot.product_id)
        .bind(&lot.store_id)
        .bind(lot.quantity)
        .bind(lot.quantity)
        .bind(lot.unit_cost_cents)
        .bind(&lot.unit)
        .bind(lot.received_at)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(PurchaseLot {
            id,
            product_id: lot.product_id.clone(),
            store_id: lot.store_id.clone(),
            quantity: lot.quantity,
            remaining_quantity: lot.quantity,
            unit_cost_cents: lot.unit_cost_cents,
            unit: lot.unit.clone(),
            received_at: lot.received_at,
            created_at: now,
        })
    }

    /// Sum of `remaining_quantity` over all lots with stock.
    pub async fn available_quantity(
        conn: &mut SqliteConnection,
        product_id: &str,
        store_id: &str,
    ) -> DbResult<i64> {
        let available: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(remaining_quantity), 0)
            FROM purchase_lots
            WHERE product_id = ?1 AND store_id = ?2 AND remaining_quantity > 0
            "#,
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(available)
    }

    /// Lots for one (product, store) in FIFO order, including drained ones.
    ///
    /// FIFO order is `received_at` ascending; identical timestamps fall back
    /// to insertion order (rowid), which is stable because lots are only
    /// ever inserted.
    pub async fn lots_fifo(
        conn: &mut SqliteConnection,
        product_id: &str,
        store_id: &str,
    ) -> DbResult<Vec<PurchaseLot>> {
        let lots = sqlx::query_as::<_, PurchaseLot>(
            r#"
            SELECT
                id, product_id, store_id,
                quantity, remaining_quantity, unit_cost_cents,
                unit, received_at, created_at
            FROM purchase_lots
            WHERE product_id = ?1 AND store_id = ?2
            ORDER BY received_at ASC, rowid ASC
            "#,
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lots)
    }

    /// Deducts `quantity` across lots oldest-first.
    ///
    /// Returns one [`LotDeduction`] per touched lot, in consumption order.
    /// Fails with [`CoreError::InsufficientStock`] if the lots are exhausted
    /// before the quantity is satisfied - by then earlier lots HAVE been
    /// mutated, which is exactly why this must run inside the caller's
    /// transaction.
    pub async fn deduct_fifo(
        conn: &mut SqliteConnection,
        product_id: &str,
        store_id: &str,
        quantity: i64,
    ) -> ServiceResult<Vec<LotDeduction>> {
        debug!(
            product_id = %product_id,
            store_id = %store_id,
            quantity,
            "FIFO deduction"
        );

        let candidates = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT id, remaining_quantity, unit_cost_cents
            FROM purchase_lots
            WHERE product_id = ?1 AND store_id = ?2 AND remaining_quantity > 0
            ORDER BY received_at ASC, rowid ASC
            "#,
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_all(&mut *conn)
        .await?;

        let available: i64 = candidates.iter().map(|(_, remaining, _)| remaining).sum();

        let mut deductions = Vec::new();
        let mut still_needed = quantity;

        for (lot_id, remaining, unit_cost_cents) in candidates {
            if still_needed == 0 {
                break;
            }

            let take = remaining.min(still_needed);

            // Guarded update: refuses to apply if a concurrent transaction
            // drained this lot between our read and this write.
            let result = sqlx::query(
                r#"
                UPDATE purchase_lots
                SET remaining_quantity = remaining_quantity - ?2
                WHERE id = ?1 AND remaining_quantity >= ?2
                "#,
            )
            .bind(&lot_id)
            .bind(take)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ServiceError::Db(DbError::WriteConflict(format!(
                    "lot {lot_id} was consumed concurrently"
                ))));
            }

            deductions.push(LotDeduction {
                lot_id,
                quantity: take,
                unit_cost_cents,
            });
            still_needed -= take;
        }

        if still_needed > 0 {
            // Callers pre-check availability, so this is the safety net for
            // races between their check and this call. Lots touched so far
            // stay mutated; the caller's rollback undoes them.
            return Err(ServiceError::Domain(CoreError::InsufficientStock {
                shortfalls: vec![Shortfall {
                    product_id: Some(product_id.to_string()),
                    product_name: product_id.to_string(),
                    requested: quantity,
                    available,
                    unit: None,
                }],
            }));
        }

        Ok(deductions)
    }

    /// Reverses a prior deduction by adding `quantity` back to the single
    /// most-recently-received lot.
    ///
    /// This is deliberately NOT an exact inverse: the quantity is not
    /// spread back across the originally-consumed lots, and a lot may end
    /// up above its originally-received quantity. Silently a no-op when the
    /// product has no lots at all.
    pub async fn restore(
        conn: &mut SqliteConnection,
        product_id: &str,
        store_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        let newest: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM purchase_lots
            WHERE product_id = ?1 AND store_id = ?2
            ORDER BY received_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(lot_id) = newest else {
            debug!(
                product_id = %product_id,
                store_id = %store_id,
                quantity,
                "Restore skipped: no lot to restore into"
            );
            return Ok(());
        };

        debug!(lot_id = %lot_id, quantity, "Restoring into most recent lot");

        sqlx::query(
            r#"
            UPDATE purchase_lots
            SET remaining_quantity = remaining_quantity + ?2
            WHERE id = ?1
            "#,
        )
        .bind(&lot_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
