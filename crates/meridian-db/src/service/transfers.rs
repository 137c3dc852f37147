//! # Transfer Service
//!
//! Cross-store inventory movement as one atomic unit.
//!
//! ## Transfer Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. Validate endpoints: distinct stores, both resolvable,              │
//! │     same tenant                                                        │
//! │                                                                         │
//! │  2. PRE-FLIGHT every item at the source via the Lot Ledger             │
//! │     (any shortfall ⇒ reject with ALL shortfalls, nothing moved)        │
//! │                                                                         │
//! │  3. Per item: deduct_fifo at source, then mirror EACH consumed         │
//! │     cost tier as a new destination lot with the same quantity and      │
//! │     unit cost - the cost basis survives the move                       │
//! │                                                                         │
//! │  4. Record one transfer header + one line per cost tier                │
//! │                                                                         │
//! │  COMMIT ← source deduction, destination lots, and the record land     │
//! │           together or not at all                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::repository::lot::LotLedger;
use crate::repository::product::ProductRepository;
use crate::repository::store::StoreRepository;
use crate::repository::transfer::TransferRepository;
use meridian_core::validation::{validate_line_count, validate_quantity};
use meridian_core::{CoreError, NewLot, Shortfall, Transfer, TransferItem};

// =============================================================================
// Inputs & Results
// =============================================================================

/// One requested movement: a product and a quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequestItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Outcome of a completed transfer.
///
/// `transferred_items` holds one line per consumed cost tier; a single
/// requested product yields several lines when its deduction spanned lots
/// with different unit costs.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub transfer_id: String,
    pub transfer_number: String,
    pub transferred_items: Vec<TransferItem>,
}

// =============================================================================
// Transfer Service
// =============================================================================

/// Orchestrates cross-store inventory movements. Holds only its pool
/// handle.
#[derive(Debug, Clone)]
pub struct TransferService {
    pool: SqlitePool,
}

impl TransferService {
    /// Creates a new TransferService.
    pub fn new(pool: SqlitePool) -> Self {
        TransferService { pool }
    }

    /// Moves stock between two stores of the same tenant, preserving the
    /// cost basis of every consumed lot. All-or-nothing.
    pub async fn transfer_inventory(
        &self,
        source_store_id: &str,
        destination_store_id: &str,
        items: &[TransferRequestItem],
    ) -> ServiceResult<TransferOutcome> {
        validate_line_count(items.len(), "items")?;
        for item in items {
            validate_quantity(item.quantity)?;
        }

        if source_store_id == destination_store_id {
            return Err(ServiceError::Domain(CoreError::SameStoreTransfer(
                source_store_id.to_string(),
            )));
        }

        let mut tx = self.pool.begin().await?;

        let source = StoreRepository::get_by_id(&mut *tx, source_store_id)
            .await?
            .ok_or_else(|| CoreError::StoreNotFound(source_store_id.to_string()))?;
        let destination = StoreRepository::get_by_id(&mut *tx, destination_store_id)
            .await?
            .ok_or_else(|| CoreError::StoreNotFound(destination_store_id.to_string()))?;

        if source.tenant_id != destination.tenant_id {
            return Err(ServiceError::Domain(CoreError::StoresNotSameTenant {
                source_store_id: source.id,
                destination_store_id: destination.id,
            }));
        }

        // Pre-flight every item at the source before anything moves,
        // accumulating ALL shortfalls.
        let mut shortfalls = Vec::new();
        let mut lines = Vec::new();
        for item in items {
            let product = ProductRepository::get_by_id(&mut *tx, &item.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

            let available =
                LotLedger::available_quantity(&mut *tx, &product.id, &source.id).await?;
            if available < item.quantity {
                shortfalls.push(Shortfall {
                    product_id: Some(product.id.clone()),
                    product_name: product.name.clone(),
                    requested: item.quantity,
                    available,
                    unit: None,
                });
            }
            lines.push((product, item.quantity));
        }

        if !shortfalls.is_empty() {
            debug!(count = shortfalls.len(), "Transfer rejected on pre-flight shortfalls");
            return Err(ServiceError::Domain(CoreError::InsufficientStock {
                shortfalls,
            }));
        }

        let now = Utc::now();
        let transfer_id = Uuid::new_v4().to_string();
        let mut transferred_items = Vec::new();

        for (product, quantity) in &lines {
            let deductions =
                LotLedger::deduct_fifo(&mut *tx, &product.id, &source.id, *quantity).await?;

            // Mirror each consumed cost tier as a fresh destination lot.
            for deduction in &deductions {
                LotLedger::receive(
                    &mut *tx,
                    &NewLot {
                        product_id: product.id.clone(),
                        store_id: destination.id.clone(),
                        quantity: deduction.quantity,
                        unit_cost_cents: deduction.unit_cost_cents,
                        unit: product.base_unit.clone(),
                        received_at: now,
                    },
                )
                .await?;

                transferred_items.push(TransferItem {
                    id: Uuid::new_v4().to_string(),
                    transfer_id: transfer_id.clone(),
                    product_id: product.id.clone(),
                    quantity: deduction.quantity,
                    unit_cost_cents: deduction.unit_cost_cents,
                    created_at: now,
                });
            }
        }

        let transfer_number =
            TransferRepository::next_transfer_number(&mut *tx, &source.tenant_id, now).await?;

        let transfer = Transfer {
            id: transfer_id.clone(),
            tenant_id: source.tenant_id.clone(),
            transfer_number: transfer_number.clone(),
            source_store_id: source.id.clone(),
            destination_store_id: destination.id.clone(),
            created_at: now,
        };

        TransferRepository::insert(&mut *tx, &transfer).await?;
        for item in &transferred_items {
            TransferRepository::insert_item(&mut *tx, item).await?;
        }

        tx.commit().await?;

        info!(
            transfer_id = %transfer_id,
            transfer_number = %transfer_number,
            source = %source.id,
            destination = %destination.id,
            lines = transferred_items.len(),
            "Inventory transferred"
        );

        Ok(TransferOutcome {
            transfer_id,
            transfer_number,
            transferred_items,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::lot::LotLedger;
    use crate::testutil::{receive_lot, seed_product, seed_store, test_db};

    #[tokio::test]
    async fn test_same_store_is_rejected() {
        let db = test_db().await;
        let store = seed_store(&db, "tenant-a").await;

        let err = db
            .transfers()
            .transfer_inventory(
                &store.id,
                &store.id,
                &[TransferRequestItem {
                    product_id: "p1".to_string(),
                    quantity: 1,
                }],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::SameStoreTransfer(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_store_is_rejected() {
        let db = test_db().await;
        let store = seed_store(&db, "tenant-a").await;

        let err = db
            .transfers()
            .transfer_inventory(
                &store.id,
                "ghost",
                &[TransferRequestItem {
                    product_id: "p1".to_string(),
                    quantity: 1,
                }],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::StoreNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cross_tenant_transfer_is_rejected() {
        let db = test_db().await;
        let source = seed_store(&db, "tenant-a").await;
        let destination = seed_store(&db, "tenant-b").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        receive_lot(&db, &product, &source, 10, 500, 1).await;

        let err = db
            .transfers()
            .transfer_inventory(
                &source.id,
                &destination.id,
                &[TransferRequestItem {
                    product_id: product.id.clone(),
                    quantity: 2,
                }],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::StoresNotSameTenant { .. })
        ));

        // Nothing moved.
        assert_eq!(
            db.available_quantity(&product.id, &source.id).await.unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn test_shortfalls_reported_for_all_items() {
        let db = test_db().await;
        let source = seed_store(&db, "tenant-a").await;
        let destination = seed_store(&db, "tenant-a").await;
        let product_a = seed_product(&db, "tenant-a", "A-01", 1_000, 1).await;
        let product_b = seed_product(&db, "tenant-a", "B-01", 2_000, 1).await;
        receive_lot(&db, &product_a, &source, 3, 500, 1).await;
        receive_lot(&db, &product_b, &source, 4, 600, 1).await;

        let err = db
            .transfers()
            .transfer_inventory(
                &source.id,
                &destination.id,
                &[
                    TransferRequestItem {
                        product_id: product_a.id.clone(),
                        quantity: 5,
                    },
                    TransferRequestItem {
                        product_id: product_b.id.clone(),
                        quantity: 10,
                    },
                ],
            )
            .await
            .unwrap_err();

        match err {
            ServiceError::Domain(CoreError::InsufficientStock { shortfalls }) => {
                assert_eq!(shortfalls.len(), 2);
                assert_eq!(shortfalls[0].available, 3);
                assert_eq!(shortfalls[1].available, 4);
            }
            other => panic!("unexpected error: {other}"),
        }

        // No partial transfer.
        assert_eq!(
            db.available_quantity(&product_a.id, &source.id).await.unwrap(),
            3
        );
        assert_eq!(
            db.available_quantity(&product_a.id, &destination.id)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_transfer_preserves_cost_tiers() {
        let db = test_db().await;
        let source = seed_store(&db, "tenant-a").await;
        let destination = seed_store(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;

        // S1 lots [{5, cost 50}, {10, cost 60}]; transfer 8.
        receive_lot(&db, &product, &source, 5, 50, 2).await;
        receive_lot(&db, &product, &source, 10, 60, 1).await;

        let outcome = db
            .transfers()
            .transfer_inventory(
                &source.id,
                &destination.id,
                &[TransferRequestItem {
                    product_id: product.id.clone(),
                    quantity: 8,
                }],
            )
            .await
            .unwrap();

        assert!(outcome.transfer_number.starts_with("TF"));
        assert!(outcome.transfer_number.ends_with('1'));

        // Source: lot1 emptied, lot2 reduced by 3.
        let mut conn = db.pool().acquire().await.unwrap();
        let source_lots = LotLedger::lots_fifo(&mut *conn, &product.id, &source.id)
            .await
            .unwrap();
        assert_eq!(source_lots[0].remaining_quantity, 0);
        assert_eq!(source_lots[1].remaining_quantity, 7);

        // Destination: two new lots mirroring the consumed cost tiers.
        let dest_lots = LotLedger::lots_fifo(&mut *conn, &product.id, &destination.id)
            .await
            .unwrap();
        assert_eq!(dest_lots.len(), 2);
        assert_eq!(
            (dest_lots[0].remaining_quantity, dest_lots[0].unit_cost_cents),
            (5, 50)
        );
        assert_eq!(
            (dest_lots[1].remaining_quantity, dest_lots[1].unit_cost_cents),
            (3, 60)
        );

        // The recorded lines match, tier for tier.
        assert_eq!(outcome.transferred_items.len(), 2);
        assert_eq!(outcome.transferred_items[0].quantity, 5);
        assert_eq!(outcome.transferred_items[0].unit_cost_cents, 50);
        assert_eq!(outcome.transferred_items[1].quantity, 3);
        assert_eq!(outcome.transferred_items[1].unit_cost_cents, 60);

        // And they were persisted with the header.
        let persisted = crate::repository::transfer::TransferRepository::get_items(
            &mut *conn,
            &outcome.transfer_id,
        )
        .await
        .unwrap();
        assert_eq!(persisted.len(), 2);
    }

    #[tokio::test]
    async fn test_transfer_numbers_increment_within_a_month() {
        let db = test_db().await;
        let source = seed_store(&db, "tenant-a").await;
        let destination = seed_store(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        receive_lot(&db, &product, &source, 20, 500, 1).await;

        let transfers = db.transfers();
        let request = [TransferRequestItem {
            product_id: product.id.clone(),
            quantity: 2,
        }];

        let first = transfers
            .transfer_inventory(&source.id, &destination.id, &request)
            .await
            .unwrap();
        let second = transfers
            .transfer_inventory(&source.id, &destination.id, &request)
            .await
            .unwrap();

        assert!(first.transfer_number.ends_with('1'));
        assert!(second.transfer_number.ends_with('2'));
    }
}
