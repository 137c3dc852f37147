//! # Order Service
//!
//! The order-side orchestrators: creation, status lifecycle, and payment
//! transitions. Every public operation here runs inside exactly ONE
//! transaction; any failure rolls the whole operation back.
//!
//! ## Order Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. Resolve online store → parent store (fail: StoreNotFound)          │
//! │                                                                         │
//! │  2. PRE-FLIGHT every line:                                             │
//! │     resolve listing → backing product (missing ⇒ shortfall, avail 0)   │
//! │     Lot Ledger available_quantity    (short   ⇒ shortfall)             │
//! │                                                                         │
//! │  3. ANY shortfall ⇒ InsufficientStock carrying ALL shortfalls          │
//! │     (rollback: no lot was touched)                                     │
//! │                                                                         │
//! │  4. All pass ⇒ deduct_fifo per line, allocate order number,            │
//! │     insert header + snapshot items                                     │
//! │                                                                         │
//! │  COMMIT ← order rows and lot mutations land together or not at all    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cancellation
//! The status write and the per-item Lot Ledger restore execute in the
//! same transaction - an order can never become `cancelled` with its stock
//! still deducted, or vice versa.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::repository::lot::LotLedger;
use crate::repository::order::OrderRepository;
use crate::repository::product::ProductRepository;
use crate::repository::store::StoreRepository;
use meridian_core::validation::{
    validate_line_count, validate_non_negative_amount, validate_positive_amount, validate_quantity,
};
use meridian_core::{
    lifecycle, CoreError, Money, Order, OrderItem, OrderStatus, OrderWithItems, PaymentMethod,
    PaymentStatus, Shortfall,
};

// =============================================================================
// Inputs & Results
// =============================================================================

/// Validated input for creating an online order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderInput {
    pub online_store_id: String,
    pub payment_method: PaymentMethod,
    pub customer_name: Option<String>,
    pub discount_cents: i64,
    pub shipping_fee_cents: i64,
    pub items: Vec<CreateOrderItem>,
}

/// One requested line: a storefront listing and a quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderItem {
    pub online_product_id: String,
    pub quantity: i64,
}

/// Optional fields stamped on specific transitions (shipping metadata on
/// the transition into `shipped`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdateOptions {
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
}

/// Outcome of a status transition: the re-read order plus what changed.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeResult {
    pub order: Order,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

// =============================================================================
// Order Service
// =============================================================================

/// Orchestrates order creation, the status lifecycle, and payment
/// transitions. Holds only its pool handle.
#[derive(Debug, Clone)]
pub struct OrderService {
    pool: SqlitePool,
}

impl OrderService {
    /// Creates a new OrderService.
    pub fn new(pool: SqlitePool) -> Self {
        OrderService { pool }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates an online order as one atomic unit: availability pre-flight,
    /// FIFO deduction, and order/line persistence.
    ///
    /// The pre-flight is all-or-nothing: if ANY line is short (or its
    /// listing does not resolve), the whole order is rejected with the full
    /// shortfall list and no lot is mutated.
    pub async fn create_order(&self, input: CreateOrderInput) -> ServiceResult<OrderWithItems> {
        validate_line_count(input.items.len(), "items")?;
        for item in &input.items {
            validate_quantity(item.quantity)?;
        }
        validate_non_negative_amount(input.discount_cents, "discount")?;
        validate_non_negative_amount(input.shipping_fee_cents, "shipping_fee")?;

        let mut tx = self.pool.begin().await?;

        let store = StoreRepository::resolve_online_store(&mut *tx, &input.online_store_id)
            .await?
            .ok_or_else(|| CoreError::StoreNotFound(input.online_store_id.clone()))?;

        // Pre-flight: resolve and availability-check every line before any
        // deduction, accumulating ALL shortfalls.
        let mut shortfalls = Vec::new();
        let mut lines = Vec::new();
        for item in &input.items {
            let resolved =
                ProductRepository::resolve_online_product(&mut *tx, &item.online_product_id)
                    .await?;

            match resolved {
                None => {
                    // Unresolvable listing: recoverable, reported as an
                    // available-zero shortfall under the listing id.
                    shortfalls.push(Shortfall {
                        product_id: None,
                        product_name: item.online_product_id.clone(),
                        requested: item.quantity,
                        available: 0,
                        unit: None,
                    });
                }
                Some(product) => {
                    let available =
                        LotLedger::available_quantity(&mut *tx, &product.product_id, &store.id)
                            .await?;
                    if available < item.quantity {
                        shortfalls.push(Shortfall {
                            product_id: Some(product.product_id.clone()),
                            product_name: product.name.clone(),
                            requested: item.quantity,
                            available,
                            unit: None,
                        });
                    }
                    lines.push((product, item.quantity));
                }
            }
        }

        if !shortfalls.is_empty() {
            debug!(count = shortfalls.len(), "Order rejected on pre-flight shortfalls");
            return Err(ServiceError::Domain(CoreError::InsufficientStock {
                shortfalls,
            }));
        }

        // Every line passed pre-flight; deduct and snapshot.
        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();
        let mut items = Vec::with_capacity(lines.len());
        let mut subtotal = Money::zero();

        for (product, quantity) in &lines {
            LotLedger::deduct_fifo(&mut *tx, &product.product_id, &store.id, *quantity).await?;

            let line_total = Money::from_cents(product.price_cents) * *quantity;
            subtotal += line_total;

            items.push(OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: product.product_id.clone(),
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                unit_price_cents: product.price_cents,
                quantity: *quantity,
                line_total_cents: line_total.cents(),
                created_at: now,
            });
        }

        let order_number = OrderRepository::next_order_number(&mut *tx, &store.id, now).await?;
        let total = subtotal - Money::from_cents(input.discount_cents)
            + Money::from_cents(input.shipping_fee_cents);

        let order = Order {
            id: order_id,
            store_id: store.id.clone(),
            online_store_id: input.online_store_id.clone(),
            order_number,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: input.payment_method,
            customer_name: input.customer_name.clone(),
            subtotal_cents: subtotal.cents(),
            discount_cents: input.discount_cents,
            shipping_fee_cents: input.shipping_fee_cents,
            total_cents: total.cents(),
            shipping_carrier: None,
            tracking_number: None,
            notes: None,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
        };

        OrderRepository::insert(&mut *tx, &order).await?;
        for item in &items {
            OrderRepository::insert_item(&mut *tx, item).await?;
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = order.total_cents,
            items = items.len(),
            "Order created"
        );

        Ok(OrderWithItems { order, items })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order with its items, scoped to a store.
    pub async fn get_order(&self, order_id: &str, store_id: &str) -> ServiceResult<OrderWithItems> {
        let mut conn = self.pool.acquire().await?;
        let order = load_order(&mut *conn, order_id, store_id).await?;
        let items = OrderRepository::get_items(&mut *conn, order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// True when an unpaid bank-transfer order has outlived its 24h window.
    ///
    /// Pure predicate over the stored order; never mutates state. Callers
    /// poll it to decide whether to cancel.
    pub async fn payment_expired(&self, order_id: &str, store_id: &str) -> ServiceResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let order = load_order(&mut *conn, order_id, store_id).await?;
        Ok(lifecycle::is_payment_expired(&order, Utc::now()))
    }

    // =========================================================================
    // Status Lifecycle
    // =========================================================================

    /// Executes a status transition.
    ///
    /// Within one transaction: re-reads the order, validates the edge,
    /// writes status + `updated_at` + the once-only lifecycle timestamp,
    /// and - when the target is `cancelled` - restores every item's
    /// quantity through the Lot Ledger. All-or-nothing.
    pub async fn update_status(
        &self,
        order_id: &str,
        store_id: &str,
        target: OrderStatus,
        options: StatusUpdateOptions,
    ) -> ServiceResult<StatusChangeResult> {
        let mut tx = self.pool.begin().await?;

        let order = load_order(&mut *tx, order_id, store_id).await?;
        lifecycle::check_transition(order.status, target)?;

        let now = Utc::now();
        OrderRepository::apply_status(
            &mut *tx,
            order_id,
            target,
            now,
            options.shipping_carrier.as_deref(),
            options.tracking_number.as_deref(),
        )
        .await?;

        if target == OrderStatus::Cancelled {
            let items = OrderRepository::get_items(&mut *tx, order_id).await?;
            for item in &items {
                LotLedger::restore(&mut *tx, &item.product_id, store_id, item.quantity).await?;
            }
            debug!(order_id = %order_id, items = items.len(), "Cancelled order stock restored");
        }

        let updated = OrderRepository::get_by_id(&mut *tx, order_id, store_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        tx.commit().await?;

        info!(
            order_id = %order_id,
            from = order.status.as_str(),
            to = target.as_str(),
            "Order status changed"
        );

        Ok(StatusChangeResult {
            order: updated,
            previous_status: order.status,
            new_status: target,
            changed_at: now,
        })
    }

    // =========================================================================
    // Payment Lifecycle
    // =========================================================================

    /// Confirms a manual bank transfer: `pending -> paid`.
    ///
    /// Only valid for bank-transfer orders that have not been cancelled.
    pub async fn confirm_bank_transfer(
        &self,
        order_id: &str,
        store_id: &str,
        reference: Option<&str>,
    ) -> ServiceResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = load_order(&mut *tx, order_id, store_id).await?;
        lifecycle::check_bank_transfer_confirmation(&order)
            .map_err(|denied| payment_error(&order, denied))?;

        let audit = match reference {
            Some(r) => format!("bank transfer confirmed (ref {r})"),
            None => "bank transfer confirmed".to_string(),
        };

        let now = Utc::now();
        OrderRepository::apply_payment(&mut *tx, order_id, PaymentStatus::Paid, now, &audit).await?;
        let updated = load_order(&mut *tx, order_id, store_id).await?;

        tx.commit().await?;

        info!(order_id = %order_id, "Bank transfer confirmed");
        Ok(updated)
    }

    /// Records COD collection: `pending -> paid`.
    ///
    /// Only valid for COD orders in `shipped`/`delivered`, and only when
    /// the collected amount equals the order total exactly.
    pub async fn complete_cod_payment(
        &self,
        order_id: &str,
        store_id: &str,
        collected_cents: i64,
    ) -> ServiceResult<Order> {
        validate_positive_amount(collected_cents, "collected_amount")?;

        let mut tx = self.pool.begin().await?;

        let order = load_order(&mut *tx, order_id, store_id).await?;
        lifecycle::check_cod_completion(&order, collected_cents)
            .map_err(|denied| payment_error(&order, denied))?;

        let audit = format!(
            "cod payment collected: {}",
            Money::from_cents(collected_cents)
        );

        let now = Utc::now();
        OrderRepository::apply_payment(&mut *tx, order_id, PaymentStatus::Paid, now, &audit).await?;
        let updated = load_order(&mut *tx, order_id, store_id).await?;

        tx.commit().await?;

        info!(order_id = %order_id, collected = collected_cents, "COD payment completed");
        Ok(updated)
    }

    /// Marks a payment failed: `pending -> failed` only.
    pub async fn mark_payment_failed(
        &self,
        order_id: &str,
        store_id: &str,
        reason: &str,
    ) -> ServiceResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = load_order(&mut *tx, order_id, store_id).await?;
        lifecycle::check_mark_failed(&order).map_err(|denied| payment_error(&order, denied))?;

        let audit = format!("payment marked failed: {reason}");

        let now = Utc::now();
        OrderRepository::apply_payment(&mut *tx, order_id, PaymentStatus::Failed, now, &audit)
            .await?;
        let updated = load_order(&mut *tx, order_id, store_id).await?;

        tx.commit().await?;

        info!(order_id = %order_id, reason = %reason, "Payment marked failed");
        Ok(updated)
    }

    /// Processes a refund: `paid -> refunded` only; the amount must not
    /// exceed the order total.
    pub async fn process_refund(
        &self,
        order_id: &str,
        store_id: &str,
        amount_cents: i64,
        reason: Option<&str>,
    ) -> ServiceResult<Order> {
        validate_positive_amount(amount_cents, "refund_amount")?;

        let mut tx = self.pool.begin().await?;

        let order = load_order(&mut *tx, order_id, store_id).await?;
        lifecycle::check_refund(&order, amount_cents)
            .map_err(|denied| payment_error(&order, denied))?;

        let audit = match reason {
            Some(r) => format!("refunded {}: {r}", Money::from_cents(amount_cents)),
            None => format!("refunded {}", Money::from_cents(amount_cents)),
        };

        let now = Utc::now();
        OrderRepository::apply_payment(&mut *tx, order_id, PaymentStatus::Refunded, now, &audit)
            .await?;
        let updated = load_order(&mut *tx, order_id, store_id).await?;

        tx.commit().await?;

        info!(order_id = %order_id, amount = amount_cents, "Refund processed");
        Ok(updated)
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

async fn load_order(
    conn: &mut SqliteConnection,
    order_id: &str,
    store_id: &str,
) -> ServiceResult<Order> {
    OrderRepository::get_by_id(conn, order_id, store_id)
        .await?
        .ok_or_else(|| {
            ServiceError::Domain(CoreError::OrderNotFound {
                order_id: order_id.to_string(),
                store_id: store_id.to_string(),
            })
        })
}

fn payment_error(order: &Order, denied: meridian_core::PaymentDenied) -> ServiceError {
    ServiceError::Domain(CoreError::PaymentStatus {
        order_id: order.id.clone(),
        current: order.payment_status,
        denied,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        receive_lot, seed_listing, seed_product, seed_storefront, test_db,
    };
    use meridian_core::PaymentDenied;

    fn single_item_input(
        online_store_id: &str,
        online_product_id: &str,
        quantity: i64,
        method: PaymentMethod,
    ) -> CreateOrderInput {
        CreateOrderInput {
            online_store_id: online_store_id.to_string(),
            payment_method: method,
            customer_name: Some("Linh Tran".to_string()),
            discount_cents: 0,
            shipping_fee_cents: 0,
            items: vec![CreateOrderItem {
                online_product_id: online_product_id.to_string(),
                quantity,
            }],
        }
    }

    #[tokio::test]
    async fn test_create_order_happy_path() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 10, 800, 1).await;

        let mut input = single_item_input(&online.id, &listing.id, 3, PaymentMethod::Cod);
        input.discount_cents = 500;
        input.shipping_fee_cents = 1_200;

        let created = db.orders().create_order(input).await.unwrap();

        assert_eq!(created.order.status, OrderStatus::Pending);
        assert_eq!(created.order.payment_status, PaymentStatus::Pending);
        assert!(created.order.order_number.starts_with("ON"));
        assert!(created.order.order_number.ends_with("0001"));
        assert_eq!(created.order.subtotal_cents, 4_500);
        // total = subtotal - discount + shipping_fee
        assert_eq!(created.order.total_cents, 4_500 - 500 + 1_200);

        assert_eq!(created.items.len(), 1);
        let item = &created.items[0];
        assert_eq!(item.name_snapshot, listing.name);
        assert_eq!(item.sku_snapshot, listing.sku);
        assert_eq!(item.unit_price_cents, 1_500);
        assert_eq!(item.line_total_cents, 4_500);

        // Stock was deducted in the same transaction.
        assert_eq!(db.available_quantity(&product.id, &store.id).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_order_numbers_increment_within_a_day() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 10, 800, 1).await;

        let orders = db.orders();
        let first = orders
            .create_order(single_item_input(&online.id, &listing.id, 1, PaymentMethod::Cod))
            .await
            .unwrap();
        let second = orders
            .create_order(single_item_input(&online.id, &listing.id, 1, PaymentMethod::Cod))
            .await
            .unwrap();

        assert!(first.order.order_number.ends_with("0001"));
        assert!(second.order.order_number.ends_with("0002"));
    }

    #[tokio::test]
    async fn test_partial_shortfall_lists_only_short_items_and_touches_nothing() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product_a = seed_product(&db, "tenant-a", "OK-01", 1_000, 1).await;
        let product_b = seed_product(&db, "tenant-a", "SHORT-01", 2_000, 1).await;
        let listing_a = seed_listing(&db, &online, &product_a).await;
        let listing_b = seed_listing(&db, &online, &product_b).await;
        receive_lot(&db, &product_a, &store, 50, 500, 1).await;
        receive_lot(&db, &product_b, &store, 10, 900, 1).await;

        let input = CreateOrderInput {
            online_store_id: online.id.clone(),
            payment_method: PaymentMethod::Cod,
            customer_name: None,
            discount_cents: 0,
            shipping_fee_cents: 0,
            items: vec![
                CreateOrderItem {
                    online_product_id: listing_a.id.clone(),
                    quantity: 5,
                },
                CreateOrderItem {
                    online_product_id: listing_b.id.clone(),
                    quantity: 20,
                },
            ],
        };

        let err = db.orders().create_order(input).await.unwrap_err();
        match err {
            ServiceError::Domain(CoreError::InsufficientStock { shortfalls }) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].product_id.as_deref(), Some(product_b.id.as_str()));
                assert_eq!(shortfalls[0].requested, 20);
                assert_eq!(shortfalls[0].available, 10);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Item A's lots were never touched.
        assert_eq!(
            db.available_quantity(&product_a.id, &store.id).await.unwrap(),
            50
        );
        assert_eq!(
            db.available_quantity(&product_b.id, &store.id).await.unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn test_unresolvable_listing_is_available_zero_shortfall() {
        let db = test_db().await;
        let (_store, online) = seed_storefront(&db, "tenant-a").await;

        let input = single_item_input(&online.id, "missing-listing", 2, PaymentMethod::Cod);
        let err = db.orders().create_order(input).await.unwrap_err();

        match err {
            ServiceError::Domain(CoreError::InsufficientStock { shortfalls }) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].product_id, None);
                assert_eq!(shortfalls[0].available, 0);
                assert_eq!(shortfalls[0].requested, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_online_store_fails_hard() {
        let db = test_db().await;
        let input = single_item_input("nope", "whatever", 1, PaymentMethod::Cod);

        let err = db.orders().create_order(input).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::StoreNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_full_status_walk_stamps_timestamps_once() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 10, 800, 1).await;

        let orders = db.orders();
        let created = orders
            .create_order(single_item_input(&online.id, &listing.id, 1, PaymentMethod::Cod))
            .await
            .unwrap();
        let id = created.order.id.clone();

        let confirmed = orders
            .update_status(&id, &store.id, OrderStatus::Confirmed, Default::default())
            .await
            .unwrap();
        assert_eq!(confirmed.previous_status, OrderStatus::Pending);
        assert_eq!(confirmed.new_status, OrderStatus::Confirmed);
        let confirmed_at = confirmed.order.confirmed_at.unwrap();

        let processing = orders
            .update_status(&id, &store.id, OrderStatus::Processing, Default::default())
            .await
            .unwrap();
        // confirmed_at is never overwritten by later transitions.
        assert_eq!(processing.order.confirmed_at, Some(confirmed_at));

        let shipped = orders
            .update_status(
                &id,
                &store.id,
                OrderStatus::Shipped,
                StatusUpdateOptions {
                    shipping_carrier: Some("GHN".to_string()),
                    tracking_number: Some("GHN-123456".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(shipped.order.shipped_at.is_some());
        assert_eq!(shipped.order.shipping_carrier.as_deref(), Some("GHN"));
        assert_eq!(shipped.order.tracking_number.as_deref(), Some("GHN-123456"));

        let delivered = orders
            .update_status(&id, &store.id, OrderStatus::Delivered, Default::default())
            .await
            .unwrap();
        assert!(delivered.order.delivered_at.is_some());
        assert_eq!(delivered.order.confirmed_at, Some(confirmed_at));
    }

    #[tokio::test]
    async fn test_skipping_states_is_rejected() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 5, 800, 1).await;

        let created = db
            .orders()
            .create_order(single_item_input(&online.id, &listing.id, 1, PaymentMethod::Cod))
            .await
            .unwrap();

        let err = db
            .orders()
            .update_status(
                &created.order.id,
                &store.id,
                OrderStatus::Shipped,
                Default::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::InvalidStatusTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped,
            })
        ));
    }

    #[tokio::test]
    async fn test_unknown_order_is_order_not_found() {
        let db = test_db().await;
        let (store, _online) = seed_storefront(&db, "tenant-a").await;

        let err = db
            .orders()
            .update_status("ghost", &store.id, OrderStatus::Confirmed, Default::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::OrderNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_restores_exact_quantity_and_is_terminal() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 6, 700, 2).await;
        receive_lot(&db, &product, &store, 6, 750, 1).await;

        let orders = db.orders();
        let created = orders
            .create_order(single_item_input(&online.id, &listing.id, 4, PaymentMethod::Cod))
            .await
            .unwrap();
        assert_eq!(db.available_quantity(&product.id, &store.id).await.unwrap(), 8);

        let cancelled = orders
            .update_status(
                &created.order.id,
                &store.id,
                OrderStatus::Cancelled,
                Default::default(),
            )
            .await
            .unwrap();

        assert!(cancelled.order.cancelled_at.is_some());
        // Exactly the ordered quantity came back (into the newest lot).
        assert_eq!(
            db.available_quantity(&product.id, &store.id).await.unwrap(),
            12
        );

        // No way out of a terminal state.
        let err = orders
            .update_status(
                &created.order.id,
                &store.id,
                OrderStatus::Confirmed,
                Default::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::InvalidStatusTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_bank_transfer_confirmation() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 5, 800, 1).await;

        let orders = db.orders();
        let created = orders
            .create_order(single_item_input(
                &online.id,
                &listing.id,
                1,
                PaymentMethod::BankTransfer,
            ))
            .await
            .unwrap();

        let paid = orders
            .confirm_bank_transfer(&created.order.id, &store.id, Some("FT-2024-0042"))
            .await
            .unwrap();

        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        let notes = paid.notes.unwrap();
        assert!(notes.contains("bank transfer confirmed (ref FT-2024-0042)"));
    }

    #[tokio::test]
    async fn test_bank_transfer_on_cod_order_is_rejected() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 5, 800, 1).await;

        let orders = db.orders();
        let created = orders
            .create_order(single_item_input(&online.id, &listing.id, 1, PaymentMethod::Cod))
            .await
            .unwrap();

        let err = orders
            .confirm_bank_transfer(&created.order.id, &store.id, None)
            .await
            .unwrap_err();

        match err {
            ServiceError::Domain(CoreError::PaymentStatus { denied, .. }) => {
                assert!(matches!(denied, PaymentDenied::WrongMethod { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Rejection left payment state untouched.
        let order = orders.get_order(&created.order.id, &store.id).await.unwrap();
        assert_eq!(order.order.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_cod_collection_requires_exact_amount() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 5, 800, 1).await;

        let orders = db.orders();
        let created = orders
            .create_order(single_item_input(&online.id, &listing.id, 2, PaymentMethod::Cod))
            .await
            .unwrap();
        let id = created.order.id.clone();

        for target in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ] {
            orders
                .update_status(&id, &store.id, target, Default::default())
                .await
                .unwrap();
        }

        // Wrong amount: rejected, payment status unchanged.
        let err = orders
            .complete_cod_payment(&id, &store.id, created.order.total_cents - 1)
            .await
            .unwrap_err();
        match err {
            ServiceError::Domain(CoreError::PaymentStatus { denied, .. }) => {
                assert!(matches!(denied, PaymentDenied::AmountMismatch { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        let order = orders.get_order(&id, &store.id).await.unwrap();
        assert_eq!(order.order.payment_status, PaymentStatus::Pending);

        // Exact amount: accepted.
        let paid = orders
            .complete_cod_payment(&id, &store.id, created.order.total_cents)
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert!(paid.notes.unwrap().contains("cod payment collected"));
    }

    #[tokio::test]
    async fn test_cod_collection_rejected_before_shipment() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 5, 800, 1).await;

        let orders = db.orders();
        let created = orders
            .create_order(single_item_input(&online.id, &listing.id, 1, PaymentMethod::Cod))
            .await
            .unwrap();

        let err = orders
            .complete_cod_payment(&created.order.id, &store.id, created.order.total_cents)
            .await
            .unwrap_err();
        match err {
            ServiceError::Domain(CoreError::PaymentStatus { denied, .. }) => {
                assert!(matches!(denied, PaymentDenied::WrongOrderStatus { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_mark_failed_and_refund_guards() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 10, 800, 1).await;

        let orders = db.orders();

        // Refund before payment: rejected.
        let created = orders
            .create_order(single_item_input(
                &online.id,
                &listing.id,
                1,
                PaymentMethod::BankTransfer,
            ))
            .await
            .unwrap();
        let id = created.order.id.clone();
        let err = orders
            .process_refund(&id, &store.id, 1_000, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::PaymentStatus { .. })
        ));

        // pending -> failed works, and is itself terminal for markFailed.
        let failed = orders
            .mark_payment_failed(&id, &store.id, "gateway timeout")
            .await
            .unwrap();
        assert_eq!(failed.payment_status, PaymentStatus::Failed);
        assert!(failed.notes.unwrap().contains("gateway timeout"));
        assert!(orders
            .mark_payment_failed(&id, &store.id, "again")
            .await
            .is_err());

        // paid -> refunded, capped at the total.
        let created = orders
            .create_order(single_item_input(
                &online.id,
                &listing.id,
                2,
                PaymentMethod::BankTransfer,
            ))
            .await
            .unwrap();
        let id = created.order.id.clone();
        orders
            .confirm_bank_transfer(&id, &store.id, None)
            .await
            .unwrap();

        let err = orders
            .process_refund(&id, &store.id, created.order.total_cents + 1, None)
            .await
            .unwrap_err();
        match err {
            ServiceError::Domain(CoreError::PaymentStatus { denied, .. }) => {
                assert!(matches!(denied, PaymentDenied::RefundExceedsTotal { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        let refunded = orders
            .process_refund(&id, &store.id, created.order.total_cents, Some("damaged"))
            .await
            .unwrap();
        assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
        assert!(refunded.notes.unwrap().contains("damaged"));
    }

    #[tokio::test]
    async fn test_fresh_bank_transfer_order_is_not_expired() {
        let db = test_db().await;
        let (store, online) = seed_storefront(&db, "tenant-a").await;
        let product = seed_product(&db, "tenant-a", "COLA-330", 1_500, 1).await;
        let listing = seed_listing(&db, &online, &product).await;
        receive_lot(&db, &product, &store, 5, 800, 1).await;

        let created = db
            .orders()
            .create_order(single_item_input(
                &online.id,
                &listing.id,
                1,
                PaymentMethod::BankTransfer,
            ))
            .await
            .unwrap();

        assert!(!db
            .orders()
            .payment_expired(&created.order.id, &store.id)
            .await
            .unwrap());
    }
}
