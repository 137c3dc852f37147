//! # Domain Types
//!
//! Core domain types for the Meridian inventory ledger and order engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  PurchaseLot    │   │     Order       │   │    Transfer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  remaining_qty  │   │  order_number   │   │  transfer_number│       │
//! │  │  unit_cost      │   │  status         │   │  source/dest    │       │
//! │  │  received_at    │   │  payment_status │   │  cost tiers     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ InventoryRecord │   │  ConversionLog  │   │   Shortfall     │       │
//! │  │  (POS aggregate │   │  (append-only   │   │  (requested vs  │       │
//! │  │   stock row)    │   │   audit trail)  │   │   available)    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (sku, order_number, transfer_number)
//!
//! ## Two Stock Representations
//! `PurchaseLot` rows are the cost-tracked FIFO ledger used by the online
//! order path. `InventoryRecord` is the coarser per-product aggregate used
//! by the in-store POS path. They are deliberately NOT unified; a separate
//! reconciliation job aligns them outside this workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Stores
// =============================================================================

/// A physical store belonging to one tenant.
///
/// All inventory and order operations are scoped to a store; cross-store
/// transfers additionally require both stores to share a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Store {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An online storefront backed by exactly one physical store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OnlineStore {
    pub id: String,
    /// The parent store that fulfils this storefront's orders.
    pub store_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Products
// =============================================================================

/// A product sold by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this product belongs to.
    pub tenant_id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown in the storefront and on order lines.
    pub name: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Name of the base (loose) unit, e.g. "piece".
    pub base_unit: String,

    /// Name of the conversion (packed) unit, e.g. "box".
    pub conversion_unit: String,

    /// How many base units make one conversion unit.
    pub units_per_conversion: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Base units per conversion unit, clamped to at least 1 so unit math
    /// never divides by zero on a misconfigured product.
    #[inline]
    pub fn conversion_factor(&self) -> i64 {
        self.units_per_conversion.max(1)
    }
}

/// An online listing that maps a storefront item to its backing product.
///
/// Name/sku are the listing's own display metadata; they are what gets
/// snapshotted onto order lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OnlineProduct {
    pub id: String,
    pub online_store_id: String,
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Lot Ledger
// =============================================================================

/// One received batch of stock for one (product, store).
///
/// `remaining_quantity` is the only mutable field and is owned exclusively
/// by the Lot Ledger. Drained lots (remaining 0) are never deleted; they
/// remain as the historical cost record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseLot {
    pub id: String,
    pub product_id: String,
    pub store_id: String,
    /// Quantity originally received. Immutable.
    pub quantity: i64,
    /// Quantity still available for deduction. Never below zero.
    pub remaining_quantity: i64,
    /// Cost per unit at receiving time. Immutable.
    pub unit_cost_cents: i64,
    /// Unit the lot was received in.
    pub unit: String,
    /// Receiving timestamp; defines FIFO order. Immutable.
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseLot {
    /// Returns the unit cost as Money.
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// True once the lot has been fully consumed.
    #[inline]
    pub fn is_drained(&self) -> bool {
        self.remaining_quantity == 0
    }
}

/// Input for receiving a new lot into the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLot {
    pub product_id: String,
    pub store_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub unit: String,
    pub received_at: DateTime<Utc>,
}

/// One lot's share of a FIFO deduction: which lot, how much, at what cost.
///
/// A multi-lot deduction yields one record per consumed cost tier, in FIFO
/// order. Transfers use these records to mirror the cost basis at the
/// destination store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDeduction {
    pub lot_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

// =============================================================================
// Stock Conversion Service (POS aggregate path)
// =============================================================================

/// Unit selector for Stock Conversion Service operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockUnit {
    /// Loose base units (pieces).
    Base,
    /// Packed conversion units (boxes/cartons).
    Conversion,
}

/// The aggregate per-(product, store) stock row used by the POS sales path.
///
/// Canonical stock is `base_unit_stock`; `conversion_unit_stock` is kept
/// in step as `base_unit_stock / units_per_conversion`. Both fields are
/// non-negative at rest. Created lazily on first access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryRecord {
    pub id: String,
    pub product_id: String,
    pub store_id: String,
    pub conversion_unit_stock: i64,
    pub base_unit_stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Classifies a Stock Conversion Service mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ConversionLogType {
    /// Stock moved by the sales path (deduct/restore/add/initialize).
    AutoDeduct,
    /// Stock overwritten by an operator adjustment.
    ManualAdjust,
}

/// Append-only audit record of one Stock Conversion Service mutation.
///
/// Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ConversionLog {
    pub id: String,
    pub product_id: String,
    pub store_id: String,
    pub log_type: ConversionLogType,
    pub conversion_before: i64,
    pub conversion_after: i64,
    pub base_before: i64,
    pub base_after: i64,
    /// Originating sale, when the mutation came from a POS sale.
    pub sale_ref: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order Status
// =============================================================================

/// The fulfilment status of an online order.
///
/// Transitions are governed by the lifecycle state machine in
/// [`crate::lifecycle`]; `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Returns `true` if no further transitions are possible.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Stable lowercase name, matching the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// Payment Status & Method
// =============================================================================

/// The payment state of an order. Narrower machine than [`OrderStatus`];
/// edges are gated by payment method (see [`crate::lifecycle`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    /// Stable lowercase name, matching the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery; collected by the carrier.
    Cod,
    /// Manual bank transfer, confirmed by an operator.
    BankTransfer,
    /// MoMo e-wallet.
    Momo,
    /// VNPay gateway.
    Vnpay,
    /// ZaloPay e-wallet.
    Zalopay,
}

impl PaymentMethod {
    /// Stable lowercase name, matching the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Momo => "momo",
            PaymentMethod::Vnpay => "vnpay",
            PaymentMethod::Zalopay => "zalopay",
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// An online order.
///
/// Created atomically with its items and the matching lot deduction.
/// Status/payment transitions are the only permitted mutations afterwards;
/// orders are never deleted. `notes` is an embedded append-only audit log
/// of payment and status events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub store_id: String,
    pub online_store_id: String,
    /// Business number, format `ON{YYYYMMDD}{seq:04}`.
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub customer_name: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub shipping_fee_cents: i64,
    /// `subtotal - discount + shipping_fee`, computed at creation.
    pub total_cents: i64,
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly once, on the transition into the matching state.
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in an order.
/// Uses snapshot pattern to freeze product data at order time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// SKU at order time (frozen).
    pub sku_snapshot: String,
    /// Product name at order time (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at order time (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// unit_price × quantity.
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// An order together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// =============================================================================
// Transfers
// =============================================================================

/// Header of a completed cross-store movement. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Transfer {
    pub id: String,
    pub tenant_id: String,
    /// Business number, format `TF{YYYYMM}{seq}`.
    pub transfer_number: String,
    pub source_store_id: String,
    pub destination_store_id: String,
    pub created_at: DateTime<Utc>,
}

/// One transferred cost tier: quantity moved at one unit cost.
///
/// A single requested product may produce several lines when its FIFO
/// deduction spanned lots with different costs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransferItem {
    pub id: String,
    pub transfer_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit cost copied from the deducted source lot.
    pub unit_cost_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Shortfall
// =============================================================================

/// Per-item record of requested vs. available quantity when stock is
/// insufficient. A rejected operation reports the shortfalls of ALL its
/// items, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    /// Backing product id, when resolution succeeded.
    pub product_id: Option<String>,
    pub product_name: String,
    pub requested: i64,
    pub available: i64,
    /// Unit the quantities are in, where the failing path is unit-aware
    /// (the POS conversion path). Lot Ledger quantities are base units.
    pub unit: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
