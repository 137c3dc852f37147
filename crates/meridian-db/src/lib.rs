//! # meridian-db: Persistence & Orchestration for Meridian Retail
//!
//! This crate owns all database operations of the Meridian core - the Lot
//! Ledger, the Stock Conversion Service, and the order/transfer
//! orchestrators - backed by SQLite via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Meridian Data Flow                                │
//! │                                                                         │
//! │  HTTP / storefront / POS layer (out of scope)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  meridian-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │ Repositories  │    │  Migrations  │  │   │
//! │  │   │ OrderService  │───►│  LotLedger    │    │  (embedded)  │  │   │
//! │  │   │ TransferSvc   │    │  OrderRepo    │    │ 001_init.sql │  │   │
//! │  │   │ StockConv.    │    │  StoreRepo    │    │              │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │   one transaction  │                               │   │
//! │  │           └────────┬───────────┘                               │   │
//! │  └────────────────────┼───────────────────────────────────────────┘   │
//! │                       ▼                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and service error types
//! - [`repository`] - Row-level access (lots, stock, orders, transfers)
//! - [`service`] - Transactional orchestrators
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/meridian.db")).await?;
//!
//! let order = db.orders().create_order(input).await?;
//! db.orders()
//!     .update_status(&order.order.id, &store_id, OrderStatus::Confirmed, Default::default())
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod testutil;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, ServiceError, ServiceResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::inventory::StockConversionService;
pub use repository::lot::LotLedger;
pub use repository::order::OrderRepository;
pub use repository::product::{ProductRepository, ResolvedOnlineProduct};
pub use repository::store::StoreRepository;
pub use repository::transfer::TransferRepository;

// Service re-exports
pub use service::orders::{
    CreateOrderInput, CreateOrderItem, OrderService, StatusChangeResult, StatusUpdateOptions,
};
pub use service::transfers::{TransferOutcome, TransferRequestItem, TransferService};
