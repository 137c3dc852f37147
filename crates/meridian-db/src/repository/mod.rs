//! # Repository Layer
//!
//! Row-level data access, one module per aggregate:
//!
//! - [`store`] - stores and online-store resolution
//! - [`product`] - products and online-listing resolution
//! - [`lot`] - the Lot Ledger (FIFO purchase lots)
//! - [`inventory`] - the Stock Conversion Service (POS aggregate stock)
//! - [`order`] - order/line-item rows and counters
//! - [`transfer`] - cross-store transfer records
//!
//! Repositories whose operations compose into larger transactions
//! (everything except the self-contained Stock Conversion Service) take an
//! explicit `&mut SqliteConnection` unit-of-work handle; the services in
//! [`crate::service`] own the transaction around them.

pub mod inventory;
pub mod lot;
pub mod order;
pub mod product;
pub mod store;
pub mod transfer;
