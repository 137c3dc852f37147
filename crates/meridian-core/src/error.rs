//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  meridian-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations (typed payloads)      │
//! │  ├── PaymentDenied    - Why a payment transition was refused           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  meridian-db errors (separate crate)                                   │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── ServiceError     - CoreError | DbError at the service boundary    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → HTTP layer         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Errors carry typed payloads the caller can act on (itemized
//!    shortfalls, current+target statuses) - never bare strings
//! 3. A `CoreError` always means "nothing happened": the enclosing
//!    transaction rolled back in full

use thiserror::Error;

use crate::types::{OrderStatus, PaymentMethod, PaymentStatus, Shortfall};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. Each one aborts the
/// surrounding transaction; callers receive the itemized payload and can
/// surface it directly.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested quantity exceeds available stock.
    ///
    /// ## When This Occurs
    /// - An order line requests more than the FIFO-available quantity
    /// - A POS sale requests more than the aggregate stock row holds
    /// - A transfer requests more than the source store has
    ///
    /// Carries the shortfalls of ALL failing items so the caller can show
    /// the full picture, not just the first failure.
    #[error("insufficient stock for {} item(s)", .shortfalls.len())]
    InsufficientStock { shortfalls: Vec<Shortfall> },

    /// Requested status edge does not exist in the lifecycle graph.
    ///
    /// No self-transitions, no skipping states, no way out of a terminal
    /// state.
    #[error("invalid status transition: {} -> {}", .from.as_str(), .to.as_str())]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// The order/store pair does not resolve.
    #[error("order not found: {order_id} (store {store_id})")]
    OrderNotFound { order_id: String, store_id: String },

    /// A payment-method/state precondition was violated.
    #[error("payment update rejected for order {order_id} (currently {}): {denied}", .current.as_str())]
    PaymentStatus {
        order_id: String,
        current: PaymentStatus,
        denied: PaymentDenied,
    },

    /// Store cannot be found.
    #[error("store not found: {0}")]
    StoreNotFound(String),

    /// Product cannot be found.
    ///
    /// Only raised where no sensible partial result exists (transfers);
    /// order creation treats an unresolvable product as an
    /// available-zero shortfall instead.
    #[error("product not found: {0}")]
    ProductNotFound(String),

    /// Transfer source and destination are the same store.
    #[error("cannot transfer inventory within the same store: {0}")]
    SameStoreTransfer(String),

    /// Transfer endpoints belong to different tenants.
    #[error("stores {source_store_id} and {destination_store_id} do not belong to the same tenant")]
    StoresNotSameTenant {
        source_store_id: String,
        destination_store_id: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Payment Denial Reasons
// =============================================================================

/// Why a payment transition was refused.
///
/// Embedded in [`CoreError::PaymentStatus`] so callers can distinguish an
/// operator mistake (wrong amount) from a workflow violation (wrong
/// method, wrong order status).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentDenied {
    #[error("payment method is {}, operation requires {}", .actual.as_str(), .expected.as_str())]
    WrongMethod {
        expected: PaymentMethod,
        actual: PaymentMethod,
    },

    #[error("order is cancelled")]
    OrderCancelled,

    /// COD can only be collected once the order is shipped or delivered.
    #[error("order status {} does not allow this payment operation", .status.as_str())]
    WrongOrderStatus { status: OrderStatus },

    /// COD collection must match the order total exactly.
    #[error("collected amount {collected_cents} does not match order total {total_cents}")]
    AmountMismatch {
        total_cents: i64,
        collected_cents: i64,
    },

    #[error("payment status is {}, operation requires {}", .current.as_str(), .expected.as_str())]
    WrongPaymentStatus {
        expected: PaymentStatus,
        current: PaymentStatus,
    },

    #[error("refund amount {requested_cents} exceeds order total {total_cents}")]
    RefundExceedsTotal {
        total_cents: i64,
        requested_cents: i64,
    },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Collection has more entries than allowed.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
