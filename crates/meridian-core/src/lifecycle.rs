//! # Order Lifecycle Rules
//!
//! The pure half of the Order Lifecycle Engine: the status state machine,
//! the payment-transition preconditions, and the bank-transfer expiry
//! predicate. No I/O here; the transactional half lives in meridian-db.
//!
//! ## Status graph
//! ```text
//!  pending ──► confirmed ──► processing ──► shipped ──► delivered (terminal)
//!     │            │             │
//!     └────────────┴─────────────┴──────► cancelled (terminal)
//! ```
//!
//! No self-transitions, no skipping states, no way out of a terminal state.
//! Cancellation is reachable from every pre-shipment state; once shipped,
//! the only way forward is delivery.
//!
//! ## Payment machine
//! The payment lifecycle is a separate, narrower machine gated by payment
//! method:
//! ```text
//!  pending ──► paid      (bank transfer confirmation | COD collection)
//!  pending ──► failed    (markFailed)
//!  paid    ──► refunded  (processRefund)
//! ```
//! Each guard below checks the method/state preconditions and reports the
//! precise refusal reason; the caller owns the actual write.

use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, CoreResult, PaymentDenied};
use crate::types::{Order, OrderStatus, PaymentMethod, PaymentStatus};

/// Bank-transfer orders expire this long after creation if still unpaid.
pub const BANK_TRANSFER_EXPIRY_HOURS: i64 = 24;

// =============================================================================
// Status State Machine
// =============================================================================

/// Returns the statuses reachable from `status` in one transition.
///
/// Terminal states return an empty slice.
pub fn allowed_transitions(status: OrderStatus) -> &'static [OrderStatus] {
    match status {
        OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
        OrderStatus::Confirmed => &[OrderStatus::Processing, OrderStatus::Cancelled],
        OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
        OrderStatus::Shipped => &[OrderStatus::Delivered],
        OrderStatus::Delivered => &[],
        OrderStatus::Cancelled => &[],
    }
}

/// Pure lookup: does the edge `current -> target` exist?
#[inline]
pub fn is_valid_transition(current: OrderStatus, target: OrderStatus) -> bool {
    allowed_transitions(current).contains(&target)
}

/// Validates a transition, surfacing both endpoints on refusal.
pub fn check_transition(current: OrderStatus, target: OrderStatus) -> CoreResult<()> {
    if is_valid_transition(current, target) {
        Ok(())
    } else {
        Err(CoreError::InvalidStatusTransition {
            from: current,
            to: target,
        })
    }
}

// =============================================================================
// Payment Guards
// =============================================================================

/// Precondition for confirming a bank transfer: `pending -> paid`, only for
/// bank-transfer orders that have not been cancelled.
pub fn check_bank_transfer_confirmation(order: &Order) -> Result<(), PaymentDenied> {
    if order.payment_method != PaymentMethod::BankTransfer {
        return Err(PaymentDenied::WrongMethod {
            expected: PaymentMethod::BankTransfer,
            actual: order.payment_method,
        });
    }
    if order.status == OrderStatus::Cancelled {
        return Err(PaymentDenied::OrderCancelled);
    }
    if order.payment_status != PaymentStatus::Pending {
        return Err(PaymentDenied::WrongPaymentStatus {
            expected: PaymentStatus::Pending,
            current: order.payment_status,
        });
    }
    Ok(())
}

/// Precondition for COD collection: `pending -> paid`, only for COD orders
/// that are shipped or delivered, and only when the collected amount equals
/// the order total exactly.
pub fn check_cod_completion(order: &Order, collected_cents: i64) -> Result<(), PaymentDenied> {
    if order.payment_method != PaymentMethod::Cod {
        return Err(PaymentDenied::WrongMethod {
            expected: PaymentMethod::Cod,
            actual: order.payment_method,
        });
    }
    if !matches!(order.status, OrderStatus::Shipped | OrderStatus::Delivered) {
        return Err(PaymentDenied::WrongOrderStatus {
            status: order.status,
        });
    }
    if order.payment_status != PaymentStatus::Pending {
        return Err(PaymentDenied::WrongPaymentStatus {
            expected: PaymentStatus::Pending,
            current: order.payment_status,
        });
    }
    if collected_cents != order.total_cents {
        return Err(PaymentDenied::AmountMismatch {
            total_cents: order.total_cents,
            collected_cents,
        });
    }
    Ok(())
}

/// Precondition for marking a payment failed: `pending -> failed` only.
pub fn check_mark_failed(order: &Order) -> Result<(), PaymentDenied> {
    if order.payment_status != PaymentStatus::Pending {
        return Err(PaymentDenied::WrongPaymentStatus {
            expected: PaymentStatus::Pending,
            current: order.payment_status,
        });
    }
    Ok(())
}

/// Precondition for a refund: `paid -> refunded` only, amount capped at the
/// order total.
pub fn check_refund(order: &Order, amount_cents: i64) -> Result<(), PaymentDenied> {
    if order.payment_status != PaymentStatus::Paid {
        return Err(PaymentDenied::WrongPaymentStatus {
            expected: PaymentStatus::Paid,
            current: order.payment_status,
        });
    }
    if amount_cents > order.total_cents {
        return Err(PaymentDenied::RefundExceedsTotal {
            total_cents: order.total_cents,
            requested_cents: amount_cents,
        });
    }
    Ok(())
}

// =============================================================================
// Payment Expiry
// =============================================================================

/// True when an unpaid bank-transfer order is older than
/// [`BANK_TRANSFER_EXPIRY_HOURS`].
///
/// Derived predicate only: callers poll it to decide whether to cancel;
/// it never mutates state itself.
pub fn is_payment_expired(order: &Order, now: DateTime<Utc>) -> bool {
    order.payment_method == PaymentMethod::BankTransfer
        && order.payment_status == PaymentStatus::Pending
        && now - order.created_at > Duration::hours(BANK_TRANSFER_EXPIRY_HOURS)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order(
        status: OrderStatus,
        payment_status: PaymentStatus,
        payment_method: PaymentMethod,
    ) -> Order {
        let now = Utc::now();
        Order {
            id: "o1".to_string(),
            store_id: "s1".to_string(),
            online_store_id: "os1".to_string(),
            order_number: "ON202608050001".to_string(),
            status,
            payment_status,
            payment_method,
            customer_name: None,
            subtotal_cents: 10_000,
            discount_cents: 0,
            shipping_fee_cents: 0,
            total_cents: 10_000,
            shipping_carrier: None,
            tracking_number: None,
            notes: None,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_state_machine_closure() {
        use OrderStatus::*;

        // The full edge table; nothing more, nothing less.
        let table: &[(OrderStatus, &[OrderStatus])] = &[
            (Pending, &[Confirmed, Cancelled]),
            (Confirmed, &[Processing, Cancelled]),
            (Processing, &[Shipped, Cancelled]),
            (Shipped, &[Delivered]),
            (Delivered, &[]),
            (Cancelled, &[]),
        ];

        for (from, targets) in table {
            assert_eq!(allowed_transitions(*from), *targets);
            for to in [Pending, Confirmed, Processing, Shipped, Delivered, Cancelled] {
                assert_eq!(is_valid_transition(*from, to), targets.contains(&to));
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_edges() {
        assert!(allowed_transitions(OrderStatus::Delivered).is_empty());
        assert!(allowed_transitions(OrderStatus::Cancelled).is_empty());
    }

    #[test]
    fn test_no_self_transitions() {
        use OrderStatus::*;
        for s in [Pending, Confirmed, Processing, Shipped, Delivered, Cancelled] {
            assert!(!is_valid_transition(s, s));
        }
    }

    #[test]
    fn test_check_transition_carries_both_statuses() {
        let err = check_transition(OrderStatus::Pending, OrderStatus::Shipped).unwrap_err();
        match err {
            CoreError::InvalidStatusTransition { from, to } => {
                assert_eq!(from, OrderStatus::Pending);
                assert_eq!(to, OrderStatus::Shipped);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bank_transfer_requires_bank_transfer_method() {
        let o = order(
            OrderStatus::Pending,
            PaymentStatus::Pending,
            PaymentMethod::Cod,
        );
        assert!(matches!(
            check_bank_transfer_confirmation(&o),
            Err(PaymentDenied::WrongMethod { .. })
        ));
    }

    #[test]
    fn test_bank_transfer_rejected_on_cancelled_order() {
        let o = order(
            OrderStatus::Cancelled,
            PaymentStatus::Pending,
            PaymentMethod::BankTransfer,
        );
        assert_eq!(
            check_bank_transfer_confirmation(&o),
            Err(PaymentDenied::OrderCancelled)
        );
    }

    #[test]
    fn test_cod_requires_shipped_or_delivered() {
        let o = order(
            OrderStatus::Processing,
            PaymentStatus::Pending,
            PaymentMethod::Cod,
        );
        assert!(matches!(
            check_cod_completion(&o, 10_000),
            Err(PaymentDenied::WrongOrderStatus { .. })
        ));

        let o = order(
            OrderStatus::Shipped,
            PaymentStatus::Pending,
            PaymentMethod::Cod,
        );
        assert!(check_cod_completion(&o, 10_000).is_ok());
    }

    #[test]
    fn test_cod_amount_must_match_exactly() {
        let o = order(
            OrderStatus::Delivered,
            PaymentStatus::Pending,
            PaymentMethod::Cod,
        );
        assert_eq!(
            check_cod_completion(&o, 9_999),
            Err(PaymentDenied::AmountMismatch {
                total_cents: 10_000,
                collected_cents: 9_999,
            })
        );
        assert!(check_cod_completion(&o, 10_000).is_ok());
    }

    #[test]
    fn test_mark_failed_only_from_pending() {
        let o = order(
            OrderStatus::Pending,
            PaymentStatus::Paid,
            PaymentMethod::Momo,
        );
        assert!(matches!(
            check_mark_failed(&o),
            Err(PaymentDenied::WrongPaymentStatus { .. })
        ));
    }

    #[test]
    fn test_refund_only_from_paid_and_capped() {
        let o = order(
            OrderStatus::Delivered,
            PaymentStatus::Pending,
            PaymentMethod::Vnpay,
        );
        assert!(matches!(
            check_refund(&o, 5_000),
            Err(PaymentDenied::WrongPaymentStatus { .. })
        ));

        let o = order(
            OrderStatus::Delivered,
            PaymentStatus::Paid,
            PaymentMethod::Vnpay,
        );
        assert!(check_refund(&o, 10_000).is_ok());
        assert_eq!(
            check_refund(&o, 10_001),
            Err(PaymentDenied::RefundExceedsTotal {
                total_cents: 10_000,
                requested_cents: 10_001,
            })
        );
    }

    #[test]
    fn test_payment_expiry_boundary() {
        let mut o = order(
            OrderStatus::Pending,
            PaymentStatus::Pending,
            PaymentMethod::BankTransfer,
        );
        let created = Utc::now();
        o.created_at = created;

        assert!(!is_payment_expired(&o, created + Duration::hours(23)));
        assert!(is_payment_expired(
            &o,
            created + Duration::hours(24) + Duration::seconds(1)
        ));
    }

    #[test]
    fn test_paid_or_cod_orders_never_expire() {
        let mut o = order(
            OrderStatus::Pending,
            PaymentStatus::Paid,
            PaymentMethod::BankTransfer,
        );
        let created = Utc::now();
        o.created_at = created;
        assert!(!is_payment_expired(&o, created + Duration::hours(48)));

        let mut o = order(
            OrderStatus::Pending,
            PaymentStatus::Pending,
            PaymentMethod::Cod,
        );
        o.created_at = created;
        assert!(!is_payment_expired(&o, created + Duration::hours(48)));
    }
}
