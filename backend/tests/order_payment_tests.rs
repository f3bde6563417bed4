//! Order lifecycle and payment arithmetic tests

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    line_subtotal, order_reference, order_total, revenue_growth_percent, status_after_refund,
    to_cents, OrderStatus, PaymentStatus, RefundStatus,
};
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

const ALL_STATUSES: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Paid,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
];

// ============================================================================
// Property Test Strategies
// ============================================================================

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=500_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn line_strategy() -> impl Strategy<Value = (Decimal, i32)> {
    (price_strategy(), 1i32..=50)
}

fn status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(ALL_STATUSES.to_vec())
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property: order total is the sum of line subtotals
    #[test]
    fn test_order_total_matches_lines(
        lines in prop::collection::vec(line_strategy(), 1..10),
    ) {
        let expected: Decimal = lines.iter().map(|(p, q)| *p * Decimal::from(*q)).sum();
        prop_assert_eq!(order_total(&lines), expected);
    }

    /// Property: two-decimal prices convert to cents exactly
    #[test]
    fn test_cents_exact_for_two_decimals(cents in 0i64..=100_000_000) {
        prop_assert_eq!(to_cents(Decimal::new(cents, 2)), Some(cents));
    }

    /// Property: terminal statuses accept no further transition
    #[test]
    fn test_terminal_statuses_are_final(
        from in status_strategy(),
        to in status_strategy(),
    ) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
            prop_assert!(from.transition_to(to).is_err());
        }
    }

    /// Property: no status transitions to itself
    #[test]
    fn test_no_self_transition(status in status_strategy()) {
        prop_assert!(!status.can_transition_to(status));
    }

    /// Property: refunding the full amount marks a payment REFUNDED, less
    /// marks it PARTIALLY_REFUNDED
    #[test]
    fn test_status_after_refund(
        amount in 1i64..=1_000_000,
        refunded in 1i64..=1_000_000,
    ) {
        let status = status_after_refund(Decimal::new(amount, 2), Decimal::new(refunded, 2));
        if refunded >= amount {
            prop_assert_eq!(status, PaymentStatus::Refunded);
        } else {
            prop_assert_eq!(status, PaymentStatus::PartiallyRefunded);
        }
    }
}

// ============================================================================
// Unit Tests: Lifecycle
// ============================================================================

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_full_happy_path() {
        let delivered = OrderStatus::Pending
            .transition_to(OrderStatus::Paid)
            .and_then(|s| s.transition_to(OrderStatus::Shipped))
            .and_then(|s| s.transition_to(OrderStatus::Delivered));
        assert_eq!(delivered, Ok(OrderStatus::Delivered));
    }

    #[test]
    fn test_shipped_cannot_be_cancelled() {
        let err = OrderStatus::Shipped
            .transition_to(OrderStatus::Cancelled)
            .unwrap_err();
        assert_eq!(err.entity, "order");
        assert_eq!(err.to_string(), "order cannot move from SHIPPED to CANCELLED");
    }

    #[test]
    fn test_revenue_statuses() {
        assert!(OrderStatus::Paid.counts_as_revenue());
        assert!(OrderStatus::Shipped.counts_as_revenue());
        assert!(OrderStatus::Delivered.counts_as_revenue());
        assert!(!OrderStatus::Pending.counts_as_revenue());
        assert!(!OrderStatus::Cancelled.counts_as_revenue());
    }

    #[test]
    fn test_order_reference_format() {
        let id = Uuid::nil();
        assert_eq!(
            order_reference(id),
            "ORDER-00000000-0000-0000-0000-000000000000"
        );
    }
}

// ============================================================================
// Unit Tests: Payments
// ============================================================================

#[cfg(test)]
mod payment_tests {
    use super::*;

    #[test]
    fn test_cents_round_half_up() {
        assert_eq!(to_cents(dec("10.005")), Some(1001));
        assert_eq!(to_cents(dec("10.004")), Some(1000));
        assert_eq!(to_cents(dec("0")), Some(0));
    }

    #[test]
    fn test_line_subtotal() {
        assert_eq!(line_subtotal(dec("12.50"), 4), dec("50.00"));
    }

    #[test]
    fn test_refundable_payment_statuses() {
        assert!(PaymentStatus::Completed.is_refundable());
        assert!(PaymentStatus::PartiallyRefunded.is_refundable());
        assert!(!PaymentStatus::Pending.is_refundable());
        assert!(!PaymentStatus::Refunded.is_refundable());
        assert!(!PaymentStatus::Failed.is_refundable());
    }

    #[test]
    fn test_gateway_refund_status_mapping() {
        assert_eq!(RefundStatus::from_gateway("succeeded"), RefundStatus::Succeeded);
        assert_eq!(RefundStatus::from_gateway("canceled"), RefundStatus::Cancelled);
        assert_eq!(RefundStatus::from_gateway("something_new"), RefundStatus::Pending);
        assert!(RefundStatus::Pending.is_effective());
        assert!(!RefundStatus::Failed.is_effective());
    }

    #[test]
    fn test_growth_percent() {
        assert_eq!(revenue_growth_percent(dec("80"), dec("100")), dec("-20"));
        assert_eq!(revenue_growth_percent(dec("10"), Decimal::ZERO), Decimal::ZERO);
    }
}
