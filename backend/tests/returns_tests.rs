//! Product return tests
//!
//! Covers the return status machine, refund amount rules and how much of an
//! order line is still returnable.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    compute_refund_amount, return_reference, returnable_quantity, RefundAmountError,
    RefundMethod, ReturnStatus,
};
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

const ALL_STATUSES: [ReturnStatus; 5] = [
    ReturnStatus::Requested,
    ReturnStatus::InEvaluation,
    ReturnStatus::Approved,
    ReturnStatus::Rejected,
    ReturnStatus::Completed,
];

fn status_strategy() -> impl Strategy<Value = ReturnStatus> {
    prop::sample::select(ALL_STATUSES.to_vec())
}

fn unit_price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=200_000).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    /// Property: without an override the refund is unit price x quantity
    #[test]
    fn test_default_refund_is_line_value(
        price in unit_price_strategy(),
        quantity in 1i32..=20,
    ) {
        let amount = compute_refund_amount(price, quantity, None).unwrap();
        prop_assert_eq!(amount, price * Decimal::from(quantity));
    }

    /// Property: an accepted override lies in (0, price x quantity]
    #[test]
    fn test_override_bounds(
        price in unit_price_strategy(),
        quantity in 1i32..=20,
        override_cents in -1_000i64..=5_000_000,
    ) {
        let max = price * Decimal::from(quantity);
        let requested = Decimal::new(override_cents, 2);
        match compute_refund_amount(price, quantity, Some(requested)) {
            Ok(amount) => {
                prop_assert!(amount > Decimal::ZERO);
                prop_assert!(amount <= max);
                prop_assert_eq!(amount, requested);
            }
            Err(RefundAmountError::NonPositive) => prop_assert!(requested <= Decimal::ZERO),
            Err(RefundAmountError::ExceedsPaid { max: m, .. }) => {
                prop_assert_eq!(m, max);
                prop_assert!(requested > max);
            }
            Err(RefundAmountError::SubCent(a)) => {
                prop_assert!(false, "whole-cent override {} rejected as sub-cent", a);
            }
        }
    }

    /// Property: returnable quantity never goes negative and never exceeds
    /// what was ordered
    #[test]
    fn test_returnable_quantity_bounds(
        ordered in 0i32..=100,
        requested in 0i32..=150,
    ) {
        let left = returnable_quantity(ordered, requested);
        prop_assert!(left >= 0);
        prop_assert!(left <= ordered);
    }

    /// Property: COMPLETED and REJECTED are final
    #[test]
    fn test_final_statuses(to in status_strategy()) {
        prop_assert!(!ReturnStatus::Completed.can_transition_to(to));
        prop_assert!(!ReturnStatus::Rejected.can_transition_to(to));
    }
}

#[cfg(test)]
mod status_machine_tests {
    use super::*;

    #[test]
    fn test_cannot_skip_evaluation() {
        assert!(!ReturnStatus::Requested.can_transition_to(ReturnStatus::Approved));
        assert!(!ReturnStatus::Requested.can_transition_to(ReturnStatus::Rejected));
        let err = ReturnStatus::Requested
            .transition_to(ReturnStatus::Completed)
            .unwrap_err();
        assert_eq!(err.from, "REQUESTED");
        assert_eq!(err.to, "COMPLETED");
    }

    #[test]
    fn test_rejected_frees_quantity() {
        assert!(!ReturnStatus::Rejected.holds_quantity());
        assert!(ReturnStatus::Requested.holds_quantity());
        assert!(ReturnStatus::Completed.holds_quantity());
    }

    #[test]
    fn test_status_after_dispatch() {
        assert_eq!(
            RefundMethod::Wallet.status_after_dispatch(true),
            ReturnStatus::Completed
        );
        assert_eq!(
            RefundMethod::Original.status_after_dispatch(true),
            ReturnStatus::Completed
        );
        assert_eq!(
            RefundMethod::Original.status_after_dispatch(false),
            ReturnStatus::Approved
        );
        assert_eq!(
            RefundMethod::Bank.status_after_dispatch(true),
            ReturnStatus::Approved
        );
    }
}

#[cfg(test)]
mod refund_amount_tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        assert_eq!(
            compute_refund_amount(dec("40.00"), 2, Some(dec("55.50"))),
            Ok(dec("55.50"))
        );
    }

    #[test]
    fn test_override_above_paid() {
        assert_eq!(
            compute_refund_amount(dec("40.00"), 2, Some(dec("80.01"))),
            Err(RefundAmountError::ExceedsPaid {
                requested: dec("80.01"),
                max: dec("80.00"),
            })
        );
    }

    #[test]
    fn test_zero_override() {
        assert_eq!(
            compute_refund_amount(dec("40.00"), 1, Some(Decimal::ZERO)),
            Err(RefundAmountError::NonPositive)
        );
    }

    #[test]
    fn test_return_reference() {
        let id = Uuid::nil();
        assert!(return_reference(id).starts_with("RETURN-"));
    }

    #[test]
    fn test_returnable_after_previous_requests() {
        assert_eq!(returnable_quantity(3, 1), 2);
        assert_eq!(returnable_quantity(3, 3), 0);
        assert_eq!(returnable_quantity(3, 5), 0);
    }
}
