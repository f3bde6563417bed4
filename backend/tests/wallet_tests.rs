//! Wallet ledger tests
//!
//! Property and unit tests for:
//! - Balances never go negative
//! - Every ledger row's balance_after equals the running balance
//! - Statistics over a transaction log

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    apply_credit, apply_debit, LedgerError, Wallet, WalletStatistics, WalletTransaction,
    WalletTransactionStatus, WalletTransactionType,
};
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn wallet(balance: &str, is_active: bool) -> Wallet {
    Wallet {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        balance: dec(balance),
        is_active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Amounts in cents between 0.01 and 10,000.00
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

#[derive(Debug, Clone)]
enum Movement {
    Credit(Decimal),
    Debit(Decimal),
}

fn movement_strategy() -> impl Strategy<Value = Movement> {
    prop_oneof![
        amount_strategy().prop_map(Movement::Credit),
        amount_strategy().prop_map(Movement::Debit),
    ]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property: replaying any sequence of movements keeps the balance >= 0
    /// and each accepted row's balance_after matches the running balance
    #[test]
    fn test_balance_never_negative(
        movements in prop::collection::vec(movement_strategy(), 1..40),
    ) {
        let mut balance = Decimal::ZERO;
        for movement in movements {
            let result = match movement {
                Movement::Credit(a) => apply_credit(balance, a, WalletTransactionType::Deposit),
                Movement::Debit(a) => apply_debit(balance, a, WalletTransactionType::Withdrawal),
            };
            match result {
                Ok(entry) => {
                    prop_assert_eq!(entry.balance_after, balance + entry.amount);
                    balance = entry.balance_after;
                }
                Err(LedgerError::InsufficientFunds { balance: b, requested }) => {
                    prop_assert_eq!(b, balance);
                    prop_assert!(requested > balance);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
            prop_assert!(balance >= Decimal::ZERO);
        }
    }

    /// Property: debits are stored negative, credits positive
    #[test]
    fn test_signed_amounts(
        start in amount_strategy(),
        amount in amount_strategy(),
    ) {
        let credit = apply_credit(start, amount, WalletTransactionType::Refund).unwrap();
        prop_assert!(credit.amount > Decimal::ZERO);

        let funded = start + amount;
        let debit = apply_debit(funded, amount, WalletTransactionType::Purchase).unwrap();
        prop_assert_eq!(debit.amount, -amount);
        prop_assert_eq!(debit.balance_after, start);
    }

    /// Property: statistics credits minus debits equals the net movement
    #[test]
    fn test_statistics_net_movement(
        amounts in prop::collection::vec(amount_strategy(), 1..20),
    ) {
        let wallet_id = Uuid::new_v4();
        let mut balance = Decimal::ZERO;
        let mut rows = Vec::new();
        for (i, amount) in amounts.iter().enumerate() {
            let signed = if i % 3 == 2 && *amount <= balance { -*amount } else { *amount };
            balance += signed;
            rows.push(WalletTransaction {
                id: Uuid::new_v4(),
                wallet_id,
                transaction_type: if signed > Decimal::ZERO {
                    WalletTransactionType::Deposit
                } else {
                    WalletTransactionType::Withdrawal
                },
                amount: signed,
                balance_after: balance,
                status: WalletTransactionStatus::Completed,
                description: String::new(),
                reference_id: None,
                created_at: Utc::now(),
            });
        }
        let stats = WalletStatistics::compute(balance, &rows);
        prop_assert_eq!(stats.total_credits - stats.total_debits, balance);
        prop_assert_eq!(stats.transaction_count, rows.len() as i64);
        prop_assert_eq!(stats.total_refunds, Decimal::ZERO);
    }
}

// ============================================================================
// Unit Tests: Wallet Methods
// ============================================================================

#[cfg(test)]
mod wallet_method_tests {
    use super::*;

    #[test]
    fn test_inactive_wallet_rejects_movements() {
        let w = wallet("50.00", false);
        assert_eq!(
            w.add_funds(dec("10"), WalletTransactionType::Deposit),
            Err(LedgerError::InactiveWallet)
        );
        assert_eq!(
            w.deduct_funds(dec("10"), WalletTransactionType::Purchase),
            Err(LedgerError::InactiveWallet)
        );
    }

    #[test]
    fn test_exact_balance_debit_allowed() {
        let w = wallet("25.40", true);
        let entry = w
            .deduct_funds(dec("25.40"), WalletTransactionType::Purchase)
            .unwrap();
        assert_eq!(entry.balance_after, Decimal::ZERO);
        assert_eq!(entry.transaction_type, WalletTransactionType::Purchase);
    }

    #[test]
    fn test_overdraft_reports_balance_and_request() {
        let w = wallet("9.99", true);
        let err = w
            .deduct_funds(dec("10.00"), WalletTransactionType::Withdrawal)
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                balance: dec("9.99"),
                requested: dec("10.00"),
            }
        );
    }

    #[test]
    fn test_zero_amount_rejected() {
        let w = wallet("10", true);
        assert_eq!(
            w.add_funds(Decimal::ZERO, WalletTransactionType::Bonus),
            Err(LedgerError::NonPositiveAmount)
        );
    }

    #[test]
    fn test_transaction_type_labels() {
        assert_eq!(WalletTransactionType::Refund.as_str(), "REFUND");
        assert_eq!(WalletTransactionType::Correction.as_str(), "CORRECTION");
    }
}
