//! Wallet ledger: a stored-value balance per user plus an append-only
//! transaction log recording the balance after every movement

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::validation::{has_cent_precision, MAX_MONEY_AMOUNT};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "wallet_transaction_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletTransactionType {
    Refund,
    Purchase,
    Withdrawal,
    Deposit,
    Bonus,
    Correction,
}

impl WalletTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTransactionType::Refund => "REFUND",
            WalletTransactionType::Purchase => "PURCHASE",
            WalletTransactionType::Withdrawal => "WITHDRAWAL",
            WalletTransactionType::Deposit => "DEPOSIT",
            WalletTransactionType::Bonus => "BONUS",
            WalletTransactionType::Correction => "CORRECTION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "wallet_transaction_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletTransactionStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_type: WalletTransactionType,
    /// Signed: negative for debits
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub status: WalletTransactionStatus,
    pub description: String,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    #[error("wallet is inactive")]
    InactiveWallet,

    #[error("amount {0} has more than two decimal places")]
    SubCentAmount(Decimal),

    #[error("balance would exceed the maximum of {max}")]
    BalanceLimitExceeded { max: Decimal },
}

fn check_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount);
    }
    if !has_cent_precision(amount) {
        return Err(LedgerError::SubCentAmount(amount));
    }
    Ok(())
}

/// The row to append for a successful balance movement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub transaction_type: WalletTransactionType,
    pub amount: Decimal,
    pub balance_after: Decimal,
}

/// Credit `amount` onto `balance`
pub fn apply_credit(
    balance: Decimal,
    amount: Decimal,
    transaction_type: WalletTransactionType,
) -> Result<LedgerEntry, LedgerError> {
    check_amount(amount)?;
    let balance_after = balance + amount;
    if balance_after > MAX_MONEY_AMOUNT {
        return Err(LedgerError::BalanceLimitExceeded {
            max: MAX_MONEY_AMOUNT,
        });
    }
    Ok(LedgerEntry {
        transaction_type,
        amount,
        balance_after,
    })
}

/// Debit `amount` from `balance`; the balance never goes below zero
pub fn apply_debit(
    balance: Decimal,
    amount: Decimal,
    transaction_type: WalletTransactionType,
) -> Result<LedgerEntry, LedgerError> {
    check_amount(amount)?;
    if amount > balance {
        return Err(LedgerError::InsufficientFunds {
            balance,
            requested: amount,
        });
    }
    Ok(LedgerEntry {
        transaction_type,
        amount: -amount,
        balance_after: balance - amount,
    })
}

impl Wallet {
    pub fn add_funds(
        &self,
        amount: Decimal,
        transaction_type: WalletTransactionType,
    ) -> Result<LedgerEntry, LedgerError> {
        if !self.is_active {
            return Err(LedgerError::InactiveWallet);
        }
        apply_credit(self.balance, amount, transaction_type)
    }

    pub fn deduct_funds(
        &self,
        amount: Decimal,
        transaction_type: WalletTransactionType,
    ) -> Result<LedgerEntry, LedgerError> {
        if !self.is_active {
            return Err(LedgerError::InactiveWallet);
        }
        apply_debit(self.balance, amount, transaction_type)
    }
}

/// Summary shown on the wallet statistics endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletStatistics {
    pub current_balance: Decimal,
    pub total_credits: Decimal,
    /// Absolute value of all debits
    pub total_debits: Decimal,
    pub total_refunds: Decimal,
    pub transaction_count: i64,
}

impl WalletStatistics {
    pub fn compute(current_balance: Decimal, transactions: &[WalletTransaction]) -> Self {
        let mut stats = Self {
            current_balance,
            total_credits: Decimal::ZERO,
            total_debits: Decimal::ZERO,
            total_refunds: Decimal::ZERO,
            transaction_count: transactions.len() as i64,
        };
        for tx in transactions {
            if tx.amount > Decimal::ZERO {
                stats.total_credits += tx.amount;
            } else {
                stats.total_debits += tx.amount.abs();
            }
            if tx.transaction_type == WalletTransactionType::Refund {
                stats.total_refunds += tx.amount;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_credit_and_debit() {
        let credit = apply_credit(dec("10.00"), dec("5.50"), WalletTransactionType::Deposit).unwrap();
        assert_eq!(credit.balance_after, dec("15.50"));
        assert_eq!(credit.amount, dec("5.50"));

        let debit = apply_debit(dec("15.50"), dec("15.50"), WalletTransactionType::Withdrawal).unwrap();
        assert_eq!(debit.balance_after, Decimal::ZERO);
        assert_eq!(debit.amount, dec("-15.50"));
    }

    #[test]
    fn test_debit_over_balance_fails() {
        let err = apply_debit(dec("10"), dec("10.01"), WalletTransactionType::Withdrawal).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        assert_eq!(
            apply_credit(dec("1"), Decimal::ZERO, WalletTransactionType::Bonus),
            Err(LedgerError::NonPositiveAmount)
        );
        assert_eq!(
            apply_debit(dec("1"), dec("-1"), WalletTransactionType::Purchase),
            Err(LedgerError::NonPositiveAmount)
        );
    }

    #[test]
    fn test_sub_cent_amounts_rejected() {
        assert_eq!(
            apply_credit(dec("10"), dec("0.004"), WalletTransactionType::Deposit),
            Err(LedgerError::SubCentAmount(dec("0.004")))
        );
        assert_eq!(
            apply_debit(dec("10"), dec("1.005"), WalletTransactionType::Withdrawal),
            Err(LedgerError::SubCentAmount(dec("1.005")))
        );
        // trailing zeros are still whole cents
        assert!(apply_credit(dec("10"), dec("1.500"), WalletTransactionType::Deposit).is_ok());
    }

    #[test]
    fn test_credit_cannot_overflow_column() {
        let err = apply_credit(MAX_MONEY_AMOUNT, dec("0.01"), WalletTransactionType::Deposit)
            .unwrap_err();
        assert!(matches!(err, LedgerError::BalanceLimitExceeded { .. }));
    }

    #[test]
    fn test_statistics() {
        let wallet_id = Uuid::new_v4();
        let row = |kind, amount: &str, after: &str| WalletTransaction {
            id: Uuid::new_v4(),
            wallet_id,
            transaction_type: kind,
            amount: dec(amount),
            balance_after: dec(after),
            status: WalletTransactionStatus::Completed,
            description: String::new(),
            reference_id: None,
            created_at: Utc::now(),
        };
        let rows = vec![
            row(WalletTransactionType::Deposit, "100", "100"),
            row(WalletTransactionType::Refund, "25", "125"),
            row(WalletTransactionType::Withdrawal, "-40", "85"),
        ];
        let stats = WalletStatistics::compute(dec("85"), &rows);
        assert_eq!(stats.total_credits, dec("125"));
        assert_eq!(stats.total_debits, dec("40"));
        assert_eq!(stats.total_refunds, dec("25"));
        assert_eq!(stats.transaction_count, 3);
    }
}
