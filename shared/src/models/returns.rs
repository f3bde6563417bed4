//! Product returns and the refund workflow
//!
//! REQUESTED -> IN_EVALUATION -> APPROVED | REJECTED, then APPROVED -> COMPLETED.
//! The refund method decides whether approval completes the return at once
//! (wallet credit, successful gateway refund) or leaves it APPROVED for
//! manual follow-up (bank transfer, failed gateway refund).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::line_subtotal;
use crate::validation::has_cent_precision;
use crate::types::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "return_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    Requested,
    InEvaluation,
    Approved,
    Rejected,
    Completed,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Requested => "REQUESTED",
            ReturnStatus::InEvaluation => "IN_EVALUATION",
            ReturnStatus::Approved => "APPROVED",
            ReturnStatus::Rejected => "REJECTED",
            ReturnStatus::Completed => "COMPLETED",
        }
    }

    pub fn can_transition_to(&self, next: ReturnStatus) -> bool {
        use ReturnStatus::*;
        matches!(
            (self, next),
            (Requested, InEvaluation)
                | (InEvaluation, Approved)
                | (InEvaluation, Rejected)
                | (Approved, Completed)
        )
    }

    pub fn transition_to(self, next: ReturnStatus) -> Result<ReturnStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "return",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }

    /// Rejected returns free their quantity for a new request
    pub fn holds_quantity(&self) -> bool {
        !matches!(self, ReturnStatus::Rejected)
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "return_reason", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnReason {
    Defective,
    WrongItem,
    NotAsDescribed,
    ChangedMind,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "refund_method", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundMethod {
    /// Credit the customer's wallet
    #[default]
    Wallet,
    /// Refund through the payment gateway that took the money
    Original,
    /// Manual bank transfer
    Bank,
}

impl RefundMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundMethod::Wallet => "WALLET",
            RefundMethod::Original => "ORIGINAL",
            RefundMethod::Bank => "BANK",
        }
    }

    /// Status a return lands in after approval, given whether the refund
    /// went through
    pub fn status_after_dispatch(&self, dispatched: bool) -> ReturnStatus {
        match (self, dispatched) {
            (RefundMethod::Wallet, true) | (RefundMethod::Original, true) => {
                ReturnStatus::Completed
            }
            _ => ReturnStatus::Approved,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductReturn {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub reason: ReturnReason,
    pub description: String,
    pub status: ReturnStatus,
    pub refund_method: RefundMethod,
    pub refund_amount: Option<Decimal>,
    pub manager_notes: String,
    pub evaluation_notes: String,
    pub requested_at: DateTime<Utc>,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefundAmountError {
    #[error("refund amount must be greater than zero")]
    NonPositive,

    #[error("refund amount {requested} exceeds the {max} paid for the returned items")]
    ExceedsPaid { requested: Decimal, max: Decimal },

    #[error("refund amount {0} has more than two decimal places")]
    SubCent(Decimal),
}

/// Refund owed for a return: the manager's override when given, otherwise
/// the purchase-time unit price times the returned quantity
pub fn compute_refund_amount(
    unit_price: Decimal,
    quantity: i32,
    override_amount: Option<Decimal>,
) -> Result<Decimal, RefundAmountError> {
    let max = line_subtotal(unit_price, quantity);
    match override_amount {
        None => Ok(max),
        Some(amount) if amount <= Decimal::ZERO => Err(RefundAmountError::NonPositive),
        Some(amount) if !has_cent_precision(amount) => Err(RefundAmountError::SubCent(amount)),
        Some(amount) if amount > max => Err(RefundAmountError::ExceedsPaid {
            requested: amount,
            max,
        }),
        Some(amount) => Ok(amount),
    }
}

/// Units of an order line still available for a new return request
pub fn returnable_quantity(ordered: i32, already_requested: i32) -> i32 {
    (ordered - already_requested).max(0)
}

/// Reference stored on the wallet transaction crediting a return
pub fn return_reference(return_id: Uuid) -> String {
    format!("RETURN-{}", return_id)
}
