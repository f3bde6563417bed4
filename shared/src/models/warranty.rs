//! Warranties issued on delivered items, and repair requests against them

use chrono::{DateTime, Duration, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::TransitionError;

/// Coverage used when the product text names no duration
pub const DEFAULT_WARRANTY_DAYS: i64 = 365;

/// Longest coverage issued, whatever the product text claims
pub const MAX_WARRANTY_DAYS: i64 = 10 * 365;

lazy_static! {
    static ref YEARS: Regex = Regex::new(r"(\d+)\s*(?:años?|years?)").unwrap();
    static ref MONTHS: Regex = Regex::new(r"(\d+)\s*(?:mes(?:es)?|months?)").unwrap();
    static ref DAYS: Regex = Regex::new(r"(\d+)\s*(?:días?|dias?|days?)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "warranty_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarrantyStatus {
    Active,
    Claimed,
    Expired,
    Void,
}

impl WarrantyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarrantyStatus::Active => "ACTIVE",
            WarrantyStatus::Claimed => "CLAIMED",
            WarrantyStatus::Expired => "EXPIRED",
            WarrantyStatus::Void => "VOID",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warranty {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: WarrantyStatus,
    pub terms: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("warranty is not active")]
    NotActive,

    /// The warranty ran out; the caller should persist the EXPIRED status
    #[error("warranty has expired")]
    Expired,
}

impl Warranty {
    /// ACTIVE and still within its coverage window
    pub fn is_usable(&self, today: NaiveDate) -> bool {
        self.status == WarrantyStatus::Active && self.end_date >= today
    }

    pub fn check_claim(&self, today: NaiveDate) -> Result<(), ClaimError> {
        if self.status != WarrantyStatus::Active {
            return Err(ClaimError::NotActive);
        }
        if self.end_date < today {
            return Err(ClaimError::Expired);
        }
        Ok(())
    }

    pub fn can_void(&self) -> bool {
        matches!(self.status, WarrantyStatus::Active | WarrantyStatus::Claimed)
    }
}

/// Coverage length in days parsed from a product's warranty text
/// ("1 año de garantía", "6 meses", "90 days"), defaulting to one year and
/// capped at [`MAX_WARRANTY_DAYS`]
pub fn warranty_duration_days(warranty_info: &str) -> i64 {
    parsed_duration_days(warranty_info).min(MAX_WARRANTY_DAYS)
}

fn parsed_duration_days(warranty_info: &str) -> i64 {
    let text = warranty_info.to_lowercase();
    // the captures are all digits, so a failed parse means too large
    let first_number = |re: &Regex| {
        re.captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().parse::<i64>().unwrap_or(i64::MAX))
    };

    if let Some(years) = first_number(&YEARS) {
        return years.saturating_mul(365);
    }
    if let Some(months) = first_number(&MONTHS) {
        return months.saturating_mul(30);
    }
    if let Some(days) = first_number(&DAYS) {
        return days;
    }
    DEFAULT_WARRANTY_DAYS
}

/// Coverage window starting on the delivery date
pub fn warranty_window(start: NaiveDate, warranty_info: &str) -> (NaiveDate, NaiveDate) {
    let end = start
        .checked_add_signed(Duration::days(warranty_duration_days(warranty_info)))
        .unwrap_or(NaiveDate::MAX);
    (start, end)
}

// ============================================================================
// Repairs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "repair_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairStatus {
    Requested,
    InProgress,
    Completed,
    Delivered,
    Cancelled,
}

impl RepairStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStatus::Requested => "REQUESTED",
            RepairStatus::InProgress => "IN_PROGRESS",
            RepairStatus::Completed => "COMPLETED",
            RepairStatus::Delivered => "DELIVERED",
            RepairStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn can_transition_to(&self, next: RepairStatus) -> bool {
        use RepairStatus::*;
        matches!(
            (self, next),
            (Requested, InProgress)
                | (Requested, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
                | (Completed, Delivered)
        )
    }

    pub fn transition_to(self, next: RepairStatus) -> Result<RepairStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "repair",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Repair {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub warranty_id: Option<Uuid>,
    pub description: String,
    pub status: RepairStatus,
    pub is_under_warranty: bool,
    pub estimated_cost: Option<Decimal>,
    pub final_cost: Option<Decimal>,
    pub technician_notes: String,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(warranty_duration_days("1 año de garantía"), 365);
        assert_eq!(warranty_duration_days("2 años de garantía"), 730);
        assert_eq!(warranty_duration_days("6 meses de garantía"), 180);
        assert_eq!(warranty_duration_days("90 días de garantía"), 90);
        assert_eq!(warranty_duration_days("2 Years limited"), 730);
        assert_eq!(warranty_duration_days("12 months"), 360);
        assert_eq!(warranty_duration_days(""), DEFAULT_WARRANTY_DAYS);
        assert_eq!(warranty_duration_days("garantía del fabricante"), DEFAULT_WARRANTY_DAYS);
    }

    #[test]
    fn test_absurd_durations_are_capped() {
        assert_eq!(warranty_duration_days("1000000 años de garantía"), MAX_WARRANTY_DAYS);
        assert_eq!(warranty_duration_days("99999999999999999999999 meses"), MAX_WARRANTY_DAYS);
        assert_eq!(warranty_duration_days("9223372036854775807 days"), MAX_WARRANTY_DAYS);
        assert_eq!(warranty_duration_days("10 años"), MAX_WARRANTY_DAYS);

        let (_, end) = warranty_window(date(2024, 1, 1), "1000000 años de garantía");
        assert_eq!(end, date(2024, 1, 1) + Duration::days(MAX_WARRANTY_DAYS));

        let (_, end) = warranty_window(NaiveDate::MAX, "1 año");
        assert_eq!(end, NaiveDate::MAX);
    }

    #[test]
    fn test_window() {
        let (start, end) = warranty_window(date(2024, 1, 1), "30 días");
        assert_eq!(start, date(2024, 1, 1));
        assert_eq!(end, date(2024, 1, 31));
    }

    fn warranty(status: WarrantyStatus, end: NaiveDate) -> Warranty {
        Warranty {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            start_date: date(2024, 1, 1),
            end_date: end,
            status,
            terms: String::new(),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_claim_rules() {
        let today = date(2024, 6, 1);
        assert!(warranty(WarrantyStatus::Active, date(2024, 6, 1)).check_claim(today).is_ok());
        assert_eq!(
            warranty(WarrantyStatus::Active, date(2024, 5, 31)).check_claim(today),
            Err(ClaimError::Expired)
        );
        assert_eq!(
            warranty(WarrantyStatus::Claimed, date(2025, 1, 1)).check_claim(today),
            Err(ClaimError::NotActive)
        );
    }

    #[test]
    fn test_repair_transitions() {
        assert!(RepairStatus::Requested.can_transition_to(RepairStatus::InProgress));
        assert!(RepairStatus::Completed.can_transition_to(RepairStatus::Delivered));
        assert!(!RepairStatus::Requested.can_transition_to(RepairStatus::Completed));
        assert!(!RepairStatus::Delivered.can_transition_to(RepairStatus::Cancelled));
    }
}
