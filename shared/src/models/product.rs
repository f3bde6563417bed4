//! Catalog models: categories, products and reviews

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Products with fewer units than this show up in low-stock listings
pub const LOW_STOCK_THRESHOLD: i32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Option<Uuid>,
    /// Free text such as "1 año de garantía" or "6 months"
    pub warranty_info: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    /// 1 to 5 stars
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate of a product's reviews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average_rating: Option<Decimal>,
    pub review_count: i64,
}

impl RatingSummary {
    pub fn from_ratings(ratings: &[i16]) -> Self {
        Self {
            average_rating: average_rating(ratings),
            review_count: ratings.len() as i64,
        }
    }
}

/// Mean of the ratings rounded half away from zero to two decimals,
/// `None` when there are no reviews
pub fn average_rating(ratings: &[i16]) -> Option<Decimal> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let mean = Decimal::from(sum) / Decimal::from(ratings.len() as i64);
    Some(mean.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_average_rating_empty() {
        assert_eq!(average_rating(&[]), None);
    }

    #[test]
    fn test_average_rating_rounds() {
        assert_eq!(average_rating(&[5, 4, 4]), Some(Decimal::from_str("4.33").unwrap()));
        assert_eq!(average_rating(&[5, 4]), Some(Decimal::from_str("4.5").unwrap()));
        assert_eq!(average_rating(&[1, 2, 2]), Some(Decimal::from_str("1.67").unwrap()));
    }

    #[test]
    fn test_rating_summary() {
        let summary = RatingSummary::from_ratings(&[3, 3, 3]);
        assert_eq!(summary.review_count, 3);
        assert_eq!(summary.average_rating, Some(Decimal::from(3)));
    }
}
