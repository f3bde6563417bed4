//! Orders, order items and the order status lifecycle

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::TransitionError;

/// Order status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

/// Statuses whose totals count as revenue
pub const REVENUE_STATUSES: [OrderStatus; 3] =
    [OrderStatus::Paid, OrderStatus::Shipped, OrderStatus::Delivered];

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Accepts either case, as the admin panel sends lowercase values
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(OrderStatus::Pending),
            "PAID" => Some(OrderStatus::Paid),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Paid, Shipped)
                | (Paid, Delivered)
                | (Paid, Cancelled)
                | (Shipped, Delivered)
        )
    }

    pub fn transition_to(self, next: OrderStatus) -> Result<OrderStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "order",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn counts_as_revenue(&self) -> bool {
        REVENUE_STATUSES.contains(self)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub shipping_address: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order with the unit price captured at purchase time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

impl OrderItem {
    pub fn subtotal(&self) -> Decimal {
        line_subtotal(self.price, self.quantity)
    }
}

pub fn line_subtotal(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum of price x quantity over the lines
pub fn order_total<'a, I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = &'a (Decimal, i32)>,
{
    lines
        .into_iter()
        .map(|(price, qty)| line_subtotal(*price, *qty))
        .sum()
}

/// Month-over-month revenue growth in percent, 0 when there is no baseline
pub fn revenue_growth_percent(current: Decimal, previous: Decimal) -> Decimal {
    if previous <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Reference stored on wallet rows that pay for an order
pub fn order_reference(order_id: Uuid) -> String {
    format!("ORDER-{}", order_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_allowed_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Delivered));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_transition_error_names_states() {
        let err = OrderStatus::Cancelled
            .transition_to(OrderStatus::Paid)
            .unwrap_err();
        assert_eq!(err.from, "CANCELLED");
        assert_eq!(err.to, "PAID");
    }

    #[test]
    fn test_parse_lowercase() {
        assert_eq!(OrderStatus::parse("shipped"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::parse("lost"), None);
    }

    #[test]
    fn test_order_total() {
        let lines = vec![
            (Decimal::from_str("19.99").unwrap(), 2),
            (Decimal::from_str("5.00").unwrap(), 3),
        ];
        assert_eq!(order_total(&lines), Decimal::from_str("54.98").unwrap());
    }

    #[test]
    fn test_revenue_growth() {
        assert_eq!(
            revenue_growth_percent(Decimal::from(150), Decimal::from(100)),
            Decimal::from(50)
        );
        assert_eq!(
            revenue_growth_percent(Decimal::from(150), Decimal::ZERO),
            Decimal::ZERO
        );
        assert_eq!(
            revenue_growth_percent(Decimal::from(2), Decimal::from(3)),
            Decimal::from_str("-33.33").unwrap()
        );
    }
}
