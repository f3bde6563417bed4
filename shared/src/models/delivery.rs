//! Delivery zones, courier profiles and delivery tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "delivery_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Assigned => "ASSIGNED",
            DeliveryStatus::PickedUp => "PICKED_UP",
            DeliveryStatus::InTransit => "IN_TRANSIT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Failed => "FAILED",
        }
    }

    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Assigned, PickedUp)
                | (Assigned, Failed)
                | (PickedUp, InTransit)
                | (PickedUp, Failed)
                | (InTransit, Delivered)
                | (InTransit, Failed)
        )
    }

    pub fn transition_to(self, next: DeliveryStatus) -> Result<DeliveryStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: "delivery",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Failed)
    }

    /// A courier is released back to AVAILABLE once a delivery finishes
    pub fn releases_courier(&self) -> bool {
        self.is_finished()
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Courier availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "courier_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourierStatus {
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DeliveryZone {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DeliveryProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub zone_id: Option<Uuid>,
    pub status: CourierStatus,
    pub vehicle_type: String,
    pub license_plate: String,
    pub phone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DeliveryProfile {
    pub fn can_take_delivery(&self) -> bool {
        self.is_active && self.status != CourierStatus::Offline
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub delivery_person_id: Option<Uuid>,
    pub zone_id: Option<Uuid>,
    pub status: DeliveryStatus,
    pub delivery_address: String,
    pub customer_phone: String,
    pub notes: String,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_path() {
        let s = DeliveryStatus::Pending
            .transition_to(DeliveryStatus::Assigned)
            .and_then(|s| s.transition_to(DeliveryStatus::PickedUp))
            .and_then(|s| s.transition_to(DeliveryStatus::InTransit))
            .and_then(|s| s.transition_to(DeliveryStatus::Delivered));
        assert_eq!(s, Ok(DeliveryStatus::Delivered));
    }

    #[test]
    fn test_failure_edges() {
        assert!(DeliveryStatus::Assigned.can_transition_to(DeliveryStatus::Failed));
        assert!(DeliveryStatus::InTransit.can_transition_to(DeliveryStatus::Failed));
        assert!(!DeliveryStatus::Pending.can_transition_to(DeliveryStatus::Failed));
        assert!(!DeliveryStatus::Failed.can_transition_to(DeliveryStatus::Assigned));
    }

    #[test]
    fn test_offline_courier_cannot_take_delivery() {
        let mut profile = DeliveryProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            zone_id: None,
            status: CourierStatus::Offline,
            vehicle_type: "moto".into(),
            license_plate: "ABC-123".into(),
            phone: "70000000".into(),
            is_active: true,
            created_at: Utc::now(),
        };
        assert!(!profile.can_take_delivery());
        profile.status = CourierStatus::Busy;
        assert!(profile.can_take_delivery());
    }
}
