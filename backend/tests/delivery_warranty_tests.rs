//! Delivery, warranty and repair tests

use chrono::{Duration, NaiveDate, Utc};
use proptest::prelude::*;
use shared::{
    warranty_duration_days, warranty_window, ClaimError, CourierStatus, DeliveryProfile,
    DeliveryStatus, RepairStatus, Warranty, WarrantyStatus, DEFAULT_WARRANTY_DAYS,
    MAX_WARRANTY_DAYS,
};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn warranty(status: WarrantyStatus, start: NaiveDate, end: NaiveDate) -> Warranty {
    Warranty {
        id: Uuid::new_v4(),
        order_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        start_date: start,
        end_date: end,
        status,
        terms: String::new(),
        notes: String::new(),
        created_at: Utc::now(),
    }
}

fn courier(status: CourierStatus, is_active: bool) -> DeliveryProfile {
    DeliveryProfile {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        zone_id: None,
        status,
        vehicle_type: "moto".to_string(),
        license_plate: "ABC-123".to_string(),
        phone: "5551234".to_string(),
        is_active,
        created_at: Utc::now(),
    }
}

const DELIVERY_STATUSES: [DeliveryStatus; 6] = [
    DeliveryStatus::Pending,
    DeliveryStatus::Assigned,
    DeliveryStatus::PickedUp,
    DeliveryStatus::InTransit,
    DeliveryStatus::Delivered,
    DeliveryStatus::Failed,
];

fn delivery_status_strategy() -> impl Strategy<Value = DeliveryStatus> {
    prop::sample::select(DELIVERY_STATUSES.to_vec())
}

proptest! {
    /// Property: finished deliveries never move again and release the courier
    #[test]
    fn test_finished_delivery_is_final(
        from in delivery_status_strategy(),
        to in delivery_status_strategy(),
    ) {
        if from.is_finished() {
            prop_assert!(!from.can_transition_to(to));
            prop_assert!(from.releases_courier());
        }
    }

    /// Property: a warranty window ends duration days after it starts
    #[test]
    fn test_window_length(months in 1i64..=36, offset in 0i64..=3000) {
        let start = date(2020, 1, 1) + Duration::days(offset);
        let (from, to) = warranty_window(start, &format!("{} meses de garantía", months));
        prop_assert_eq!(from, start);
        prop_assert_eq!((to - from).num_days(), months * 30);
    }

    /// Property: no warranty text yields coverage beyond the cap
    #[test]
    fn test_duration_is_bounded(n in any::<u64>(), unit in prop::sample::select(vec!["años", "meses", "días"])) {
        let days = warranty_duration_days(&format!("{} {} de garantía", n, unit));
        prop_assert!((0..=MAX_WARRANTY_DAYS).contains(&days));
        let (from, to) = warranty_window(date(2024, 1, 1), &format!("{} {}", n, unit));
        prop_assert!(to >= from);
    }

    /// Property: an ACTIVE warranty is claimable on every day up to its end
    #[test]
    fn test_claimable_until_end(days_before in 0i64..=365) {
        let end = date(2025, 6, 30);
        let w = warranty(WarrantyStatus::Active, date(2024, 6, 30), end);
        let today = end - Duration::days(days_before);
        prop_assert!(w.is_usable(today));
        prop_assert_eq!(w.check_claim(today), Ok(()));
    }
}

#[cfg(test)]
mod delivery_tests {
    use super::*;

    #[test]
    fn test_delivery_happy_path() {
        let status = DeliveryStatus::Pending
            .transition_to(DeliveryStatus::Assigned)
            .and_then(|s| s.transition_to(DeliveryStatus::PickedUp))
            .and_then(|s| s.transition_to(DeliveryStatus::InTransit))
            .and_then(|s| s.transition_to(DeliveryStatus::Delivered));
        assert_eq!(status, Ok(DeliveryStatus::Delivered));
    }

    #[test]
    fn test_pending_cannot_fail_before_assignment() {
        assert!(!DeliveryStatus::Pending.can_transition_to(DeliveryStatus::Failed));
        assert!(DeliveryStatus::Assigned.can_transition_to(DeliveryStatus::Failed));
    }

    #[test]
    fn test_courier_availability() {
        assert!(courier(CourierStatus::Available, true).can_take_delivery());
        assert!(courier(CourierStatus::Busy, true).can_take_delivery());
        assert!(!courier(CourierStatus::Offline, true).can_take_delivery());
        assert!(!courier(CourierStatus::Available, false).can_take_delivery());
    }
}

#[cfg(test)]
mod warranty_tests {
    use super::*;

    #[test]
    fn test_duration_parsing() {
        assert_eq!(warranty_duration_days("1 año de garantía"), 365);
        assert_eq!(warranty_duration_days("2 years limited"), 730);
        assert_eq!(warranty_duration_days("6 meses"), 180);
        assert_eq!(warranty_duration_days("90 días"), 90);
        assert_eq!(warranty_duration_days(""), DEFAULT_WARRANTY_DAYS);
        assert_eq!(warranty_duration_days("sin garantía"), DEFAULT_WARRANTY_DAYS);
    }

    #[test]
    fn test_expired_claim() {
        let w = warranty(WarrantyStatus::Active, date(2023, 1, 1), date(2024, 1, 1));
        assert_eq!(w.check_claim(date(2024, 1, 2)), Err(ClaimError::Expired));
        assert!(!w.is_usable(date(2024, 1, 2)));
    }

    #[test]
    fn test_claimed_warranty_not_active() {
        let w = warranty(WarrantyStatus::Claimed, date(2024, 1, 1), date(2025, 1, 1));
        assert_eq!(w.check_claim(date(2024, 6, 1)), Err(ClaimError::NotActive));
        assert!(w.can_void());
    }

    #[test]
    fn test_void_rules() {
        let start = date(2024, 1, 1);
        let end = date(2025, 1, 1);
        assert!(warranty(WarrantyStatus::Active, start, end).can_void());
        assert!(!warranty(WarrantyStatus::Expired, start, end).can_void());
        assert!(!warranty(WarrantyStatus::Void, start, end).can_void());
    }
}

#[cfg(test)]
mod repair_tests {
    use super::*;

    #[test]
    fn test_repair_lifecycle() {
        let status = RepairStatus::Requested
            .transition_to(RepairStatus::InProgress)
            .and_then(|s| s.transition_to(RepairStatus::Completed))
            .and_then(|s| s.transition_to(RepairStatus::Delivered));
        assert_eq!(status, Ok(RepairStatus::Delivered));
    }

    #[test]
    fn test_completed_repair_cannot_be_cancelled() {
        assert!(!RepairStatus::Completed.can_transition_to(RepairStatus::Cancelled));
        assert!(RepairStatus::InProgress.can_transition_to(RepairStatus::Cancelled));
        assert!(!RepairStatus::Cancelled.can_transition_to(RepairStatus::InProgress));
    }
}
