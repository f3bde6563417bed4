//! Catalog, account validation and role access tests

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    average_rating, validate_email, validate_password, validate_price, validate_quantity,
    validate_rating, validate_username, Access, Pagination, RatingSummary, Role,
    MAX_PAGE_SIZE,
};
use uuid::Uuid;

// ============================================================================
// Property Test Strategies
// ============================================================================

fn rating_strategy() -> impl Strategy<Value = i16> {
    1i16..=5
}

fn role_strategy() -> impl Strategy<Value = Option<Role>> {
    prop_oneof![
        Just(None),
        Just(Some(Role::Admin)),
        Just(Some(Role::Manager)),
        Just(Some(Role::Cajero)),
        Just(Some(Role::Delivery)),
    ]
}

fn email_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,10}@[a-z]{3,8}\\.(com|org|net|mx)"
}

fn username_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.]{3,30}"
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property: average rating stays within 1..=5 and matches the mean to
    /// two decimals
    #[test]
    fn test_average_rating_is_mean(
        ratings in prop::collection::vec(rating_strategy(), 1..50),
    ) {
        let avg = average_rating(&ratings).unwrap();
        prop_assert!(avg >= Decimal::ONE);
        prop_assert!(avg <= Decimal::from(5));

        let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
        let exact = Decimal::from(sum) / Decimal::from(ratings.len() as i64);
        prop_assert!((avg - exact).abs() <= Decimal::new(5, 3));

        let summary = RatingSummary::from_ratings(&ratings);
        prop_assert_eq!(summary.review_count, ratings.len() as i64);
        prop_assert_eq!(summary.average_rating, Some(avg));
    }

    /// Property: only 1..=5 are valid ratings
    #[test]
    fn test_rating_range(rating in -10i16..=15) {
        prop_assert_eq!(validate_rating(rating).is_ok(), (1..=5).contains(&rating));
    }

    /// Property: owners always reach their own records
    #[test]
    fn test_owner_access(role in role_strategy(), is_staff in any::<bool>()) {
        let me = Uuid::new_v4();
        prop_assert!(Access::new(role, is_staff).can_access_owned(me, me));
    }

    /// Property: only staff, admins and managers reach other users' records
    #[test]
    fn test_foreign_access(role in role_strategy(), is_staff in any::<bool>()) {
        let access = Access::new(role, is_staff);
        let allowed = access.can_access_owned(Uuid::new_v4(), Uuid::new_v4());
        let expected = is_staff || matches!(role, Some(Role::Admin) | Some(Role::Manager));
        prop_assert_eq!(allowed, expected);
    }

    /// Property: generated emails and usernames validate
    #[test]
    fn test_account_fields(email in email_strategy(), username in username_strategy()) {
        prop_assert!(validate_email(&email).is_ok());
        prop_assert!(validate_username(&username).is_ok());
    }

    /// Property: page size is always clamped to 1..=MAX_PAGE_SIZE
    #[test]
    fn test_pagination_clamp(page in 0u32..1000, per_page in 0u32..1000) {
        let p = Pagination::new(Some(page), Some(per_page));
        prop_assert!(p.limit() >= 1);
        prop_assert!(p.limit() <= i64::from(MAX_PAGE_SIZE));
        prop_assert!(p.offset() >= 0);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_invalid_emails() {
        for email in ["", "no-at-sign", "@example.com", "user@", "user@nodot", "user@.com"] {
            assert!(validate_email(email).is_err(), "{} should be invalid", email);
        }
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("short1").is_err());
        assert!(validate_password("12345678901").is_err());
        assert!(validate_password("correct-horse").is_ok());
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("maria.lopez+shop").is_ok());
    }

    #[test]
    fn test_price_and_quantity() {
        assert!(validate_price(Decimal::new(1999, 2)).is_ok());
        assert!(validate_price(Decimal::new(-1, 2)).is_err());
        assert!(validate_price(Decimal::new(19999, 3)).is_err());
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
    }

    #[test]
    fn test_no_reviews_no_average() {
        assert_eq!(average_rating(&[]), None);
        assert_eq!(RatingSummary::from_ratings(&[]).review_count, 0);
    }
}

#[cfg(test)]
mod role_tests {
    use super::*;

    #[test]
    fn test_report_access() {
        assert!(Access::new(Some(Role::Cajero), false).can_view_reports());
        assert!(Access::new(None, true).can_view_reports());
        assert!(!Access::new(Some(Role::Delivery), false).can_view_reports());
        assert!(!Access::new(None, false).can_view_reports());
    }

    #[test]
    fn test_admin_counts_as_staff() {
        let admin = Access::new(Some(Role::Admin), false);
        assert!(admin.is_staff_user());
        assert!(admin.is_manager_or_admin());
        assert!(!Access::new(Some(Role::Manager), false).is_staff_user());
    }

    #[test]
    fn test_role_labels() {
        assert_eq!(Role::parse(" manager "), Some(Role::Manager));
        assert_eq!(Role::parse("customer"), None);
        assert_eq!(Role::Delivery.to_string(), "DELIVERY");
    }
}
