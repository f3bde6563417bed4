//! User accounts and role-based access rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Staff role assigned to an account; customers carry no role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    /// Cashier
    Cajero,
    /// Courier
    Delivery,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Cajero => "CAJERO",
            Role::Delivery => "DELIVERY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "MANAGER" => Some(Role::Manager),
            "CAJERO" => Some(Role::Cajero),
            "DELIVERY" => Some(Role::Delivery),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public view of a user account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.username.clone()
        } else {
            name.to_string()
        }
    }
}

/// The role facts every authorization decision is made from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub role: Option<Role>,
    pub is_staff: bool,
}

impl Access {
    pub fn new(role: Option<Role>, is_staff: bool) -> Self {
        Self { role, is_staff }
    }

    /// Staff flag or the ADMIN role
    pub fn is_staff_user(&self) -> bool {
        self.is_staff || self.role == Some(Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    /// MANAGER or ADMIN role
    pub fn is_manager_or_admin(&self) -> bool {
        matches!(self.role, Some(Role::Admin) | Some(Role::Manager))
    }

    /// Staff, or any of ADMIN / MANAGER / CAJERO
    pub fn can_view_reports(&self) -> bool {
        self.is_staff
            || matches!(
                self.role,
                Some(Role::Admin) | Some(Role::Manager) | Some(Role::Cajero)
            )
    }

    pub fn is_delivery(&self) -> bool {
        self.role == Some(Role::Delivery)
    }

    /// Owner of a resource, or someone allowed to see every customer's records
    pub fn can_access_owned(&self, caller: Uuid, owner: Uuid) -> bool {
        caller == owner || self.is_staff_user() || self.is_manager_or_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("cajero"), Some(Role::Cajero));
        assert_eq!(Role::parse(" ADMIN "), Some(Role::Admin));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn test_report_access() {
        assert!(Access::new(Some(Role::Cajero), false).can_view_reports());
        assert!(Access::new(None, true).can_view_reports());
        assert!(!Access::new(Some(Role::Delivery), false).can_view_reports());
        assert!(!Access::new(None, false).can_view_reports());
    }

    #[test]
    fn test_manager_checks() {
        assert!(Access::new(Some(Role::Manager), false).is_manager_or_admin());
        assert!(!Access::new(Some(Role::Cajero), true).is_manager_or_admin());
        assert!(Access::new(Some(Role::Admin), false).is_staff_user());
    }

    #[test]
    fn test_owned_access() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let customer = Access::new(None, false);
        assert!(customer.can_access_owned(owner, owner));
        assert!(!customer.can_access_owned(other, owner));
        assert!(Access::new(Some(Role::Manager), false).can_access_owned(other, owner));
    }
}
