//! Audit trail: which HTTP requests are recorded, under which action and
//! severity, and which object they touched

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "audit_action", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Login,
    Logout,
    LoginFailed,
    UserCreate,
    UserUpdate,
    UserDelete,
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    ProductView,
    OrderCreate,
    OrderUpdate,
    OrderDelete,
    OrderPayment,
    OrderCancel,
    ReportGenerate,
    ReportDownload,
    NlpQuery,
    SystemError,
    PermissionDenied,
    DataExport,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::LoginFailed => "LOGIN_FAILED",
            AuditAction::UserCreate => "USER_CREATE",
            AuditAction::UserUpdate => "USER_UPDATE",
            AuditAction::UserDelete => "USER_DELETE",
            AuditAction::ProductCreate => "PRODUCT_CREATE",
            AuditAction::ProductUpdate => "PRODUCT_UPDATE",
            AuditAction::ProductDelete => "PRODUCT_DELETE",
            AuditAction::ProductView => "PRODUCT_VIEW",
            AuditAction::OrderCreate => "ORDER_CREATE",
            AuditAction::OrderUpdate => "ORDER_UPDATE",
            AuditAction::OrderDelete => "ORDER_DELETE",
            AuditAction::OrderPayment => "ORDER_PAYMENT",
            AuditAction::OrderCancel => "ORDER_CANCEL",
            AuditAction::ReportGenerate => "REPORT_GENERATE",
            AuditAction::ReportDownload => "REPORT_DOWNLOAD",
            AuditAction::NlpQuery => "NLP_QUERY",
            AuditAction::SystemError => "SYSTEM_ERROR",
            AuditAction::PermissionDenied => "PERMISSION_DENIED",
            AuditAction::DataExport => "DATA_EXPORT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "audit_severity", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn from_status(status: u16) -> Self {
        match status {
            500.. => Severity::Critical,
            400..=499 => Severity::Error,
            300..=399 => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub action: AuditAction,
    pub severity: Severity,
    pub http_method: String,
    pub path: String,
    pub status_code: i32,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub success: bool,
    pub description: String,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// What the audit layer knows about a finished request
#[derive(Debug, Clone, Copy)]
pub struct RequestFacts<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub status: u16,
    pub content_type: &'a str,
}

const IGNORED_PREFIXES: [&str; 4] = ["/static", "/media", "/favicon", "/health"];

pub fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn has_segment(path: &str, name: &str) -> bool {
    segments(path).iter().any(|s| *s == name)
}

/// Segment following `name`, if any
fn segment_after<'a>(path: &'a str, name: &str) -> Option<&'a str> {
    let parts = segments(path);
    let idx = parts.iter().position(|s| *s == name)?;
    parts.get(idx + 1).copied()
}

fn is_write(method: &str) -> bool {
    matches!(method, "PUT" | "PATCH")
}

/// Decide whether a request is recorded and under which action.
/// `None` means the request is not audited.
pub fn classify_request(facts: &RequestFacts<'_>) -> Option<AuditAction> {
    let RequestFacts {
        method,
        path,
        status,
        content_type,
    } = *facts;

    if IGNORED_PREFIXES.iter().any(|p| path.starts_with(p))
        || path == "/"
        || path.ends_with("/health")
    {
        return None;
    }

    if path.contains("token") && method == "POST" {
        return Some(if (200..300).contains(&status) {
            AuditAction::Login
        } else {
            AuditAction::LoginFailed
        });
    }
    if path.contains("logout") {
        return Some(AuditAction::Logout);
    }
    if path.contains("webhook") {
        return Some(AuditAction::OrderPayment);
    }
    if path.contains("export") {
        return Some(AuditAction::DataExport);
    }
    if path.contains("reports/dynamic") || path.contains("cart/add-natural-language") {
        return Some(AuditAction::NlpQuery);
    }
    if has_segment(path, "reports") {
        let is_download = content_type.starts_with("application/")
            && !content_type.starts_with("application/json");
        return Some(if is_download || content_type.starts_with("text/csv") {
            AuditAction::ReportDownload
        } else {
            AuditAction::ReportGenerate
        });
    }
    if path.contains("register") && method == "POST" {
        return Some(AuditAction::UserCreate);
    }

    if has_segment(path, "orders") {
        if path.contains("cancel") {
            return Some(AuditAction::OrderCancel);
        }
        if method == "POST" && (path.contains("checkout") || path.contains("pay-with-wallet")) {
            return Some(AuditAction::OrderPayment);
        }
        match method {
            "POST" if segment_after(path, "orders").is_none() => {
                return Some(AuditAction::OrderCreate)
            }
            m if is_write(m) => return Some(AuditAction::OrderUpdate),
            "DELETE" => return Some(AuditAction::OrderDelete),
            _ => {}
        }
    } else if has_segment(path, "products") {
        match method {
            "POST" if segment_after(path, "products").is_none() => {
                return Some(AuditAction::ProductCreate)
            }
            m if is_write(m) => return Some(AuditAction::ProductUpdate),
            "DELETE" => return Some(AuditAction::ProductDelete),
            "GET" => {
                if let Some(id) = segment_after(path, "products") {
                    if Uuid::parse_str(id).is_ok() && segments(path).last() == Some(&id) {
                        return Some(AuditAction::ProductView);
                    }
                }
            }
            _ => {}
        }
    } else if has_segment(path, "users") {
        match method {
            "POST" => return Some(AuditAction::UserCreate),
            m if is_write(m) => return Some(AuditAction::UserUpdate),
            "DELETE" => return Some(AuditAction::UserDelete),
            _ => {}
        }
    }

    if status == 403 {
        return Some(AuditAction::PermissionDenied);
    }
    if status >= 500 {
        return Some(AuditAction::SystemError);
    }
    None
}

/// Object type and id addressed by the path, taken from the segment after
/// `products`, `orders` or `users`
pub fn extract_object(path: &str) -> Option<(&'static str, Option<String>)> {
    let kinds = [("products", "Product"), ("orders", "Order"), ("users", "User")];
    for (segment, object_type) in kinds {
        if has_segment(path, segment) {
            let id = segment_after(path, segment)
                .filter(|s| Uuid::parse_str(s).is_ok())
                .map(str::to_string);
            return Some((object_type, id));
        }
    }
    None
}

pub fn describe(method: &str, path: &str, status: u16) -> String {
    format!("{} {} - Status {}", method, path, status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts<'a>(method: &'a str, path: &'a str, status: u16) -> RequestFacts<'a> {
        RequestFacts {
            method,
            path,
            status,
            content_type: "application/json",
        }
    }

    #[test]
    fn test_severity_from_status() {
        assert_eq!(Severity::from_status(200), Severity::Info);
        assert_eq!(Severity::from_status(302), Severity::Warning);
        assert_eq!(Severity::from_status(404), Severity::Error);
        assert_eq!(Severity::from_status(503), Severity::Critical);
    }

    #[test]
    fn test_login_classification() {
        assert_eq!(
            classify_request(&facts("POST", "/api/v1/auth/token", 200)),
            Some(AuditAction::Login)
        );
        assert_eq!(
            classify_request(&facts("POST", "/api/v1/auth/token", 401)),
            Some(AuditAction::LoginFailed)
        );
    }

    #[test]
    fn test_ignored_paths() {
        assert_eq!(classify_request(&facts("GET", "/health", 200)), None);
        assert_eq!(classify_request(&facts("GET", "/static/app.js", 200)), None);
        assert_eq!(classify_request(&facts("GET", "/api/v1/orders", 200)), None);
    }

    #[test]
    fn test_product_view_needs_id() {
        let id = Uuid::new_v4();
        let path = format!("/api/v1/products/{}", id);
        assert_eq!(
            classify_request(&facts("GET", &path, 200)),
            Some(AuditAction::ProductView)
        );
        assert_eq!(classify_request(&facts("GET", "/api/v1/products", 200)), None);
    }

    #[test]
    fn test_report_download_by_content_type() {
        let csv = RequestFacts {
            method: "GET",
            path: "/api/v1/reports/sales",
            status: 200,
            content_type: "text/csv; charset=utf-8",
        };
        assert_eq!(classify_request(&csv), Some(AuditAction::ReportDownload));
        assert_eq!(
            classify_request(&facts("GET", "/api/v1/reports/sales", 200)),
            Some(AuditAction::ReportGenerate)
        );
    }

    #[test]
    fn test_order_actions() {
        let id = Uuid::new_v4();
        assert_eq!(
            classify_request(&facts("POST", "/api/v1/orders", 201)),
            Some(AuditAction::OrderCreate)
        );
        assert_eq!(
            classify_request(&facts("POST", &format!("/api/v1/orders/{}/cancel", id), 200)),
            Some(AuditAction::OrderCancel)
        );
        assert_eq!(
            classify_request(&facts("PUT", &format!("/api/v1/orders/{}/status", id), 200)),
            Some(AuditAction::OrderUpdate)
        );
        assert_eq!(
            classify_request(&facts("POST", "/api/v1/webhooks/payment", 200)),
            Some(AuditAction::OrderPayment)
        );
    }

    #[test]
    fn test_forbidden_and_errors() {
        assert_eq!(
            classify_request(&facts("GET", "/api/v1/wallets", 403)),
            Some(AuditAction::PermissionDenied)
        );
        assert_eq!(
            classify_request(&facts("GET", "/api/v1/wallets", 500)),
            Some(AuditAction::SystemError)
        );
    }

    #[test]
    fn test_extract_object() {
        let id = Uuid::new_v4();
        let path = format!("/api/v1/orders/{}/invoice", id);
        assert_eq!(extract_object(&path), Some(("Order", Some(id.to_string()))));
        assert_eq!(extract_object("/api/v1/users/profile"), Some(("User", None)));
        assert_eq!(extract_object("/api/v1/wallets/me"), None);
    }
}
