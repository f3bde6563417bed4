//! Audit log persistence and queries

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{AuditAction, AuditLog, PaginatedResponse, Pagination, Severity};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::reporting::ReportingService;

const AUDIT_COLUMNS: &str = "id, user_id, username, action, severity, http_method, path, \
                             status_code, ip_address, user_agent, object_type, object_id, \
                             success, description, duration_ms, created_at";

/// Shared WHERE clause for list and export; binds $1..$10
const AUDIT_FILTER: &str = "($1::audit_action IS NULL OR action = $1) \
     AND ($2::audit_severity IS NULL OR severity = $2) \
     AND ($3::uuid IS NULL OR user_id = $3) \
     AND ($4::text IS NULL OR username ILIKE '%' || $4 || '%') \
     AND ($5::text IS NULL OR ip_address = $5) \
     AND ($6::text IS NULL OR object_type = $6) \
     AND ($7::text IS NULL OR object_id = $7) \
     AND ($8::date IS NULL OR created_at >= $8::date) \
     AND ($9::date IS NULL OR created_at < $9::date + 1) \
     AND ($10::bool IS NULL OR success = $10)";

/// Rows returned by a single export
const EXPORT_LIMIT: i64 = 10_000;

#[derive(Clone)]
pub struct AuditService {
    db: PgPool,
}

/// An audit row about to be written
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
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
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub severity: Option<Severity>,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub success: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ActionCount {
    pub action: AuditAction,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SeverityCount {
    pub severity: Severity,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserActivity {
    pub username: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AuditStatistics {
    pub total_logs: i64,
    pub failed_actions: i64,
    pub last_24h: i64,
    pub by_action: Vec<ActionCount>,
    pub by_severity: Vec<SeverityCount>,
    pub top_users: Vec<UserActivity>,
}

/// Flat CSV record of an audit row
#[derive(Debug, Serialize)]
struct AuditCsvRow {
    timestamp: DateTime<Utc>,
    username: String,
    action: &'static str,
    severity: &'static str,
    method: String,
    path: String,
    status_code: i32,
    ip_address: String,
    object_type: String,
    object_id: String,
    success: bool,
    duration_ms: i64,
    description: String,
}

impl From<AuditLog> for AuditCsvRow {
    fn from(log: AuditLog) -> Self {
        Self {
            timestamp: log.created_at,
            username: log.username.unwrap_or_else(|| "anonymous".to_string()),
            action: log.action.as_str(),
            severity: log.severity.as_str(),
            method: log.http_method,
            path: log.path,
            status_code: log.status_code,
            ip_address: log.ip_address.unwrap_or_default(),
            object_type: log.object_type.unwrap_or_default(),
            object_id: log.object_id.unwrap_or_default(),
            success: log.success,
            duration_ms: log.duration_ms,
            description: log.description,
        }
    }
}

macro_rules! bind_audit_filter {
    ($query:expr, $filter:expr) => {
        $query
            .bind($filter.action)
            .bind($filter.severity)
            .bind($filter.user_id)
            .bind($filter.username.as_deref())
            .bind($filter.ip_address.as_deref())
            .bind($filter.object_type.as_deref())
            .bind($filter.object_id.as_deref())
            .bind($filter.start_date)
            .bind($filter.end_date)
            .bind($filter.success)
    };
}

impl AuditService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn record(&self, entry: NewAuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (user_id, username, action, severity, http_method, path, status_code,
                 ip_address, user_agent, object_type, object_id, success, description, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.username)
        .bind(entry.action)
        .bind(entry.severity)
        .bind(&entry.http_method)
        .bind(&entry.path)
        .bind(entry.status_code)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.object_type)
        .bind(&entry.object_id)
        .bind(entry.success)
        .bind(&entry.description)
        .bind(entry.duration_ms)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn list(&self, filter: AuditFilter) -> AppResult<PaginatedResponse<AuditLog>> {
        let pagination = Pagination::new(filter.page, filter.per_page);

        let total = bind_audit_filter!(
            sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM audit_logs WHERE {}",
                AUDIT_FILTER
            )),
            filter
        )
        .fetch_one(&self.db)
        .await?;

        let sql = format!(
            "SELECT {} FROM audit_logs WHERE {} ORDER BY created_at DESC LIMIT $11 OFFSET $12",
            AUDIT_COLUMNS, AUDIT_FILTER
        );
        let logs = bind_audit_filter!(sqlx::query_as::<_, AuditLog>(&sql), filter)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

        Ok(PaginatedResponse::new(
            logs,
            &pagination,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    pub async fn get(&self, log_id: Uuid) -> AppResult<AuditLog> {
        sqlx::query_as::<_, AuditLog>(&format!(
            "SELECT {} FROM audit_logs WHERE id = $1",
            AUDIT_COLUMNS
        ))
        .bind(log_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Audit log".to_string()))
    }

    pub async fn statistics(&self) -> AppResult<AuditStatistics> {
        let (total_logs, failed_actions, last_24h): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE NOT success),
                COUNT(*) FILTER (WHERE created_at >= NOW() - INTERVAL '24 hours')
            FROM audit_logs
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let by_action = sqlx::query_as::<_, ActionCount>(
            "SELECT action, COUNT(*) AS count FROM audit_logs GROUP BY action ORDER BY count DESC",
        )
        .fetch_all(&self.db)
        .await?;

        let by_severity = sqlx::query_as::<_, SeverityCount>(
            "SELECT severity, COUNT(*) AS count FROM audit_logs GROUP BY severity ORDER BY severity",
        )
        .fetch_all(&self.db)
        .await?;

        let top_users = sqlx::query_as::<_, UserActivity>(
            r#"
            SELECT username, COUNT(*) AS count
            FROM audit_logs
            WHERE username IS NOT NULL
            GROUP BY username
            ORDER BY count DESC
            LIMIT 10
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(AuditStatistics {
            total_logs,
            failed_actions,
            last_24h,
            by_action,
            by_severity,
            top_users,
        })
    }

    /// Filtered audit rows rendered as CSV
    pub async fn export(&self, filter: AuditFilter) -> AppResult<String> {
        let sql = format!(
            "SELECT {} FROM audit_logs WHERE {} ORDER BY created_at DESC LIMIT $11",
            AUDIT_COLUMNS, AUDIT_FILTER
        );
        let logs = bind_audit_filter!(sqlx::query_as::<_, AuditLog>(&sql), filter)
            .bind(EXPORT_LIMIT)
            .fetch_all(&self.db)
            .await?;

        let rows: Vec<AuditCsvRow> = logs.into_iter().map(AuditCsvRow::from).collect();
        ReportingService::export_to_csv(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_row_defaults_for_anonymous_requests() {
        let log = AuditLog {
            id: Uuid::new_v4(),
            user_id: None,
            username: None,
            action: AuditAction::LoginFailed,
            severity: Severity::Error,
            http_method: "POST".to_string(),
            path: "/api/v1/auth/token".to_string(),
            status_code: 401,
            ip_address: None,
            user_agent: None,
            object_type: None,
            object_id: None,
            success: false,
            description: "POST /api/v1/auth/token -> 401".to_string(),
            duration_ms: 12,
            created_at: Utc::now(),
        };
        let row = AuditCsvRow::from(log);
        assert_eq!(row.username, "anonymous");
        assert_eq!(row.action, "LOGIN_FAILED");
        assert_eq!(row.severity, "ERROR");
        assert!(row.ip_address.is_empty());
    }

    #[test]
    fn test_export_header_row() {
        let csv = ReportingService::export_to_csv(&[AuditCsvRow {
            timestamp: Utc::now(),
            username: "ana".to_string(),
            action: "LOGIN",
            severity: "INFO",
            method: "POST".to_string(),
            path: "/api/v1/auth/token".to_string(),
            status_code: 200,
            ip_address: "127.0.0.1".to_string(),
            object_type: String::new(),
            object_id: String::new(),
            success: true,
            duration_ms: 3,
            description: String::new(),
        }])
        .unwrap();
        assert!(csv.starts_with("timestamp,username,action,severity,method,path"));
        assert!(csv.contains("ana,LOGIN,INFO,POST"));
    }
}
