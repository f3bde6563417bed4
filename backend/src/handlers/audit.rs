//! Audit log handlers (staff only)

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use shared::{AuditLog, PaginatedResponse};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::audit::{AuditFilter, AuditStatistics};
use crate::services::AuditService;
use crate::AppState;

pub async fn list_audit_logs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<AuditFilter>,
) -> AppResult<Json<PaginatedResponse<AuditLog>>> {
    user.require_staff()?;
    let service = AuditService::new(state.db.clone());
    Ok(Json(service.list(filter).await?))
}

pub async fn get_audit_log(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(log_id): Path<Uuid>,
) -> AppResult<Json<AuditLog>> {
    user.require_staff()?;
    let service = AuditService::new(state.db.clone());
    Ok(Json(service.get(log_id).await?))
}

pub async fn audit_statistics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<AuditStatistics>> {
    user.require_staff()?;
    let service = AuditService::new(state.db.clone());
    Ok(Json(service.statistics().await?))
}

/// Download filtered audit rows as CSV
pub async fn export_audit_logs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<AuditFilter>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;
    let service = AuditService::new(state.db.clone());
    let csv = service.export(filter).await?;

    let disposition = format!(
        "attachment; filename=\"audit_logs_{}.csv\"",
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
