//! Reporting handlers for analytics and data export

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::ParsedPrompt;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reporting::{resolve_range, DashboardMetrics, SalesAnalytics};
use crate::services::ReportingService;
use crate::AppState;

#[derive(Deserialize)]
pub struct ReportQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub format: Option<String>, // "json" or "csv"
}

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<i64>,
}

#[derive(Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

fn csv_download(filename: &str, csv: String) -> Response {
    let disposition = format!("attachment; filename=\"{}.csv\"", filename);
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response()
}

/// Sales report for a date range (current month by default)
pub async fn sales_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    user.require_reports()?;
    let range = resolve_range(query.start_date, query.end_date, Utc::now().date_naive());

    let service = ReportingService::new(state.db.clone());
    let data = service.sales_report(&range).await?;

    if query.format.as_deref() == Some("csv") {
        let csv = ReportingService::export_to_csv(&data)?;
        let name = format!("reporte_ventas_{}_a_{}", range.start, range.end);
        Ok(csv_download(&name, csv))
    } else {
        Ok(Json(data).into_response())
    }
}

pub async fn products_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    user.require_reports()?;
    let service = ReportingService::new(state.db.clone());
    let data = service.products_report().await?;

    if query.format.as_deref() == Some("csv") {
        let csv = ReportingService::export_to_csv(&data)?;
        Ok(csv_download("reporte_productos", csv))
    } else {
        Ok(Json(data).into_response())
    }
}

/// Show how a prompt would be interpreted without running it
pub async fn parse_dynamic_report(
    CurrentUser(user): CurrentUser,
    Json(body): Json<PromptRequest>,
) -> AppResult<Json<ParsedPrompt>> {
    user.require_reports()?;
    let parsed = ReportingService::parse(&body.prompt, Utc::now().date_naive())?;
    Ok(Json(parsed))
}

/// Run a free-text report; spreadsheet formats download as CSV
pub async fn run_dynamic_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<PromptRequest>,
) -> AppResult<Response> {
    user.require_reports()?;
    let service = ReportingService::new(state.db.clone());
    let report = service
        .dynamic_report(&body.prompt, Utc::now().date_naive())
        .await?;

    if report.format.is_download() {
        let csv = report.to_csv()?;
        Ok(csv_download(&report.file_stem, csv))
    } else {
        Ok(Json(report).into_response())
    }
}

/// Get dashboard metrics
pub async fn get_dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<DashboardMetrics>> {
    user.require_staff()?;
    let service = ReportingService::new(state.db.clone());
    let metrics = service.get_dashboard_metrics(Utc::now().date_naive()).await?;
    Ok(Json(metrics))
}

pub async fn sales_analytics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<SalesAnalytics>> {
    user.require_staff()?;
    let service = ReportingService::new(state.db.clone());
    let analytics = service
        .sales_analytics(query.days.unwrap_or(30), Utc::now().date_naive())
        .await?;
    Ok(Json(analytics))
}
