//! Sales prediction handler

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::prediction::SalesForecast;
use crate::services::PredictionService;
use crate::AppState;

#[derive(Deserialize)]
pub struct ForecastQuery {
    pub days: Option<u32>,
}

pub async fn predict_sales(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ForecastQuery>,
) -> AppResult<Json<SalesForecast>> {
    user.require_staff()?;
    let service = PredictionService::new(state.db.clone());
    let forecast = service
        .forecast(query.days.unwrap_or(30), Utc::now().date_naive())
        .await?;
    Ok(Json(forecast))
}
