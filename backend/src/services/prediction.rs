//! Sales forecasting from stored order history

use chrono::NaiveDate;
use serde::Serialize;
use shared::{DailySales, ModelInfo, SalesForecaster, SalesPrediction};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::services::reporting::REVENUE_FILTER;

/// Longest horizon a forecast may cover
pub const MAX_FORECAST_DAYS: u32 = 90;

#[derive(Clone)]
pub struct PredictionService {
    db: PgPool,
}

#[derive(Debug, Serialize)]
pub struct SalesForecast {
    pub predictions: Vec<SalesPrediction>,
    pub model_info: ModelInfo,
}

impl PredictionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Revenue per calendar day, days without sales omitted
    pub async fn daily_revenue(&self) -> AppResult<Vec<DailySales>> {
        let rows = sqlx::query_as::<_, (NaiveDate, rust_decimal::Decimal)>(&format!(
            r#"
            SELECT o.created_at::date AS date, SUM(o.total_price) AS total
            FROM orders o
            WHERE {}
            GROUP BY o.created_at::date
            ORDER BY date
            "#,
            REVENUE_FILTER
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, total)| DailySales { date, total })
            .collect())
    }

    /// Fit on the full history and forecast `days` days starting `today`
    pub async fn forecast(&self, days: u32, today: NaiveDate) -> AppResult<SalesForecast> {
        if !(1..=MAX_FORECAST_DAYS).contains(&days) {
            return Err(AppError::Validation {
                field: "days".to_string(),
                message: format!("days must be between 1 and {}", MAX_FORECAST_DAYS),
                message_es: format!("Los días deben estar entre 1 y {}", MAX_FORECAST_DAYS),
            });
        }

        let history = self.daily_revenue().await?;
        let model = SalesForecaster::fit(&history)?;
        let info = model.info();

        tracing::debug!(
            "Sales model fitted on {} days (r² = {})",
            info.training_samples,
            info.r_squared
        );

        Ok(SalesForecast {
            predictions: model.predict(today, days),
            model_info: info,
        })
    }
}
