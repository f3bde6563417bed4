//! Daily sales forecasting
//!
//! Fits a least-squares linear trend over the daily revenue series plus an
//! additive per-weekday offset (mean residual of each weekday), then projects
//! both forward.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fewer observed days than this and no model is fitted
pub const MIN_TRAINING_SAMPLES: usize = 10;

pub const FORECAST_ALGORITHM: &str = "linear_trend_weekday_seasonality";

/// Revenue of one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPrediction {
    pub date: NaiveDate,
    pub predicted_sales: Decimal,
    pub day_of_week: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub algorithm: &'static str,
    pub training_samples: usize,
    pub trained_from: NaiveDate,
    pub trained_to: NaiveDate,
    pub r_squared: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ForecastError {
    #[error("not enough sales history: {samples} days, need {required}")]
    InsufficientData { samples: usize, required: usize },
}

#[derive(Debug, Clone)]
pub struct SalesForecaster {
    intercept: f64,
    slope: f64,
    weekday_offsets: [f64; 7],
    first_date: NaiveDate,
    last_date: NaiveDate,
    samples: usize,
    r_squared: f64,
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

impl SalesForecaster {
    /// Fit on the observed days. Days missing between the first and last
    /// observation count as zero revenue.
    pub fn fit(history: &[DailySales]) -> Result<Self, ForecastError> {
        let mut observed: Vec<DailySales> = history.to_vec();
        observed.sort_by_key(|d| d.date);
        observed.dedup_by_key(|d| d.date);

        if observed.len() < MIN_TRAINING_SAMPLES {
            return Err(ForecastError::InsufficientData {
                samples: observed.len(),
                required: MIN_TRAINING_SAMPLES,
            });
        }

        let first_date = observed[0].date;
        let last_date = observed[observed.len() - 1].date;
        let span = (last_date - first_date).num_days() as usize + 1;

        let mut series = vec![0.0_f64; span];
        for day in &observed {
            let idx = (day.date - first_date).num_days() as usize;
            series[idx] = day.total.to_f64().unwrap_or(0.0);
        }

        let n = span as f64;
        let mean_x = (n - 1.0) / 2.0;
        let mean_y = series.iter().sum::<f64>() / n;
        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (i, y) in series.iter().enumerate() {
            let dx = i as f64 - mean_x;
            sxy += dx * (y - mean_y);
            sxx += dx * dx;
        }
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = mean_y - slope * mean_x;

        let mut sums = [0.0_f64; 7];
        let mut counts = [0_u32; 7];
        for (i, y) in series.iter().enumerate() {
            let date = first_date + Duration::days(i as i64);
            let wd = date.weekday().num_days_from_monday() as usize;
            sums[wd] += y - (intercept + slope * i as f64);
            counts[wd] += 1;
        }
        let mut weekday_offsets = [0.0_f64; 7];
        for wd in 0..7 {
            if counts[wd] > 0 {
                weekday_offsets[wd] = sums[wd] / f64::from(counts[wd]);
            }
        }

        let mut model = Self {
            intercept,
            slope,
            weekday_offsets,
            first_date,
            last_date,
            samples: observed.len(),
            r_squared: 0.0,
        };

        let ss_tot: f64 = series.iter().map(|y| (y - mean_y).powi(2)).sum();
        let ss_res: f64 = series
            .iter()
            .enumerate()
            .map(|(i, y)| (y - model.raw_estimate(i as f64)).powi(2))
            .sum();
        model.r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

        Ok(model)
    }

    fn raw_estimate(&self, index: f64) -> f64 {
        let date = self.first_date + Duration::days(index as i64);
        let wd = date.weekday().num_days_from_monday() as usize;
        self.intercept + self.slope * index + self.weekday_offsets[wd]
    }

    /// Predicted revenue for one date, never negative
    pub fn estimate(&self, date: NaiveDate) -> Decimal {
        let index = (date - self.first_date).num_days() as f64;
        let value = self.raw_estimate(index).max(0.0);
        Decimal::from_f64(value)
            .unwrap_or(Decimal::ZERO)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Forecast `days` consecutive days beginning at `start`
    pub fn predict(&self, start: NaiveDate, days: u32) -> Vec<SalesPrediction> {
        (0..days)
            .map(|offset| {
                let date = start + Duration::days(i64::from(offset));
                SalesPrediction {
                    date,
                    predicted_sales: self.estimate(date),
                    day_of_week: weekday_name(date.weekday()).to_string(),
                }
            })
            .collect()
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            algorithm: FORECAST_ALGORITHM,
            training_samples: self.samples,
            trained_from: self.first_date,
            trained_to: self.last_date,
            r_squared: (self.r_squared * 10_000.0).round() / 10_000.0,
        }
    }
}
