//! Sales forecasting tests

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{weekday_name, DailySales, ForecastError, SalesForecaster, MIN_TRAINING_SAMPLES};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn series(values: &[i64]) -> Vec<DailySales> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| DailySales {
            date: start() + Duration::days(i as i64),
            total: Decimal::from(*v),
        })
        .collect()
}

proptest! {
    /// Property: forecasts have the requested length, consecutive dates and
    /// no negative values
    #[test]
    fn test_forecast_shape(
        values in prop::collection::vec(0i64..=5_000, MIN_TRAINING_SAMPLES..60),
        days in 1u32..=90,
    ) {
        let model = SalesForecaster::fit(&series(&values)).unwrap();
        let first = start() + Duration::days(values.len() as i64);
        let predictions = model.predict(first, days);

        prop_assert_eq!(predictions.len(), days as usize);
        for (i, p) in predictions.iter().enumerate() {
            prop_assert_eq!(p.date, first + Duration::days(i as i64));
            prop_assert!(p.predicted_sales >= Decimal::ZERO);
            prop_assert_eq!(p.predicted_sales.round_dp(2), p.predicted_sales);
        }
    }

    /// Property: fewer than the minimum observed days is rejected
    #[test]
    fn test_short_history_rejected(len in 0usize..MIN_TRAINING_SAMPLES) {
        let values = vec![100; len];
        let err = SalesForecaster::fit(&series(&values)).unwrap_err();
        prop_assert_eq!(
            err,
            ForecastError::InsufficientData { samples: len, required: MIN_TRAINING_SAMPLES }
        );
    }
}

#[cfg(test)]
mod model_tests {
    use super::*;

    #[test]
    fn test_duplicate_days_count_once() {
        let mut history = series(&[100; 9]);
        history.push(history[0]);
        assert!(SalesForecaster::fit(&history).is_err());
    }

    #[test]
    fn test_gaps_count_as_zero_days() {
        // 10 observed days spread over 19 calendar days
        let history: Vec<DailySales> = (0..10)
            .map(|i| DailySales {
                date: start() + Duration::days(i * 2),
                total: Decimal::from(100),
            })
            .collect();
        let model = SalesForecaster::fit(&history).unwrap();
        let info = model.info();
        assert_eq!(info.training_samples, 10);
        assert_eq!(info.trained_to, start() + Duration::days(18));
        // Mean of the filled series is below the observed daily value
        let next = start() + Duration::days(19);
        assert!(model.estimate(next) < Decimal::from(100));
    }

    #[test]
    fn test_model_info() {
        let model = SalesForecaster::fit(&series(&[40; 12])).unwrap();
        let info = model.info();
        assert_eq!(info.algorithm, "linear_trend_weekday_seasonality");
        assert_eq!(info.trained_from, start());
        assert_eq!(info.r_squared, 1.0);
    }

    #[test]
    fn test_weekday_names() {
        let monday = start();
        assert_eq!(weekday_name(chrono::Datelike::weekday(&monday)), "Monday");
    }
}
