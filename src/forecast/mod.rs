//! Daily time-series forecasting.
//!
//! [`fit_and_forecast`] is the reusable primitive: it picks a [`ModelKind`]
//! for one [`TimeSeries`], fits it with `augurs` and predicts every
//! historical date plus `horizon` consecutive days after the last one.
//! Independent series go through [`forecast_many`], which fans out over the
//! rayon pool.

mod model;
mod series;

pub use model::{Band, ModelKind};
pub use series::TimeSeries;

use chrono::{Days, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Model and horizon settings shared by every forecast in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    /// Number of future days to predict.
    pub horizon_days: usize,
    /// Coverage of the uncertainty band.
    pub interval_width: f64,
    /// Series spanning fewer days fall back to the naive model.
    pub min_model_days: usize,
    pub weekly_seasonality: bool,
    pub yearly_seasonality: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: 30,
            interval_width: 0.8,
            min_model_days: 10,
            weekly_seasonality: true,
            yearly_seasonality: true,
        }
    }
}

/// One predicted day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub is_history: bool,
}

/// Predictions for every historical date followed by the future horizon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub series: String,
    pub model: String,
    pub horizon: usize,
    pub rows: Vec<ForecastRow>,
}

impl Forecast {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for the observed dates.
    pub fn history(&self) -> &[ForecastRow] {
        &self.rows[..self.rows.len() - self.horizon]
    }

    /// The `horizon` rows after the last observed date.
    pub fn future(&self) -> &[ForecastRow] {
        &self.rows[self.rows.len() - self.horizon..]
    }
}

/// Fits `series` and predicts its history plus `horizon_days` future days.
///
/// Gaps between observed dates are interpolated before fitting; history
/// rows are emitted for the observed dates only.
///
/// # Errors
///
/// `InsufficientHistory` with fewer than two observations,
/// `HorizonOutOfRange` if the horizon passes the last representable date,
/// `Model` if `augurs` rejects the series.
#[tracing::instrument(skip(series, config), fields(series = series.name(), observations = series.len()))]
pub fn fit_and_forecast(series: &TimeSeries, horizon_days: usize, config: &ForecastConfig) -> Result<Forecast> {
    let last = match series.last_date() {
        Some(last) if series.len() >= 2 => last,
        _ => {
            return Err(PipelineError::InsufficientHistory {
                series: series.name().to_string(),
                observations: series.len(),
            });
        }
    };
    if last.checked_add_days(Days::new(horizon_days as u64)).is_none() {
        return Err(PipelineError::HorizonOutOfRange {
            series: series.name().to_string(),
            horizon: horizon_days,
        });
    }

    let values = series.daily_values();
    let kind = ModelKind::select(&values, config);
    let (fitted, future) = kind
        .fit(&values, horizon_days, config.interval_width)
        .map_err(|message| PipelineError::Model {
            target: series.name().to_string(),
            message,
        })?;

    let mut rows = Vec::with_capacity(series.len() + horizon_days);
    for ((date, _), offset) in series.points().iter().zip(series.day_offsets()) {
        rows.push(row(*date, fitted.at(offset), true));
    }
    let future_dates = last.iter_days().skip(1).take(horizon_days);
    for (step, date) in future_dates.enumerate() {
        rows.push(row(date, future.at(step), false));
    }

    debug!(model = kind.name(), days = values.len(), rows = rows.len(), "Forecast fitted");

    Ok(Forecast {
        series: series.name().to_string(),
        model: kind.name().to_string(),
        horizon: horizon_days,
        rows,
    })
}

fn row(date: NaiveDate, (yhat, yhat_lower, yhat_upper): (f64, f64, f64), is_history: bool) -> ForecastRow {
    ForecastRow {
        date,
        yhat,
        yhat_lower,
        yhat_upper,
        is_history,
    }
}

/// Forecasts independent series in parallel, returning results in input order.
pub fn forecast_many(series: &[TimeSeries], config: &ForecastConfig) -> Vec<Result<Forecast>> {
    series
        .par_iter()
        .map(|s| fit_and_forecast(s, config.horizon_days, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn daily(start: NaiveDate, values: &[f64]) -> TimeSeries {
        TimeSeries::from_observations(
            "test",
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), Some(*v))),
        )
    }

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_forecast_length_and_dates() {
        let values: Vec<f64> = (0..20).map(|i| 8.0 + (i % 3) as f64).collect();
        let series = daily(jan(1), &values);
        let forecast = fit_and_forecast(&series, 30, &ForecastConfig::default()).unwrap();

        assert_eq!(forecast.len(), 50);
        assert_eq!(forecast.history().len(), 20);
        assert_eq!(forecast.future().len(), 30);
        for (row, (date, _)) in forecast.history().iter().zip(series.points()) {
            assert_eq!(row.date, *date);
            assert!(row.is_history);
        }
        for (i, row) in forecast.future().iter().enumerate() {
            assert_eq!(row.date, jan(20) + Duration::days(i as i64 + 1));
            assert!(!row.is_history);
        }
    }

    #[test]
    fn test_irregular_dates_are_kept() {
        let series = TimeSeries::from_observations(
            "gappy",
            vec![
                (jan(1), Some(3.0)),
                (jan(4), Some(4.0)),
                (jan(5), Some(4.0)),
                (jan(9), Some(5.0)),
            ],
        );
        let forecast = fit_and_forecast(&series, 3, &ForecastConfig::default()).unwrap();
        let dates: Vec<NaiveDate> = forecast.rows.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![jan(1), jan(4), jan(5), jan(9), jan(10), jan(11), jan(12)]
        );
    }

    #[test]
    fn test_constant_series_forecasts_constant() {
        let series = daily(jan(1), &[10.0; 60]);
        let forecast = fit_and_forecast(&series, 30, &ForecastConfig::default()).unwrap();
        for row in forecast.future() {
            assert_eq!(row.yhat, 10.0);
            assert!(row.yhat_lower <= row.yhat && row.yhat <= row.yhat_upper);
        }
    }

    #[test]
    fn test_forecast_is_deterministic() {
        let values: Vec<f64> = (0..45).map(|i| ((i * 7919) % 13) as f64).collect();
        let series = daily(jan(1), &values);
        let config = ForecastConfig::default();
        let a = fit_and_forecast(&series, 30, &config).unwrap();
        let b = fit_and_forecast(&series, 30, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_uncertainty_widens_with_horizon() {
        let values: Vec<f64> = (0..30).map(|i| 10.0 + ((i * 37) % 5) as f64).collect();
        let forecast = fit_and_forecast(&daily(jan(1), &values), 10, &ForecastConfig::default()).unwrap();
        let future = forecast.future();
        let first = future[0].yhat_upper - future[0].yhat_lower;
        let last = future[9].yhat_upper - future[9].yhat_lower;
        assert!(last >= first);
        assert!(future.iter().all(|r| r.yhat_lower <= r.yhat && r.yhat <= r.yhat_upper));
    }

    #[test]
    fn test_horizon_past_calendar_end_is_an_error() {
        let series = daily(jan(1), &[1.0, 2.0, 3.0]);
        let err = fit_and_forecast(&series, usize::MAX / 2, &ForecastConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::HorizonOutOfRange { .. }));
    }

    #[test]
    fn test_model_is_reported() {
        let constant = fit_and_forecast(&daily(jan(1), &[10.0; 20]), 5, &ForecastConfig::default()).unwrap();
        assert_eq!(constant.model, "flat");

        let short = fit_and_forecast(&daily(jan(1), &[1.0, 3.0, 2.0]), 5, &ForecastConfig::default()).unwrap();
        assert_eq!(short.model, "naive");
    }

    #[test]
    fn test_forecast_many_keeps_order_and_errors() {
        let config = ForecastConfig {
            horizon_days: 5,
            ..Default::default()
        };
        let ok = daily(jan(1), &[1.0, 2.0, 3.0]);
        let short = daily(jan(1), &[1.0]);
        let results = forecast_many(&[ok, short], &config);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().len(), 8);
        assert!(matches!(
            results[1],
            Err(PipelineError::InsufficientHistory { observations: 1, .. })
        ));
    }
}
