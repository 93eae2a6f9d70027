//! Model selection and fitting on top of `augurs`.
//!
//! Series spanning at least two full seasonal cycles get an MSTL
//! decomposition (weekly, plus yearly past two years) with an AutoETS trend.
//! Shorter series get a non-seasonal AutoETS, and the shortest a naive
//! last-value model. A constant series is projected flat.

use augurs::ets::AutoETS;
use augurs::mstl::MSTLModel;
use augurs::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::forecast::ForecastConfig;

const WEEK: usize = 7;
const YEAR: usize = 365;

/// The model chosen for one daily series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelKind {
    Flat,
    Naive,
    Ets,
    Mstl(Vec<usize>),
}

impl ModelKind {
    /// Picks a model from the length and shape of `values`.
    pub fn select(values: &[f64], config: &ForecastConfig) -> Self {
        let n = values.len();
        if values.iter().all(|&v| v == values[0]) {
            return ModelKind::Flat;
        }
        if n < config.min_model_days {
            return ModelKind::Naive;
        }

        let mut periods = Vec::new();
        if config.weekly_seasonality && n >= 2 * WEEK {
            periods.push(WEEK);
        }
        if config.yearly_seasonality && n >= 2 * YEAR {
            periods.push(YEAR);
        }
        if periods.is_empty() {
            ModelKind::Ets
        } else {
            ModelKind::Mstl(periods)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Flat => "flat",
            ModelKind::Naive => "naive",
            ModelKind::Ets => "ets",
            ModelKind::Mstl(_) => "mstl",
        }
    }

    /// Fits `values` (at least two of them) and returns the in-sample band
    /// followed by the `horizon`-day forecast band, both at coverage `level`.
    pub fn fit(&self, values: &[f64], horizon: usize, level: f64) -> Result<(Band, Band), String> {
        let (in_sample, future) = match self {
            ModelKind::Flat => (Band::flat(values[0], values.len()), Band::flat(values[0], horizon)),
            ModelKind::Naive => naive(values, horizon, level)?,
            ModelKind::Ets => {
                let mut ets = AutoETS::non_seasonal();
                let fitted = ets.fit(values).map_err(|e| format!("ETS fit error: {e}"))?;
                predict_bands(&fitted, horizon, level)?
            }
            ModelKind::Mstl(periods) => {
                let trend = AutoETS::non_seasonal().into_trend_model();
                let mstl = MSTLModel::new(periods.clone(), trend);
                let fitted = mstl.fit(values).map_err(|e| format!("MSTL fit error: {e}"))?;
                predict_bands(&fitted, horizon, level)?
            }
        };

        if in_sample.len() != values.len() || future.len() != horizon {
            return Err(format!(
                "model returned {} fitted and {} future values for {} days and a {horizon}-day horizon",
                in_sample.len(),
                future.len(),
                values.len()
            ));
        }
        Ok((in_sample, future))
    }
}

/// Point predictions with their uncertainty band.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Band {
    pub point: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Band {
    fn flat(value: f64, len: usize) -> Self {
        Self {
            point: vec![value; len],
            lower: vec![value; len],
            upper: vec![value; len],
        }
    }

    fn with_half_width(point: Vec<f64>, half_width: impl Fn(usize) -> f64) -> Self {
        let lower = point.iter().enumerate().map(|(i, p)| p - half_width(i)).collect();
        let upper = point.iter().enumerate().map(|(i, p)| p + half_width(i)).collect();
        Self { point, lower, upper }
    }

    fn from_parts(point: Vec<f64>, intervals: Option<(Vec<f64>, Vec<f64>)>) -> Self {
        match intervals {
            Some((lower, upper)) => Self { point, lower, upper },
            None => Self {
                lower: point.clone(),
                upper: point.clone(),
                point,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }

    /// `(yhat, lower, upper)` at index `i`.
    pub fn at(&self, i: usize) -> (f64, f64, f64) {
        (self.point[i], self.lower[i], self.upper[i])
    }
}

fn predict_bands<P: Predict>(fitted: &P, horizon: usize, level: f64) -> Result<(Band, Band), String> {
    let in_sample = fitted
        .predict_in_sample(level)
        .map_err(|e| format!("in-sample prediction error: {e}"))?;
    let future = fitted
        .predict(horizon, level)
        .map_err(|e| format!("prediction error: {e}"))?;

    Ok((
        Band::from_parts(in_sample.point, in_sample.intervals.map(|i| (i.lower, i.upper))),
        Band::from_parts(future.point, future.intervals.map(|i| (i.lower, i.upper))),
    ))
}

/// Random walk: each day predicts the previous one, the future repeats the
/// last value and the band grows with the square root of the step.
fn naive(values: &[f64], horizon: usize, level: f64) -> Result<(Band, Band), String> {
    let last = values[values.len() - 1];
    let steps: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let sigma = (steps.iter().map(|d| d * d).sum::<f64>() / steps.len() as f64).sqrt();
    let z = Normal::new(0.0, 1.0)
        .map_err(|e| e.to_string())?
        .inverse_cdf(0.5 + level / 2.0);

    let fitted: Vec<f64> = std::iter::once(values[0])
        .chain(values[..values.len() - 1].iter().copied())
        .collect();
    let in_sample = Band::with_half_width(fitted, |_| z * sigma);
    let future = Band::with_half_width(vec![last; horizon], |h| z * sigma * ((h + 1) as f64).sqrt());
    Ok((in_sample, future))
}
