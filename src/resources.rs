//! Bed and staff demand derived from the admissions forecast.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::forecast::Forecast;
use crate::utility::mean_present;

/// Policy constants for staffing projections.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffingConfig {
    /// Multiplier covering shift rotation on top of the steady-state ratio.
    pub buffer_factor: f64,
    /// Ratio used when history cannot provide one.
    pub default_ratio: f64,
}

impl Default for StaffingConfig {
    fn default() -> Self {
        Self {
            buffer_factor: 2.0,
            default_ratio: 0.5,
        }
    }
}

/// Staff per occupied bed-day, from dates present in both admissions and rosters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffingRatio {
    pub value: f64,
    pub average_los: f64,
    /// Rows in the admissions ⋈ staff date join.
    pub overlap_rows: usize,
    /// `true` when `value` is the configured default.
    pub defaulted: bool,
}

impl StaffingRatio {
    /// `mean(staff_count) / (mean(admissions) × average_los)` over the inner
    /// join of both tables on date, or `config.default_ratio` when the
    /// denominator is not positive or nothing overlaps.
    pub fn from_history(
        admissions: &[(NaiveDate, Option<f64>)],
        staff: &[(NaiveDate, Option<f64>)],
        average_los: f64,
        config: &StaffingConfig,
    ) -> Self {
        let mut staff_by_date: HashMap<NaiveDate, Vec<Option<f64>>> = HashMap::new();
        for (date, count) in staff {
            staff_by_date.entry(*date).or_default().push(*count);
        }

        let mut joined_admissions = Vec::new();
        let mut joined_staff = Vec::new();
        for (date, admitted) in admissions {
            if let Some(counts) = staff_by_date.get(date) {
                for count in counts {
                    joined_admissions.push(*admitted);
                    joined_staff.push(*count);
                }
            }
        }
        let overlap_rows = joined_admissions.len();

        let ratio = match (mean_present(joined_staff), mean_present(joined_admissions)) {
            (Some(avg_staff), Some(avg_admissions)) => {
                let bed_days = avg_admissions * average_los;
                (bed_days > 0.0).then(|| avg_staff / bed_days)
            }
            _ => None,
        };

        match ratio {
            Some(value) => Self {
                value,
                average_los,
                overlap_rows,
                defaulted: false,
            },
            None => {
                warn!(
                    overlap_rows,
                    default = config.default_ratio,
                    "Staffing ratio unavailable from history, using default"
                );
                Self {
                    value: config.default_ratio,
                    average_los,
                    overlap_rows,
                    defaulted: true,
                }
            }
        }
    }
}

/// Projected needs for one future day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceProjection {
    pub date: NaiveDate,
    pub predicted_admissions: f64,
    pub beds_needed: u64,
    pub staff_needed: u64,
}

/// Rounds demand up to whole units, never below zero.
fn whole_units(demand: f64) -> u64 {
    demand.ceil().max(0.0) as u64
}

/// Projects beds and staff for every future day of the admissions forecast.
pub fn project(forecast: &Forecast, staffing: &StaffingRatio, config: &StaffingConfig) -> Vec<ResourceProjection> {
    let projection: Vec<ResourceProjection> = forecast
        .future()
        .iter()
        .map(|row| ResourceProjection {
            date: row.date,
            predicted_admissions: row.yhat,
            beds_needed: whole_units(row.yhat),
            staff_needed: whole_units(config.buffer_factor * row.yhat * staffing.value),
        })
        .collect();

    info!(
        days = projection.len(),
        ratio = staffing.value,
        peak_beds = projection.iter().map(|p| p.beds_needed).max().unwrap_or(0),
        "Resource projection computed"
    );
    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastRow;
    use chrono::Duration;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn forecast(future: &[f64]) -> Forecast {
        let rows = future
            .iter()
            .enumerate()
            .map(|(i, y)| ForecastRow {
                date: day(1) + Duration::days(i as i64),
                yhat: *y,
                yhat_lower: *y,
                yhat_upper: *y,
                is_history: false,
            })
            .collect();
        Forecast {
            series: "admissions".into(),
            model: "naive".into(),
            horizon: future.len(),
            rows,
        }
    }

    fn ratio(value: f64) -> StaffingRatio {
        StaffingRatio {
            value,
            average_los: 4.0,
            overlap_rows: 10,
            defaulted: false,
        }
    }

    #[test]
    fn test_staffing_ratio_from_overlap() {
        let admissions = vec![(day(1), Some(10.0)), (day(2), Some(20.0)), (day(3), Some(99.0))];
        let staff = vec![(day(1), Some(30.0)), (day(2), Some(30.0)), (day(9), Some(500.0))];
        let r = StaffingRatio::from_history(&admissions, &staff, 2.0, &StaffingConfig::default());
        // mean staff 30 / (mean admissions 15 * los 2)
        assert_eq!(r.value, 1.0);
        assert_eq!(r.overlap_rows, 2);
        assert!(!r.defaulted);
    }

    #[test]
    fn test_staffing_ratio_defaults_when_los_is_zero() {
        let admissions = vec![(day(1), Some(10.0))];
        let staff = vec![(day(1), Some(30.0))];
        let r = StaffingRatio::from_history(&admissions, &staff, 0.0, &StaffingConfig::default());
        assert_eq!(r.value, 0.5);
        assert!(r.defaulted);
    }

    #[test]
    fn test_staffing_ratio_defaults_without_overlap() {
        let admissions = vec![(day(1), Some(10.0))];
        let staff = vec![(day(2), Some(30.0))];
        let r = StaffingRatio::from_history(&admissions, &staff, 3.0, &StaffingConfig::default());
        assert_eq!(r.value, 0.5);
        assert_eq!(r.overlap_rows, 0);
    }

    #[test]
    fn test_staffing_ratio_ignores_null_cells() {
        let admissions = vec![(day(1), Some(10.0)), (day(2), None)];
        let staff = vec![(day(1), Some(20.0)), (day(2), Some(40.0))];
        let r = StaffingRatio::from_history(&admissions, &staff, 1.0, &StaffingConfig::default());
        assert_eq!(r.value, 3.0);
    }

    #[test]
    fn test_beds_are_ceiling_of_admissions() {
        let projection = project(&forecast(&[9.2, 10.0, 0.4]), &ratio(0.5), &StaffingConfig::default());
        let beds: Vec<u64> = projection.iter().map(|p| p.beds_needed).collect();
        assert_eq!(beds, vec![10, 10, 1]);
        for p in &projection {
            assert!(p.beds_needed as f64 >= p.predicted_admissions);
        }
    }

    #[test]
    fn test_negative_prediction_clamps_to_zero() {
        let projection = project(&forecast(&[-1.7]), &ratio(0.5), &StaffingConfig::default());
        assert_eq!(projection[0].beds_needed, 0);
        assert_eq!(projection[0].staff_needed, 0);
    }

    #[test]
    fn test_staff_uses_buffer_factor() {
        let projection = project(&forecast(&[10.0]), &ratio(0.25), &StaffingConfig::default());
        // ceil(2 * 10 * 0.25) = 5
        assert_eq!(projection[0].staff_needed, 5);

        let config = StaffingConfig {
            buffer_factor: 3.0,
            ..Default::default()
        };
        let projection = project(&forecast(&[10.0]), &ratio(0.25), &config);
        // ceil(3 * 10 * 0.25) = ceil(7.5)
        assert_eq!(projection[0].staff_needed, 8);
    }
}
