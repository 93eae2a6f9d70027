use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::utility::mean;

/// A daily series: one value per unique date, sorted ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    name: String,
    points: Vec<(NaiveDate, f64)>,
}

impl TimeSeries {
    /// Builds a series from raw observations.
    ///
    /// Null observations are dropped. Repeated dates collapse to the mean of
    /// their values.
    pub fn from_observations<I>(name: &str, observations: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        let mut dropped = 0usize;

        for (date, value) in observations {
            match value {
                Some(v) if v.is_finite() => by_date.entry(date).or_default().push(v),
                _ => dropped += 1,
            }
        }

        let duplicates = by_date.values().filter(|v| v.len() > 1).count();
        if duplicates > 0 {
            warn!(series = name, duplicates, "Repeated dates averaged");
        }
        if dropped > 0 {
            warn!(series = name, dropped, "Null observations dropped");
        }

        let points = by_date
            .into_iter()
            .map(|(date, values)| (date, mean(&values)))
            .collect();

        Self {
            name: name.to_string(),
            points,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|(d, _)| *d)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(d, _)| *d)
    }

    /// One value per calendar day from the first to the last date. Days
    /// without an observation are linearly interpolated from their
    /// neighbours.
    pub fn daily_values(&self) -> Vec<f64> {
        let mut values = Vec::new();
        for pair in self.points.windows(2) {
            let ((d0, v0), (d1, v1)) = (pair[0], pair[1]);
            let gap = (d1 - d0).num_days();
            for step in 0..gap {
                values.push(v0 + (v1 - v0) * step as f64 / gap as f64);
            }
        }
        if let Some((_, last)) = self.points.last() {
            values.push(*last);
        }
        values
    }

    /// Index of each observed date within [`TimeSeries::daily_values`].
    pub fn day_offsets(&self) -> Vec<usize> {
        let Some(start) = self.first_date() else {
            return Vec::new();
        };
        self.points
            .iter()
            .map(|(d, _)| (*d - start).num_days() as usize)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_sorted_and_nulls_dropped() {
        let series = TimeSeries::from_observations(
            "admissions",
            vec![(day(3), Some(3.0)), (day(1), Some(1.0)), (day(2), None)],
        );
        assert_eq!(series.points(), &[(day(1), 1.0), (day(3), 3.0)]);
        assert_eq!(series.first_date(), Some(day(1)));
        assert_eq!(series.last_date(), Some(day(3)));
    }

    #[test]
    fn test_duplicate_dates_are_averaged() {
        let series = TimeSeries::from_observations(
            "beds",
            vec![(day(1), Some(4.0)), (day(1), Some(6.0)), (day(2), Some(1.0))],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0], (day(1), 5.0));
    }

    #[test]
    fn test_gaps_are_interpolated() {
        let series = TimeSeries::from_observations(
            "icu",
            vec![(day(1), Some(2.0)), (day(5), Some(6.0)), (day(6), Some(1.0))],
        );
        assert_eq!(series.daily_values(), vec![2.0, 3.0, 4.0, 5.0, 6.0, 1.0]);
        assert_eq!(series.day_offsets(), vec![0, 4, 5]);
    }

    #[test]
    fn test_empty_series() {
        let series = TimeSeries::from_observations("empty", Vec::new());
        assert!(series.is_empty());
        assert_eq!(series.last_date(), None);
        assert!(series.daily_values().is_empty());
        assert!(series.day_offsets().is_empty());
    }
}
