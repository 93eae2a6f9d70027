use std::collections::HashMap;

use crate::dataset::{DatasetKind, Table, is_null};
use crate::error::{PipelineError, Result};
use crate::los::StayRecord;
use crate::utility::mean;

const ID_COLUMN: &str = "patient_id";
const TARGET_COLUMN: &str = "los";
const GENDER_COLUMN: &str = "gender";

/// Encodes gender as a binary indicator: `"M"` → 0, `"F"` → 1, anything else → 0.
pub fn encode_gender(value: &str) -> f64 {
    match value.trim() {
        "F" => 1.0,
        _ => 0.0,
    }
}

fn is_recognized_gender(value: &str) -> bool {
    matches!(value.trim(), "M" | "F")
}

/// Training data for the length-of-stay regressor.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    /// Stay records with no demographics match.
    pub dropped_records: usize,
    /// Gender cells that were neither "M" nor "F".
    pub unrecognized_gender: usize,
}

impl FeatureMatrix {
    /// Inner-joins stay records with demographics on `patient_id`.
    ///
    /// Every demographics column except the id (and a stray `los`) becomes a
    /// feature, in file order. A stay matching several demographic rows
    /// yields one training row per match.
    pub fn join(stays: &[StayRecord], demographics: &Table) -> Result<Self> {
        let id_col = demographics.expect_column(DatasetKind::Demographics, ID_COLUMN)?;
        let feature_cols: Vec<usize> = demographics
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() != ID_COLUMN && c.as_str() != TARGET_COLUMN)
            .map(|(i, _)| i)
            .collect();
        let gender_col = demographics.column_index(GENDER_COLUMN);

        let mut by_id: HashMap<&str, Vec<usize>> = HashMap::new();
        for row in 0..demographics.len() {
            by_id.entry(demographics.cell(row, id_col)).or_default().push(row);
        }

        let mut matrix = FeatureMatrix {
            names: feature_cols
                .iter()
                .map(|&c| demographics.columns()[c].clone())
                .collect(),
            rows: Vec::new(),
            targets: Vec::new(),
            dropped_records: 0,
            unrecognized_gender: 0,
        };

        for stay in stays {
            let Some(matches) = by_id.get(stay.patient_id.as_str()) else {
                matrix.dropped_records += 1;
                continue;
            };

            for &row in matches {
                let mut features = Vec::with_capacity(feature_cols.len());
                for &col in &feature_cols {
                    let value = demographics.cell(row, col);
                    if Some(col) == gender_col {
                        if !is_recognized_gender(value) {
                            matrix.unrecognized_gender += 1;
                        }
                        features.push(encode_gender(value));
                        continue;
                    }
                    features.push(feature_value(demographics, col, value, &stay.patient_id)?);
                }
                matrix.rows.push(features);
                matrix.targets.push(stay.los_days as f64);
            }
        }

        if matrix.rows.is_empty() {
            return Err(PipelineError::EmptyJoin);
        }
        Ok(matrix)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A finite number; null markers (including "NaN") and anything else are
/// rejected.
fn feature_value(demographics: &Table, col: usize, value: &str, patient_id: &str) -> Result<f64> {
    let column = || demographics.columns()[col].clone();
    if is_null(value) {
        return Err(PipelineError::MissingFeature {
            column: column(),
            patient_id: patient_id.to_string(),
        });
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PipelineError::NonNumericFeature {
            column: column(),
            patient_id: patient_id.to_string(),
            value: value.to_string(),
        })
}

/// Column-wise mean of a feature matrix.
pub fn column_means(rows: &[Vec<f64>]) -> Vec<f64> {
    let width = rows.first().map_or(0, Vec::len);
    (0..width)
        .map(|c| {
            let column: Vec<f64> = rows.iter().map(|r| r[c]).collect();
            mean(&column)
        })
        .collect()
}
