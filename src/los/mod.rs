//! Length-of-stay estimation.
//!
//! Discharge records give each stay a duration in whole days. Joined with
//! patient demographics they train a [`RandomForest`], which is then asked
//! for the stay of an "average" patient: the column-wise mean of the
//! training features.

mod features;
mod forest;

pub use features::{FeatureMatrix, column_means, encode_gender};
pub use forest::{ForestConfig, RandomForest};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::dataset::{DatasetKind, Table};
use crate::error::{PipelineError, Result};

/// One discharge event.
#[derive(Debug, Clone, PartialEq)]
pub struct StayRecord {
    pub patient_id: String,
    pub admission_date: NaiveDate,
    pub discharge_date: NaiveDate,
    /// Whole days between admission and discharge; negative if the dates
    /// are inverted in the source data.
    pub los_days: i64,
}

/// Whole days from admission to discharge.
pub fn length_of_stay(admission: NaiveDate, discharge: NaiveDate) -> i64 {
    (discharge - admission).num_days()
}

/// Reads stay records from a discharge table.
pub fn stay_records(discharge: &Table) -> Result<Vec<StayRecord>> {
    discharge.require(DatasetKind::Discharge)?;
    let id = discharge.expect_column(DatasetKind::Discharge, "patient_id")?;
    let admitted = discharge.expect_column(DatasetKind::Discharge, "admission_date")?;
    let discharged = discharge.expect_column(DatasetKind::Discharge, "discharge_date")?;

    (0..discharge.len())
        .map(|row| {
            let admission_date = discharge.date_at(row, admitted)?;
            let discharge_date = discharge.date_at(row, discharged)?;
            Ok(StayRecord {
                patient_id: discharge.cell(row, id).to_string(),
                admission_date,
                discharge_date,
                los_days: length_of_stay(admission_date, discharge_date),
            })
        })
        .collect()
}

/// Result of the length-of-stay stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LosEstimate {
    /// Predicted stay, in days, for the mean patient profile.
    pub average_los: f64,
    pub features: Vec<String>,
    pub training_rows: usize,
    /// Discharge records without a demographics match.
    pub dropped_records: usize,
    /// Gender values other than "M"/"F", encoded as 0.
    pub unrecognized_gender: usize,
}

/// Trains the forest on joined discharge/demographics data and predicts the
/// average length of stay.
#[tracing::instrument(skip_all, fields(discharges = discharge.len(), patients = demographics.len()))]
pub fn estimate(discharge: &Table, demographics: &Table, config: &ForestConfig) -> Result<LosEstimate> {
    demographics.require(DatasetKind::Demographics)?;
    let stays = stay_records(discharge)?;
    let matrix = FeatureMatrix::join(&stays, demographics)?;

    if matrix.dropped_records > 0 {
        warn!(
            dropped = matrix.dropped_records,
            "Discharge records without matching demographics were dropped"
        );
    }
    if matrix.unrecognized_gender > 0 {
        warn!(
            count = matrix.unrecognized_gender,
            "Unrecognized gender values encoded as 0"
        );
    }

    let model_error = |message| PipelineError::Model {
        target: "length_of_stay".to_string(),
        message,
    };
    let forest = RandomForest::fit(&matrix.rows, &matrix.targets, config).map_err(model_error)?;
    let average_los = forest.predict_average(&matrix.rows).map_err(model_error)?;

    info!(
        average_los,
        training_rows = matrix.len(),
        trees = forest.n_trees(),
        "Length of stay estimated"
    );

    Ok(LosEstimate {
        average_los,
        training_rows: matrix.len(),
        dropped_records: matrix.dropped_records,
        unrecognized_gender: matrix.unrecognized_gender,
        features: matrix.names,
    })
}
