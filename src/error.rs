//! Error types shared by every pipeline stage.

use crate::dataset::DatasetKind;

/// Errors raised while loading datasets or running a forecasting stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A core dataset was not supplied at all.
    #[error("Please upload all five core CSV files to proceed (missing: {0})")]
    MissingDataset(DatasetKind),

    /// A dataset is present but lacks required columns.
    #[error("{kind} CSV must have {} columns (missing: {})", .required.join(", "), .missing.join(", "))]
    MissingColumns {
        kind: DatasetKind,
        required: Vec<String>,
        missing: Vec<String>,
    },

    /// The ICU table has a date column but nothing to forecast.
    #[error("ICU CSV must have at least one metric column besides date")]
    NoMetricColumns,

    #[error("{source_name}: row {row}, column '{column}': cannot parse date '{value}'")]
    InvalidDate {
        source_name: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("{source_name}: row {row}, column '{column}': cannot parse number '{value}'")]
    InvalidNumber {
        source_name: String,
        row: usize,
        column: String,
        value: String,
    },

    /// A length-of-stay feature column holds something other than a number.
    #[error("feature column '{column}' is not numeric (value '{value}' for patient {patient_id})")]
    NonNumericFeature {
        column: String,
        patient_id: String,
        value: String,
    },

    /// A length-of-stay feature cell is empty or a null marker.
    #[error("feature column '{column}' has no value for patient {patient_id}")]
    MissingFeature { column: String, patient_id: String },

    /// No discharge record matched a demographic record.
    #[error("no discharge record matched a demographics record on patient_id")]
    EmptyJoin,

    #[error("insufficient history for '{series}': {observations} observation(s), need at least 2")]
    InsufficientHistory { series: String, observations: usize },

    /// A forecasting or regression model rejected its input.
    #[error("model for '{target}' failed: {message}")]
    Model { target: String, message: String },

    /// The horizon runs past the last representable calendar date.
    #[error("forecast horizon of {horizon} days for '{series}' is out of range")]
    HorizonOutOfRange { series: String, horizon: usize },

    #[error("failed to fetch {source_name}: {message}")]
    Fetch { source_name: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for Result with [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;
