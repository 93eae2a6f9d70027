//! Tabular dataset loading and validation.
//!
//! Every upload is read into a [`Table`] with lowercase column names. The
//! pipeline then checks each table against the required columns of its
//! [`DatasetKind`] before any model is fitted.

mod cache;
mod loader;
mod table;

pub use cache::DatasetCache;
pub use loader::{load, read_source};
pub use table::{Table, parse_date};
pub(crate) use table::is_null;

use serde::Serialize;
use std::fmt;

/// The seven kinds of operational data the dashboard understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Admissions,
    Demographics,
    Discharge,
    Icu,
    Staff,
    Emergency,
    Department,
}

impl DatasetKind {
    /// Core datasets must all be supplied before a run can start.
    pub const CORE: [DatasetKind; 5] = [
        DatasetKind::Admissions,
        DatasetKind::Demographics,
        DatasetKind::Discharge,
        DatasetKind::Icu,
        DatasetKind::Staff,
    ];

    /// Columns that must be present (after lowercasing) for this kind.
    ///
    /// Demographics only needs the join key; `age`, `gender` and any other
    /// column become length-of-stay features when present.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            DatasetKind::Admissions => &["date", "admissions"],
            DatasetKind::Demographics => &["patient_id"],
            DatasetKind::Discharge => &["patient_id", "admission_date", "discharge_date"],
            DatasetKind::Icu => &["date"],
            DatasetKind::Staff => &["date", "staff_count"],
            DatasetKind::Emergency => &["date", "emergency_cases"],
            DatasetKind::Department => &["date", "department", "patient_count"],
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetKind::Admissions => "Admissions",
            DatasetKind::Demographics => "Demographics",
            DatasetKind::Discharge => "Discharge",
            DatasetKind::Icu => "ICU",
            DatasetKind::Staff => "Staff",
            DatasetKind::Emergency => "Emergency",
            DatasetKind::Department => "Department",
        };
        f.write_str(name)
    }
}
