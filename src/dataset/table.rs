use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, Trim};

use crate::dataset::DatasetKind;
use crate::error::{PipelineError, Result};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];
const NULL_MARKERS: &[&str] = &["", "na", "nan", "null", "none", "n/a"];

/// An in-memory CSV table with lowercase column names and trimmed string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Parses comma-delimited text with a header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV is malformed (e.g. ragged rows).
    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

        let columns = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self {
            name: name.to_string(),
            columns,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Returns the required columns of `kind` that this table lacks.
    pub fn missing_columns(&self, kind: DatasetKind) -> Vec<String> {
        kind.required_columns()
            .iter()
            .filter(|c| self.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect()
    }

    /// Checks that every required column of `kind` is present.
    pub fn require(&self, kind: DatasetKind) -> Result<()> {
        let missing = self.missing_columns(kind);
        if missing.is_empty() {
            return Ok(());
        }
        Err(PipelineError::MissingColumns {
            kind,
            required: kind.required_columns().iter().map(|c| c.to_string()).collect(),
            missing,
        })
    }

    /// Index of `column`, reported as a missing column of `kind` when absent.
    pub fn expect_column(&self, kind: DatasetKind, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| PipelineError::MissingColumns {
                kind,
                required: kind.required_columns().iter().map(|c| c.to_string()).collect(),
                missing: vec![column.to_string()],
            })
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Parses the cell at (`row`, `col`) as a calendar date.
    pub fn date_at(&self, row: usize, col: usize) -> Result<NaiveDate> {
        let value = self.cell(row, col);
        parse_date(value).ok_or_else(|| PipelineError::InvalidDate {
            source_name: self.name.clone(),
            row: row + 1,
            column: self.columns[col].clone(),
            value: value.to_string(),
        })
    }

    /// Parses the cell at (`row`, `col`) as a number; null markers yield `None`.
    pub fn number_at(&self, row: usize, col: usize) -> Result<Option<f64>> {
        let value = self.cell(row, col);
        if is_null(value) {
            return Ok(None);
        }
        value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| PipelineError::InvalidNumber {
                source_name: self.name.clone(),
                row: row + 1,
                column: self.columns[col].clone(),
                value: value.to_string(),
            })
    }

    /// Reads a (date, value) column pair, keeping null values as `None`.
    pub fn dated_values(&self, date_col: usize, value_col: usize) -> Result<Vec<(NaiveDate, Option<f64>)>> {
        (0..self.rows.len())
            .map(|row| Ok((self.date_at(row, date_col)?, self.number_at(row, value_col)?)))
            .collect()
    }
}

pub(crate) fn is_null(value: &str) -> bool {
    NULL_MARKERS.contains(&value.trim().to_lowercase().as_str())
}

/// Parses a date or timestamp, truncating any time part to the calendar day.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}
