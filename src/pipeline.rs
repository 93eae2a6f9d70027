//! Stage sequencing for one dashboard run.
//!
//! Admissions, length of stay and resource projection are core: any error
//! there aborts the run. ICU, emergency and department sections fail on
//! their own and are reported as [`Section::Failed`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::dataset::{DatasetCache, DatasetKind, Table};
use crate::error::{PipelineError, Result};
use crate::forecast::{Forecast, ForecastConfig, TimeSeries, fit_and_forecast, forecast_many};
use crate::los::{self, ForestConfig, LosEstimate};
use crate::resources::{self, ResourceProjection, StaffingConfig, StaffingRatio};
use crate::session::Session;
use crate::utility::capitalize;

/// Every tunable of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub forecast: ForecastConfig,
    pub forest: ForestConfig,
    pub staffing: StaffingConfig,
}

/// Where each dataset comes from (path or URL); `None` when not supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSources {
    pub admissions: Option<String>,
    pub demographics: Option<String>,
    pub discharge: Option<String>,
    pub icu: Option<String>,
    pub staff: Option<String>,
    pub emergency: Option<String>,
    pub departments: Option<String>,
}

impl DatasetSources {
    pub fn get(&self, kind: DatasetKind) -> Option<&str> {
        let source = match kind {
            DatasetKind::Admissions => &self.admissions,
            DatasetKind::Demographics => &self.demographics,
            DatasetKind::Discharge => &self.discharge,
            DatasetKind::Icu => &self.icu,
            DatasetKind::Staff => &self.staff,
            DatasetKind::Emergency => &self.emergency,
            DatasetKind::Department => &self.departments,
        };
        source.as_deref()
    }

    /// First core dataset without a source, if any.
    pub fn missing_core(&self) -> Option<DatasetKind> {
        DatasetKind::CORE.into_iter().find(|k| self.get(*k).is_none())
    }
}

/// Parsed tables for one run.
#[derive(Debug, Clone)]
pub struct DatasetInputs {
    pub admissions: Arc<Table>,
    pub demographics: Arc<Table>,
    pub discharge: Arc<Table>,
    pub icu: Arc<Table>,
    pub staff: Arc<Table>,
    pub emergency: Option<Arc<Table>>,
    pub departments: Option<Arc<Table>>,
}

impl DatasetInputs {
    /// Loads every supplied source through the session cache.
    ///
    /// # Errors
    ///
    /// [`PipelineError::MissingDataset`] before anything is read if a core
    /// source is absent; otherwise the first load failure.
    pub async fn load(sources: &DatasetSources, cache: &mut DatasetCache) -> Result<Self> {
        if let Some(kind) = sources.missing_core() {
            return Err(PipelineError::MissingDataset(kind));
        }

        let core = |kind| sources.get(kind).ok_or(PipelineError::MissingDataset(kind));
        let admissions = cache.load(core(DatasetKind::Admissions)?).await?;
        let demographics = cache.load(core(DatasetKind::Demographics)?).await?;
        let discharge = cache.load(core(DatasetKind::Discharge)?).await?;
        let icu = cache.load(core(DatasetKind::Icu)?).await?;
        let staff = cache.load(core(DatasetKind::Staff)?).await?;

        let emergency = match sources.get(DatasetKind::Emergency) {
            Some(source) => Some(cache.load(source).await?),
            None => None,
        };
        let departments = match sources.get(DatasetKind::Department) {
            Some(source) => Some(cache.load(source).await?),
            None => None,
        };

        Ok(Self {
            admissions,
            demographics,
            discharge,
            icu,
            staff,
            emergency,
            departments,
        })
    }
}

/// Outcome of a section that may fail without stopping the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    Failed { message: String },
}

impl<T> Section<T> {
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Section::Ready(value),
            Err(e) => {
                warn!(error = %e, "Section failed");
                Section::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            Section::Failed { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Section::Ready(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricForecast {
    pub metric: String,
    pub forecast: Section<Forecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentForecast {
    pub department: String,
    pub display_name: String,
    pub forecast: Section<Forecast>,
}

/// Everything a run produces, in dashboard order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub username: String,
    pub generated_at: DateTime<Utc>,
    pub admissions: Forecast,
    pub length_of_stay: LosEstimate,
    pub staffing: StaffingRatio,
    pub resources: Vec<ResourceProjection>,
    pub icu: Section<Vec<MetricForecast>>,
    pub emergency: Option<Section<Forecast>>,
    pub departments: Option<Section<Vec<DepartmentForecast>>>,
}

/// Runs every stage for an authenticated session.
#[tracing::instrument(skip_all, fields(user = session.username()))]
pub fn run(session: &Session, inputs: &DatasetInputs, config: &PipelineConfig) -> Result<DashboardReport> {
    let horizon = config.forecast.horizon_days;

    info!("Forecasting admissions");
    let admissions_obs = observations(&inputs.admissions, DatasetKind::Admissions, "admissions")?;
    let admissions_series = TimeSeries::from_observations("admissions", admissions_obs.iter().copied());
    let admissions = fit_and_forecast(&admissions_series, horizon, &config.forecast)?;

    info!("Estimating length of stay");
    let length_of_stay = los::estimate(&inputs.discharge, &inputs.demographics, &config.forest)?;

    info!("Projecting bed and staff needs");
    let staff_obs = observations(&inputs.staff, DatasetKind::Staff, "staff_count")?;
    let staffing = StaffingRatio::from_history(
        &admissions_obs,
        &staff_obs,
        length_of_stay.average_los,
        &config.staffing,
    );
    let resources = resources::project(&admissions, &staffing, &config.staffing);

    info!("Forecasting ICU equipment usage");
    let icu = Section::from_result(icu_forecasts(&inputs.icu, &config.forecast));

    let emergency = inputs.emergency.as_deref().map(|table| {
        info!("Forecasting emergency cases");
        Section::from_result(emergency_forecast(table, &config.forecast))
    });

    let departments = inputs.departments.as_deref().map(|table| {
        info!("Forecasting department patient load");
        Section::from_result(department_forecasts(table, &config.forecast))
    });

    Ok(DashboardReport {
        username: session.username().to_string(),
        generated_at: Utc::now(),
        admissions,
        length_of_stay,
        staffing,
        resources,
        icu,
        emergency,
        departments,
    })
}

/// Raw (date, value) rows of a validated table.
fn observations(table: &Table, kind: DatasetKind, value_column: &str) -> Result<Vec<(NaiveDate, Option<f64>)>> {
    table.require(kind)?;
    let date_col = table.expect_column(kind, "date")?;
    let value_col = table.expect_column(kind, value_column)?;
    table.dated_values(date_col, value_col)
}

/// Forecasts every non-date ICU column independently.
pub fn icu_forecasts(table: &Table, config: &ForecastConfig) -> Result<Vec<MetricForecast>> {
    table.require(DatasetKind::Icu)?;
    let date_col = table.expect_column(DatasetKind::Icu, "date")?;
    let metrics: Vec<usize> = (0..table.columns().len()).filter(|&c| c != date_col).collect();
    if metrics.is_empty() {
        return Err(PipelineError::NoMetricColumns);
    }

    Ok(metrics
        .par_iter()
        .map(|&col| {
            let metric = table.columns()[col].clone();
            let forecast = table
                .dated_values(date_col, col)
                .map(|obs| TimeSeries::from_observations(&metric, obs))
                .and_then(|series| fit_and_forecast(&series, config.horizon_days, config));
            MetricForecast {
                metric,
                forecast: Section::from_result(forecast),
            }
        })
        .collect())
}

pub fn emergency_forecast(table: &Table, config: &ForecastConfig) -> Result<Forecast> {
    let obs = observations(table, DatasetKind::Emergency, "emergency_cases")?;
    let series = TimeSeries::from_observations("emergency_cases", obs);
    fit_and_forecast(&series, config.horizon_days, config)
}

/// One independent forecast per department, in order of first appearance.
pub fn department_forecasts(table: &Table, config: &ForecastConfig) -> Result<Vec<DepartmentForecast>> {
    table.require(DatasetKind::Department)?;
    let date_col = table.expect_column(DatasetKind::Department, "date")?;
    let dept_col = table.expect_column(DatasetKind::Department, "department")?;
    let count_col = table.expect_column(DatasetKind::Department, "patient_count")?;

    let mut order: Vec<String> = Vec::new();
    let mut rows: HashMap<String, Vec<(NaiveDate, Option<f64>)>> = HashMap::new();
    for row in 0..table.len() {
        let department = table.cell(row, dept_col).to_string();
        let observation = (table.date_at(row, date_col)?, table.number_at(row, count_col)?);
        rows.entry(department.clone())
            .or_insert_with(|| {
                order.push(department);
                Vec::new()
            })
            .push(observation);
    }

    let series: Vec<TimeSeries> = order
        .iter()
        .map(|dept| TimeSeries::from_observations(dept, rows.remove(dept).unwrap_or_default()))
        .collect();

    Ok(order
        .into_iter()
        .zip(forecast_many(&series, config))
        .map(|(department, forecast)| DepartmentForecast {
            display_name: capitalize(&department),
            department,
            forecast: Section::from_result(forecast),
        })
        .collect())
}
