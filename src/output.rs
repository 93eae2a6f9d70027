//! Rendering and persistence of dashboard reports.
//!
//! Supports plain-text tables, JSON serialization, and CSV export.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::forecast::{Forecast, ForecastRow};
use crate::pipeline::{DashboardReport, Section};

/// Logs the report using Rust's debug pretty-print format.
pub fn print_pretty(report: &DashboardReport) {
    debug!("{:#?}", report);
}

/// Writes the report as pretty-printed JSON.
pub fn write_json<W: Write>(mut out: W, report: &DashboardReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, report)?;
    writeln!(out)?;
    Ok(())
}

/// Writes every section as a plain-text table.
pub fn write_tables<W: Write>(mut out: W, report: &DashboardReport) -> Result<()> {
    writeln!(out, "MediPredict report for {} ({})", report.username, report.generated_at.format("%Y-%m-%d %H:%M UTC"))?;

    heading(&mut out, "1. Patient Admissions Forecast")?;
    forecast_table(&mut out, report.admissions.future(), "Admissions")?;

    heading(&mut out, "2. Length-of-Stay (LOS) Prediction")?;
    let los = &report.length_of_stay;
    writeln!(out, "Predicted Avg LOS (days): {:.2}", los.average_los)?;
    writeln!(
        out,
        "Training rows: {}  Dropped discharges: {}  Unrecognized gender: {}",
        los.training_rows, los.dropped_records, los.unrecognized_gender
    )?;

    heading(&mut out, &format!("3. Bed & Staff Needs (Next {} days)", report.resources.len()))?;
    let note = if report.staffing.defaulted { " (default)" } else { "" };
    writeln!(out, "Staffing ratio: {:.4}{note}", report.staffing.value)?;
    writeln!(out, "{:<12} {:>12} {:>12} {:>13}", "Date", "Admissions", "Beds Needed", "Staff Needed")?;
    for p in &report.resources {
        writeln!(
            out,
            "{:<12} {:>12.2} {:>12} {:>13}",
            p.date.to_string(), p.predicted_admissions, p.beds_needed, p.staff_needed
        )?;
    }

    heading(&mut out, "4. ICU Equipment Usage Forecast")?;
    match &report.icu {
        Section::Ready(metrics) => {
            for m in metrics {
                writeln!(out, "\nForecast for {}", m.metric)?;
                section_forecast(&mut out, &m.forecast, "Predicted")?;
            }
        }
        Section::Failed { message } => writeln!(out, "Error: {message}")?,
    }

    if let Some(emergency) = &report.emergency {
        heading(&mut out, "5. Emergency Case Forecasting")?;
        section_forecast(&mut out, emergency, "Emergency Cases")?;
    }

    if let Some(departments) = &report.departments {
        heading(&mut out, "6. Department-wise Patient Forecast")?;
        match departments {
            Section::Ready(list) => {
                for d in list {
                    writeln!(out, "\n{} Department", d.display_name)?;
                    section_forecast(&mut out, &d.forecast, "Predicted Patients")?;
                }
            }
            Section::Failed { message } => writeln!(out, "Error: {message}")?,
        }
    }

    Ok(())
}

fn heading<W: Write>(out: &mut W, title: &str) -> Result<()> {
    writeln!(out, "\n{title}\n{}", "-".repeat(title.chars().count()))?;
    Ok(())
}

fn section_forecast<W: Write>(out: &mut W, section: &Section<Forecast>, label: &str) -> Result<()> {
    match section {
        Section::Ready(forecast) => forecast_table(out, forecast.future(), label),
        Section::Failed { message } => {
            writeln!(out, "Error: {message}")?;
            Ok(())
        }
    }
}

fn forecast_table<W: Write>(out: &mut W, rows: &[ForecastRow], label: &str) -> Result<()> {
    writeln!(out, "{:<12} {:>18} {:>10} {:>10}", "Date", label, "Lower", "Upper")?;
    for r in rows {
        writeln!(
            out,
            "{:<12} {:>18.2} {:>10.2} {:>10.2}",
            r.date.to_string(), r.yhat, r.yhat_lower, r.yhat_upper
        )?;
    }
    Ok(())
}

/// Writes `records` to a fresh CSV file at `path`, header included.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = records.len(), "Writing CSV");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Exports each ready section as its own CSV file under `dir`.
pub fn export_csv(dir: &Path, report: &DashboardReport) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    macro_rules! emit {
        ($name:expr, $rows:expr) => {
            let path = dir.join($name);
            write_records(&path, $rows)?;
            written.push(path);
        };
    }

    emit!("admissions_forecast.csv", &report.admissions.rows);
    emit!("resources.csv", &report.resources);

    if let Section::Ready(metrics) = &report.icu {
        for m in metrics {
            if let Section::Ready(f) = &m.forecast {
                emit!(format!("icu_{}.csv", slug(&m.metric)), &f.rows);
            }
        }
    }
    if let Some(Section::Ready(f)) = &report.emergency {
        emit!("emergency_forecast.csv", &f.rows);
    }
    if let Some(Section::Ready(departments)) = &report.departments {
        for d in departments {
            if let Section::Ready(f) = &d.forecast {
                emit!(format!("department_{}.csv", slug(&d.department)), f.future());
            }
        }
    }

    info!(dir = %dir.display(), files = written.len(), "CSV export complete");
    Ok(written)
}

fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}
