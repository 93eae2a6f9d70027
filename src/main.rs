//! CLI entry point for MediPredict.
//!
//! Provides subcommands for creating accounts, checking credentials, and
//! running the forecasting dashboard over a set of CSV uploads.

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use medipredict::{
    auth::{CredentialStore, FileCredentialStore},
    forecast::ForecastConfig,
    los::ForestConfig,
    output::{export_csv, print_pretty, write_json, write_tables},
    pipeline::{self, DatasetInputs, DatasetSources, PipelineConfig},
    resources::StaffingConfig,
    session::Session,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "medipredict")]
#[command(about = "Forecast hospital admissions, length of stay and resource needs", long_about = None)]
struct Cli {
    /// JSON file holding registered accounts
    #[arg(long, global = true, env = "MEDIPREDICT_USER_FILE", default_value = "users.json")]
    user_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Credentials {
    #[arg(short, long)]
    username: String,

    #[arg(short, long, env = "MEDIPREDICT_PASSWORD", hide_env_values = true)]
    password: String,
}

/// CSV uploads: local paths, `.gz` files or http(s) URLs.
#[derive(Args)]
struct Datasets {
    /// Admissions logs (date, admissions)
    #[arg(long)]
    admissions: Option<String>,

    /// Patient demographics (patient_id, age, gender, ...)
    #[arg(long)]
    demographics: Option<String>,

    /// Discharge summaries (patient_id, admission_date, discharge_date)
    #[arg(long)]
    discharge: Option<String>,

    /// ICU equipment usage (date, ventilators_used, beds_occupied, ...)
    #[arg(long)]
    icu: Option<String>,

    /// Staff rosters (date, staff_count)
    #[arg(long)]
    staff: Option<String>,

    /// Emergency cases (date, emergency_cases)
    #[arg(long)]
    emergency: Option<String>,

    /// Department-wise patient data (date, department, patient_count)
    #[arg(long)]
    departments: Option<String>,
}

impl From<Datasets> for DatasetSources {
    fn from(d: Datasets) -> Self {
        DatasetSources {
            admissions: d.admissions,
            demographics: d.demographics,
            discharge: d.discharge,
            icu: d.icu,
            staff: d.staff,
            emergency: d.emergency,
            departments: d.departments,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new account
    Register {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Check credentials without running the pipeline
    Login {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Run every forecast over the supplied datasets
    Run {
        #[command(flatten)]
        credentials: Credentials,

        #[command(flatten)]
        datasets: Datasets,

        /// Days to forecast past the last observed date
        #[arg(long, env = "MEDIPREDICT_HORIZON", default_value_t = 30)]
        horizon: usize,

        /// Staffing multiplier applied on top of the historical ratio
        #[arg(long, default_value_t = 2.0)]
        staff_buffer: f64,

        /// Staffing ratio used when history cannot provide one
        #[arg(long, default_value_t = 0.5)]
        default_staffing_ratio: f64,

        /// Trees in the length-of-stay forest
        #[arg(long, default_value_t = 100)]
        trees: usize,

        /// Seed for the length-of-stay forest
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Optional: directory to export each section as CSV
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/medipredict.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("medipredict.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let store = FileCredentialStore::new(&cli.user_file);

    match cli.command {
        Commands::Register { credentials } => {
            let (created, message) = store.register(&credentials.username, &credentials.password)?;
            if !created {
                warn!(username = %credentials.username, "{message}");
                bail!(message);
            }
            info!(username = %credentials.username, "{message}");
        }
        Commands::Login { credentials } => {
            let session = Session::login(&store, &credentials.username, &credentials.password)?;
            session.logout();
        }
        Commands::Run {
            credentials,
            datasets,
            horizon,
            staff_buffer,
            default_staffing_ratio,
            trees,
            seed,
            format,
            export_dir,
        } => {
            let config = PipelineConfig {
                forecast: ForecastConfig {
                    horizon_days: horizon,
                    ..Default::default()
                },
                forest: ForestConfig {
                    n_trees: trees,
                    seed,
                    ..Default::default()
                },
                staffing: StaffingConfig {
                    buffer_factor: staff_buffer,
                    default_ratio: default_staffing_ratio,
                },
            };
            run_dashboard(&store, credentials, datasets.into(), config, format, export_dir).await?;
        }
    }

    Ok(())
}

/// Authenticates, loads every dataset, runs the pipeline off the async
/// runtime and renders the report to stdout.
#[tracing::instrument(skip_all, fields(username = %credentials.username))]
async fn run_dashboard(
    store: &FileCredentialStore,
    credentials: Credentials,
    sources: DatasetSources,
    config: PipelineConfig,
    format: OutputFormat,
    export_dir: Option<PathBuf>,
) -> Result<()> {
    let mut session = Session::login(store, &credentials.username, &credentials.password)?;

    let inputs = DatasetInputs::load(&sources, session.cache_mut()).await?;
    info!(
        cached = session.cache().len(),
        emergency = inputs.emergency.is_some(),
        departments = inputs.departments.is_some(),
        "Datasets ready"
    );

    let (session, report) = tokio::task::spawn_blocking(move || {
        let report = pipeline::run(&session, &inputs, &config);
        (session, report)
    })
    .await?;
    let report = report?;

    print_pretty(&report);
    let stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Table => write_tables(stdout, &report)?,
        OutputFormat::Json => write_json(stdout, &report)?,
    }

    if let Some(dir) = export_dir {
        export_csv(&dir, &report)?;
    }

    session.logout();
    Ok(())
}
