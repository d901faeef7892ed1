//! garmin-gpx - Download Garmin Connect activities as GPX files
//!
//! Usage:
//!   garmin-gpx [-n <name>...] [-t <type>...] [-r <km> [-c "(lat,lon)"]] [-f and|or] [--nowrite]
//!
//! Filters can be applied to only download activities:
//! - with certain text in the activity name (-n), ignoring capitals
//! - of certain activity types (-t)
//! - starting within a radius (-r) of a coordinate (-c), or of the start of
//!   the most recent activity when no coordinate is given
//!
//! Multiple filters are combined with AND (default) or OR (-f).

use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use garmin_gpx::download::{download_all, DownloadConfig, ProgressCallback};
use garmin_gpx::filter::DEFAULT_SKIPPED_TYPES;
use garmin_gpx::http::{ClientConfig, GarminClient};
use garmin_gpx::session::{Session, TokenStore, DEFAULT_TOKEN_DIR, TOKEN_DIR_ENV};
use garmin_gpx::store::{GpxStore, DEFAULT_OUTPUT_DIR};
use garmin_gpx::{
    filter_activities, ActivityDirectory, CombineMode, Coordinate, DownloaderError, FilterOptions,
};

#[derive(Parser)]
#[command(name = "garmin-gpx")]
#[command(about = "Download the GPX files of your Garmin Connect activities", long_about = None)]
struct Cli {
    /// Log level
    #[arg(short, long, value_enum, default_value_t = LogLevel::Error)]
    loglevel: LogLevel,

    /// Only keep activities whose name contains any of these strings (ignores capitals)
    #[arg(short, long, num_args = 1..)]
    name: Option<Vec<String>>,

    /// Only keep activities whose type contains any of these strings, e.g. "cycling" "running"
    #[arg(short = 't', long, num_args = 1..)]
    activity_type: Option<Vec<String>>,

    /// Circle center for the radius filter, as "(latitude,longitude)"
    #[arg(short = 'c', long, requires = "radius", allow_hyphen_values = true)]
    start_coordinate: Option<Coordinate>,

    /// Radius in km around the start coordinate (or the start of your last activity)
    #[arg(short, long)]
    radius: Option<f64>,

    /// Combine filters with AND or OR
    #[arg(short, long, value_enum, default_value_t = CombineMode::And)]
    filtertype: CombineMode,

    /// Dry run: list and filter without downloading
    #[arg(long)]
    nowrite: bool,

    /// Output directory for GPX files
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Directory with saved authentication tokens
    #[arg(long, env = TOKEN_DIR_ENV, default_value = DEFAULT_TOKEN_DIR)]
    tokens: String,

    /// Bearer access token, overrides the token directory
    #[arg(long, env = "GARMIN_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Activity types that are never downloaded
    #[arg(long = "skip-type", default_values_t = DEFAULT_SKIPPED_TYPES.iter().map(|s| s.to_string()))]
    skip_types: Vec<String>,

    /// Parallel downloads
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides --loglevel
    let level = LevelFilter::from(cli.loglevel);
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(level.to_string().to_lowercase()),
    )
    .filter_module("reqwest", LevelFilter::Warn)
    .filter_module("hyper_util", LevelFilter::Warn)
    .format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {:5} - {}",
            buf.timestamp_seconds(),
            record.target(),
            record.level(),
            record.args()
        )
    })
    .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_session(cli: &Cli) -> Result<Session, DownloaderError> {
    if let Some(token) = &cli.access_token {
        info!("Using access token from command line/environment");
        return Ok(Session::from_access_token(token.clone()));
    }

    let store = TokenStore::new(&cli.tokens);
    println!("🔐 Token storage: {}", store.path().display());
    let files = store.token_files();
    if !files.is_empty() {
        let names: Vec<String> = files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        println!("🔑 Found {} token file(s): {:?}", files.len(), names);
    }
    Session::from_store(&store)
}

async fn run(cli: Cli) -> Result<(), DownloaderError> {
    let session = open_session(&cli)?;
    let client = GarminClient::new(&session, ClientConfig::default())?;

    let activities = client.list_activities().await?;
    println!("\nIn total {} activities found.", activities.len());

    let options = FilterOptions {
        names: cli.name,
        types: cli.activity_type,
        start_coordinate: cli.start_coordinate,
        radius_km: cli.radius,
        mode: cli.filtertype,
        skip_types: Some(cli.skip_types),
    };
    let has_filters = options.has_filters();
    let config = options.resolve(activities.as_slice())?;

    if has_filters {
        info!(
            "Filtering on: name={:?} type={:?} radius={:?} mode={}",
            config.names, config.types, config.radius, config.mode
        );
    }
    let activities = filter_activities(&activities, &config);
    if has_filters {
        println!("\nAfter filtering, {} activities left over.", activities.len());
    }

    if cli.nowrite {
        return Ok(());
    }

    println!("\nFetching data and writing to GPX files.\nThis may take a while...\n");
    let store = GpxStore::new(cli.output);
    let progress: ProgressCallback =
        Arc::new(|done, total| println!("Writing file {:4} out of {:4}", done, total));

    let mut report = download_all(
        &client,
        &store,
        &activities,
        &DownloadConfig {
            concurrency: cli.concurrency,
        },
        Some(progress),
    )
    .await;

    let fatal = report.take_fatal();
    println!(
        "\n✅ {} written, {} already present, {} failed ({})",
        report.written.len(),
        report.skipped.len(),
        report.failed.len() + usize::from(fatal.is_some()),
        store.dir().display()
    );
    for failure in &report.failed {
        eprintln!(
            "❌ {} ({}): {}",
            failure.file_name, failure.activity_id, failure.error
        );
    }

    match fatal {
        Some(failure) => {
            eprintln!(
                "\nDownloading stopped at {} ({}), {} activities not attempted.",
                failure.file_name,
                failure.activity_id,
                report.not_attempted.len()
            );
            Err(failure.error)
        }
        None => Ok(()),
    }
}
