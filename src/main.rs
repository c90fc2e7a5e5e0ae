use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use debenture_prices::{config, get_business_days, run, Config, HttpTransport};
use tracing::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Downloads the daily secondary-market debenture spreadsheets for the last business days,
/// builds a cleaned and validated dataset and renders indicative rate reports.
#[derive(Debug, Parser)]
struct Args {
    /// Number of business days, counting back from yesterday, to fetch.
    #[arg(
        long,
        env = "DEBENTURE_PRICES_BUSINESS_DAYS",
        default_value_t = config::BUSINESS_DAYS_COUNT
    )]
    business_days: u32,

    /// Root folder for source files, datasets and reports.
    #[arg(long, env = "DEBENTURE_PRICES_DATA_DIR", default_value = config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[arg(long, env = "DEBENTURE_PRICES_BASE_URL", default_value = config::BASE_URL)]
    base_url: String,

    /// Download attempts per day.
    #[arg(long, env = "DEBENTURE_PRICES_MAX_RETRIES", default_value_t = config::MAX_RETRIES)]
    max_retries: u32,

    /// Seconds to wait between download attempts.
    #[arg(
        long,
        env = "DEBENTURE_PRICES_RETRY_DELAY",
        default_value_t = config::RETRY_DELAY.as_secs()
    )]
    retry_delay: u64,

    /// The logging verbosity: off, error, warn, info, debug or trace. RUST_LOG overrides it.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Config {
            business_days: args.business_days,
            data_dir: args.data_dir.clone(),
            base_url: args.base_url.clone(),
            max_retries: args.max_retries,
            retry_delay: Duration::from_secs(args.retry_delay),
            ..Config::default()
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.log_level);
    debug!("{args:?}");

    match main_inner(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("no validated dataset was produced");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn main_inner(args: &Args) -> anyhow::Result<bool> {
    let config = Config::from(args);
    let transport = HttpTransport::new(config.timeout).context("failed to set up downloads")?;
    let business_days = get_business_days(i64::from(config.business_days));

    let report = run(&config, &transport, &business_days);

    for (day, outcome) in &report.downloads {
        info!(%day, "download: {outcome}");
    }
    info!("combine: {}", report.combined);
    info!("clean: {}", report.cleaned);
    info!("validate: {}", report.validation);
    info!("reports: {}", report.reports);
    Ok(report.succeeded())
}

fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        // The binary and the library share the crate name, so one directive covers both.
        None => EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
