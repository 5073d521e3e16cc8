//! Sumo Uploader - Main entry point
//!
//! Uploads the files exported for an FMU case since the previous run.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumo_uploader::{config::Config, utils, CaseRegistry, HttpSumoClient, SumoMode};

/// Upload concurrency when neither the command line nor the config file sets it.
const CLI_DEFAULT_THREADS: usize = 2;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Absolute path to the case root
    casepath: PathBuf,

    /// Sumo environment (preview, dev, test, prod, localhost)
    env: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Explicit Sumo API base URL (overrides the one derived from env)
    #[arg(long)]
    url: Option<String>,

    /// Case metadata, relative to the case root
    #[arg(long)]
    metadata_path: Option<PathBuf>,

    /// Global variables (fmu config) file
    #[arg(long)]
    config_path: Option<PathBuf>,

    /// Realization parameters file
    #[arg(long)]
    parameters_path: Option<PathBuf>,

    /// What to do with local files after upload
    #[arg(long, value_enum)]
    sumo_mode: Option<SumoMode>,

    /// Number of concurrent uploads [default: 2, or upload.threads from the config file]
    #[arg(long)]
    threads: Option<usize>,

    /// Register the case before uploading (outside FMU workflows)
    #[arg(long)]
    register: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    /// Apply command line overrides on top of the file configuration.
    fn apply(&self, config: &mut Config) {
        config.sumo.env = self.env.clone();
        if let Some(url) = &self.url {
            config.sumo.url = Some(url.clone());
        }
        if let Some(path) = &self.metadata_path {
            config.case.metadata_path = path.clone();
        }
        if let Some(path) = &self.config_path {
            config.case.config_path = path.clone();
        }
        if let Some(path) = &self.parameters_path {
            config.case.parameters_path = path.clone();
        }
        if let Some(mode) = self.sumo_mode {
            config.upload.mode = mode;
        }
        config.upload.threads = self
            .threads
            .or(config.upload.threads)
            .or(Some(CLI_DEFAULT_THREADS));
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // The calling workflow must keep running whatever happens here, so every
    // failure below is reported and the exit code stays 0.
    let (mut config, config_error) = load_config(args.config.as_deref());
    args.apply(&mut config);

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    if let Err(e) = utils::logger::init(log_level) {
        eprintln!("WARNING: Failed to initialize logging: {:#}", e);
    }

    tracing::info!("Starting sumo-upload v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        tracing::warn!("Problem related to Sumo upload configuration, using defaults: {:#}", e);
    }

    if let Err(e) = run(&args, &config).await {
        tracing::warn!("Problem related to Sumo upload: {:#}", e);
    }
}

/// Load the config file if one was given, falling back to defaults on error.
fn load_config(path: Option<&Path>) -> (Config, Option<anyhow::Error>) {
    match path.map(Config::from_file) {
        None => (Config::default(), None),
        Some(Ok(config)) => (config, None),
        Some(Err(e)) => (Config::default(), Some(e)),
    }
}

async fn run(args: &Args, config: &Config) -> Result<()> {
    if !args.casepath.is_absolute() {
        bail!("Provided casepath must be an absolute path to the case root");
    }
    if !args.casepath.exists() {
        bail!("Provided case path does not exist: {}", args.casepath.display());
    }
    if !config.sumo.is_known_env() {
        tracing::warn!("Non-standard environment: {}", config.sumo.env);
    }

    tracing::info!("Uploading to {}", config.sumo.base_url());
    let client = Arc::new(HttpSumoClient::new(&config.sumo)?);
    let mut case = CaseRegistry::from_config(&args.casepath, client, config);

    if args.register {
        case.register().await;
    }

    case.add_files()?;
    let report = case.upload().await?;

    tracing::info!(
        ok = report.outcome.ok.len(),
        failed = report.outcome.failed.len(),
        rejected = report.outcome.rejected.len(),
        "Sumo upload done"
    );

    Ok(())
}
