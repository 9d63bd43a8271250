//! Speedcenter - construct performance tracking
//!
//! A CLI tool that measures benchmark constructs under a baseline runtime
//! and three compiler branches, tags noise-filtered trends, ranks the
//! develop→factory changes and generates the documentation site.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any failure (malformed data, inconsistent dataset, tool failure, I/O)

mod analysis;
mod cli;
mod config;
mod datafile;
mod error;
mod harness;
mod models;
mod repo;
mod report;
mod scanner;
mod sources;

use analysis::RankFilter;
use anyhow::{Context, Result};
use cli::{Args, Stages};
use config::{Config, CONFIG_FILE_NAME};
use report::RankedReport;
use scanner::MeasurementStore;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so `general.verbose` can set the log level
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("Speedcenter v{}", env!("CARGO_PKG_VERSION"));
    match config_path(&args) {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(&config, &args) {
        error!("Run failed: {:#}", e);
        eprintln!("\nError: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .speedcenter.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("Created {} with default settings.", CONFIG_FILE_NAME);
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the selected stages in pipeline order.
fn run(config: &Config, args: &Args) -> Result<()> {
    let start_time = Instant::now();

    let stages = args.stages();
    let show_progress = !args.quiet;
    debug!("Stages: {:?}", stages);

    run_stages(config, &stages, args, show_progress)?;

    info!("Done in {:.1}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn run_stages(config: &Config, stages: &Stages, args: &Args, show_progress: bool) -> Result<()> {
    if stages.update_compiler {
        info!("Updating compiler worktrees");
        repo::refresh(config, show_progress).context("Failed to update the compiler")?;
    }

    if stages.update_numbers {
        info!("Updating numbers");
        let written = harness::update_numbers(config, show_progress)
            .context("Failed to update measurements")?;
        info!("{} measurements written", written);
    }

    if stages.update_graphs {
        info!("Updating construct pages");
        let store = MeasurementStore::from_config(config);
        let scan = store
            .scan()
            .context("Failed to scan the measurement tree")?;
        report::write_pages(config, &store, &scan).context("Failed to write construct pages")?;
    }

    if stages.build_site || stages.deploy_site {
        report::site::clear_cache(config)?;
    }

    if stages.build_site {
        report::site::build(config).context("Failed to build the site")?;
    }

    if stages.deploy_site {
        report::site::deploy(config).context("Failed to deploy the site")?;
    }

    if stages.report {
        print_report(config, args)?;
    }

    Ok(())
}

/// Scan, rank and emit the develop→factory report.
fn print_report(config: &Config, args: &Args) -> Result<()> {
    let store = MeasurementStore::from_config(config);
    let scan = store
        .scan()
        .context("Failed to scan the measurement tree")?;

    let Some(filter) = RankFilter::from_config(&config.report, &scan.versions) else {
        warn!(
            "No runtime versions under {}, nothing to rank",
            store.data_root().display()
        );
        return Ok(());
    };
    info!(
        "Ranking {} (legacy {} excluded)",
        filter.pinned_version, filter.legacy_version
    );

    let entries = analysis::rank(&scan.datasets, &scan.tags, &filter);
    let ranked = RankedReport::new(&filter, &scan.versions, scan.constructs.len(), entries);
    let output = report::render(&ranked, config.report.format)?;

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }
        None => print!("{}", output),
    }

    Ok(())
}

/// The config file in effect: `--config`, else `.speedcenter.toml` if present.
fn config_path(args: &Args) -> Option<PathBuf> {
    match args.config {
        Some(ref path) => Some(path.clone()),
        None => {
            let default_path = Path::new(CONFIG_FILE_NAME);
            default_path.exists().then(|| default_path.to_path_buf())
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    Ok(Config::load_default()?.unwrap_or_default())
}
