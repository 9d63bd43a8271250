//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and the expansion of `--update-all`.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Speedcenter - construct performance tracking for the compiler
///
/// Measures benchmark constructs across compiler branches and runtime
/// versions, tags trends, ranks develop→factory changes and generates the
/// documentation site.
///
/// Examples:
///   speedcenter --update-all --no-push
///   speedcenter --report --format markdown --output ranking.md
///   speedcenter --update-graphs --data-dir ./performance-data
///   speedcenter --init-config
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Refresh the upstream mirror and branch worktrees
    #[arg(long)]
    pub update_compiler: bool,

    /// Recompute stale measurements
    #[arg(long)]
    pub update_numbers: bool,

    /// Print the ranked develop→factory report
    #[arg(long)]
    pub report: bool,

    /// Regenerate construct pages and the index
    #[arg(long)]
    pub update_graphs: bool,

    /// Build the documentation site
    #[arg(long)]
    pub build_site: bool,

    /// Deploy the documentation site
    #[arg(long)]
    pub deploy_site: bool,

    /// With --update-all, do not deploy (ignored otherwise)
    #[arg(long)]
    pub no_push: bool,

    /// Run every stage except the report
    ///
    /// Deploys unless --no-push is given.
    #[arg(long)]
    pub update_all: bool,

    /// Root of the measurement tree
    #[arg(long, value_name = "DIR", env = "SPEEDCENTER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Cache root holding the git mirror and default measurement tree
    #[arg(long, value_name = "DIR", env = "SPEEDCENTER_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Root of the documentation site sources
    #[arg(long, value_name = "DIR")]
    pub site_dir: Option<PathBuf>,

    /// Runtime version whose changes are ranked (default: newest found)
    #[arg(long, value_name = "VERSION")]
    pub pinned_version: Option<String>,

    /// Runtime version excluded from ranking
    #[arg(long, value_name = "VERSION")]
    pub legacy_version: Option<String>,

    /// Report format (text, markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .speedcenter.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .speedcenter.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the ranked report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per entry (default)
    #[default]
    Text,
    /// Markdown document
    Markdown,
    /// JSON document
    Json,
}

/// Pipeline stages selected for one run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stages {
    pub update_compiler: bool,
    pub update_numbers: bool,
    pub update_graphs: bool,
    pub build_site: bool,
    pub deploy_site: bool,
    pub report: bool,
}

impl Stages {
    pub fn any(&self) -> bool {
        self.update_compiler
            || self.update_numbers
            || self.update_graphs
            || self.build_site
            || self.deploy_site
            || self.report
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.output.is_some() && !self.report {
            return Err("--output requires --report".to_string());
        }

        if !self.stages().any() {
            return Err(
                "Nothing to do: give --update-all, --report or another stage flag".to_string(),
            );
        }

        Ok(())
    }

    /// Stages to run, with `--update-all` expanded.
    pub fn stages(&self) -> Stages {
        let all = self.update_all;
        Stages {
            update_compiler: all || self.update_compiler,
            update_numbers: all || self.update_numbers,
            update_graphs: all || self.update_graphs,
            build_site: all || self.build_site,
            deploy_site: (all && !self.no_push) || self.deploy_site,
            report: self.report,
        }
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `general.verbose` from the config file.
    /// `--quiet` overrides it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
