//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.speedcenter.toml` files. One `Config` is built per run and passed
//! by reference to every stage.

use crate::analysis::NoiseThreshold;
use crate::cli::OutputFormat;
use crate::models::Branch;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".speedcenter.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Locations.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Upstream compiler repository and harness.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Measurement file layout and keys.
    #[serde(default)]
    pub data: DataConfig,

    /// Noise threshold.
    #[serde(default)]
    pub threshold: NoiseThreshold,

    /// Ranked report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Site generator settings.
    #[serde(default)]
    pub site: SiteConfig,
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Cache root holding the git mirror and the measurements.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Measurement root; defaults to `<cache_dir>/performance-data`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Root of the documentation site sources.
    #[serde(default = "default_site_dir")]
    pub site_dir: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            data_dir: None,
            site_dir: default_site_dir(),
            verbose: false,
        }
    }
}

fn default_site_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Upstream compiler repository and benchmark harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Clone URL of the compiler repository.
    #[serde(default = "default_upstream_url")]
    pub url: String,

    /// Directory name of the bare mirror below the git directory.
    #[serde(default = "default_mirror_name")]
    pub mirror_name: String,

    /// Git branch measured as `main`.
    #[serde(default = "default_main_branch")]
    pub main_branch: String,

    /// Git branch measured as `develop`.
    #[serde(default = "default_develop_branch")]
    pub develop_branch: String,

    /// Git branch measured as `factory`.
    #[serde(default = "default_factory_branch")]
    pub factory_branch: String,

    /// Runtime interpreters to measure with.
    #[serde(default = "default_runtimes")]
    pub runtimes: Vec<String>,

    /// Harness script, relative to the factory worktree.
    #[serde(default = "default_harness_script")]
    pub harness_script: PathBuf,

    /// Compiler entry point, relative to each worktree.
    #[serde(default = "default_compiler_binary")]
    pub compiler_binary: PathBuf,

    /// Benchmark cases directory, relative to the factory worktree.
    #[serde(default = "default_cases_dir")]
    pub cases_dir: PathBuf,

    /// Case file names never measured.
    #[serde(default = "default_excluded_cases")]
    pub excluded_cases: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            mirror_name: default_mirror_name(),
            main_branch: default_main_branch(),
            develop_branch: default_develop_branch(),
            factory_branch: default_factory_branch(),
            runtimes: default_runtimes(),
            harness_script: default_harness_script(),
            compiler_binary: default_compiler_binary(),
            cases_dir: default_cases_dir(),
            excluded_cases: default_excluded_cases(),
        }
    }
}

fn default_upstream_url() -> String {
    "https://github.com/Nuitka/Nuitka.git".to_string()
}

fn default_mirror_name() -> String {
    "Nuitka.git".to_string()
}

fn default_main_branch() -> String {
    "main".to_string()
}

fn default_develop_branch() -> String {
    "develop".to_string()
}

fn default_factory_branch() -> String {
    "factory".to_string()
}

fn default_runtimes() -> Vec<String> {
    vec!["python2.7".to_string(), "python3.12".to_string()]
}

fn default_harness_script() -> PathBuf {
    PathBuf::from("bin/measure-construct-performance")
}

fn default_compiler_binary() -> PathBuf {
    PathBuf::from("bin/nuitka")
}

fn default_cases_dir() -> PathBuf {
    PathBuf::from("tests/benchmarks/constructs")
}

fn default_excluded_cases() -> Vec<String> {
    vec!["InplaceOperationInstanceStringAdd.py".to_string()]
}

impl UpstreamConfig {
    /// Git branch name for a development branch.
    pub fn branch_ref(&self, branch: Branch) -> Option<&str> {
        match branch {
            Branch::Baseline => None,
            Branch::Main => Some(&self.main_branch),
            Branch::Develop => Some(&self.develop_branch),
            Branch::Factory => Some(&self.factory_branch),
        }
    }
}

/// Measurement file layout and required keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Lines containing any of these markers are build output, not data.
    #[serde(default = "default_noise_markers")]
    pub noise_markers: Vec<String>,

    /// Reserved subdirectory of the data root holding construct sources.
    #[serde(default = "default_sources_dir")]
    pub sources_dir: String,

    #[serde(default = "default_hash_key")]
    pub hash_key: String,

    #[serde(default = "default_revision_key")]
    pub revision_key: String,

    #[serde(default = "default_runtime_key")]
    pub runtime_key: String,

    #[serde(default = "default_baseline_metric_key")]
    pub baseline_metric_key: String,

    #[serde(default = "default_compiler_metric_key")]
    pub compiler_metric_key: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            noise_markers: default_noise_markers(),
            sources_dir: default_sources_dir(),
            hash_key: default_hash_key(),
            revision_key: default_revision_key(),
            runtime_key: default_runtime_key(),
            baseline_metric_key: default_baseline_metric_key(),
            compiler_metric_key: default_compiler_metric_key(),
        }
    }
}

fn default_noise_markers() -> Vec<String> {
    vec![
        "Nuitka:".to_string(),
        "Nuitka-".to_string(),
        "scons:".to_string(),
    ]
}

fn default_sources_dir() -> String {
    "construct-sources".to_string()
}

fn default_hash_key() -> String {
    "TEST_CASE_HASH".to_string()
}

fn default_revision_key() -> String {
    "NUITKA_COMMIT".to_string()
}

fn default_runtime_key() -> String {
    "PYTHON".to_string()
}

fn default_baseline_metric_key() -> String {
    "CPYTHON_CONSTRUCT".to_string()
}

fn default_compiler_metric_key() -> String {
    "NUITKA_CONSTRUCT".to_string()
}

/// Ranked report and page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Runtime version whose develop→factory changes are ranked.
    /// Defaults to the newest version found.
    #[serde(default)]
    pub pinned_version: Option<String>,

    /// Runtime version never ranked.
    #[serde(default = "default_legacy_version")]
    pub legacy_version: String,

    /// Output format of the ranked report.
    #[serde(default)]
    pub format: OutputFormat,

    /// Chart label of the baseline runtime.
    #[serde(default = "default_baseline_label")]
    pub baseline_label: String,

    /// Chart label prefix of the compiler branches.
    #[serde(default = "default_compiler_label")]
    pub compiler_label: String,

    /// License header lines dropped from construct sources on pages.
    #[serde(default = "default_source_header_lines")]
    pub source_header_lines: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            pinned_version: None,
            legacy_version: default_legacy_version(),
            format: OutputFormat::default(),
            baseline_label: default_baseline_label(),
            compiler_label: default_compiler_label(),
            source_header_lines: default_source_header_lines(),
        }
    }
}

fn default_legacy_version() -> String {
    "2.7".to_string()
}

fn default_baseline_label() -> String {
    "CPython".to_string()
}

fn default_compiler_label() -> String {
    "Nuitka".to_string()
}

fn default_source_header_lines() -> usize {
    19
}

/// Static site generator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site generator executable.
    #[serde(default = "default_site_command")]
    pub command: String,

    /// Generator cache removed before building, relative to the site dir.
    #[serde(default = "default_site_cache")]
    pub cache_dir: PathBuf,

    /// Files removed after a build, relative to the site dir.
    #[serde(default = "default_site_prune")]
    pub prune_after_build: Vec<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            command: default_site_command(),
            cache_dir: default_site_cache(),
            prune_after_build: default_site_prune(),
        }
    }
}

fn default_site_command() -> String {
    "nikola".to_string()
}

fn default_site_cache() -> PathBuf {
    PathBuf::from("cache")
}

fn default_site_prune() -> Vec<PathBuf> {
    vec![PathBuf::from("output/rss.xml")]
}

/// Per-user cache location (`$XDG_CACHE_HOME` or `~/.cache` on Linux).
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("speedcenter"))
        .unwrap_or_else(|| PathBuf::from(".speedcenter-cache"))
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they are given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref cache_dir) = args.cache_dir {
            self.general.cache_dir = Some(cache_dir.clone());
        }
        if let Some(ref data_dir) = args.data_dir {
            self.general.data_dir = Some(data_dir.clone());
        }
        if let Some(ref site_dir) = args.site_dir {
            self.general.site_dir = site_dir.clone();
        }

        if let Some(ref pinned) = args.pinned_version {
            self.report.pinned_version = Some(pinned.clone());
        }
        if let Some(ref legacy) = args.legacy_version {
            self.report.legacy_version = legacy.clone();
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.general
            .cache_dir
            .clone()
            .unwrap_or_else(default_cache_dir)
    }

    /// Root of the measurement tree.
    pub fn data_dir(&self) -> PathBuf {
        self.general
            .data_dir
            .clone()
            .unwrap_or_else(|| self.cache_dir().join("performance-data"))
    }

    /// Directory holding construct sources copied by the harness.
    pub fn sources_dir(&self) -> PathBuf {
        self.data_dir().join(&self.data.sources_dir)
    }

    pub fn git_dir(&self) -> PathBuf {
        self.cache_dir().join("git")
    }

    /// Bare mirror of the upstream repository.
    pub fn mirror_dir(&self) -> PathBuf {
        self.git_dir().join(&self.upstream.mirror_name)
    }

    /// Checkout of one development branch.
    pub fn worktree_dir(&self, branch: Branch) -> PathBuf {
        self.git_dir().join(branch.dir_name())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
