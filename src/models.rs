//! Data models for the measurement pipeline.
//!
//! This module contains the core data structures shared by the scanner,
//! the analysis stages and the report generators.

use crate::config::DataConfig;
use crate::datafile::{Record, Value};
use crate::error::{Result, SpeedError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

/// A line of measurements: the baseline runtime or a compiler branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// The reference runtime without the compiler.
    Baseline,
    /// Released compiler.
    Main,
    /// Pre-release compiler.
    Develop,
    /// Work in progress.
    Factory,
}

impl Branch {
    /// All branches, in chart order.
    pub const ALL: [Branch; 4] = [Branch::Baseline, Branch::Main, Branch::Develop, Branch::Factory];

    /// The compiler branches.
    pub const DEVELOPMENT: [Branch; 3] = [Branch::Main, Branch::Develop, Branch::Factory];

    /// Directory name of this branch below a runtime version directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Branch::Baseline => "baseline",
            Branch::Main => "main",
            Branch::Develop => "develop",
            Branch::Factory => "factory",
        }
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self, Branch::Baseline)
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Direction of a change between two branches, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The target branch needs more ticks.
    Up,
    /// The target branch needs fewer ticks.
    Down,
    /// The change is within noise.
    Steady,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
            Direction::Steady => write!(f, "steady"),
        }
    }
}

/// Symbolic trend between two branches for one runtime version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrendTag {
    /// Dotted runtime version, e.g. `3.12`.
    pub version: String,
    pub to: Branch,
    pub direction: Direction,
    pub from: Branch,
}

impl TrendTag {
    /// The version with its dots removed, as used in tag strings.
    pub fn version_prefix(&self) -> String {
        self.version.replace('.', "")
    }
}

impl fmt::Display for TrendTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_vs_{}",
            self.version_prefix(),
            self.to,
            self.direction,
            self.from
        )
    }
}

/// Order-preserving set of tags for one construct.
///
/// Tags are compared by their rendered string; the first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    tags: Vec<TrendTag>,
    seen: HashSet<String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the tag unless an equal one is present. Returns whether it was added.
    pub fn insert(&mut self, tag: TrendTag) -> bool {
        if !self.seen.insert(tag.to_string()) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrendTag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Rendered tag strings in insertion order.
    pub fn labels(&self) -> Vec<String> {
        self.tags.iter().map(ToString::to_string).collect()
    }
}

/// One validated measurement file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub runtime_version: String,
    pub branch: Branch,
    pub construct_name: String,
    pub tick_count: u64,
    pub test_case_hash: String,
    /// Compiler revision; `None` for the baseline runtime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_revision: Option<String>,
    /// Full runtime version reported by the baseline record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_full_version: Option<String>,
}

impl Measurement {
    /// Build a measurement from a parsed record, checking the required keys.
    pub fn from_record(
        record: &Record,
        keys: &DataConfig,
        path: &Path,
        runtime_version: &str,
        branch: Branch,
        construct_name: &str,
    ) -> Result<Self> {
        let metric_key = if branch.is_baseline() {
            &keys.baseline_metric_key
        } else {
            &keys.compiler_metric_key
        };

        let tick_count = match record.get(metric_key) {
            Some(Value::Int(n)) if *n >= 0 => *n as u64,
            Some(other) => {
                return Err(SpeedError::malformed(
                    path,
                    0,
                    format!("{} must be a non-negative integer, found {}", metric_key, other),
                ))
            }
            None => return Err(missing_key(path, metric_key)),
        };

        let test_case_hash = required_str(record, &keys.hash_key, path)?;

        let (source_revision, runtime_full_version) = if branch.is_baseline() {
            (None, Some(required_str(record, &keys.runtime_key, path)?))
        } else {
            (Some(required_str(record, &keys.revision_key, path)?), None)
        };

        Ok(Self {
            runtime_version: runtime_version.to_string(),
            branch,
            construct_name: construct_name.to_string(),
            tick_count,
            test_case_hash,
            source_revision,
            runtime_full_version,
        })
    }
}

fn missing_key(path: &Path, key: &str) -> SpeedError {
    SpeedError::malformed(path, 0, format!("missing required key {}", key))
}

fn required_str(record: &Record, key: &str, path: &Path) -> Result<String> {
    match record.get(key) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(SpeedError::malformed(
            path,
            0,
            format!("{} must be a string, found {}", key, other),
        )),
        None => Err(missing_key(path, key)),
    }
}

/// All four measurements of one construct under one runtime version.
#[derive(Debug, Clone, Serialize)]
pub struct ConstructDataset {
    pub runtime_version: String,
    pub construct_name: String,
    pub measurements: BTreeMap<Branch, Measurement>,
}

impl ConstructDataset {
    /// Tick counts by branch.
    pub fn values(&self) -> BTreeMap<Branch, u64> {
        self.measurements
            .iter()
            .map(|(branch, m)| (*branch, m.tick_count))
            .collect()
    }

    pub fn ticks(&self, branch: Branch) -> Option<u64> {
        self.measurements.get(&branch).map(|m| m.tick_count)
    }
}

/// Datasets keyed by (runtime version, construct name).
pub type DatasetMap = BTreeMap<(String, String), ConstructDataset>;

/// Tag sets keyed by construct name.
pub type TagMap = BTreeMap<String, TagSet>;

/// A significant develop→factory change, ready for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub construct_name: String,
    pub tag: String,
    pub runtime_version: String,
    pub main_value: u64,
    pub develop_value: u64,
    pub factory_value: u64,
    /// `factory / develop * 100`; below 100 means factory is faster.
    pub percent_ratio: f64,
}

/// Parse a dotted-integer version such as `3.12` into its components.
pub fn parse_version(version: &str) -> Option<Vec<u64>> {
    if version.is_empty() {
        return None;
    }
    version.split('.').map(|part| part.parse().ok()).collect()
}
