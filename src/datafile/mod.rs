//! Measurement file reading.
//!
//! The benchmark harness writes one file per construct and branch. Its
//! output may be interleaved with compiler progress lines, which are
//! dropped before parsing.

pub mod grammar;

use crate::error::{Result, SpeedError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// A literal value bound in a measurement file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::None => write!(f, "None"),
        }
    }
}

/// The bindings of one measurement file.
pub type Record = BTreeMap<String, Value>;

/// Read a measurement file.
///
/// Returns `Ok(None)` when the file does not exist. Lines containing any of
/// `noise_markers` are ignored.
pub fn read(path: &Path, noise_markers: &[String]) -> Result<Option<Record>> {
    if !path.exists() {
        debug!("No measurement at {}", path.display());
        return Ok(None);
    }

    let bytes = fs::read(path).map_err(|e| SpeedError::io(path, e))?;
    let content = String::from_utf8(bytes)
        .map_err(|_| SpeedError::malformed(path, 0, "content is not valid UTF-8"))?;

    parse(&content, noise_markers)
        .map(Some)
        .map_err(|e| SpeedError::malformed(path, e.line, e.reason))
}

/// Parse measurement file content after removing build noise.
pub fn parse(
    content: &str,
    noise_markers: &[String],
) -> std::result::Result<Record, grammar::GrammarError> {
    let lines = content
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .filter(|(_, line)| !is_noise(line, noise_markers));

    grammar::parse_statements(lines)
}

fn is_noise(line: &str, noise_markers: &[String]) -> bool {
    noise_markers
        .iter()
        .any(|marker| !marker.is_empty() && line.contains(marker.as_str()))
}
