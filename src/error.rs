//! Error types for the measurement pipeline.
//!
//! Every variant is fatal for the current run. Missing or stale
//! measurements are not errors: the reader returns `None` for a missing
//! file and the updater decides staleness on its own.

use crate::models::Branch;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the reading, scanning, tagging and update stages.
#[derive(Debug, Error)]
pub enum SpeedError {
    /// A measurement file exists but does not follow the data grammar,
    /// or lacks a required key.
    #[error("malformed data in {} (line {line}): {reason}", .path.display())]
    MalformedData {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A construct listed by the authoritative branch has no record in
    /// another branch.
    #[error(
        "inconsistent dataset for {construct} ({version}): no {branch} record at {}",
        .path.display()
    )]
    InconsistentDataset {
        version: String,
        construct: String,
        branch: Branch,
        path: PathBuf,
    },

    /// A tag was requested for a branch that has no value.
    #[error("no value for branch {branch}")]
    MissingBranchValue { branch: Branch },

    /// A harness, interpreter, git or site generator invocation failed.
    #[error("external tool failed: {command}: {detail}")]
    ExternalToolFailure { command: String, detail: String },

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SpeedError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SpeedError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        SpeedError::MalformedData {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn tool(command: impl Into<String>, detail: impl Into<String>) -> Self {
        SpeedError::ExternalToolFailure {
            command: command.into(),
            detail: detail.into(),
        }
    }
}

impl From<git2::Error> for SpeedError {
    fn from(err: git2::Error) -> Self {
        SpeedError::tool("git", err.message().to_string())
    }
}

pub type Result<T> = std::result::Result<T, SpeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_file_and_line() {
        let err = SpeedError::malformed("/data/3.12/main/X.data", 3, "expected '='");
        let msg = err.to_string();
        assert!(msg.contains("/data/3.12/main/X.data"));
        assert!(msg.contains("line 3"));
        assert!(msg.contains("expected '='"));
    }

    #[test]
    fn test_inconsistent_message_names_branch() {
        let err = SpeedError::InconsistentDataset {
            version: "3.12".to_string(),
            construct: "X".to_string(),
            branch: Branch::Factory,
            path: PathBuf::from("/data/3.12/factory/X.data"),
        };
        let msg = err.to_string();
        assert!(msg.contains("factory"));
        assert!(msg.contains("X"));
        assert!(msg.contains("/data/3.12/factory/X.data"));
    }
}
