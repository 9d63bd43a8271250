//! External process invocation.

use crate::error::{Result, SpeedError};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Prints `major.minor.micro` of the running interpreter.
const VERSION_PROBE: &str = "import sys; print('.'.join(str(s) for s in sys.version_info[:3]))";

/// Run a command to completion and return its standard output.
///
/// A non-zero exit status is an `ExternalToolFailure` carrying stderr.
pub fn run_command(command: &[String], cwd: Option<&Path>) -> Result<Vec<u8>> {
    let Some((program, args)) = command.split_first() else {
        return Err(SpeedError::tool("", "empty command"));
    };

    let rendered = command.join(" ");
    debug!("Execute: {}", rendered);

    let mut process = Command::new(program);
    process.args(args);
    if let Some(dir) = cwd {
        process.current_dir(dir);
    }

    let output = process
        .output()
        .map_err(|e| SpeedError::tool(rendered.clone(), e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = match output.status.code() {
            Some(code) => format!("exit code {}: {}", code, stderr),
            None => format!("terminated by signal: {}", stderr),
        };
        return Err(SpeedError::tool(rendered, detail));
    }

    Ok(output.stdout)
}

/// Full version (`x.y.z`) of a runtime interpreter.
pub fn runtime_version(interpreter: &str) -> Result<String> {
    let command = vec![
        interpreter.to_string(),
        "-c".to_string(),
        VERSION_PROBE.to_string(),
    ];
    let stdout = run_command(&command, None)?;

    String::from_utf8_lossy(&stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| SpeedError::tool(command.join(" "), "no version printed"))
}

/// `x.y` of an `x.y.z` version string.
pub fn major_version(full_version: &str) -> String {
    full_version
        .split('.')
        .take(2)
        .collect::<Vec<_>>()
        .join(".")
}
