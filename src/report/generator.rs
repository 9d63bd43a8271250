//! Ranked report generation.
//!
//! This module renders the ranked develop→factory changes as plain text,
//! Markdown or JSON.

use crate::analysis::aggregator::worst_regressions;
use crate::analysis::{RankFilter, RankSummary};
use crate::cli::OutputFormat;
use crate::models::RankedEntry;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata about a ranked report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub pinned_version: String,
    pub legacy_version: String,
    /// Runtime versions found on disk, newest first.
    pub versions_scanned: Vec<String>,
    pub constructs_scanned: usize,
}

/// The complete ranked report.
#[derive(Debug, Clone, Serialize)]
pub struct RankedReport {
    pub metadata: ReportMetadata,
    pub summary: RankSummary,
    pub entries: Vec<RankedEntry>,
}

impl RankedReport {
    pub fn new(
        filter: &RankFilter,
        versions: &[String],
        constructs_scanned: usize,
        entries: Vec<RankedEntry>,
    ) -> Self {
        Self {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                pinned_version: filter.pinned_version.clone(),
                legacy_version: filter.legacy_version.clone(),
                versions_scanned: versions.to_vec(),
                constructs_scanned,
            },
            summary: RankSummary::from_entries(&entries),
            entries,
        }
    }
}

/// Render a report in the requested format.
pub fn render(report: &RankedReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(generate_text_report(report)),
        OutputFormat::Markdown => Ok(generate_markdown_report(report)),
        OutputFormat::Json => generate_json_report(report),
    }
}

/// One aligned line per entry.
pub fn generate_text_report(report: &RankedReport) -> String {
    let width = report
        .entries
        .iter()
        .map(|e| e.construct_name.len())
        .max()
        .unwrap_or(0);

    let mut output = String::new();
    for entry in &report.entries {
        output.push_str(&format!(
            "{:<width$}  {}  {}  main={} develop={} factory={}  {}\n",
            entry.construct_name,
            entry.tag,
            entry.runtime_version,
            entry.main_value,
            entry.develop_value,
            entry.factory_value,
            format_ratio(entry.percent_ratio),
            width = width
        ));
    }
    output
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RankedReport) -> String {
    let mut output = String::new();

    output.push_str("# Construct Performance Ranking\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary, &report.entries));
    output.push_str(&generate_ranking_section(&report.entries));
    output.push_str("---\n\n*Report generated by speedcenter*\n");

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Pinned Version:** {}\n",
        metadata.pinned_version
    ));
    section.push_str(&format!(
        "- **Versions Scanned:** {}\n",
        metadata.versions_scanned.join(", ")
    ));
    section.push_str(&format!(
        "- **Constructs Scanned:** {}\n\n",
        metadata.constructs_scanned
    ));

    section
}

fn generate_summary_section(summary: &RankSummary, entries: &[RankedEntry]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Improvements | Regressions | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | **{}** |\n\n",
        summary.improvements, summary.regressions, summary.total
    ));

    let worst = worst_regressions(entries, 5);
    if !worst.is_empty() {
        section.push_str("### Largest Regressions\n\n");
        for entry in worst {
            section.push_str(&format!(
                "- `{}`: {}\n",
                entry.construct_name,
                format_ratio(entry.percent_ratio)
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_ranking_section(entries: &[RankedEntry]) -> String {
    let mut section = String::new();

    section.push_str("## Ranking\n\n");

    if entries.is_empty() {
        section.push_str("No significant changes between develop and factory.\n\n");
        return section;
    }

    section.push_str("| Construct | Tag | Main | Develop | Factory | Ratio |\n");
    section.push_str("|:---|:---|---:|---:|---:|---:|\n");
    for entry in entries {
        section.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} |\n",
            entry.construct_name,
            entry.tag,
            entry.main_value,
            entry.develop_value,
            entry.factory_value,
            format_ratio(entry.percent_ratio)
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RankedReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Percentage with two decimals.
pub fn format_ratio(ratio: f64) -> String {
    if ratio.is_infinite() {
        return "inf%".to_string();
    }
    format!("{:.2}%", ratio)
}
