//! Construct documentation pages.
//!
//! One reStructuredText page per construct with its trend tags, a chart
//! per runtime version and the source variants, plus an index page
//! linking all of them.

use super::diff;
use super::graph::{self, GraphDescriptor, GraphLabels};
use crate::config::Config;
use crate::error::{Result, SpeedError};
use crate::models::{Branch, TagSet};
use crate::scanner::{MeasurementStore, ScanResult};
use crate::sources::{self, SourceVariants};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Publication date stamped on every construct page.
const PAGE_DATE: &str = "2013/08/15 08:15:17";

const DIFF_STYLE: &str = r#"<style type="text/css">
    table.diff {font-family:Courier; border:medium;}
    .diff_header {background-color:#e0e0e0}
    td.diff_header {text-align:right}
    .diff_next {background-color:#c0c0c0}
    .diff_add {background-color:#aaffaa}
    .diff_chg {background-color:#ffff77}
    .diff_sub {background-color:#ffaaaa}
</style>"#;

/// Everything shown on one construct page.
pub struct PageContent<'a> {
    pub construct: &'a str,
    pub tags: Option<&'a TagSet>,
    pub graphs: &'a [GraphDescriptor],
    pub variants: Option<&'a SourceVariants>,
    /// Leading source lines left out of the code blocks.
    pub header_lines: usize,
    pub generated_diff: Option<&'a str>,
}

/// Render a construct page.
pub fn construct_page(content: &PageContent<'_>) -> String {
    let tags = content
        .tags
        .filter(|t| !t.is_empty())
        .map(|t| t.labels().join(","))
        .unwrap_or_else(|| "untagged".to_string());

    let mut page = String::new();

    page.push_str(&format!(
        ".. title: Construct {}\n.. tags: {}\n.. date: {}\n\n.. contents::\n",
        content.construct, tags, PAGE_DATE
    ));

    page.push_str(&heading("Performance Diagrams"));
    for graph in content.graphs {
        page.push_str(&graph.to_directive());
    }

    if let Some(variants) = content.variants {
        page.push_str(&heading("Source Code with Construct"));
        page.push_str(".. code-block:: python\n\n");
        page.push_str(&indent(&variants.with_construct, content.header_lines));
        page.push('\n');

        page.push_str(&heading("Source Code without Construct"));
        page.push_str(".. code-block:: python\n\n");
        page.push_str(&indent(&variants.without_construct, content.header_lines));
        page.push('\n');

        let table = diff::context_table(
            &variants.with_construct,
            &variants.without_construct,
            "Construct",
            "Baseline",
        );
        page.push_str(&heading("Context Diff of Source Code"));
        page.push_str(".. raw:: html\n\n");
        page.push_str(&indent(DIFF_STYLE, 0));
        page.push_str("\n\n");
        page.push_str(&indent(&table, 0));
        page.push('\n');
    }

    if let Some(generated) = content.generated_diff {
        page.push_str(&heading("Context Diff of Generated Code"));
        page.push_str(".. raw:: html\n\n");
        page.push_str(&indent(DIFF_STYLE, 0));
        page.push_str("\n\n");
        page.push_str(&indent(generated, 0));
        page.push('\n');
    }

    page
}

/// Render the index page.
pub fn index_page(constructs: &[String]) -> String {
    let mut page = String::new();

    page.push_str(
        "\
.. title: Welcome to Speedcenter
.. slug: index

This is a list of basic constructs and performance comparisons of the
compiler with the baseline runtime for each. Bear in mind that for some
operations large gains are feasible by avoiding them entirely; these pages
are about their cost when they cannot be avoided.

The following construct test cases exist so far:

",
    );

    for construct in constructs {
        page.push_str(&format!(
            "* `{} </constructs/construct-{}.html>`_\n",
            construct,
            construct.to_lowercase()
        ));
    }

    page
}

fn heading(title: &str) -> String {
    format!("\n{}\n{}\n\n", title, "=".repeat(title.len()))
}

/// Indent non-empty lines by four spaces after dropping `skip` lines.
fn indent(text: &str, skip: usize) -> String {
    text.split('\n')
        .skip(skip)
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("    {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write all construct pages and the index below the site directory.
///
/// Returns the number of construct pages written.
pub fn write_pages(config: &Config, store: &MeasurementStore, scan: &ScanResult) -> Result<usize> {
    let site_dir = &config.general.site_dir;
    let constructs_dir = site_dir.join("constructs");
    create_dir(&constructs_dir)?;

    let labels = GraphLabels::from(&config.report);
    let sources_dir = config.sources_dir();

    for construct in &scan.constructs {
        let tags = scan.tags.get(construct);
        debug!(
            "Writing page for {} ({} tags)",
            construct,
            tags.map_or(0, TagSet::len)
        );

        let graphs: Vec<GraphDescriptor> = scan
            .versions
            .iter()
            .filter_map(|version| {
                scan.dataset(version, construct)
                    .map(|dataset| graph::build(construct, version, &dataset.values(), &labels))
            })
            .collect();

        let source_path = sources_dir.join(format!("{}.py", construct));
        let variants = sources::load_variants(&source_path)?;
        if variants.is_none() {
            warn!("No source for {} at {}", construct, source_path.display());
        }

        let generated_diff = newest_diff(store, &scan.versions, construct)?;

        let page = construct_page(&PageContent {
            construct: construct.as_str(),
            tags,
            graphs: &graphs,
            variants: variants.as_ref(),
            header_lines: config.report.source_header_lines,
            generated_diff: generated_diff.as_deref(),
        });

        write_file(&constructs_dir.join(format!("construct-{}.rst", construct)), &page)?;
    }

    let index_dir = site_dir.join("index");
    create_dir(&index_dir)?;
    write_file(&index_dir.join("index.rst"), &index_page(&scan.constructs))?;

    info!(
        "Wrote {} construct pages to {}",
        scan.constructs.len(),
        constructs_dir.display()
    );
    Ok(scan.constructs.len())
}

/// The factory code diff of the newest version that has one.
fn newest_diff(
    store: &MeasurementStore,
    versions: &[String],
    construct: &str,
) -> Result<Option<String>> {
    let found: Option<PathBuf> = versions
        .iter()
        .map(|version| store.diff_path(version, Branch::Factory, construct))
        .find(|path| path.is_file());

    match found {
        Some(path) => {
            let diff = fs::read_to_string(&path).map_err(|e| SpeedError::io(&path, e))?;
            Ok(Some(diff))
        }
        None => Ok(None),
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| SpeedError::io(path, e))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| SpeedError::io(path, e))
}
