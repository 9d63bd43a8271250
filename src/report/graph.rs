//! Chart descriptors for construct pages.

use crate::config::ReportConfig;
use crate::models::Branch;
use serde::Serialize;
use std::collections::BTreeMap;

/// Labels used for the chart axes.
#[derive(Debug, Clone)]
pub struct GraphLabels {
    pub baseline: String,
    pub compiler: String,
}

impl From<&ReportConfig> for GraphLabels {
    fn from(config: &ReportConfig) -> Self {
        Self {
            baseline: config.baseline_label.clone(),
            compiler: config.compiler_label.clone(),
        }
    }
}

impl GraphLabels {
    fn branch_label(&self, branch: Branch, version: &str) -> String {
        match branch {
            Branch::Baseline => format!("{} {}", self.baseline, version),
            other => format!("{} ({})", self.compiler, other),
        }
    }
}

/// A bar chart of one construct under one runtime version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphDescriptor {
    pub title: String,
    pub series: String,
    pub x_labels: Vec<String>,
    pub values: Vec<u64>,
}

/// Lay out the branch values of one dataset in chart order.
pub fn build(
    construct: &str,
    version: &str,
    values: &BTreeMap<Branch, u64>,
    labels: &GraphLabels,
) -> GraphDescriptor {
    let (x_labels, ticks): (Vec<String>, Vec<u64>) = Branch::ALL
        .iter()
        .filter_map(|branch| {
            values
                .get(branch)
                .map(|value| (labels.branch_label(*branch, version), *value))
        })
        .unzip();

    GraphDescriptor {
        title: format!("Construct {}", construct),
        series: "Ticks".to_string(),
        x_labels,
        values: ticks,
    }
}

impl GraphDescriptor {
    /// Render as a `chart` directive for the site generator.
    pub fn to_directive(&self) -> String {
        let labels: Vec<String> = self.x_labels.iter().map(|l| quote(l)).collect();
        let values: Vec<String> = self.values.iter().map(ToString::to_string).collect();

        format!(
            "\n.. chart:: Bar\n    :title: {}\n    :x_labels: [{}]\n\n    {}, [{}]\n",
            quote(&self.title),
            labels.join(", "),
            quote(&self.series),
            values.join(", ")
        )
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}
