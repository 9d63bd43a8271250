//! Ranking of significant develop→factory changes.
//!
//! This module filters the trend tags down to the comparison of interest
//! and orders the surviving constructs by their relative change.

use crate::config::ReportConfig;
use crate::models::{Branch, DatasetMap, Direction, RankedEntry, TagMap};
use serde::Serialize;
use tracing::warn;

/// Which tags take part in the ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankFilter {
    /// Only this runtime version is ranked.
    pub pinned_version: String,
    /// This runtime version is never ranked.
    pub legacy_version: String,
}

impl RankFilter {
    /// Build the filter from configuration, pinning the newest of
    /// `versions` when no version is configured.
    ///
    /// Returns `None` when nothing can be pinned.
    pub fn from_config(report: &ReportConfig, versions: &[String]) -> Option<Self> {
        let pinned_version = report
            .pinned_version
            .clone()
            .or_else(|| versions.first().cloned())?;

        Some(Self {
            pinned_version,
            legacy_version: report.legacy_version.clone(),
        })
    }
}

/// Rank the significant develop→factory changes of the pinned version.
///
/// The result is sorted ascending by `percent_ratio`: the largest
/// improvements come first, the largest regressions last.
pub fn rank(datasets: &DatasetMap, tags: &TagMap, filter: &RankFilter) -> Vec<RankedEntry> {
    let mut entries = Vec::new();

    for (construct, tag_set) in tags {
        for tag in tag_set.iter() {
            if tag.direction == Direction::Steady
                || tag.version == filter.legacy_version
                || tag.version != filter.pinned_version
                || tag.from != Branch::Develop
                || tag.to != Branch::Factory
            {
                continue;
            }

            let key = (tag.version.clone(), construct.clone());
            let Some(dataset) = datasets.get(&key) else {
                warn!("No dataset for tag {} of {}", tag, construct);
                continue;
            };

            let (Some(main_value), Some(develop_value), Some(factory_value)) = (
                dataset.ticks(Branch::Main),
                dataset.ticks(Branch::Develop),
                dataset.ticks(Branch::Factory),
            ) else {
                warn!("Incomplete dataset for tag {} of {}", tag, construct);
                continue;
            };

            entries.push(RankedEntry {
                construct_name: construct.clone(),
                tag: tag.to_string(),
                runtime_version: tag.version.clone(),
                main_value,
                develop_value,
                factory_value,
                percent_ratio: percent_ratio(factory_value, develop_value),
            });
        }
    }

    entries.sort_by(|a, b| a.percent_ratio.total_cmp(&b.percent_ratio));
    entries
}

/// `factory / develop * 100`, infinite for a zero develop value.
pub fn percent_ratio(factory_value: u64, develop_value: u64) -> f64 {
    if develop_value == 0 {
        return f64::INFINITY;
    }
    factory_value as f64 / develop_value as f64 * 100.0
}

/// Counts over a ranked report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankSummary {
    pub total: usize,
    /// Entries where factory needs fewer ticks than develop.
    pub improvements: usize,
    /// Entries where factory needs more ticks than develop.
    pub regressions: usize,
}

impl RankSummary {
    pub fn from_entries(entries: &[RankedEntry]) -> Self {
        let improvements = entries.iter().filter(|e| e.percent_ratio < 100.0).count();
        Self {
            total: entries.len(),
            improvements,
            regressions: entries.len() - improvements,
        }
    }
}

/// The `n` largest regressions, worst first.
pub fn worst_regressions(entries: &[RankedEntry], n: usize) -> Vec<&RankedEntry> {
    entries
        .iter()
        .rev()
        .take_while(|e| e.percent_ratio > 100.0)
        .take(n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConstructDataset, Measurement, TagSet, TrendTag};
    use std::collections::BTreeMap;

    fn dataset(version: &str, construct: &str, ticks: [u64; 4]) -> ConstructDataset {
        let measurements = Branch::ALL
            .iter()
            .zip(ticks)
            .map(|(branch, tick_count)| {
                (
                    *branch,
                    Measurement {
                        runtime_version: version.to_string(),
                        branch: *branch,
                        construct_name: construct.to_string(),
                        tick_count,
                        test_case_hash: "hash".to_string(),
                        source_revision: None,
                        runtime_full_version: None,
                    },
                )
            })
            .collect();

        ConstructDataset {
            runtime_version: version.to_string(),
            construct_name: construct.to_string(),
            measurements,
        }
    }

    fn factory_tag(version: &str, direction: Direction) -> TrendTag {
        TrendTag {
            version: version.to_string(),
            to: Branch::Factory,
            direction,
            from: Branch::Develop,
        }
    }

    fn fixture() -> (DatasetMap, TagMap) {
        let mut datasets = DatasetMap::new();
        let mut tags: TagMap = BTreeMap::new();

        let rows = [
            ("3.12", "Faster", [3_000_000, 1_000_000, 1_000_000, 500_000], Direction::Down),
            ("3.12", "Slower", [3_000_000, 1_000_000, 1_000_000, 1_500_000], Direction::Up),
            ("3.12", "Same", [3_000_000, 1_000_000, 1_000_000, 1_000_100], Direction::Steady),
            ("3.12", "Little", [3_000_000, 1_000_000, 1_000_000, 900_000], Direction::Down),
            ("3.11", "Faster", [3_000_000, 1_000_000, 1_000_000, 100_000], Direction::Down),
            ("2.7", "Faster", [3_000_000, 1_000_000, 1_000_000, 100_000], Direction::Down),
        ];

        for (version, construct, ticks, direction) in rows {
            datasets.insert(
                (version.to_string(), construct.to_string()),
                dataset(version, construct, ticks),
            );
            tags.entry(construct.to_string())
                .or_insert_with(TagSet::new)
                .insert(factory_tag(version, direction));
        }

        (datasets, tags)
    }

    fn filter(pinned: &str) -> RankFilter {
        RankFilter {
            pinned_version: pinned.to_string(),
            legacy_version: "2.7".to_string(),
        }
    }

    #[test]
    fn test_rank_orders_by_ratio() {
        let (datasets, tags) = fixture();
        let ranked = rank(&datasets, &tags, &filter("3.12"));

        let names: Vec<_> = ranked.iter().map(|e| e.construct_name.as_str()).collect();
        assert_eq!(names, vec!["Faster", "Little", "Slower"]);
        assert_eq!(ranked[0].percent_ratio, 50.0);
        assert_eq!(ranked[0].tag, "312_factory_down_vs_develop");
        assert!(ranked
            .windows(2)
            .all(|w| w[0].percent_ratio <= w[1].percent_ratio));
    }

    #[test]
    fn test_rank_excludes_steady_and_other_versions() {
        let (datasets, tags) = fixture();
        let ranked = rank(&datasets, &tags, &filter("3.12"));

        assert!(ranked.iter().all(|e| e.construct_name != "Same"));
        assert!(ranked.iter().all(|e| e.runtime_version == "3.12"));
    }

    #[test]
    fn test_rank_never_includes_legacy_version() {
        let (datasets, tags) = fixture();
        let ranked = rank(&datasets, &tags, &filter("2.7"));
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_filter_defaults_to_newest_version() {
        let report = ReportConfig::default();
        let versions = vec!["3.12".to_string(), "3.9".to_string()];

        let f = RankFilter::from_config(&report, &versions).unwrap();
        assert_eq!(f.pinned_version, "3.12");
        assert_eq!(f.legacy_version, "2.7");
        assert!(RankFilter::from_config(&report, &[]).is_none());
    }

    #[test]
    fn test_percent_ratio_zero_develop() {
        assert_eq!(percent_ratio(500, 1000), 50.0);
        assert!(percent_ratio(5000, 0).is_infinite());
    }

    #[test]
    fn test_summary_and_worst_regressions() {
        let (datasets, tags) = fixture();
        let ranked = rank(&datasets, &tags, &filter("3.12"));

        let summary = RankSummary::from_entries(&ranked);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.improvements, 2);
        assert_eq!(summary.regressions, 1);

        let worst = worst_regressions(&ranked, 5);
        assert_eq!(worst.len(), 1);
        assert_eq!(worst[0].construct_name, "Slower");
    }
}
