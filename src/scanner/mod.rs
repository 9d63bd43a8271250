//! Measurement store scanning.
//!
//! This module walks the measurement tree
//! `<data_root>/<version>/<branch>/<construct>.data` and turns it into
//! complete datasets plus the trend tags derived from them.

use crate::analysis::{tag, NoiseThreshold, TAGGED_COMPARISONS};
use crate::config::{Config, DataConfig};
use crate::datafile;
use crate::error::{Result, SpeedError};
use crate::models::{
    parse_version, Branch, ConstructDataset, DatasetMap, Measurement, TagMap, TagSet,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File extension of measurement files.
pub const DATA_EXTENSION: &str = ".data";

/// Everything derived from one scan of the measurement tree.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Runtime versions, newest first.
    pub versions: Vec<String>,
    /// All construct names, sorted.
    pub constructs: Vec<String>,
    pub datasets: DatasetMap,
    pub tags: TagMap,
}

impl ScanResult {
    pub fn dataset(&self, version: &str, construct: &str) -> Option<&ConstructDataset> {
        self.datasets
            .get(&(version.to_string(), construct.to_string()))
    }
}

/// Reader for the measurement tree.
pub struct MeasurementStore {
    data_root: PathBuf,
    data: DataConfig,
    threshold: NoiseThreshold,
}

impl MeasurementStore {
    /// Create a store over an explicit root.
    pub fn new(data_root: PathBuf, data: DataConfig, threshold: NoiseThreshold) -> Self {
        Self {
            data_root,
            data,
            threshold,
        }
    }

    /// Create a store from the run configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_dir(), config.data.clone(), config.threshold)
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Scan the whole tree.
    ///
    /// All datasets are read before any tag is computed. A construct listed
    /// by `main` but missing in another branch aborts the scan.
    pub fn scan(&self) -> Result<ScanResult> {
        let versions = self.versions()?;
        info!("Found {} runtime versions", versions.len());

        let mut datasets = DatasetMap::new();
        let mut listed: Vec<(String, Vec<String>)> = Vec::new();

        for version in &versions {
            debug!("Runtime version: {}", version);
            let constructs = self.constructs(version)?;

            for construct in &constructs {
                let dataset = self.load_dataset(version, construct)?;
                datasets.insert((version.clone(), construct.clone()), dataset);
            }

            listed.push((version.clone(), constructs));
        }

        let mut tags: TagMap = BTreeMap::new();
        for (version, constructs) in &listed {
            for construct in constructs {
                let key = (version.clone(), construct.clone());
                let values = datasets[&key].values();
                let tag_set = tags.entry(construct.clone()).or_insert_with(TagSet::new);

                for (from, to) in TAGGED_COMPARISONS {
                    tag_set.insert(tag(&self.threshold, version, &values, from, to)?);
                }
            }
        }

        let constructs: BTreeSet<String> = listed
            .into_iter()
            .flat_map(|(_, constructs)| constructs)
            .collect();

        info!(
            "Scanned {} datasets for {} constructs",
            datasets.len(),
            constructs.len()
        );

        Ok(ScanResult {
            versions,
            constructs: constructs.into_iter().collect(),
            datasets,
            tags,
        })
    }

    /// Runtime version directories, newest first by numeric comparison.
    pub fn versions(&self) -> Result<Vec<String>> {
        let mut versions = Vec::new();

        if !self.data_root.is_dir() {
            warn!("Measurement root {} does not exist", self.data_root.display());
            return Ok(Vec::new());
        }

        for (name, path) in list_dir(&self.data_root)? {
            if !path.is_dir() || name == self.data.sources_dir || is_hidden(&name) {
                continue;
            }

            let parsed = parse_version(&name).ok_or_else(|| {
                SpeedError::malformed(&path, 0, "directory name is not a runtime version")
            })?;
            versions.push((parsed, name));
        }

        versions.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(versions.into_iter().map(|(_, name)| name).collect())
    }

    /// Construct names of one version, as listed by the `main` branch.
    pub fn constructs(&self, version: &str) -> Result<Vec<String>> {
        let main_dir = self.branch_dir(version, Branch::Main);

        if !main_dir.is_dir() {
            return Err(SpeedError::InconsistentDataset {
                version: version.to_string(),
                construct: "*".to_string(),
                branch: Branch::Main,
                path: main_dir,
            });
        }

        let mut constructs: Vec<String> = list_dir(&main_dir)?
            .into_iter()
            .filter(|(_, path)| path.is_file())
            .filter_map(|(name, _)| name.strip_suffix(DATA_EXTENSION).map(String::from))
            .filter(|name| !name.is_empty())
            .collect();

        constructs.sort();
        Ok(constructs)
    }

    /// Read all four branch records of one construct.
    pub fn load_dataset(&self, version: &str, construct: &str) -> Result<ConstructDataset> {
        let mut measurements = BTreeMap::new();

        for branch in Branch::ALL {
            let path = self.data_path(version, branch, construct);

            let record = datafile::read(&path, &self.data.noise_markers)?.ok_or_else(|| {
                SpeedError::InconsistentDataset {
                    version: version.to_string(),
                    construct: construct.to_string(),
                    branch,
                    path: path.clone(),
                }
            })?;

            let measurement =
                Measurement::from_record(&record, &self.data, &path, version, branch, construct)?;
            measurements.insert(branch, measurement);
        }

        Ok(ConstructDataset {
            runtime_version: version.to_string(),
            construct_name: construct.to_string(),
            measurements,
        })
    }

    pub fn branch_dir(&self, version: &str, branch: Branch) -> PathBuf {
        self.data_root.join(version).join(branch.dir_name())
    }

    /// Path of the measurement file of one construct.
    pub fn data_path(&self, version: &str, branch: Branch, construct: &str) -> PathBuf {
        self.branch_dir(version, branch)
            .join(format!("{}{}", construct, DATA_EXTENSION))
    }

    /// Path of the generated code diff stored next to a measurement.
    pub fn diff_path(&self, version: &str, branch: Branch, construct: &str) -> PathBuf {
        self.branch_dir(version, branch)
            .join(format!("{}.html", construct))
    }
}

/// Direct children of `dir` as `(file name, path)`, sorted by name.
pub fn list_dir(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| SpeedError::io(dir, e.into()))?;
        let name = entry.file_name().to_string_lossy().to_string();
        entries.push((name, entry.into_path()));
    }

    Ok(entries)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use std::fs;
    use tempfile::TempDir;

    fn write_record(root: &Path, version: &str, branch: Branch, construct: &str, ticks: u64) {
        let dir = root.join(version).join(branch.dir_name());
        fs::create_dir_all(&dir).unwrap();

        let content = if branch.is_baseline() {
            format!(
                "TEST_CASE_HASH = 'h1'\nPYTHON = '{}.0'\nCPYTHON_CONSTRUCT = {}\n",
                version, ticks
            )
        } else {
            format!(
                "Nuitka:INFO: Completed.\nTEST_CASE_HASH = 'h1'\nNUITKA_COMMIT = 'c-{}'\nNUITKA_CONSTRUCT = {}\n",
                branch, ticks
            )
        };
        fs::write(dir.join(format!("{}.data", construct)), content).unwrap();
    }

    fn write_construct(root: &Path, version: &str, construct: &str, ticks: [u64; 4]) {
        for (branch, value) in Branch::ALL.iter().zip(ticks) {
            write_record(root, version, *branch, construct, value);
        }
    }

    fn store(root: &TempDir) -> MeasurementStore {
        MeasurementStore::new(
            root.path().to_path_buf(),
            DataConfig::default(),
            NoiseThreshold::default(),
        )
    }

    #[test]
    fn test_versions_sorted_numerically() {
        let root = TempDir::new().unwrap();
        for version in ["3.9", "3.12", "2.7", "3.10"] {
            write_construct(root.path(), version, "X", [1, 1, 1, 1]);
        }
        fs::create_dir_all(root.path().join("construct-sources")).unwrap();

        let versions = store(&root).versions().unwrap();
        assert_eq!(versions, vec!["3.12", "3.10", "3.9", "2.7"]);
    }

    #[test]
    fn test_scan_builds_datasets_and_tags() {
        let root = TempDir::new().unwrap();
        write_construct(
            root.path(),
            "3.12",
            "X",
            [2_000_000, 1_000_000, 1_000_000, 500_000],
        );
        write_construct(root.path(), "2.7", "X", [2_000_000, 1_000_000, 1_000_000, 1_000_000]);
        write_construct(root.path(), "3.12", "Y", [2_000_000, 1_000_000, 2_000_000, 2_000_000]);

        let result = store(&root).scan().unwrap();

        assert_eq!(result.versions, vec!["3.12", "2.7"]);
        assert_eq!(result.constructs, vec!["X", "Y"]);
        assert_eq!(result.datasets.len(), 3);

        let dataset = result.dataset("3.12", "X").unwrap();
        assert_eq!(dataset.measurements.len(), 4);
        assert_eq!(dataset.ticks(Branch::Factory), Some(500_000));
        assert_eq!(
            dataset.measurements[&Branch::Develop].source_revision.as_deref(),
            Some("c-develop")
        );

        assert_eq!(
            result.tags["X"].labels(),
            vec![
                "312_develop_steady_vs_main",
                "312_factory_down_vs_develop",
                "27_develop_steady_vs_main",
                "27_factory_steady_vs_develop",
            ]
        );
        let y: Vec<_> = result.tags["Y"].iter().map(|t| t.direction).collect();
        assert_eq!(y, vec![Direction::Up, Direction::Steady]);
    }

    #[test]
    fn test_constructs_come_from_main_only() {
        let root = TempDir::new().unwrap();
        write_construct(root.path(), "3.12", "X", [1, 1, 1, 1]);
        // Records outside the main listing are not constructs.
        write_record(root.path(), "3.12", Branch::Factory, "Orphan", 5);
        fs::write(root.path().join("3.12/main/X.html"), "<table/>").unwrap();

        let result = store(&root).scan().unwrap();
        assert_eq!(result.constructs, vec!["X"]);
    }

    #[test]
    fn test_missing_branch_record_is_inconsistent() {
        let root = TempDir::new().unwrap();
        for branch in [Branch::Baseline, Branch::Main, Branch::Develop] {
            write_record(root.path(), "3.12", branch, "X", 1_000_000);
        }
        fs::create_dir_all(root.path().join("3.12/factory")).unwrap();

        let err = store(&root).scan().unwrap_err();
        match err {
            SpeedError::InconsistentDataset {
                construct, branch, ..
            } => {
                assert_eq!(construct, "X");
                assert_eq!(branch, Branch::Factory);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_malformed_record_aborts_scan() {
        let root = TempDir::new().unwrap();
        write_construct(root.path(), "3.12", "X", [1, 1, 1, 1]);
        fs::write(
            root.path().join("3.12/develop/X.data"),
            "NUITKA_CONSTRUCT = 12\nexec('rm -rf /')\n",
        )
        .unwrap();

        let err = store(&root).scan().unwrap_err();
        assert!(matches!(err, SpeedError::MalformedData { .. }));
    }

    #[test]
    fn test_repeated_scans_do_not_duplicate_tags() {
        let root = TempDir::new().unwrap();
        write_construct(root.path(), "3.12", "X", [1, 1_000_000, 1_000_000, 2_000_000]);

        let s = store(&root);
        let first = s.scan().unwrap();
        let second = s.scan().unwrap();

        assert_eq!(first.tags["X"].labels(), second.tags["X"].labels());
        assert_eq!(first.tags["X"].len(), 2);
    }

    #[test]
    fn test_missing_root_has_no_versions() {
        let root = TempDir::new().unwrap();
        let s = MeasurementStore::new(
            root.path().join("absent"),
            DataConfig::default(),
            NoiseThreshold::default(),
        );

        assert!(s.versions().unwrap().is_empty());
        assert!(s.scan().unwrap().datasets.is_empty());
    }

    #[test]
    fn test_non_version_directory_is_malformed() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("latest")).unwrap();

        let err = store(&root).versions().unwrap_err();
        assert!(matches!(err, SpeedError::MalformedData { .. }));
    }
}
