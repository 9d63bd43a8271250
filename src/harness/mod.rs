//! Measurement updates.
//!
//! For every configured runtime this module lists the benchmark cases of
//! the factory worktree, decides which records are stale and re-runs the
//! harness for those. Records of cases that no longer exist are removed.

pub mod runner;

use crate::config::Config;
use crate::datafile::{self, Record, Value};
use crate::error::{Result, SpeedError};
use crate::models::Branch;
use crate::repo;
use crate::scanner::{list_dir, MeasurementStore, DATA_EXTENSION};
use indicatif::{ProgressBar, ProgressStyle};
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extension of the generated code diff stored next to a record.
const DIFF_EXTENSION: &str = ".html";

/// One benchmark case file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkCase {
    /// Construct name, the file name without `.py`.
    pub name: String,
    pub path: PathBuf,
}

/// Re-measure stale records for every configured runtime.
///
/// Returns the number of records written.
pub fn update_numbers(config: &Config, show_progress: bool) -> Result<usize> {
    let store = MeasurementStore::from_config(config);

    let mut heads = BTreeMap::new();
    for branch in Branch::DEVELOPMENT {
        let head = repo::branch_head(config, branch)?;
        debug!("{} is at {}", branch, head);
        heads.insert(branch, head);
    }

    let mut written = 0;
    for interpreter in &config.upstream.runtimes {
        let full_version = runner::runtime_version(interpreter)?;
        info!("Working with {} ({})", interpreter, full_version);
        written += update_runtime(
            config,
            &store,
            interpreter,
            &full_version,
            &heads,
            show_progress,
        )?;
    }

    Ok(written)
}

/// Re-measure stale records of one runtime, then drop obsolete files.
pub fn update_runtime(
    config: &Config,
    store: &MeasurementStore,
    interpreter: &str,
    full_version: &str,
    heads: &BTreeMap<Branch, String>,
    show_progress: bool,
) -> Result<usize> {
    let major = runner::major_version(full_version);
    let factory_dir = config.worktree_dir(Branch::Factory);
    let cases_dir = factory_dir.join(&config.upstream.cases_dir);
    let harness = Harness {
        interpreter,
        script: factory_dir.join(&config.upstream.harness_script),
        sources_dir: config.sources_dir(),
    };

    let cases = list_cases(&cases_dir, &config.upstream.excluded_cases, full_version)?;
    info!("{} benchmark cases for {}", cases.len(), major);

    let progress = progress_bar(cases.len(), show_progress);
    let keys = &config.data;
    let mut written = 0;

    for case in &cases {
        progress.set_message(case.name.clone());
        let hash = case_hash(&case.path)?;

        let path = store.data_path(&major, Branch::Baseline, &case.name);
        let record = datafile::read(&path, &keys.noise_markers)?;
        if is_stale(
            record.as_ref(),
            &[(&keys.hash_key, &hash), (&keys.runtime_key, full_version)],
        ) {
            debug!("Measuring {} on {}", case.name, Branch::Baseline);
            harness.measure_baseline(&case.path, &path)?;
            written += 1;
        }

        for branch in Branch::DEVELOPMENT {
            let head = heads
                .get(&branch)
                .ok_or(SpeedError::MissingBranchValue { branch })?;

            let path = store.data_path(&major, branch, &case.name);
            let record = datafile::read(&path, &keys.noise_markers)?;
            if is_stale(
                record.as_ref(),
                &[(&keys.hash_key, &hash), (&keys.revision_key, head)],
            ) {
                debug!("Measuring {} on {}", case.name, branch);
                let compiler = config
                    .worktree_dir(branch)
                    .join(&config.upstream.compiler_binary);
                let diff_path = store.diff_path(&major, branch, &case.name);
                harness.measure_compiled(&compiler, &case.path, &path, &diff_path)?;
                written += 1;
            }
        }

        progress.inc(1);
    }
    progress.finish_and_clear();

    let removed = remove_obsolete(store, &major, &cases_dir)?;
    info!(
        "{}: {} records measured, {} obsolete files removed",
        major, written, removed
    );

    Ok(written)
}

fn progress_bar(len: usize, show_progress: bool) -> ProgressBar {
    if !show_progress {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// The benchmark harness script of the factory worktree.
struct Harness<'a> {
    interpreter: &'a str,
    script: PathBuf,
    sources_dir: PathBuf,
}

impl Harness<'_> {
    /// Measure the baseline runtime and copy the case source for the pages.
    fn measure_baseline(&self, case: &Path, data_path: &Path) -> Result<()> {
        create_dir(&self.sources_dir)?;

        let command = vec![
            self.interpreter.to_string(),
            self.script.display().to_string(),
            case.display().to_string(),
            "--copy-source-to".to_string(),
            self.sources_dir.display().to_string(),
        ];
        self.run_into(&command, data_path)
    }

    /// Measure a compiler branch, also writing the generated code diff.
    fn measure_compiled(
        &self,
        compiler: &Path,
        case: &Path,
        data_path: &Path,
        diff_path: &Path,
    ) -> Result<()> {
        if let Some(parent) = diff_path.parent() {
            create_dir(parent)?;
        }
        let diff_path =
            std::path::absolute(diff_path).map_err(|e| SpeedError::io(diff_path, e))?;

        let command = vec![
            self.interpreter.to_string(),
            self.script.display().to_string(),
            "--nuitka".to_string(),
            compiler.display().to_string(),
            "--cpython".to_string(),
            "no".to_string(),
            "--code-diff".to_string(),
            diff_path.display().to_string(),
            case.display().to_string(),
        ];
        self.run_into(&command, data_path)
    }

    fn run_into(&self, command: &[String], data_path: &Path) -> Result<()> {
        let stdout = runner::run_command(command, None)?;

        if let Some(parent) = data_path.parent() {
            create_dir(parent)?;
        }
        fs::write(data_path, stdout).map_err(|e| SpeedError::io(data_path, e))
    }
}

/// Benchmark cases measured under the given runtime, sorted by name.
pub fn list_cases(
    cases_dir: &Path,
    excluded: &[String],
    full_version: &str,
) -> Result<Vec<BenchmarkCase>> {
    let mut cases = Vec::new();

    for (file_name, path) in list_dir(cases_dir)? {
        if !path.is_file() || !is_measured_case(&file_name, excluded, full_version) {
            continue;
        }
        if let Some(name) = file_name.strip_suffix(".py") {
            cases.push(BenchmarkCase {
                name: name.to_string(),
                path,
            });
        }
    }

    Ok(cases)
}

/// Whether a file in the cases directory is a case for this runtime.
pub fn is_measured_case(file_name: &str, excluded: &[String], full_version: &str) -> bool {
    if !file_name.ends_with(".py") || file_name.starts_with("run_") {
        return false;
    }
    if excluded.iter().any(|e| e == file_name) {
        return false;
    }
    !(full_version.starts_with('3') && file_name.ends_with("_27.py"))
}

/// MD5 hex digest of a case source.
pub fn case_hash(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| SpeedError::io(path, e))?;
    Ok(format!("{:x}", Md5::digest(&bytes)))
}

/// A record is stale when missing or when any expected string differs.
pub fn is_stale(record: Option<&Record>, expected: &[(&str, &str)]) -> bool {
    let Some(record) = record else {
        return true;
    };

    expected.iter().any(|(key, value)| {
        !matches!(record.get(*key), Some(Value::Str(found)) if found == value)
    })
}

/// Remove records and diffs of cases that no longer exist.
///
/// Any other file in a branch directory is an inconsistency.
pub fn remove_obsolete(store: &MeasurementStore, version: &str, cases_dir: &Path) -> Result<usize> {
    let version_dir = store.data_root().join(version);
    if !version_dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for (dir_name, branch_dir) in list_dir(&version_dir)? {
        if !branch_dir.is_dir() {
            continue;
        }
        let Some(branch) = Branch::ALL.into_iter().find(|b| b.dir_name() == dir_name) else {
            warn!("Ignoring unknown branch directory {}", branch_dir.display());
            continue;
        };

        for (file_name, path) in list_dir(&branch_dir)? {
            let stem = file_name
                .strip_suffix(DATA_EXTENSION)
                .or_else(|| file_name.strip_suffix(DIFF_EXTENSION));

            let Some(stem) = stem else {
                return Err(SpeedError::InconsistentDataset {
                    version: version.to_string(),
                    construct: file_name,
                    branch,
                    path,
                });
            };

            if !cases_dir.join(format!("{}.py", stem)).exists() {
                info!("Removing obsolete {}", path.display());
                fs::remove_file(&path).map_err(|e| SpeedError::io(&path, e))?;
                removed += 1;
            }
        }
    }

    Ok(removed)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| SpeedError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn excluded() -> Vec<String> {
        vec!["InplaceOperationInstanceStringAdd.py".to_string()]
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Str(v.to_string())))
            .collect()
    }

    #[test]
    fn test_is_measured_case() {
        let excluded = excluded();

        assert!(is_measured_case("LocalVariableAssign.py", &excluded, "3.12.1"));
        assert!(!is_measured_case("run_all.py", &excluded, "3.12.1"));
        assert!(!is_measured_case("README.txt", &excluded, "3.12.1"));
        assert!(!is_measured_case("InplaceOperationInstanceStringAdd.py", &excluded, "2.7.18"));
        assert!(!is_measured_case("PrintStatement_27.py", &excluded, "3.12.1"));
        assert!(is_measured_case("PrintStatement_27.py", &excluded, "2.7.18"));
    }

    #[test]
    fn test_list_cases() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("B.py"), "b").unwrap();
        fs::write(dir.path().join("A.py"), "a").unwrap();
        fs::write(dir.path().join("run_all.py"), "").unwrap();
        fs::create_dir(dir.path().join("Dir.py")).unwrap();

        let cases = list_cases(dir.path(), &excluded(), "3.12.1").unwrap();
        let names: Vec<_> = cases.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(cases[0].path, dir.path().join("A.py"));
    }

    #[test]
    fn test_case_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("A.py");
        fs::write(&path, "abc").unwrap();

        assert_eq!(case_hash(&path).unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_is_stale() {
        let fresh = record(&[("TEST_CASE_HASH", "h1"), ("NUITKA_COMMIT", "c1")]);
        let expected = [("TEST_CASE_HASH", "h1"), ("NUITKA_COMMIT", "c1")];

        assert!(is_stale(None, &expected));
        assert!(!is_stale(Some(&fresh), &expected));
        assert!(is_stale(
            Some(&fresh),
            &[("TEST_CASE_HASH", "h2"), ("NUITKA_COMMIT", "c1")]
        ));
        assert!(is_stale(Some(&fresh), &[("PYTHON", "3.12.1")]));

        let mut typed = fresh.clone();
        typed.insert("NUITKA_COMMIT".to_string(), Value::Int(1));
        assert!(is_stale(Some(&typed), &expected));
    }

    fn store_at(root: &Path) -> MeasurementStore {
        let config = Config::default();
        MeasurementStore::new(root.to_path_buf(), config.data, config.threshold)
    }

    #[test]
    fn test_remove_obsolete() {
        let data = TempDir::new().unwrap();
        let cases = TempDir::new().unwrap();
        fs::write(cases.path().join("Kept.py"), "").unwrap();

        let develop = data.path().join("3.12").join("develop");
        fs::create_dir_all(&develop).unwrap();
        for name in ["Kept.data", "Kept.html", "Gone.data", "Gone.html"] {
            fs::write(develop.join(name), "").unwrap();
        }

        let removed = remove_obsolete(&store_at(data.path()), "3.12", cases.path()).unwrap();

        assert_eq!(removed, 2);
        assert!(develop.join("Kept.data").exists());
        assert!(develop.join("Kept.html").exists());
        assert!(!develop.join("Gone.data").exists());
    }

    #[test]
    fn test_remove_obsolete_rejects_stray_file() {
        let data = TempDir::new().unwrap();
        let cases = TempDir::new().unwrap();

        let main = data.path().join("3.12").join("main");
        fs::create_dir_all(&main).unwrap();
        fs::write(main.join("notes.txt"), "").unwrap();

        let err = remove_obsolete(&store_at(data.path()), "3.12", cases.path()).unwrap_err();
        assert!(matches!(
            err,
            SpeedError::InconsistentDataset {
                branch: Branch::Main,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_update_runtime_measures_stale_records() {
        let cache = TempDir::new().unwrap();
        let mut config = Config::default();
        config.general.cache_dir = Some(cache.path().to_path_buf());

        let factory = config.worktree_dir(Branch::Factory);
        let cases_dir = factory.join(&config.upstream.cases_dir);
        fs::create_dir_all(&cases_dir).unwrap();
        fs::write(cases_dir.join("LocalVariableAssign.py"), "x = 1\n").unwrap();

        let script = factory.join(&config.upstream.harness_script);
        fs::create_dir_all(script.parent().unwrap()).unwrap();
        fs::write(&script, "printf 'ARGS = \"%s\"\\n' \"$*\"\n").unwrap();

        let heads: BTreeMap<Branch, String> = Branch::DEVELOPMENT
            .into_iter()
            .map(|b| (b, format!("{}-head", b)))
            .collect();

        let store = MeasurementStore::from_config(&config);
        let hash = case_hash(&cases_dir.join("LocalVariableAssign.py")).unwrap();

        // A fresh main record is left alone.
        let main_path = store.data_path("3.12", Branch::Main, "LocalVariableAssign");
        fs::create_dir_all(main_path.parent().unwrap()).unwrap();
        let fresh = format!(
            "TEST_CASE_HASH = \"{}\"\nNUITKA_COMMIT = \"main-head\"\nNUITKA_CONSTRUCT = 7\n",
            hash
        );
        fs::write(&main_path, &fresh).unwrap();

        let written =
            update_runtime(&config, &store, "sh", "3.12.1", &heads, false).unwrap();
        assert_eq!(written, 3);
        assert_eq!(fs::read_to_string(&main_path).unwrap(), fresh);

        let markers = &config.data.noise_markers;
        let baseline = datafile::read(
            &store.data_path("3.12", Branch::Baseline, "LocalVariableAssign"),
            markers,
        )
        .unwrap()
        .unwrap();
        let Some(Value::Str(args)) = baseline.get("ARGS") else {
            panic!("no ARGS in baseline record");
        };
        assert!(args.contains("--copy-source-to"));

        let factory_record = datafile::read(
            &store.data_path("3.12", Branch::Factory, "LocalVariableAssign"),
            markers,
        )
        .unwrap()
        .unwrap();
        let Some(Value::Str(args)) = factory_record.get("ARGS") else {
            panic!("no ARGS in factory record");
        };
        assert!(args.contains("--code-diff"));
        assert!(args.contains("LocalVariableAssign.html"));
        assert!(args.contains("--cpython no"));
    }
}
