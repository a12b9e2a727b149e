//! Durable run records: one JSON file per execution id plus `latest.json`
//! for page-reload recovery. Single writer (the active runner), any number
//! of readers; readers tolerate staleness, so no locking is needed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::RunResults;

pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(workspace: &Path, reports_dir: &Path) -> Self {
        Self {
            dir: workspace.join(reports_dir),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a terminal run: the timestamped record and `latest.json`.
    pub fn write(&self, results: &RunResults) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create reports dir {}", self.dir.display()))?;
        let record = self.dir.join(format!("{}.json", results.execution_id));
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&record, &json)
            .with_context(|| format!("failed to write {}", record.display()))?;
        self.write_latest(results)?;
        debug!(execution_id = %results.execution_id, path = %record.display(), "run record persisted");
        Ok(())
    }

    /// Replace `latest.json` only. Called incrementally during a run so a
    /// crash or page reload can recover the most recent state. Written to
    /// a temp file first so readers never see a torn record.
    pub fn write_latest(&self, results: &RunResults) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create reports dir {}", self.dir.display()))?;
        let json = serde_json::to_string_pretty(results)?;
        let tmp = self.dir.join(".latest.json.tmp");
        std::fs::write(&tmp, &json).with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, self.dir.join("latest.json"))
            .context("failed to replace latest.json")?;
        Ok(())
    }

    /// The most recent run record, if any run has ever been persisted.
    pub fn load_latest(&self) -> Result<Option<RunResults>> {
        let path = self.dir.join("latest.json");
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        let results = serde_json::from_str(&content)
            .with_context(|| format!("malformed run record {}", path.display()))?;
        Ok(Some(results))
    }

    /// Execution ids of persisted runs, newest first. The id's leading
    /// start-time stamp makes lexicographic order chronological.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", self.dir.display()));
            }
        };
        let mut ids: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json")
                    .filter(|stem| *stem != "latest" && !stem.starts_with('.'))
                    .map(str::to_string)
            })
            .collect();
        ids.sort_by(|a, b| b.cmp(a));
        Ok(ids)
    }

    pub fn load(&self, execution_id: &str) -> Result<RunResults> {
        let path = self.dir.join(format!("{execution_id}.json"));
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("malformed run record {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunStatus, SuiteId};
    use chrono::Utc;

    fn store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path(), Path::new("reports"));
        (dir, store)
    }

    fn results(id: &str) -> RunResults {
        let mut results = RunResults::new(id.to_string(), Utc::now());
        for suite in SuiteId::ALL {
            results.suites.get_mut(suite).status = crate::models::SuiteStatus::Completed;
        }
        results.finalize(&SuiteId::ALL);
        results
    }

    #[test]
    fn test_write_then_load_latest_round_trips() {
        let (_dir, store) = store();
        let run = results("20260805-101500-1a2b3c");
        store.write(&run).unwrap();

        let loaded = store.load_latest().unwrap().unwrap();
        assert_eq!(loaded.execution_id, run.execution_id);
        assert_eq!(loaded.status, RunStatus::Completed);
        assert_eq!(loaded.overall, run.overall);

        // latest.json and the timestamped record carry the same snapshot.
        let by_id = store.load(&run.execution_id).unwrap();
        assert_eq!(
            serde_json::to_string(&by_id).unwrap(),
            serde_json::to_string(&loaded).unwrap()
        );
    }

    #[test]
    fn test_load_latest_on_empty_store() {
        let (_dir, store) = store();
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn test_list_is_newest_first_and_skips_latest() {
        let (_dir, store) = store();
        store.write(&results("20260805-090000-aaaaaa")).unwrap();
        store.write(&results("20260805-110000-bbbbbb")).unwrap();

        let ids = store.list().unwrap();
        assert_eq!(
            ids,
            vec![
                "20260805-110000-bbbbbb".to_string(),
                "20260805-090000-aaaaaa".to_string()
            ]
        );
    }

    #[test]
    fn test_incremental_latest_overwrites() {
        let (_dir, store) = store();
        let mut run = results("20260805-120000-cccccc");
        run.status = RunStatus::Running;
        store.write_latest(&run).unwrap();

        run.status = RunStatus::Completed;
        store.write_latest(&run).unwrap();
        let loaded = store.load_latest().unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Completed);
    }
}
