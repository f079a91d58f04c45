//! JSON run history.
//!
//! A single document of the form `{"runs": [...]}`, appended to at the end
//! of every batch. Writes go to a temp file that atomically replaces the
//! original. A missing or corrupt file is treated as an empty history so a
//! damaged document can never block a run.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub summary: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryDocument {
    #[serde(default)]
    runs: Vec<HistoryEntry>,
}

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one run and persist atomically
    pub fn append_run(&self, summary: &str, details: serde_json::Value) -> Result<()> {
        let mut document = self.load();

        document.runs.push(HistoryEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: summary.to_string(),
            details,
        });

        let serialized =
            serde_json::to_string_pretty(&document).context("Failed to serialize history")?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all().context("Failed to sync history to disk")?;

        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace history {}", self.path.display()))?;

        debug!("Appended run to history ({} total)", document.runs.len());
        Ok(())
    }

    /// Up to `n` most recent runs, newest first
    pub fn last_runs(&self, n: usize) -> Vec<HistoryEntry> {
        let document = self.load();
        document.runs.into_iter().rev().take(n).collect()
    }

    fn load(&self) -> HistoryDocument {
        if !self.path.exists() {
            return HistoryDocument::default();
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(document) => document,
                Err(e) => {
                    warn!(
                        "History file {} is corrupt ({}), starting fresh",
                        self.path.display(),
                        e
                    );
                    HistoryDocument::default()
                }
            },
            Err(e) => {
                warn!("Could not read history {}: {}", self.path.display(), e);
                HistoryDocument::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(&dir.path().join("history.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_yields_empty() {
        let (_dir, store) = temp_store();
        assert!(store.last_runs(5).is_empty());
    }

    #[test]
    fn test_append_and_recall() {
        let (_dir, store) = temp_store();
        store
            .append_run("first", serde_json::json!({"leads": 3}))
            .unwrap();
        store
            .append_run("second", serde_json::json!({"leads": 7}))
            .unwrap();

        let runs = store.last_runs(5);
        assert_eq!(runs.len(), 2);
        // newest first
        assert_eq!(runs[0].summary, "second");
        assert_eq!(runs[1].summary, "first");
    }

    #[test]
    fn test_last_runs_caps_at_n() {
        let (_dir, store) = temp_store();
        for i in 0..4 {
            store
                .append_run(&format!("run {}", i), serde_json::Value::Null)
                .unwrap();
        }
        assert_eq!(store.last_runs(2).len(), 2);
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), "{not json").unwrap();

        assert!(store.last_runs(5).is_empty());
        store.append_run("recovered", serde_json::Value::Null).unwrap();
        assert_eq!(store.last_runs(5).len(), 1);
    }

    #[test]
    fn test_document_shape_on_disk() {
        let (_dir, store) = temp_store();
        store.append_run("only", serde_json::Value::Null).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("runs").unwrap().is_array());
    }
}
