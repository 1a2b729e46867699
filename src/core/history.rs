//! Build history log.
//!
//! Every completed pipeline stage appends one JSON object per line to
//! `logs/history.jsonl`. The log is never rewritten.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PersistenceError;

/// File name of the history log inside the `logs/` directory.
pub const HISTORY_FILE: &str = "history.jsonl";

/// A single history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// When the record was written
    pub timestamp: DateTime<Utc>,
    /// State name, e.g. `analysis_complete`
    pub state: String,
    /// Files written by the state
    pub files: Vec<PathBuf>,
    /// Pipeline version label
    pub version: String,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl HistoryRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        state: impl Into<String>,
        files: Vec<PathBuf>,
        version: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            state: state.into(),
            files,
            version: version.into(),
            metadata,
        }
    }
}

/// Append-only JSON-lines history log.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    /// Create a log writing to the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a log inside a `logs/` directory.
    pub fn in_dir(logs_dir: &Path) -> Self {
        Self::new(logs_dir.join(HISTORY_FILE))
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record.
    pub fn append(&self, record: &HistoryRecord) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }

        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        writeln!(file, "{line}").map_err(|e| PersistenceError::io(&self.path, e))?;

        Ok(())
    }

    /// Read every record back, skipping lines that fail to parse.
    pub fn records(&self) -> Result<Vec<HistoryRecord>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| PersistenceError::io(&self.path, e))?;

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Skipping malformed history line");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::in_dir(dir.path());

        log.append(&HistoryRecord::new(
            "analysis_complete",
            vec![PathBuf::from("a.md")],
            "v1",
            json!({"agent": "analyzer"}),
        ))
        .unwrap();
        log.append(&HistoryRecord::new("build_complete", vec![], "v1", json!({"duration": 1.5})))
            .unwrap();

        let records = log.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].state, "analysis_complete");
        assert_eq!(records[0].metadata["agent"], "analyzer");
        assert_eq!(records[1].state, "build_complete");
    }

    #[test]
    fn test_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::in_dir(dir.path());

        for state in ["analysis_complete", "architecture_complete", "features_complete"] {
            log.append(&HistoryRecord::new(state, vec![], "v1", json!({}))).unwrap();
        }

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 3);
        for line in content.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("timestamp").is_some());
            assert_eq!(value["version"], "v1");
        }
    }

    #[test]
    fn test_missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::in_dir(&dir.path().join("nope"));
        assert!(log.records().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::in_dir(dir.path());
        log.append(&HistoryRecord::new("analysis_complete", vec![], "v1", json!({}))).unwrap();

        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        writeln!(file, "not json").unwrap();

        assert_eq!(log.records().unwrap().len(), 1);
    }
}
