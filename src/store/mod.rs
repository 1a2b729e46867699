//! Output persistence.
//!
//! [`ArtifactStore`] owns everything a build writes: rendered files under the
//! per-stage directories, the retrieval index and the history log.

mod index;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use index::{IndexStats, Metadata, QueryHit, RetrievalEntry, RetrievalIndex};

use crate::core::{HistoryLog, HistoryRecord, PersistenceError};

/// Name of the log directory under the output root.
pub const LOGS_DIR: &str = "logs";

/// Writes build outputs under one versioned output directory.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    index: RetrievalIndex,
    history: HistoryLog,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, index: RetrievalIndex) -> Self {
        let root = root.into();
        let history = HistoryLog::in_dir(&root.join(LOGS_DIR));
        Self { root, index, history }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn index(&self) -> &RetrievalIndex {
        &self.index
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Create the output root, each subdirectory and `logs/`, then check
    /// the root is writable.
    pub fn prepare(&self, subdirs: &[&str]) -> Result<(), PersistenceError> {
        for dir in subdirs.iter().copied().chain(std::iter::once(LOGS_DIR)) {
            let path = self.root.join(dir);
            fs::create_dir_all(&path).map_err(|e| PersistenceError::io(&path, e))?;
        }

        let marker = self.root.join(".write_test");
        fs::write(&marker, b"").map_err(|e| PersistenceError::io(&marker, e))?;
        fs::remove_file(&marker).map_err(|e| PersistenceError::io(&marker, e))?;

        tracing::debug!(root = %self.root.display(), "Output layout ready");
        Ok(())
    }

    /// Write `content` to `<root>/<subdir>/<name>`. `name` may contain
    /// further path segments; missing parents are created.
    pub fn write(&self, subdir: &str, name: &str, content: &str) -> Result<PathBuf, PersistenceError> {
        let path = self.root.join(subdir).join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }

        fs::write(&path, content).map_err(|e| PersistenceError::io(&path, e))?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "Wrote artifact");
        Ok(path)
    }

    /// Write a value as pretty JSON.
    pub fn write_json<T: Serialize>(&self, subdir: &str, name: &str, value: &T) -> Result<PathBuf, PersistenceError> {
        let content = serde_json::to_string_pretty(value)?;
        self.write(subdir, name, &content)
    }

    /// Read a JSON file written by [`write_json`](Self::write_json).
    /// Returns `None` when the file does not exist.
    pub fn read_json<T: DeserializeOwned>(&self, subdir: &str, name: &str) -> Result<Option<T>, PersistenceError> {
        let path = self.root.join(subdir).join(name);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| PersistenceError::io(&path, e))?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Add text to the retrieval index. Empty text is skipped.
    pub fn index_text(&mut self, text: &str, metadata: Metadata) -> Result<Option<String>, PersistenceError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.index.put(text, metadata).map(Some)
    }

    /// Append a history record.
    pub fn record(&self, record: &HistoryRecord) -> Result<(), PersistenceError> {
        self.history.append(record)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_prepare_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("v1"), RetrievalIndex::in_memory("docs"));

        store.prepare(&["state_1_analysis", "state_2_architecture"]).unwrap();

        assert!(dir.path().join("v1/state_1_analysis").is_dir());
        assert!(dir.path().join("v1/state_2_architecture").is_dir());
        assert!(dir.path().join("v1/logs").is_dir());
        assert!(!dir.path().join("v1/.write_test").exists());
    }

    #[test]
    fn test_prepare_fails_on_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("taken");
        fs::write(&root, "not a directory").unwrap();

        let store = ArtifactStore::new(&root, RetrievalIndex::in_memory("docs"));
        assert!(matches!(store.prepare(&["state_1_analysis"]), Err(PersistenceError::Io { .. })));
    }

    #[test]
    fn test_write_nested() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), RetrievalIndex::in_memory("docs"));

        let path = store.write("state_3_features", "features/login.md", "# Login").unwrap();
        assert_eq!(path, dir.path().join("state_3_features/features/login.md"));
        assert_eq!(fs::read_to_string(path).unwrap(), "# Login");
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), RetrievalIndex::in_memory("docs"));

        assert!(store.read_json::<serde_json::Value>(LOGS_DIR, "missing.json").unwrap().is_none());

        store.write_json(LOGS_DIR, "state.json", &json!({"version": "v1"})).unwrap();
        let value: serde_json::Value = store.read_json(LOGS_DIR, "state.json").unwrap().unwrap();
        assert_eq!(value["version"], "v1");
    }

    #[test]
    fn test_index_text_skips_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::new(dir.path(), RetrievalIndex::in_memory("docs"));

        assert!(store.index_text("  \n", Metadata::new()).unwrap().is_none());
        assert!(store.index_text("analysis text", Metadata::new()).unwrap().is_some());
        assert_eq!(store.index().stats().count, 1);
    }

    #[test]
    fn test_record_appends_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), RetrievalIndex::in_memory("docs"));

        store.record(&HistoryRecord::new("analysis_complete", vec![], "v1", json!({}))).unwrap();
        store.record(&HistoryRecord::new("build_complete", vec![], "v1", json!({}))).unwrap();

        let states: Vec<_> = store.history().records().unwrap().into_iter().map(|r| r.state).collect();
        assert_eq!(states, ["analysis_complete", "build_complete"]);
    }
}
