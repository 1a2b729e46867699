//! Content-addressed retrieval index.
//!
//! Entries are keyed by the SHA-256 of their text, so adding the same text
//! twice updates one entry. Queries rank entries with BM25 over lowercase
//! alphanumeric tokens. The index persists as one JSON file.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::PersistenceError;

/// Term frequency saturation.
const K1: f32 = 1.5;
/// Length normalization.
const B: f32 = 0.75;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "that", "from", "this", "have", "will", "into", "when",
        "where", "what", "your", "their", "about", "which", "there", "been", "while", "should",
        "could", "would", "they", "them", "then", "than", "only", "also", "each", "more", "most",
        "some", "such", "are", "was", "were", "its", "our", "can", "not", "but", "all", "any",
    ]
    .into_iter()
    .collect()
});

/// Free-form entry metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One indexed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalEntry {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A ranked query result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub entry: RetrievalEntry,
    pub score: f32,
}

/// Index statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub collection: String,
    pub count: usize,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "- Collection: {}\n- Documents: {}", self.collection, self.count)
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    collection: String,
    entries: Vec<RetrievalEntry>,
}

/// The retrieval index.
#[derive(Debug, Clone)]
pub struct RetrievalIndex {
    collection: String,
    path: Option<PathBuf>,
    entries: IndexMap<String, RetrievalEntry>,
}

impl RetrievalIndex {
    /// An index that lives only in memory.
    pub fn in_memory(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), path: None, entries: IndexMap::new() }
    }

    /// Open the index persisted at `path`, or start an empty one there.
    pub fn open(path: impl Into<PathBuf>, collection: impl Into<String>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let mut index = Self { collection: collection.into(), path: Some(path.clone()), entries: IndexMap::new() };

        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| PersistenceError::io(&path, e))?;
            let persisted: PersistedIndex = serde_json::from_str(&content)?;
            index.entries = persisted.entries.into_iter().map(|e| (e.id.clone(), e)).collect();
            tracing::debug!(path = %path.display(), count = index.entries.len(), "Loaded retrieval index");
        }

        Ok(index)
    }

    /// Content id for a text: lowercase hex SHA-256.
    pub fn content_id(text: &str) -> String {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    }

    /// Where the index persists, if anywhere.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or replace the entry for `text`. Returns its id.
    pub fn put(&mut self, text: &str, mut metadata: Metadata) -> Result<String, PersistenceError> {
        let id = Self::content_id(text);
        metadata.insert("length".to_string(), text.chars().count().into());

        self.entries.insert(id.clone(), RetrievalEntry { id: id.clone(), text: text.to_string(), metadata });
        self.save()?;

        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&RetrievalEntry> {
        self.entries.get(id)
    }

    /// Remove an entry. Returns whether it existed.
    pub fn delete(&mut self, id: &str) -> Result<bool, PersistenceError> {
        let removed = self.entries.shift_remove(id).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats { collection: self.collection.clone(), count: self.entries.len() }
    }

    /// Up to `k` entries with a positive BM25 score, best first.
    pub fn query(&self, text: &str, k: usize) -> Vec<QueryHit> {
        let query_terms = tokenize(text);
        if query_terms.is_empty() || self.entries.is_empty() {
            return Vec::new();
        }

        let docs: Vec<(&RetrievalEntry, HashMap<String, usize>, usize)> = self
            .entries
            .values()
            .map(|entry| {
                let terms = tokenize(&entry.text);
                let len = terms.len();
                (entry, count_terms(terms), len)
            })
            .collect();

        let num_docs = docs.len() as f32;
        let avg_len = docs.iter().map(|(_, _, len)| *len).sum::<usize>() as f32 / num_docs;

        let idf = |term: &str| -> f32 {
            let df = docs.iter().filter(|(_, terms, _)| terms.contains_key(term)).count() as f32;
            ((num_docs - df + 0.5) / (df + 0.5)).ln_1p()
        };

        let mut hits: Vec<QueryHit> = docs
            .iter()
            .filter_map(|(entry, terms, len)| {
                let norm = if avg_len > 0.0 { *len as f32 / avg_len } else { 0.0 };
                let score: f32 = query_terms
                    .iter()
                    .filter_map(|term| terms.get(term).map(|tf| (term, *tf as f32)))
                    .map(|(term, tf)| {
                        let numerator = tf * (K1 + 1.0);
                        let denominator = K1.mul_add(B.mul_add(norm, 1.0 - B), tf);
                        idf(term) * (numerator / denominator)
                    })
                    .sum();

                (score > 0.0).then(|| QueryHit { entry: (*entry).clone(), score })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        hits
    }

    fn save(&self) -> Result<(), PersistenceError> {
        let Some(path) = &self.path else { return Ok(()) };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }

        let persisted = PersistedIndex {
            collection: self.collection.clone(),
            entries: self.entries.values().cloned().collect(),
        };
        let content = serde_json::to_string_pretty(&persisted)?;
        fs::write(path, content).map_err(|e| PersistenceError::io(path, e))
    }
}

/// Lowercase alphanumeric tokens longer than two characters, minus stop words.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(word.as_str()))
        .collect()
}

fn count_terms(terms: Vec<String>) -> HashMap<String, usize> {
    let mut freq = HashMap::new();
    for term in terms {
        *freq.entry(term).or_insert(0) += 1;
    }
    freq
}
