//! Error types shared across the pipeline.

use std::path::PathBuf;

/// Failure of a completion backend.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No response from {0}")]
    NoResponse(String),

    /// Free-form failure, used by scripted providers in tests and by callers
    /// that wrap non-HTTP backends.
    #[error("{0}")]
    Other(String),
}

/// Failure reading or writing a prompt template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write template {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure persisting artifacts, history, or the retrieval index.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PersistenceError {
    /// Wrap an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Failure of a whole build or refinement request.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to set up output layout: {0}")]
    Setup(#[source] PersistenceError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("No previous build found to refine")]
    NoPreviousBuild,

    #[error("Stage '{0}' cannot be refined")]
    NotRefinable(String),

    #[error("No feedback given for refinement")]
    NoFeedback,

    #[error("Configuration error: {0}")]
    Config(String),
}
