//! Core types for docforge.
//!
//! Configuration, the error taxonomy, and the append-only build history.

mod config;
mod error;
mod history;

pub use config::{
    Config, FeaturesConfig, LlmConfig, OutputConfig, ProjectConfig, PromptsConfig, ProviderKind,
    RetrievalConfig,
};
pub use error::{BuildError, PersistenceError, ProviderError, TemplateError};
pub use history::{HistoryLog, HistoryRecord, HISTORY_FILE};
