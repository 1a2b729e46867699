#![allow(clippy::format_push_string)]
#![allow(clippy::unused_self)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]

//! # Docforge
//!
//! Turn free-text project requirements into a set of business and technical
//! documents by chaining calls to a text-completion model.
//!
//! A build runs six fixed stages: analysis, architecture, feature planning,
//! documents (BRD and SRS), validation and a final report. Every stage hands
//! its [`Artifact`] to the next; a failed stage degrades to an empty artifact
//! and the pipeline keeps going.
//!
//! ## Quick Start
//!
//! ```bash
//! # Build with the default Ollama backend
//! docforge "Build a blog with posts and comments"
//!
//! # Refine the generated documents later
//! docforge "Build a blog" --refine documents --feedback "Add missing security requirements"
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::redundant_clone)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unnecessary_debug_formatting)]
#![allow(clippy::use_self)]

pub mod agents;
pub mod ai;
pub mod core;
pub mod extract;
pub mod orchestrator;
pub mod prompts;
pub mod store;

// Re-export commonly used types
pub use agents::{AgentContext, Artifact, ArtifactKind, ArtifactMetadata};
pub use ai::{build_provider, CompletionProvider};
pub use core::{BuildError, Config, PersistenceError, ProviderError, TemplateError};
pub use extract::{Extractor, HeuristicExtractor};
pub use orchestrator::{BuildResult, Orchestrator, RefinementOutcome, Stage, StageResult, StageStatus};
pub use prompts::PromptTemplateStore;
pub use store::{ArtifactStore, RetrievalIndex};
