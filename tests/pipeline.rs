//! Pipeline Integration Tests
//!
//! Runs whole builds against a stub completion provider that answers by
//! agent role, and checks stage results, written files and the history log.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use docforge::core::{HistoryLog, ProviderError};
use docforge::orchestrator::BUILD_STATE_FILE;
use docforge::store::LOGS_DIR;
use docforge::{
    AgentContext, ArtifactKind, ArtifactStore, BuildError, CompletionProvider, Config,
    HeuristicExtractor, Orchestrator, PromptTemplateStore, RetrievalIndex, Stage, StageStatus,
};

// ============================================================================
// Stub Provider
// ============================================================================

const ANALYSIS: &str = "\
# Project Overview
A blog where authors publish posts and readers comment.
## Risks
- Spam comments need moderation
";

const ARCHITECTURE: &str = "\
# High-level Architecture
Web Service: serves pages
Comment Module: stores comments
Built with Rust, React and PostgreSQL
";

const FEATURES: &str = "\
## Core Features
- Publish posts with images
## Enhanced Features
- Comment threading
## Optional Features
- Dark mode
Phase 1: MVP in four weeks
";

const BRD: &str = "\
# Executive Summary
A blog.
# Business Objectives
Grow readership.
# Functional Requirements
- Authors can publish posts with images
- Readers can comment on posts
# Quality Attributes
- Pages load in under two seconds
";

const SRS: &str = "\
# System Overview
- Monolithic web application
# Functional Specifications
Posts and comments.
# Technical Requirements
- Runs on a single server
# Interface Requirements
- REST endpoints for posts and comments
";

const DETAIL: &str = "# Feature Specification\n## User Stories\n- As an author I can publish\n";

const BUSINESS: &str = "# Market Position\nNiche blogging for developers.\n";

const REFINED: &str = "# Refined Content\n## Security\n- Rate limit comment submission\n";

type FailWhen = Box<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Answers by the system prompt of the calling agent.
struct StubProvider {
    fail_when: FailWhen,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubProvider {
    fn new() -> Self {
        Self::failing_when(|_, _| false)
    }

    fn failing_when(predicate: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> Self {
        Self { fail_when: Box::new(predicate), calls: Mutex::new(Vec::new()) }
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for StubProvider {
    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push((prompt.to_string(), system_prompt.to_string()));

        if (self.fail_when)(prompt, system_prompt) {
            return Err(ProviderError::Api { status: 503, body: "model unavailable".to_string() });
        }

        let reply = if system_prompt.contains("expert business analyst") {
            ANALYSIS
        } else if system_prompt.contains("software architect") {
            ARCHITECTURE
        } else if system_prompt.contains("senior product manager") {
            DETAIL
        } else if system_prompt.contains("product manager") {
            FEATURES
        } else if system_prompt.contains("Business Requirements Document") {
            BRD
        } else if system_prompt.contains("Software Requirements") {
            SRS
        } else if system_prompt.contains("business strategist") {
            BUSINESS
        } else {
            REFINED
        };
        Ok(reply.to_string())
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-model"
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.project.name = "Blog Platform".to_string();
    config.output.base_path = dir.join("output");
    config.output.current_version = "v7".to_string();
    config.retrieval.persist_directory = dir.join("vector_store");
    config.prompts.directory = dir.join("prompts");
    config
}

fn orchestrator(config: &Config, provider: &Arc<StubProvider>) -> Orchestrator {
    let ctx = AgentContext::new(
        provider.clone(),
        Arc::new(PromptTemplateStore::new(config.prompts_dir())),
        Arc::new(HeuristicExtractor),
        config.output.current_version.clone(),
    );
    let index =
        RetrievalIndex::open(config.retrieval_path(), config.retrieval.collection_name.clone()).unwrap();
    Orchestrator::new(config.clone(), ctx, ArtifactStore::new(config.output_path(), index))
}

fn setup() -> (TempDir, Config, Arc<StubProvider>) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    (dir, config, Arc::new(StubProvider::new()))
}

fn history_states(config: &Config) -> Vec<String> {
    HistoryLog::in_dir(&config.output_path().join(LOGS_DIR))
        .records()
        .unwrap()
        .into_iter()
        .map(|r| r.state)
        .collect()
}

// ============================================================================
// Build Tests
// ============================================================================

#[tokio::test]
async fn test_blog_build_completes_all_stages() {
    let (_dir, config, provider) = setup();
    let mut orch = orchestrator(&config, &provider);

    let build = orch.build_project("Build a blog with posts and comments", json!({})).await.unwrap();

    let stages: Vec<Stage> = build.stages.keys().copied().collect();
    assert_eq!(stages, Stage::ALL);
    for (stage, result) in &build.stages {
        assert_eq!(result.status, StageStatus::Completed, "stage {stage} failed: {:?}", result.error);
    }
    assert!(build.is_successful());
    assert_eq!(build.version, "v7");

    let report_path = config.output_path().join("state_6_final").join("final_report.md");
    let report = std::fs::read_to_string(report_path).unwrap();
    assert!(report.contains("Blog Platform"));
    assert!(report.contains("v7"));

    // analysis, architecture, features, brd, srs
    assert_eq!(provider.calls().len(), 5);
}

#[tokio::test]
async fn test_build_writes_layout_and_history() {
    let (_dir, config, provider) = setup();
    let mut orch = orchestrator(&config, &provider);

    let build = orch.build_project("Build a blog with posts and comments", json!({})).await.unwrap();
    let root = config.output_path();

    for file in [
        "state_1_analysis/analysis_overview.md",
        "state_2_architecture/system_architecture.md",
        "state_3_features/feature_list.md",
        "state_4_documents/brd.md",
        "state_4_documents/srs.md",
        "state_5_validation/validation_report.json",
        "state_6_final/final_report.md",
        "logs/build_state.json",
    ] {
        assert!(root.join(file).is_file(), "missing {file}");
    }

    let brd = std::fs::read_to_string(root.join("state_4_documents/brd.md")).unwrap();
    assert!(brd.starts_with("# BRD - Blog Platform"));

    assert_eq!(
        history_states(&config),
        [
            "analysis_complete",
            "architecture_complete",
            "features_complete",
            "documents_complete",
            "validation_complete",
            "final_report_complete",
            "build_complete",
        ]
    );

    // Structured data flows from the extraction pass
    let documents = build.stage(Stage::Documents).unwrap();
    let brd = documents.artifact(ArtifactKind::Brd).unwrap();
    assert_eq!(
        brd.structured().requirements,
        ["Authors can publish posts with images", "Readers can comment on posts"]
    );

    // Every non-empty artifact was indexed
    assert!(orch.store().index().stats().count >= 7);
    let hits = orch.store().index().query("comment threading publish posts", 3);
    assert!(!hits.is_empty());
}

#[tokio::test]
async fn test_upstream_text_is_threaded_into_prompts() {
    let (_dir, config, provider) = setup();
    let mut orch = orchestrator(&config, &provider);

    orch.build_project("Build a blog with posts and comments", json!({})).await.unwrap();

    let calls = provider.calls();
    assert!(calls[0].0.contains("Requirements: Build a blog with posts and comments"));
    assert!(calls[1].0.contains("A blog where authors publish posts"));
    assert!(calls[2].0.contains("Web Service: serves pages"));
    assert!(calls[4].0.contains("Features: ## Core Features"));
}

#[tokio::test]
async fn test_architecture_failure_does_not_abort() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let provider = Arc::new(StubProvider::failing_when(|_, system| system.contains("software architect")));
    let mut orch = orchestrator(&config, &provider);

    let build = orch.build_project("Build a blog with posts and comments", json!({})).await.unwrap();

    let architecture = build.stage(Stage::Architecture).unwrap();
    assert_eq!(architecture.status, StageStatus::Failed);
    assert!(architecture.error.as_deref().unwrap().contains("503"));
    assert!(architecture.artifact(ArtifactKind::Architecture).unwrap().text().is_empty());

    assert_eq!(build.stage(Stage::Features).unwrap().status, StageStatus::Completed);
    assert_eq!(build.stage(Stage::Final).unwrap().status, StageStatus::Completed);
    assert_eq!(build.stages.len(), 6);

    // The feature planner received the empty architecture
    let calls = provider.calls();
    let features_prompt = &calls.iter().find(|(_, system)| system.contains("product manager")).unwrap().0;
    assert!(features_prompt.contains("Architecture: \n"));

    let report =
        std::fs::read_to_string(config.output_path().join("state_6_final/final_report.md")).unwrap();
    assert!(report.contains("### Architecture Phase\n- Status: failed"));
}

#[tokio::test]
async fn test_detailed_features_fan_out() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let provider = Arc::new(StubProvider::failing_when(|prompt, system| {
        system.contains("senior product manager") && prompt.contains("Comment threading")
    }));
    let mut orch = orchestrator(&config, &provider).with_detailed_features(true);

    let build = orch.build_project("Build a blog with posts and comments", json!({})).await.unwrap();

    let features = build.stage(Stage::Features).unwrap();
    assert_eq!(features.status, StageStatus::Completed);
    assert_eq!(features.details.len(), 3);
    assert_eq!(features.details.values().filter(|d| d.is_failed()).count(), 1);
    assert!(features.details["Comment threading"].is_failed());

    let features_dir = config.output_path().join("state_3_features");
    assert!(features_dir.join("features/publish_posts_with_images.md").is_file());
    assert!(features_dir.join("features/dark_mode.md").is_file());
    assert!(!features_dir.join("features/comment_threading.md").exists());

    let summary = std::fs::read_to_string(features_dir.join("detailed_features_summary.md")).unwrap();
    assert!(summary.contains("## Comment threading\n\n**Error:**"));

    // feature_list.md, two specs, the summary
    assert_eq!(features.files.len(), 4);

    // One aggregated history record for the stage
    let states = history_states(&config);
    assert_eq!(states.iter().filter(|s| *s == "features_complete").count(), 1);
}

#[tokio::test]
async fn test_business_analysis_runs_with_market_context() {
    let (_dir, config, provider) = setup();
    let mut orch = orchestrator(&config, &provider);

    let context = json!({"business_needs": "Grow a developer audience", "market_context": "Crowded"});
    let build = orch.build_project("Build a blog", context).await.unwrap();

    let analysis = build.stage(Stage::Analysis).unwrap();
    assert_eq!(analysis.artifacts.len(), 2);
    assert_eq!(analysis.files.len(), 2);

    let business =
        std::fs::read_to_string(config.output_path().join("state_1_analysis/business_analysis.md")).unwrap();
    assert!(business.contains("Grow a developer audience"));
    assert!(business.contains("Niche blogging for developers."));
}

#[tokio::test]
async fn test_document_write_failure_keeps_written_files() {
    let (_dir, config, provider) = setup();
    let documents_dir = config.output_path().join("state_4_documents");
    std::fs::create_dir_all(documents_dir.join("srs.md")).unwrap();
    let mut orch = orchestrator(&config, &provider);

    let build = orch.build_project("Build a blog with posts and comments", json!({})).await.unwrap();

    let documents = build.stage(Stage::Documents).unwrap();
    assert_eq!(documents.status, StageStatus::Failed);
    assert!(documents.error.as_deref().unwrap().contains("srs.md"));
    assert_eq!(documents.files, [documents_dir.join("brd.md")]);
    assert!(build.files().any(|f| f.ends_with("state_4_documents/brd.md")));

    assert_eq!(build.stage(Stage::Final).unwrap().status, StageStatus::Completed);
    let report =
        std::fs::read_to_string(config.output_path().join("state_6_final/final_report.md")).unwrap();
    assert!(report.contains("### Documents Phase\n- Status: failed\n- Files: 1"));
    assert!(report.contains(&documents_dir.join("brd.md").display().to_string()));
}

#[tokio::test]
async fn test_feature_spec_write_failure_is_isolated() {
    let (_dir, config, provider) = setup();
    let features_dir = config.output_path().join("state_3_features");
    std::fs::create_dir_all(features_dir.join("features/publish_posts_with_images.md")).unwrap();
    let mut orch = orchestrator(&config, &provider).with_detailed_features(true);

    let build = orch.build_project("Build a blog with posts and comments", json!({})).await.unwrap();

    let features = build.stage(Stage::Features).unwrap();
    assert_eq!(features.status, StageStatus::Failed);
    assert_eq!(
        features.files,
        [
            features_dir.join("feature_list.md"),
            features_dir.join("features/comment_threading.md"),
            features_dir.join("features/dark_mode.md"),
            features_dir.join("detailed_features_summary.md"),
        ]
    );
    for file in &features.files {
        assert!(file.is_file(), "missing {}", file.display());
    }

    // The plan still flows downstream
    assert_eq!(build.stage(Stage::Documents).unwrap().status, StageStatus::Completed);
}

#[test]
fn test_setup_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, "not a directory").unwrap();
    config.output.base_path = blocker;

    let provider = Arc::new(StubProvider::new());
    let mut orch = orchestrator(&config, &provider);

    let result = tokio_test::block_on(orch.build_project("Build a blog", json!({})));
    assert!(matches!(result, Err(BuildError::Setup(_))));
    assert!(provider.calls().is_empty());
}

// ============================================================================
// Refinement Tests
// ============================================================================

#[tokio::test]
async fn test_refine_documents() {
    let (_dir, config, provider) = setup();
    let mut orch = orchestrator(&config, &provider);
    orch.build_project("Build a blog with posts and comments", json!({})).await.unwrap();

    let feedback = vec!["Please add missing security requirements".to_string()];
    let outcome = orch.refine_with_feedback(&feedback, Stage::Documents).await.unwrap();

    assert!(outcome.is_successful());
    let refined_dir = config.output_path().join("state_4_documents/refined");
    let expected: Vec<PathBuf> = vec![refined_dir.join("refined_brd.md"), refined_dir.join("refined_srs.md")];
    assert_eq!(outcome.files, expected);

    let refined = std::fs::read_to_string(&expected[0]).unwrap();
    assert!(refined.starts_with(REFINED));
    assert!(refined.contains("- Strategy: completeness_check"));

    // The recorded build keeps the original artifacts
    let original = std::fs::read_to_string(config.output_path().join("state_4_documents/brd.md")).unwrap();
    assert!(original.contains("# Executive Summary"));
    let build = orch.last_build().unwrap();
    let brd = build.stage(Stage::Documents).unwrap().artifact(ArtifactKind::Brd).unwrap();
    assert!(!brd.metadata().refined);

    assert_eq!(history_states(&config).last().map(String::as_str), Some("documents_refined"));
}

#[tokio::test]
async fn test_refine_loads_previous_build_from_disk() {
    let (_dir, config, provider) = setup();
    orchestrator(&config, &provider)
        .build_project("Build a blog with posts and comments", json!({}))
        .await
        .unwrap();
    assert!(config.output_path().join(LOGS_DIR).join(BUILD_STATE_FILE).is_file());

    // A fresh orchestrator, as in a later process
    let mut orch = orchestrator(&config, &provider);
    let feedback = vec!["The overview is unclear".to_string(), "Add a risks section".to_string()];
    let outcome = orch.refine_with_feedback(&feedback, Stage::Analysis).await.unwrap();

    assert_eq!(outcome.files.len(), 1);
    let refined = std::fs::read_to_string(&outcome.files[0]).unwrap();
    assert!(refined.contains("- Total refinement rounds: 2"));
    assert!(refined.contains("**Round 1**: The overview is unclear"));
}

#[tokio::test]
async fn test_refine_without_build() {
    let (_dir, config, provider) = setup();
    let mut orch = orchestrator(&config, &provider);

    let result = orch.refine_with_feedback(&["anything".to_string()], Stage::Documents).await;
    assert!(matches!(result, Err(BuildError::NoPreviousBuild)));
}

#[tokio::test]
async fn test_refine_rejects_unrefinable_stage() {
    let (_dir, config, provider) = setup();
    let mut orch = orchestrator(&config, &provider);

    let result = orch.refine_with_feedback(&["anything".to_string()], Stage::Validation).await;
    assert!(matches!(result, Err(BuildError::NotRefinable(stage)) if stage == "validation"));
}

#[tokio::test]
async fn test_refine_requires_feedback() {
    let (_dir, config, provider) = setup();
    let mut orch = orchestrator(&config, &provider);
    orch.build_project("Build a blog with posts and comments", json!({})).await.unwrap();
    let calls = provider.calls().len();

    let result = orch.refine_with_feedback(&[], Stage::Documents).await;
    assert!(matches!(result, Err(BuildError::NoFeedback)));
    assert_eq!(provider.calls().len(), calls);
    assert!(!config.output_path().join("state_4_documents/refined").exists());
    assert_eq!(history_states(&config).last().map(String::as_str), Some("build_complete"));
}
