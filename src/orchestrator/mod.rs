//! Pipeline orchestration.
//!
//! The [`Orchestrator`] runs the six stages in fixed order:
//!
//! 1. `analysis` - requirements analysis, plus business analysis when the
//!    context carries `business_needs` and `market_context`
//! 2. `architecture` - system design
//! 3. `features` - feature plan, optionally one spec per feature
//! 4. `documents` - BRD and SRS
//! 5. `validation` - every markdown file under the output root
//! 6. `final` - the build report
//!
//! Each stage is a failure boundary. A stage whose agent degrades, or whose
//! outputs cannot be written, is recorded as failed and the next stage runs
//! with whatever the failed one produced. Only output setup can abort a build.

mod report;
mod stage;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::json;

pub use report::render as render_final_report;
pub use stage::{BuildResult, Stage, StageResult, StageStatus};

use crate::agents::{
    render_architecture, render_business_analysis, render_detail_summary, render_document,
    render_feature_plan, render_iterative, render_overview, render_refinement, AgentContext,
    Analyzer, Architect, Artifact, ArtifactKind, ArtifactMetadata, DocumentKind, DocumentWriter,
    FeatureDetail, FeaturePlanner, Refiner, Validator,
};
use crate::ai::build_provider;
use crate::core::{BuildError, Config, HistoryRecord, PersistenceError};
use crate::extract::{Extractor, HeuristicExtractor};
use crate::prompts::PromptTemplateStore;
use crate::store::{ArtifactStore, Metadata, RetrievalIndex, LOGS_DIR};

/// File under `logs/` holding the last build.
pub const BUILD_STATE_FILE: &str = "build_state.json";

const AGENT: &str = "Orchestrator";

/// Refined artifacts written by [`Orchestrator::refine_with_feedback`].
#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    pub stage: Stage,
    pub artifacts: Vec<Artifact>,
    pub files: Vec<PathBuf>,
}

impl RefinementOutcome {
    /// Whether every refinement call succeeded.
    pub fn is_successful(&self) -> bool {
        self.artifacts.iter().all(|a| !a.is_degraded())
    }
}

/// Drives the document pipeline.
pub struct Orchestrator {
    config: Config,
    extractor: Arc<dyn Extractor>,
    analyzer: Analyzer,
    architect: Architect,
    feature_planner: FeaturePlanner,
    document_writer: DocumentWriter,
    refiner: Refiner,
    validator: Validator,
    store: ArtifactStore,
    detailed_features: bool,
    last_build: Option<BuildResult>,
}

impl Orchestrator {
    /// Create an orchestrator from already-built collaborators.
    pub fn new(config: Config, ctx: AgentContext, store: ArtifactStore) -> Self {
        Self {
            config,
            extractor: Arc::clone(&ctx.extractor),
            analyzer: Analyzer::new(ctx.clone()),
            architect: Architect::new(ctx.clone()),
            feature_planner: FeaturePlanner::new(ctx.clone()),
            document_writer: DocumentWriter::new(ctx.clone()),
            refiner: Refiner::new(ctx),
            validator: Validator::new(),
            store,
            detailed_features: false,
            last_build: None,
        }
    }

    /// Build the provider, prompt store and artifact store from configuration.
    pub fn from_config(config: Config) -> Result<Self, BuildError> {
        let provider = build_provider(&config.llm)?;
        let prompts = Arc::new(PromptTemplateStore::new(config.prompts_dir()));
        let ctx = AgentContext::new(
            provider,
            prompts,
            Arc::new(HeuristicExtractor),
            config.output.current_version.clone(),
        );

        let index = RetrievalIndex::open(config.retrieval_path(), config.retrieval.collection_name.clone())
            .map_err(BuildError::Setup)?;
        let store = ArtifactStore::new(config.output_path(), index);

        Ok(Self::new(config, ctx, store))
    }

    /// Also generate one specification per planned feature.
    pub fn with_detailed_features(mut self, enabled: bool) -> Self {
        self.detailed_features = enabled;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn last_build(&self) -> Option<&BuildResult> {
        self.last_build.as_ref()
    }

    fn version(&self) -> &str {
        &self.config.output.current_version
    }

    /// Run all six stages.
    ///
    /// Returns `Err` only when the output layout cannot be set up; stage
    /// failures are reported in the result.
    pub async fn build_project(
        &mut self,
        requirements: &str,
        context: serde_json::Value,
    ) -> Result<BuildResult, BuildError> {
        let dirs: Vec<&str> = Stage::ALL.iter().map(Stage::dir_name).collect();
        self.store.prepare(&dirs).map_err(BuildError::Setup)?;

        tracing::info!(version = %self.version(), root = %self.store.root().display(), "Starting project build");
        let started = Instant::now();
        let mut build = BuildResult::start(self.version(), requirements, context);

        let result = self.run_analysis(requirements, &build.context).await;
        self.conclude(&mut build, Stage::Analysis, result);
        let analysis = self.upstream(&build, Stage::Analysis, ArtifactKind::Analysis);

        let result = self.run_architecture(&analysis, requirements).await;
        self.conclude(&mut build, Stage::Architecture, result);
        let architecture = self.upstream(&build, Stage::Architecture, ArtifactKind::Architecture);

        let result = self.run_features(&analysis, &architecture).await;
        self.conclude(&mut build, Stage::Features, result);
        let features = self.upstream(&build, Stage::Features, ArtifactKind::Features);

        let result = self.run_documents(&analysis, &architecture, &features).await;
        self.conclude(&mut build, Stage::Documents, result);

        let result = self.run_validation();
        self.conclude(&mut build, Stage::Validation, result);

        build.duration_secs = started.elapsed().as_secs_f64();
        let result = self.run_final(&build);
        self.conclude(&mut build, Stage::Final, result);

        build.finished_at = Some(Utc::now());
        build.duration_secs = started.elapsed().as_secs_f64();

        if let Err(e) = self.store.write_json(LOGS_DIR, BUILD_STATE_FILE, &build) {
            tracing::warn!(error = %e, "Failed to persist build state");
        }

        let files: Vec<PathBuf> = build.files().cloned().collect();
        let record = HistoryRecord::new(
            "build_complete",
            files,
            self.version(),
            json!({ "build_id": build.build_id, "duration": build.duration_secs }),
        );
        if let Err(e) = self.store.record(&record) {
            tracing::warn!(error = %e, "Failed to append history record");
        }

        tracing::info!(
            duration_secs = build.duration_secs,
            successful = build.is_successful(),
            "Project build completed"
        );

        self.last_build = Some(build.clone());
        Ok(build)
    }

    /// Refine the artifacts of a previous build's stage.
    ///
    /// One feedback text runs a single refinement; several run an iterative
    /// refinement in order. Results go to `<stage dir>/refined/` and the
    /// recorded build is left untouched.
    pub async fn refine_with_feedback(
        &mut self,
        feedback: &[String],
        stage: Stage,
    ) -> Result<RefinementOutcome, BuildError> {
        if !stage.is_refinable() {
            return Err(BuildError::NotRefinable(stage.to_string()));
        }
        if feedback.is_empty() {
            return Err(BuildError::NoFeedback);
        }

        let build = match &self.last_build {
            Some(build) => build.clone(),
            None => self
                .store
                .read_json::<BuildResult>(LOGS_DIR, BUILD_STATE_FILE)?
                .ok_or(BuildError::NoPreviousBuild)?,
        };
        let result = build.stage(stage).ok_or(BuildError::NoPreviousBuild)?;

        tracing::info!(stage = %stage, rounds = feedback.len(), "Refining stage based on feedback");

        let mut artifacts = Vec::new();
        let mut written = Written::default();

        for kind in stage.refinable_kinds() {
            let Some(original) = result.artifact(*kind) else {
                tracing::warn!(stage = %stage, kind = %kind, "No artifact to refine");
                continue;
            };

            let (refined, content) = match feedback {
                [single] => {
                    let refinement = self.refiner.refine(original.text(), single, *kind).await;
                    let content = render_refinement(&refinement);
                    (refinement.artifact, content)
                }
                rounds => {
                    let refinement = self.refiner.iterative_refine(original.text(), rounds, *kind).await;
                    let content = render_iterative(&refinement);
                    (refinement.artifact, content)
                }
            };

            self.save(&mut written, stage, &format!("refined/refined_{kind}.md"), &content, Some(&refined));
            artifacts.push(refined);
        }

        let record = HistoryRecord::new(
            format!("{stage}_refined"),
            written.files.clone(),
            self.version(),
            json!({ "feedback": feedback, "refined": artifacts.len() }),
        );
        self.store.record(&record)?;

        if let Some(e) = written.error {
            return Err(e.into());
        }
        Ok(RefinementOutcome { stage, artifacts, files: written.files })
    }

    async fn run_analysis(&mut self, requirements: &str, context: &serde_json::Value) -> StageResult {
        tracing::info!("Running stage 1: analysis");
        let started = Instant::now();

        let mut artifacts = vec![self.analyzer.analyze_requirements(requirements, context).await];
        let business = business_inputs(context);
        if let Some((needs, market)) = &business {
            artifacts.push(self.analyzer.analyze_business_needs(needs, market).await);
        }

        let written = self.persist_analysis(
            requirements,
            business.as_ref().map(|(needs, _)| needs.as_str()),
            &artifacts,
        );
        finish(artifacts, written, started)
    }

    fn persist_analysis(
        &mut self,
        requirements: &str,
        business_needs: Option<&str>,
        artifacts: &[Artifact],
    ) -> Written {
        let mut written = Written::default();

        if let Some(analysis) = artifacts.first() {
            let content = render_overview(requirements, analysis);
            self.save(&mut written, Stage::Analysis, "analysis_overview.md", &content, Some(analysis));
        }
        if let (Some(needs), Some(business)) = (business_needs, artifacts.get(1)) {
            let content = render_business_analysis(needs, business);
            self.save(&mut written, Stage::Analysis, "business_analysis.md", &content, Some(business));
        }

        written
    }

    async fn run_architecture(&mut self, analysis: &Artifact, requirements: &str) -> StageResult {
        tracing::info!("Running stage 2: architecture");
        let started = Instant::now();

        let architecture = self.architect.design(analysis, requirements).await;
        let mut written = Written::default();
        let content = render_architecture(&architecture);
        self.save(&mut written, Stage::Architecture, "system_architecture.md", &content, Some(&architecture));

        finish(vec![architecture], written, started)
    }

    async fn run_features(&mut self, analysis: &Artifact, architecture: &Artifact) -> StageResult {
        tracing::info!("Running stage 3: features");
        let started = Instant::now();

        let plan = self.feature_planner.plan(analysis, architecture).await;
        let details = if self.detailed_features {
            self.feature_planner
                .generate_detailed_features(&plan, self.config.features.max_filename_length)
                .await
        } else {
            IndexMap::new()
        };

        let written = self.persist_features(&plan, &details);
        let mut result = finish(vec![plan], written, started);
        result.details = details;
        result
    }

    fn persist_features(
        &mut self,
        plan: &Artifact,
        details: &IndexMap<String, FeatureDetail>,
    ) -> Written {
        let mut written = Written::default();
        self.save(&mut written, Stage::Features, "feature_list.md", &render_feature_plan(plan), Some(plan));

        if details.is_empty() {
            return written;
        }

        // One spec failing to write does not stop the others.
        for detail in details.values().filter(|d| !d.is_failed()) {
            let name = detail.relative_path();
            self.save(&mut written, Stage::Features, &name, detail.artifact.text(), Some(&detail.artifact));
        }
        let summary = render_detail_summary(details);
        self.save(&mut written, Stage::Features, "detailed_features_summary.md", &summary, None);

        written
    }

    async fn run_documents(&mut self, analysis: &Artifact, architecture: &Artifact, features: &Artifact) -> StageResult {
        tracing::info!("Running stage 4: documents");
        let started = Instant::now();

        let brd = self.document_writer.generate_brd(analysis, features).await;
        let srs = self.document_writer.generate_srs(analysis, architecture, features).await;
        let artifacts = vec![brd, srs];

        let written = self.persist_documents(&artifacts);
        finish(artifacts, written, started)
    }

    fn persist_documents(&mut self, documents: &[Artifact]) -> Written {
        let mut written = Written::default();
        for document in documents {
            let Some(kind) = DocumentKind::of(document) else { continue };
            let content = render_document(kind, document, &self.config.project.name);
            self.save(&mut written, Stage::Documents, &kind.file_name(), &content, Some(document));
        }
        written
    }

    fn run_validation(&mut self) -> StageResult {
        tracing::info!("Running stage 5: validation");
        let started = Instant::now();

        let validation = self.validator.validate_output(self.store.root());
        let metadata = ArtifactMetadata::new("Validator", self.version(), &["documents"]);

        let mut written = Written::default();
        let artifact = match serde_json::to_string_pretty(&validation) {
            Ok(report) => {
                let artifact = Artifact::new(ArtifactKind::Validation, report, metadata, self.extractor.as_ref());
                self.save(&mut written, Stage::Validation, "validation_report.json", artifact.text(), Some(&artifact));
                artifact
            }
            Err(e) => {
                let artifact = Artifact::degraded(ArtifactKind::Validation, metadata, e.to_string());
                written.fail(e.into());
                artifact
            }
        };

        let mut result = finish(vec![artifact], written, started);
        result.validation = Some(validation);
        result
    }

    fn run_final(&mut self, build: &BuildResult) -> StageResult {
        tracing::info!("Running stage 6: final report");
        let started = Instant::now();

        let report = render_final_report(build, &self.config, &self.store.index().stats());
        let inputs: Vec<&str> = build.stages.keys().map(Stage::as_str).collect();
        let artifact = Artifact::new(
            ArtifactKind::Final,
            report,
            ArtifactMetadata::new(AGENT, self.version(), &inputs),
            self.extractor.as_ref(),
        );

        let mut written = Written::default();
        self.save(&mut written, Stage::Final, "final_report.md", artifact.text(), Some(&artifact));
        finish(vec![artifact], written, started)
    }

    /// Record a stage result in the build and append its history record.
    fn conclude(&self, build: &mut BuildResult, stage: Stage, result: StageResult) {
        match &result.error {
            Some(error) => tracing::error!(stage = %stage, error = %error, "Stage failed"),
            None => tracing::info!(stage = %stage, files = result.files.len(), "Stage completed"),
        }

        let mut metadata = json!({
            "status": result.status,
            "artifacts": result.artifacts.iter().map(|a| a.kind().as_str()).collect::<Vec<_>>(),
            "duration": result.duration_secs,
        });
        if let Some(error) = &result.error {
            metadata["error"] = json!(error);
        }
        if !result.details.is_empty() {
            metadata["detailed_features"] = json!(result.details.keys().collect::<Vec<_>>());
        }
        if let Some(validation) = &result.validation {
            metadata["overall_valid"] = json!(validation.overall_valid);
        }

        let record = HistoryRecord::new(stage.history_state(), result.files.clone(), self.version(), metadata);
        if let Err(e) = self.store.record(&record) {
            tracing::warn!(stage = %stage, error = %e, "Failed to append history record");
        }

        build.stages.insert(stage, result);
    }

    /// The primary artifact a finished stage produced, or an empty
    /// placeholder when it produced none.
    fn upstream(&self, build: &BuildResult, stage: Stage, kind: ArtifactKind) -> Artifact {
        build.stage(stage).and_then(|result| result.artifact(kind)).cloned().unwrap_or_else(|| {
            Artifact::degraded(
                kind,
                ArtifactMetadata::new(AGENT, self.version(), &[]),
                format!("{stage} stage produced no {kind} artifact"),
            )
        })
    }

    /// Write a file under the stage directory and index the artifact's text.
    ///
    /// A written path is recorded even when indexing it fails afterwards.
    fn save(
        &mut self,
        written: &mut Written,
        stage: Stage,
        name: &str,
        content: &str,
        indexed: Option<&Artifact>,
    ) {
        let path = match self.store.write(stage.dir_name(), name, content) {
            Ok(path) => path,
            Err(e) => return written.fail(e),
        };
        written.files.push(path.clone());

        if let Some(artifact) = indexed {
            let mut metadata = Metadata::new();
            metadata.insert("type".to_string(), json!(artifact.kind()));
            metadata.insert("stage".to_string(), json!(stage));
            metadata.insert("version".to_string(), json!(self.version()));
            metadata.insert("agent".to_string(), json!(artifact.metadata().agent));
            metadata.insert("file".to_string(), json!(path.display().to_string()));
            if let Err(e) = self.store.index_text(artifact.text(), metadata) {
                written.fail(e);
            }
        }
    }
}

/// Paths a stage wrote, in order, and the first persistence failure.
#[derive(Debug, Default)]
struct Written {
    files: Vec<PathBuf>,
    error: Option<PersistenceError>,
}

impl Written {
    fn fail(&mut self, error: PersistenceError) {
        tracing::warn!(error = %error, "Failed to persist stage output");
        self.error.get_or_insert(error);
    }
}

/// Assemble a stage result. The stage fails when writing failed or when
/// any of its artifacts is degraded.
fn finish(artifacts: Vec<Artifact>, written: Written, started: Instant) -> StageResult {
    let Written { files, error } = written;
    let error = error
        .map(|e| e.to_string())
        .or_else(|| artifacts.iter().find_map(Artifact::error).map(String::from));

    StageResult {
        status: if error.is_some() { StageStatus::Failed } else { StageStatus::Completed },
        artifacts,
        files,
        details: IndexMap::new(),
        validation: None,
        error,
        duration_secs: started.elapsed().as_secs_f64(),
    }
}

/// `business_needs` and `market_context` from the build context, when both are present.
fn business_inputs(context: &serde_json::Value) -> Option<(String, String)> {
    let text = |key: &str| {
        context.get(key).filter(|v| !v.is_null()).map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        })
    };
    Some((text("business_needs")?, text("market_context")?))
}
