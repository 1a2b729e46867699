//! Pipeline agents.
//!
//! Each agent turns upstream artifacts into one new [`Artifact`] by resolving
//! a prompt template, calling the completion provider and running extraction
//! over the response. Agents hold no state between calls.
//!
//! A provider failure never escapes an agent: it becomes a degraded artifact
//! with empty text and [`Artifact::error`] set.

mod analyzer;
mod architect;
mod document_writer;
mod feature_planner;
mod refiner;
mod validator;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use analyzer::{render_business_analysis, render_overview, Analyzer};
pub use architect::{render as render_architecture, Architect};
pub use document_writer::{render as render_document, DocumentKind, DocumentWriter};
pub use feature_planner::{
    render_detail_summary, render_plan as render_feature_plan, FeatureDetail, FeaturePlanner,
};
pub use refiner::{
    identify_improvements, render_iterative, render_refinement, select_strategy,
    IterativeRefinement, Refinement, RefinementRound, RefinementStrategy, Refiner,
};
pub use validator::{DocKind, ProjectValidation, ValidationReport, ValidationSummary, Validator};

use crate::ai::CompletionProvider;
use crate::extract::{Extractor, FeatureCategories, Sections, TechnologyStack, Timeline};
use crate::prompts::PromptTemplateStore;

/// What an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Analysis,
    Architecture,
    Features,
    FeatureDetail,
    Brd,
    Srs,
    Validation,
    Final,
}

impl ArtifactKind {
    /// Lowercase name used in metadata and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Architecture => "architecture",
            Self::Features => "features",
            Self::FeatureDetail => "feature_detail",
            Self::Brd => "brd",
            Self::Srs => "srs",
            Self::Validation => "validation",
            Self::Final => "final",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data derived from an artifact's text by extraction.
///
/// Which fields are populated depends on the artifact kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Structured {
    pub sections: Sections,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technical_requirements: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology_stack: Option<TechnologyStack>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_categories: Option<FeatureCategories>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
}

impl Structured {
    /// Run the full extraction for `kind` over `text`.
    pub fn extract(kind: ArtifactKind, text: &str, extractor: &dyn Extractor) -> Self {
        let mut structured = Self { sections: extractor.sections(text), ..Self::default() };

        match kind {
            ArtifactKind::Architecture => {
                structured.components = extractor.components(text);
                structured.technology_stack = Some(extractor.technology_stack(text));
            }
            ArtifactKind::Features => {
                structured.feature_categories = Some(extractor.feature_categories(text));
                structured.timeline = Some(extractor.timeline(text));
            }
            ArtifactKind::Brd => structured.requirements = extractor.requirements(text),
            ArtifactKind::Srs => {
                structured.technical_requirements = extractor.technical_requirements(text);
            }
            ArtifactKind::Analysis
            | ArtifactKind::FeatureDetail
            | ArtifactKind::Validation
            | ArtifactKind::Final => {}
        }

        structured
    }
}

/// Who produced an artifact, from what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Producing agent
    pub agent: String,
    /// Pipeline version label
    pub version: String,
    /// Upstream artifact kinds this one was generated from
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Creation time
    pub generated_at: DateTime<Utc>,
    /// Set when produced by refinement
    #[serde(default)]
    pub refined: bool,
    /// Feedback that drove the refinement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Document revision, for BRD/SRS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_version: Option<String>,
}

impl ArtifactMetadata {
    /// Metadata for a freshly generated artifact.
    pub fn new(agent: impl Into<String>, version: impl Into<String>, inputs: &[&str]) -> Self {
        Self {
            agent: agent.into(),
            version: version.into(),
            inputs: inputs.iter().map(|s| (*s).to_string()).collect(),
            generated_at: Utc::now(),
            refined: false,
            feedback: None,
            document_version: None,
        }
    }

    /// Set the document revision.
    pub fn with_document_version(mut self, document_version: impl Into<String>) -> Self {
        self.document_version = Some(document_version.into());
        self
    }

    /// Copy of this metadata marked as refined with the given feedback.
    pub fn refined_with(&self, feedback: &str) -> Self {
        Self {
            generated_at: Utc::now(),
            refined: true,
            feedback: Some(feedback.to_string()),
            ..self.clone()
        }
    }
}

/// The unit passed between pipeline stages.
///
/// Artifacts are immutable. The structured data is always the extraction of
/// the text; producing new text means producing a new artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    kind: ArtifactKind,
    primary_text: String,
    structured: Structured,
    metadata: ArtifactMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Artifact {
    /// Build an artifact, extracting structured data from `text`.
    pub fn new(
        kind: ArtifactKind,
        text: impl Into<String>,
        metadata: ArtifactMetadata,
        extractor: &dyn Extractor,
    ) -> Self {
        let primary_text = text.into();
        let structured = Structured::extract(kind, &primary_text, extractor);
        Self { kind, primary_text, structured, metadata, error: None }
    }

    /// An empty placeholder standing in for a failed generation.
    pub fn degraded(kind: ArtifactKind, metadata: ArtifactMetadata, error: impl Into<String>) -> Self {
        Self {
            kind,
            primary_text: String::new(),
            structured: Structured::default(),
            metadata,
            error: Some(error.into()),
        }
    }

    /// A new artifact of the same kind with revised text and metadata.
    pub fn revise(
        &self,
        text: impl Into<String>,
        metadata: ArtifactMetadata,
        extractor: &dyn Extractor,
    ) -> Self {
        Self::new(self.kind, text, metadata, extractor)
    }

    /// This artifact with an error attached, keeping its text.
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..self.clone() }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.primary_text
    }

    pub fn structured(&self) -> &Structured {
        &self.structured
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the producing stage failed.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Collaborators every agent needs.
#[derive(Clone)]
pub struct AgentContext {
    pub provider: Arc<dyn CompletionProvider>,
    pub prompts: Arc<PromptTemplateStore>,
    pub extractor: Arc<dyn Extractor>,
    pub version: String,
}

impl AgentContext {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        prompts: Arc<PromptTemplateStore>,
        extractor: Arc<dyn Extractor>,
        version: impl Into<String>,
    ) -> Self {
        Self { provider, prompts, extractor, version: version.into() }
    }

    /// Resolve a template, call the provider and wrap the result.
    ///
    /// Provider failures are logged and returned as a degraded artifact.
    async fn generate(
        &self,
        kind: ArtifactKind,
        template: &str,
        vars: &[(&str, &str)],
        system_prompt: &str,
        metadata: ArtifactMetadata,
    ) -> Artifact {
        let prompt = self.prompts.resolve(template, vars);

        match self.provider.complete(&prompt, system_prompt).await {
            Ok(text) => Artifact::new(kind, text, metadata, self.extractor.as_ref()),
            Err(e) => {
                tracing::error!(agent = %metadata.agent, kind = %kind, error = %e, "Generation failed");
                Artifact::degraded(kind, metadata, e.to_string())
            }
        }
    }

    /// Re-run generation on an existing artifact with feedback.
    ///
    /// On provider failure the input artifact is returned unchanged.
    async fn refine_with(
        &self,
        artifact: &Artifact,
        feedback: &str,
        prompt: &str,
        system_prompt: &str,
    ) -> Artifact {
        match self.provider.complete(prompt, system_prompt).await {
            Ok(text) => artifact.revise(
                text,
                artifact.metadata().refined_with(feedback),
                self.extractor.as_ref(),
            ),
            Err(e) => {
                tracing::error!(agent = %artifact.metadata().agent, kind = %artifact.kind(), error = %e, "Refinement failed");
                artifact.clone()
            }
        }
    }
}

/// Bulleted list, one item per line.
fn bullet_list<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items.into_iter().map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n")
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::HeuristicExtractor;

    #[test]
    fn test_structured_follows_kind() {
        let text = "# Architecture\nAuth Service: login\nBuilt with Rust and Redis";
        let artifact = Artifact::new(
            ArtifactKind::Architecture,
            text,
            ArtifactMetadata::new("Architect", "v1", &["analysis"]),
            &HeuristicExtractor,
        );

        let structured = artifact.structured();
        assert_eq!(structured.components, ["Auth Service"]);
        let stack = structured.technology_stack.as_ref().unwrap();
        assert_eq!(stack.backend, ["rust"]);
        assert_eq!(stack.database, ["redis"]);
        assert!(structured.feature_categories.is_none());
    }

    #[test]
    fn test_revise_reruns_extraction() {
        let meta = ArtifactMetadata::new("DocumentWriter", "v1", &["analysis", "features"]);
        let brd = Artifact::new(ArtifactKind::Brd, "# Intro\nnothing", meta.clone(), &HeuristicExtractor);
        assert!(brd.structured().requirements.is_empty());

        let revised = brd.revise(
            "# Functional Requirements\n- Users can publish posts",
            meta.refined_with("add requirements"),
            &HeuristicExtractor,
        );
        assert_eq!(revised.structured().requirements, ["Users can publish posts"]);
        assert!(revised.metadata().refined);
        assert_eq!(revised.metadata().feedback.as_deref(), Some("add requirements"));
        // The original is untouched
        assert!(!brd.metadata().refined);
    }

    #[test]
    fn test_degraded_artifact() {
        let artifact = Artifact::degraded(
            ArtifactKind::Srs,
            ArtifactMetadata::new("DocumentWriter", "v1", &[]),
            "API error (500): boom",
        );
        assert!(artifact.is_degraded());
        assert_eq!(artifact.text(), "");
        assert!(artifact.structured().sections.is_empty());
    }

    #[test]
    fn test_artifact_serde_roundtrip() {
        let artifact = Artifact::new(
            ArtifactKind::Features,
            "## Core\n- Login\nPhase 1: MVP",
            ArtifactMetadata::new("FeaturePlanner", "v1", &["analysis", "architecture"]),
            &HeuristicExtractor,
        );
        let json = serde_json::to_string(&artifact).unwrap();
        let back: Artifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, artifact);
        assert_eq!(back.structured().timeline.as_ref().unwrap()["Phase 1"], "MVP");
    }
}
