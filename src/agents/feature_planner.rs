//! Feature planning and per-feature specifications.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{bullet_list, AgentContext, Artifact, ArtifactKind, ArtifactMetadata};
use crate::extract::sanitize_feature_filename;

const AGENT: &str = "FeaturePlanner";

const PLAN_SYSTEM_PROMPT: &str =
    "You are a product manager. Create a comprehensive feature plan with clear priorities.";
const DETAIL_SYSTEM_PROMPT: &str =
    "You are a senior product manager. Write a detailed, clear, and actionable feature specification.";
const REFINE_SYSTEM_PROMPT: &str =
    "You are refining a feature plan based on feedback. Balance user needs with technical constraints.";

/// Detailed specification for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDetail {
    /// Feature text as extracted from the plan
    pub feature: String,
    /// Sanitized file stem, unique within one batch
    pub file_stem: String,
    /// The generated specification; degraded when its call failed
    pub artifact: Artifact,
}

impl FeatureDetail {
    /// Whether this feature's call failed.
    pub fn is_failed(&self) -> bool {
        self.artifact.is_degraded()
    }

    /// Path of the spec file relative to the features stage directory.
    pub fn relative_path(&self) -> String {
        format!("features/{}.md", self.file_stem)
    }
}

/// Plans features from an analysis and architecture.
#[derive(Clone)]
pub struct FeaturePlanner {
    ctx: AgentContext,
}

impl FeaturePlanner {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// Produce the categorized feature plan.
    pub async fn plan(&self, analysis: &Artifact, architecture: &Artifact) -> Artifact {
        tracing::info!("Starting feature planning");

        self.ctx
            .generate(
                ArtifactKind::Features,
                "features",
                &[("analysis", analysis.text()), ("architecture", architecture.text())],
                PLAN_SYSTEM_PROMPT,
                ArtifactMetadata::new(AGENT, &self.ctx.version, &["analysis", "architecture"]),
            )
            .await
    }

    /// One completion call per extracted feature, in extraction order.
    ///
    /// A failed call degrades only its own entry. Features are keyed by their
    /// text, so a feature listed twice is detailed once.
    pub async fn generate_detailed_features(
        &self,
        features: &Artifact,
        max_filename_len: usize,
    ) -> IndexMap<String, FeatureDetail> {
        let categories = features.structured().feature_categories.clone().unwrap_or_default();
        tracing::info!(total = categories.len(), "Generating detailed feature specifications");

        let mut details: IndexMap<String, FeatureDetail> = IndexMap::new();

        for feature in categories.all() {
            if details.contains_key(feature) {
                continue;
            }

            let file_stem = unique_stem(feature, max_filename_len, &details);
            let artifact = self
                .ctx
                .generate(
                    ArtifactKind::FeatureDetail,
                    "feature_detail",
                    &[("feature", feature.as_str())],
                    DETAIL_SYSTEM_PROMPT,
                    ArtifactMetadata::new(AGENT, &self.ctx.version, &["features"]),
                )
                .await;

            if let Some(error) = artifact.error() {
                tracing::warn!(feature = %feature, error, "Feature detail failed");
            }

            details.insert(
                feature.clone(),
                FeatureDetail { feature: feature.clone(), file_stem, artifact },
            );
        }

        let failed = details.values().filter(|d| d.is_failed()).count();
        tracing::info!(total = details.len(), failed, "Detailed feature specifications generated");
        details
    }

    /// Refine a feature plan with feedback.
    pub async fn refine(&self, features: &Artifact, feedback: &str) -> Artifact {
        tracing::info!("Refining feature plan based on feedback");

        let prompt = format!(
            "\nOriginal Feature Plan:\n{}\n\nFeedback:\n{}\n\nPlease refine the feature plan based on the feedback \
             provided. Adjust priorities and add/remove features as needed.\n",
            features.text(),
            feedback
        );

        self.ctx.refine_with(features, feedback, &prompt, REFINE_SYSTEM_PROMPT).await
    }
}

/// Sanitized stem for `feature`. When two different features sanitize to the
/// same stem, the later one gets a short content hash suffix.
fn unique_stem(feature: &str, max_len: usize, taken: &IndexMap<String, FeatureDetail>) -> String {
    let stem = sanitize_feature_filename(feature, max_len);
    if !taken.values().any(|d| d.file_stem == stem) {
        return stem;
    }

    let digest = format!("{:x}", Sha256::digest(feature.as_bytes()));
    let suffix = &digest[..8];
    let base_len = max_len.saturating_sub(suffix.len() + 1);
    if base_len == 0 {
        // No room for a readable prefix: the hash alone, cut to the limit.
        return suffix[..max_len.clamp(1, suffix.len())].to_string();
    }

    let base = sanitize_feature_filename(feature, base_len);
    format!("{base}_{suffix}")
}

/// Render `feature_list.md`.
pub fn render_plan(features: &Artifact) -> String {
    let structured = features.structured();
    let categories = structured.feature_categories.clone().unwrap_or_default();
    let timeline = structured
        .timeline
        .iter()
        .flatten()
        .map(|(phase, desc)| format!("**{phase}**: {desc}"))
        .collect::<Vec<_>>()
        .join("\n");
    let meta = features.metadata();

    format!(
        "# Feature Plan\n\n\
         ## Feature Overview\n{}\n\n\
         ## Feature Categories\n\n\
         ### Core Features (Must-Have)\n{}\n\n\
         ### Enhanced Features (Should-Have)\n{}\n\n\
         ### Optional Features (Nice-to-Have)\n{}\n\n\
         ## Implementation Timeline\n{timeline}\n\n\
         ## Metadata\n\
         - Agent: {}\n\
         - Version: {}\n\
         - Based on: {}\n",
        features.text(),
        bullet_list(&categories.core),
        bullet_list(&categories.enhanced),
        bullet_list(&categories.optional),
        meta.agent,
        meta.version,
        meta.inputs.join(", "),
    )
}

/// Render `detailed_features_summary.md`.
pub fn render_detail_summary(details: &IndexMap<String, FeatureDetail>) -> String {
    let mut out = String::from("# Detailed Feature Specifications\n\n");

    for (feature, detail) in details {
        out.push_str(&format!("## {feature}\n\n"));
        match detail.artifact.error() {
            Some(error) => out.push_str(&format!("**Error:** {error}\n\n")),
            None => {
                out.push_str(&format!("{}\n\n", detail.artifact.text()));
                out.push_str(&format!("**File Path:** {}\n\n", detail.relative_path()));
            }
        }
    }

    out
}
