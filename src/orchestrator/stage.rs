//! Pipeline stages and their results.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::agents::{Artifact, ArtifactKind, FeatureDetail, ProjectValidation};

/// One of the six fixed pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analysis,
    Architecture,
    Features,
    Documents,
    Validation,
    Final,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 6] = [
        Self::Analysis,
        Self::Architecture,
        Self::Features,
        Self::Documents,
        Self::Validation,
        Self::Final,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Architecture => "architecture",
            Self::Features => "features",
            Self::Documents => "documents",
            Self::Validation => "validation",
            Self::Final => "final",
        }
    }

    /// Output subdirectory, e.g. `state_1_analysis`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Analysis => "state_1_analysis",
            Self::Architecture => "state_2_architecture",
            Self::Features => "state_3_features",
            Self::Documents => "state_4_documents",
            Self::Validation => "state_5_validation",
            Self::Final => "state_6_final",
        }
    }

    /// State name written to the history log when the stage ends.
    pub fn history_state(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis_complete",
            Self::Architecture => "architecture_complete",
            Self::Features => "features_complete",
            Self::Documents => "documents_complete",
            Self::Validation => "validation_complete",
            Self::Final => "final_report_complete",
        }
    }

    /// Artifact kinds that feedback refinement rewrites for this stage.
    /// Empty for stages that cannot be refined.
    pub fn refinable_kinds(&self) -> &'static [ArtifactKind] {
        match self {
            Self::Analysis => &[ArtifactKind::Analysis],
            Self::Architecture => &[ArtifactKind::Architecture],
            Self::Features => &[ArtifactKind::Features],
            Self::Documents => &[ArtifactKind::Brd, ArtifactKind::Srs],
            Self::Validation | Self::Final => &[],
        }
    }

    pub fn is_refinable(&self) -> bool {
        !self.refinable_kinds().is_empty()
    }

    /// Human-readable label, e.g. `Analysis`.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Analysis => "Analysis",
            Self::Architecture => "Architecture",
            Self::Features => "Features",
            Self::Documents => "Documents",
            Self::Validation => "Validation",
            Self::Final => "Final",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// What one stage produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub status: StageStatus,

    /// Artifacts in production order; the first is the stage's primary one
    pub artifacts: Vec<Artifact>,

    /// Files written, in write order
    pub files: Vec<PathBuf>,

    /// Per-feature specifications, features stage only
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub details: IndexMap<String, FeatureDetail>,

    /// Directory validation, validation stage only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ProjectValidation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_secs: f64,
}

impl StageResult {
    pub fn is_completed(&self) -> bool {
        self.status == StageStatus::Completed
    }

    /// First artifact of the given kind.
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind() == kind)
    }
}

/// Result of one whole build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub build_id: String,
    pub version: String,
    pub requirements: String,
    pub context: serde_json::Value,
    pub stages: IndexMap<Stage, StageResult>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
}

impl BuildResult {
    pub(crate) fn start(version: &str, requirements: &str, context: serde_json::Value) -> Self {
        Self {
            build_id: uuid::Uuid::new_v4().to_string(),
            version: version.to_string(),
            requirements: requirements.to_string(),
            context,
            stages: IndexMap::new(),
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: 0.0,
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.get(&stage)
    }

    /// Whether every stage completed.
    pub fn is_successful(&self) -> bool {
        self.stages.values().all(StageResult::is_completed)
    }

    /// Every file written by every stage, in stage order.
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.stages.values().flat_map(|result| result.files.iter())
    }

    /// Multi-line summary for the terminal.
    pub fn to_summary_string(&self) -> String {
        let mut summary = format!(
            "Build {} (version {}) finished in {:.2}s\n",
            self.build_id, self.version, self.duration_secs
        );

        for (stage, result) in &self.stages {
            let mark = if result.is_completed() { "✓" } else { "✗" };
            summary.push_str(&format!(
                "  {mark} {:<13} {:<9} {} file(s)\n",
                stage.title(),
                result.status,
                result.files.len()
            ));
            if let Some(error) = &result.error {
                summary.push_str(&format!("      error: {error}\n"));
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_dirs() {
        let dirs: Vec<_> = Stage::ALL.iter().map(Stage::dir_name).collect();
        assert_eq!(
            dirs,
            [
                "state_1_analysis",
                "state_2_architecture",
                "state_3_features",
                "state_4_documents",
                "state_5_validation",
                "state_6_final",
            ]
        );
        assert!(Stage::Analysis < Stage::Final);
    }

    #[test]
    fn test_refinable() {
        assert!(Stage::Documents.is_refinable());
        assert_eq!(Stage::Documents.refinable_kinds(), [ArtifactKind::Brd, ArtifactKind::Srs]);
        assert!(!Stage::Validation.is_refinable());
        assert!(!Stage::Final.is_refinable());
    }

    #[test]
    fn test_build_result_serde_keys() {
        let mut build = BuildResult::start("v1", "Build a blog", serde_json::json!({}));
        build.stages.insert(
            Stage::Analysis,
            StageResult {
                status: StageStatus::Failed,
                artifacts: Vec::new(),
                files: vec![PathBuf::from("a.md")],
                details: IndexMap::new(),
                validation: None,
                error: Some("boom".to_string()),
                duration_secs: 0.5,
            },
        );

        let json = serde_json::to_value(&build).unwrap();
        assert_eq!(json["stages"]["analysis"]["status"], "failed");

        let back: BuildResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, build);
        assert!(!back.is_successful());
        assert!(back.to_summary_string().contains("error: boom"));
    }
}
