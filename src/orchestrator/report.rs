//! Final build report.

use super::{BuildResult, Stage};
use crate::core::Config;
use crate::store::IndexStats;

/// Render `final_report.md` from the stages run so far.
pub fn render(build: &BuildResult, config: &Config, stats: &IndexStats) -> String {
    let mut out = format!(
        "# {} - Final Report\n\n\
         ## Project Overview\n\
         **Version**: {}\n\
         **Generated**: {}\n\
         **Duration**: {:.2} seconds\n\n\
         ## Requirements\n{}\n\n\
         ## Build Summary\n",
        config.project.name,
        build.version,
        build.started_at.format("%Y-%m-%d %H:%M:%S"),
        build.duration_secs,
        build.requirements,
    );

    for stage in Stage::ALL.iter().filter(|s| **s != Stage::Final) {
        let Some(result) = build.stage(*stage) else { continue };

        out.push_str(&format!("\n### {} Phase\n- Status: {}\n", stage.title(), result.status));
        match &result.validation {
            Some(validation) => {
                out.push_str(&format!("- Overall Valid: {}\n", validation.overall_valid));
            }
            None => out.push_str(&format!("- Files: {}\n", result.files.len())),
        }
    }

    let files = build.files().map(|f| format!("- {}", f.display())).collect::<Vec<_>>().join("\n");

    out.push_str(&format!(
        "\n## Generated Files\n{files}\n\n\
         ## Retrieval Index Statistics\n{stats}\n\n\
         ## Project Metadata\n\
         - Author: {}\n\
         - Description: {}\n\
         - LLM Provider: {}\n\
         - Model: {}\n",
        config.project.author, config.project.description, config.llm.provider, config.llm.model_name,
    ));

    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use indexmap::IndexMap;

    use super::*;
    use crate::agents::ProjectValidation;
    use crate::orchestrator::{StageResult, StageStatus};

    fn stage_result(status: StageStatus, files: &[&str]) -> StageResult {
        StageResult {
            status,
            artifacts: Vec::new(),
            files: files.iter().map(PathBuf::from).collect(),
            details: IndexMap::new(),
            validation: None,
            error: None,
            duration_secs: 0.0,
        }
    }

    #[test]
    fn test_render_report() {
        let mut config = Config::default();
        config.project.name = "Blog".to_string();

        let mut build = BuildResult::start("v2", "Build a blog", serde_json::json!({}));
        build.stages.insert(Stage::Analysis, stage_result(StageStatus::Completed, &["a/analysis_overview.md"]));
        build.stages.insert(Stage::Architecture, stage_result(StageStatus::Failed, &[]));
        let mut validation = stage_result(StageStatus::Completed, &["v/validation_report.json"]);
        validation.validation = Some(ProjectValidation::default());
        build.stages.insert(Stage::Validation, validation);

        let stats = IndexStats { collection: "docs".to_string(), count: 3 };
        let report = render(&build, &config, &stats);

        assert!(report.starts_with("# Blog - Final Report"));
        assert!(report.contains("**Version**: v2"));
        assert!(report.contains("### Analysis Phase\n- Status: completed\n- Files: 1"));
        assert!(report.contains("### Architecture Phase\n- Status: failed\n- Files: 0"));
        assert!(report.contains("### Validation Phase\n- Status: completed\n- Overall Valid: false"));
        assert!(report.contains("- a/analysis_overview.md\n- v/validation_report.json"));
        assert!(report.contains("- Documents: 3"));
        assert!(report.contains("- LLM Provider: ollama"));
    }
}
