//! System architecture design.

use super::{bullet_list, AgentContext, Artifact, ArtifactKind, ArtifactMetadata};

const AGENT: &str = "Architect";

const SYSTEM_PROMPT: &str =
    "You are a senior software architect. Design scalable and maintainable system architecture.";
const REFINE_SYSTEM_PROMPT: &str =
    "You are refining a system architecture based on feedback. Ensure technical feasibility.";

/// Designs an architecture from an analysis.
#[derive(Clone)]
pub struct Architect {
    ctx: AgentContext,
}

impl Architect {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// Design the architecture. A degraded analysis yields an empty prompt
    /// parameter, not an error.
    pub async fn design(&self, analysis: &Artifact, requirements: &str) -> Artifact {
        tracing::info!("Starting architecture design");

        self.ctx
            .generate(
                ArtifactKind::Architecture,
                "architecture",
                &[("analysis", analysis.text()), ("requirements", requirements)],
                SYSTEM_PROMPT,
                ArtifactMetadata::new(AGENT, &self.ctx.version, &["analysis"]),
            )
            .await
    }

    /// Refine an architecture with feedback.
    pub async fn refine(&self, architecture: &Artifact, feedback: &str) -> Artifact {
        tracing::info!("Refining architecture based on feedback");

        let prompt = format!(
            "\nOriginal Architecture:\n{}\n\nFeedback:\n{}\n\nPlease refine the architecture design based on the \
             feedback provided. Address the concerns while maintaining system integrity.\n",
            architecture.text(),
            feedback
        );

        self.ctx.refine_with(architecture, feedback, &prompt, REFINE_SYSTEM_PROMPT).await
    }
}

/// Render `system_architecture.md`.
pub fn render(architecture: &Artifact) -> String {
    let structured = architecture.structured();
    let meta = architecture.metadata();

    let mut out = format!(
        "# System Architecture Design\n\n\
         ## Architecture Overview\n{}\n\n\
         ## System Components\n{}\n\n\
         ## Technology Stack\n",
        architecture.text(),
        bullet_list(&structured.components),
    );

    let stack = structured.technology_stack.clone().unwrap_or_default();
    for (label, techs) in stack.categories() {
        out.push_str(&format!("\n### {label}\n{}\n", bullet_list(techs)));
    }

    out.push_str(&format!(
        "\n## Metadata\n- Agent: {}\n- Version: {}\n- Based on: {}\n",
        meta.agent,
        meta.version,
        meta.inputs.join(", ")
    ));
    out
}
