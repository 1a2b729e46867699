//! Requirements analysis.

use super::{AgentContext, Artifact, ArtifactKind, ArtifactMetadata};

const AGENT: &str = "Analyzer";

const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are an expert business analyst. Provide thorough and structured analysis.";
const BUSINESS_SYSTEM_PROMPT: &str =
    "You are a business strategist. Analyze the business needs and market position.";
const REFINE_SYSTEM_PROMPT: &str =
    "You are refining a business analysis based on feedback. Maintain structure while addressing concerns.";

/// Turns raw requirements into a structured analysis.
#[derive(Clone)]
pub struct Analyzer {
    ctx: AgentContext,
}

impl Analyzer {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// Analyze raw requirements with optional build context.
    pub async fn analyze_requirements(
        &self,
        requirements: &str,
        context: &serde_json::Value,
    ) -> Artifact {
        tracing::info!("Starting requirements analysis");
        let context = context.to_string();

        self.ctx
            .generate(
                ArtifactKind::Analysis,
                "analysis",
                &[("requirements", requirements), ("context", context.as_str())],
                ANALYSIS_SYSTEM_PROMPT,
                ArtifactMetadata::new(AGENT, &self.ctx.version, &["requirements"]),
            )
            .await
    }

    /// Analyze business needs against the market context.
    pub async fn analyze_business_needs(&self, business_needs: &str, market_context: &str) -> Artifact {
        tracing::info!("Starting business needs and market position analysis");

        self.ctx
            .generate(
                ArtifactKind::Analysis,
                "bnm_analysis",
                &[("bnm", business_needs), ("context", market_context)],
                BUSINESS_SYSTEM_PROMPT,
                ArtifactMetadata::new(AGENT, &self.ctx.version, &["business_needs", "market_context"]),
            )
            .await
    }

    /// Refine an analysis with feedback.
    pub async fn refine(&self, analysis: &Artifact, feedback: &str) -> Artifact {
        tracing::info!("Refining analysis based on feedback");

        let prompt = format!(
            "\nOriginal Analysis:\n{}\n\nFeedback:\n{}\n\nPlease refine the analysis based on the feedback provided. \
             Keep the good parts and improve the areas mentioned in the feedback.\n",
            analysis.text(),
            feedback
        );

        self.ctx.refine_with(analysis, feedback, &prompt, REFINE_SYSTEM_PROMPT).await
    }
}

/// Render `analysis_overview.md`.
pub fn render_overview(requirements: &str, analysis: &Artifact) -> String {
    let meta = analysis.metadata();
    format!(
        "# Project Analysis Overview\n\n\
         ## Raw Requirements\n{requirements}\n\n\
         ## Analysis Content\n{}\n\n\
         ## Metadata\n\
         - Agent: {}\n\
         - Version: {}\n\
         - Generated: {}\n",
        analysis.text(),
        meta.agent,
        meta.version,
        meta.generated_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Render `business_analysis.md`.
pub fn render_business_analysis(business_needs: &str, analysis: &Artifact) -> String {
    let meta = analysis.metadata();
    format!(
        "# Business Needs and Market Position\n\n\
         ## Business Needs\n{business_needs}\n\n\
         ## Analysis Content\n{}\n\n\
         ## Metadata\n\
         - Agent: {}\n\
         - Version: {}\n",
        analysis.text(),
        meta.agent,
        meta.version,
    )
}
