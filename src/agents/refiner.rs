//! Feedback-driven refinement of any artifact text.

use serde::{Deserialize, Serialize};

use super::{AgentContext, Artifact, ArtifactKind, ArtifactMetadata};

const AGENT: &str = "Refiner";

/// How a refinement prompt is steered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementStrategy {
    StructureImprovement,
    ClarityOptimization,
    CompletenessCheck,
    ContentEnhancement,
}

impl RefinementStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructureImprovement => "structure_improvement",
            Self::ClarityOptimization => "clarity_optimization",
            Self::CompletenessCheck => "completeness_check",
            Self::ContentEnhancement => "content_enhancement",
        }
    }

    /// Instruction appended to the refinement prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::StructureImprovement => {
                "Focus on improving the structure, organization, and formatting. Reorganize sections for better flow."
            }
            Self::ClarityOptimization => {
                "Focus on making the content clearer and easier to understand. Simplify complex concepts."
            }
            Self::CompletenessCheck => {
                "Focus on adding missing information and ensuring comprehensive coverage of all topics."
            }
            Self::ContentEnhancement => {
                "Focus on overall content quality, accuracy, and professional presentation."
            }
        }
    }
}

impl std::fmt::Display for RefinementStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const STRUCTURE_KEYWORDS: &[&str] = &["structure", "organize", "format", "section"];
const CLARITY_KEYWORDS: &[&str] = &["unclear", "confusing", "explain", "clarify"];
const COMPLETENESS_KEYWORDS: &[&str] = &["missing", "incomplete", "add", "include"];

/// Pick a strategy from feedback text. The first matching bucket wins, in
/// the order structure, clarity, completeness.
pub fn select_strategy(feedback: &str) -> RefinementStrategy {
    let lower = feedback.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if matches(STRUCTURE_KEYWORDS) {
        RefinementStrategy::StructureImprovement
    } else if matches(CLARITY_KEYWORDS) {
        RefinementStrategy::ClarityOptimization
    } else if matches(COMPLETENESS_KEYWORDS) {
        RefinementStrategy::CompletenessCheck
    } else {
        RefinementStrategy::ContentEnhancement
    }
}

/// Describe what changed between two texts. Informational only.
pub fn identify_improvements(original: &str, refined: &str) -> Vec<String> {
    let mut improvements = Vec::new();

    let original_lines = original.split('\n').count();
    let refined_lines = refined.split('\n').count();
    if refined_lines > original_lines {
        improvements.push(format!("Expanded content from {original_lines} to {refined_lines} lines"));
    }

    let headings = |text: &str| text.split('\n').filter(|l| l.trim().starts_with('#')).count();
    let (original_headings, refined_headings) = (headings(original), headings(refined));
    if refined_headings > original_headings {
        improvements.push(format!("Added {} new sections", refined_headings - original_headings));
    }

    if refined.contains("##") && !original.contains("##") {
        improvements.push("Improved document structure with sub-sections".to_string());
    }

    let (original_items, refined_items) = (original.matches("- ").count(), refined.matches("- ").count());
    if refined_items > original_items {
        improvements.push(format!(
            "Added {} new list items for better organization",
            refined_items - original_items
        ));
    }

    improvements
}

/// Outcome of one refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    /// The refined artifact; carries the original text and an error when the call failed
    pub artifact: Artifact,
    pub original: String,
    pub feedback: String,
    pub strategy: RefinementStrategy,
    pub improvements: Vec<String>,
}

/// One round of an iterative refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementRound {
    pub round: usize,
    pub feedback: String,
    pub strategy: RefinementStrategy,
    pub improvements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a sequence of refinements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterativeRefinement {
    /// Artifact holding the content after the last round
    pub artifact: Artifact,
    pub original: String,
    pub rounds: Vec<RefinementRound>,
}

/// Applies feedback to existing content.
#[derive(Clone)]
pub struct Refiner {
    ctx: AgentContext,
}

impl Refiner {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    fn build_prompt(content: &str, feedback: &str, kind: ArtifactKind, strategy: RefinementStrategy) -> String {
        format!(
            "\nOriginal {kind}:\n{content}\n\nFeedback received:\n{feedback}\n\nRefinement strategy: {strategy}\n\n\n\
             {}\n\n\
             Please provide the refined {kind} that addresses the feedback while maintaining or improving the overall quality.\n",
            strategy.instruction()
        )
    }

    /// Refine `content` of the given kind once.
    ///
    /// On provider failure the artifact keeps the original content and
    /// carries the error.
    pub async fn refine(&self, content: &str, feedback: &str, kind: ArtifactKind) -> Refinement {
        let strategy = select_strategy(feedback);
        tracing::info!(kind = %kind, strategy = %strategy, "Refining content based on feedback");

        let prompt = Self::build_prompt(content, feedback, kind, strategy);
        let system_prompt = format!(
            "You are an expert editor refining {kind}. Focus on addressing feedback while maintaining quality."
        );
        let metadata = ArtifactMetadata::new(AGENT, &self.ctx.version, &[kind.as_str()]).refined_with(feedback);

        match self.ctx.provider.complete(&prompt, &system_prompt).await {
            Ok(refined) => Refinement {
                improvements: identify_improvements(content, &refined),
                artifact: Artifact::new(kind, refined, metadata, self.ctx.extractor.as_ref()),
                original: content.to_string(),
                feedback: feedback.to_string(),
                strategy,
            },
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "Refinement failed");
                let artifact = Artifact::new(kind, content, metadata, self.ctx.extractor.as_ref())
                    .with_error(e.to_string());
                Refinement {
                    artifact,
                    original: content.to_string(),
                    feedback: feedback.to_string(),
                    strategy,
                    improvements: Vec::new(),
                }
            }
        }
    }

    /// Apply each feedback in turn, feeding each round's output into the next.
    pub async fn iterative_refine(
        &self,
        content: &str,
        feedback_rounds: &[String],
        kind: ArtifactKind,
    ) -> IterativeRefinement {
        tracing::info!(kind = %kind, rounds = feedback_rounds.len(), "Starting iterative refinement");

        let mut current = Artifact::new(
            kind,
            content,
            ArtifactMetadata::new(AGENT, &self.ctx.version, &[kind.as_str()]),
            self.ctx.extractor.as_ref(),
        );
        let mut rounds = Vec::with_capacity(feedback_rounds.len());

        for (i, feedback) in feedback_rounds.iter().enumerate() {
            let refinement = self.refine(current.text(), feedback, kind).await;
            rounds.push(RefinementRound {
                round: i + 1,
                feedback: feedback.clone(),
                strategy: refinement.strategy,
                improvements: refinement.improvements,
                error: refinement.artifact.error().map(String::from),
            });
            current = refinement.artifact;
        }

        IterativeRefinement { artifact: current, original: content.to_string(), rounds }
    }
}

/// Render a single refinement with its summary footer.
pub fn render_refinement(refinement: &Refinement) -> String {
    format!(
        "{}\n\n---\n\n## Refinement Summary\n\
         - Strategy: {}\n\
         - Improvements: {}\n\
         - Agent: {}\n",
        refinement.artifact.text(),
        refinement.strategy,
        refinement.improvements.join(", "),
        AGENT,
    )
}

/// Render an iterative refinement with its round history.
pub fn render_iterative(refinement: &IterativeRefinement) -> String {
    let history = refinement
        .rounds
        .iter()
        .map(|r| format!("**Round {}**: {} (Strategy: {})", r.round, r.feedback, r.strategy))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\n---\n\n## Refinement Summary\n\
         - Total refinement rounds: {}\n\
         - Content type: {}\n\
         - Agent: {}\n\n\
         ### Refinement History\n{history}\n",
        refinement.artifact.text(),
        refinement.rounds.len(),
        refinement.artifact.kind(),
        AGENT,
    )
}
