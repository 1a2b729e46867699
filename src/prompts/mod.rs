//! Prompt templates.
//!
//! Templates live as `<name>.txt` files in the prompts directory and use
//! `{{ name }}` placeholders. A template that is missing or unreadable falls
//! back to a built-in default, so resolution never fails.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::TemplateError;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("placeholder pattern is valid"));

/// Template used for names without a built-in default.
const GENERIC_TEMPLATE: &str = "Please provide detailed analysis for: {{requirements}}";

const ANALYSIS_TEMPLATE: &str = "
Analyze the following project requirements and provide a comprehensive analysis:

Requirements: {{requirements}}

Please provide:
1. Project overview and objectives
2. Key stakeholders and their needs
3. Technical requirements and constraints
4. Risk assessment
5. Success criteria
";

const ARCHITECTURE_TEMPLATE: &str = "
Design the system architecture for the following project:

Project Analysis: {{analysis}}

Please provide:
1. High-level system architecture
2. Component breakdown
3. Technology stack recommendations
4. Integration points
5. Scalability considerations
";

const FEATURES_TEMPLATE: &str = "
Create a detailed feature list based on the project analysis:

Analysis: {{analysis}}
Architecture: {{architecture}}

Please provide:
1. Core features (must-have)
2. Enhanced features (should-have)
3. Optional features (nice-to-have)
4. Feature prioritization
5. Implementation timeline
";

const BRD_TEMPLATE: &str = "
Create a Business Requirements Document (BRD) based on the following:

Analysis: {{analysis}}
Features: {{features}}

Please create a comprehensive BRD including:
1. Executive Summary
2. Business Objectives
3. Functional Requirements
4. Non-functional Requirements
5. Acceptance Criteria
";

const SRS_TEMPLATE: &str = "
Create a Software Requirements Specification (SRS) based on the following:

Analysis: {{analysis}}
Architecture: {{architecture}}
Features: {{features}}

Please create a detailed SRS including:
1. System Overview
2. Functional Specifications
3. Technical Requirements
4. Interface Requirements
5. Performance Requirements
";

const FEATURE_DETAIL_TEMPLATE: &str = "
Write a detailed specification for the following feature:

Feature: {{feature}}

Please include:
1. Description and purpose
2. User stories
3. Acceptance criteria
4. Technical considerations
5. Dependencies and risks
";

const BNM_ANALYSIS_TEMPLATE: &str = "
Analyze the business needs and market position described below:

Business Needs: {{bnm}}
Market Context: {{context}}

Please provide:
1. Business needs summary
2. Target market and customer segments
3. Competitive landscape
4. Market positioning and differentiation
5. Opportunities and threats
";

/// Built-in default for a template name.
pub fn default_template(name: &str) -> &'static str {
    match name {
        "analysis" => ANALYSIS_TEMPLATE,
        "architecture" => ARCHITECTURE_TEMPLATE,
        "features" => FEATURES_TEMPLATE,
        "brd" => BRD_TEMPLATE,
        "srs" => SRS_TEMPLATE,
        "feature_detail" => FEATURE_DETAIL_TEMPLATE,
        "bnm_analysis" => BNM_ANALYSIS_TEMPLATE,
        _ => GENERIC_TEMPLATE,
    }
}

/// Substitute `{{ name }}` placeholders. Unknown names render as empty text.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Resolves named prompt templates from a directory.
#[derive(Debug, Clone)]
pub struct PromptTemplateStore {
    dir: PathBuf,
}

impl PromptTemplateStore {
    /// Create a store reading from the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory templates are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn template_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.txt"))
    }

    /// Load the raw template text for `name`, if a file exists.
    pub fn load(&self, name: &str) -> Result<Option<String>, TemplateError> {
        let path = self.template_path(name);
        if !path.exists() {
            return Ok(None);
        }

        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| TemplateError::Read { path, source })
    }

    /// Resolve a template and substitute variables.
    pub fn resolve(&self, name: &str, vars: &[(&str, &str)]) -> String {
        let template = match self.load(name) {
            Ok(Some(template)) => template,
            Ok(None) => {
                tracing::warn!(template = name, "Prompt template not found, using default");
                default_template(name).to_string()
            }
            Err(e) => {
                tracing::error!(template = name, error = %e, "Loading prompt template failed, using default");
                default_template(name).to_string()
            }
        };

        render(&template, vars)
    }

    /// Write a template to `<dir>/<name>.txt`.
    pub fn save(&self, name: &str, content: &str) -> Result<PathBuf, TemplateError> {
        let path = self.template_path(name);
        fs::create_dir_all(&self.dir)
            .and_then(|()| fs::write(&path, content))
            .map_err(|source| TemplateError::Write { path: path.clone(), source })?;

        tracing::info!(template = name, "Saved prompt template");
        Ok(path)
    }
}
