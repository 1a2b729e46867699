//! Document validation.
//!
//! Validation failures are results, not errors: a document that misses
//! required sections gets a low score and `valid == false`.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

const MAX_LINE_CHARS: usize = 200;
const MIN_LINES: usize = 5;
const ERROR_PENALTY: u32 = 20;
const WARNING_PENALTY: u32 = 5;
const PASSING_SCORE: u32 = 70;

const BRD_SECTIONS: &[&str] = &[
    "Executive Summary",
    "Business Objectives",
    "Functional Requirements",
    "Non-functional Requirements",
];

const SRS_SECTIONS: &[&str] = &[
    "System Overview",
    "Functional Specifications",
    "Technical Requirements",
    "Interface Requirements",
];

/// Kind of document being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    Markdown,
    Brd,
    Srs,
}

impl DocKind {
    /// Infer the kind from a file name: `brd` wins over `srs`.
    pub fn from_file_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("brd") {
            Self::Brd
        } else if name.contains("srs") {
            Self::Srs
        } else {
            Self::Markdown
        }
    }

    /// Section titles that must appear somewhere in the text.
    pub fn required_sections(&self) -> &'static [&'static str] {
        match self {
            Self::Markdown => &[],
            Self::Brd => BRD_SECTIONS,
            Self::Srs => SRS_SECTIONS,
        }
    }
}

/// Result of validating one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub score: u32,
}

impl ValidationReport {
    fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        let penalty = ERROR_PENALTY * errors.len() as u32 + WARNING_PENALTY * warnings.len() as u32;
        let score = 100u32.saturating_sub(penalty);
        Self { valid: score >= PASSING_SCORE, errors, warnings, score }
    }
}

/// Totals across a directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_files: usize,
    pub valid_files: usize,
    pub average_score: f64,
}

/// Result of validating every markdown file under a directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectValidation {
    pub overall_valid: bool,
    pub files: IndexMap<String, ValidationReport>,
    pub summary: ValidationSummary,
}

/// Stateless document validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Validate document text.
    pub fn validate(&self, content: &str, kind: DocKind) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let lines: Vec<&str> = content.split('\n').collect();

        if content.trim().is_empty() {
            errors.push("Document is empty".to_string());
        } else {
            for (i, line) in lines.iter().enumerate() {
                let len = line.chars().count();
                if len > MAX_LINE_CHARS {
                    warnings.push(format!("Line {} is very long ({len} characters)", i + 1));
                }
            }
            if lines.len() < MIN_LINES {
                warnings.push("Document seems too short".to_string());
            }
        }

        // Level is the count of leading '#' on the raw line; an indented
        // heading counts as level 0.
        let levels: Vec<usize> = lines
            .iter()
            .filter(|line| line.trim().starts_with('#'))
            .map(|line| line.len() - line.trim_start_matches('#').len())
            .collect();

        if levels.is_empty() {
            errors.push("No markdown headers found".to_string());
        } else if levels.windows(2).any(|w| w[1] > w[0] + 1) {
            warnings.push("Header level skipped - poor hierarchy".to_string());
        }

        let lower = content.to_lowercase();
        for section in kind.required_sections() {
            if !lower.contains(&section.to_lowercase()) {
                errors.push(format!("Missing required section: {section}"));
            }
        }

        let report = ValidationReport::from_findings(errors, warnings);
        tracing::info!(kind = ?kind, score = report.score, "Validated document");
        report
    }

    /// Validate a file; an unreadable file scores zero.
    pub fn validate_file(&self, path: &Path, kind: DocKind) -> ValidationReport {
        match fs::read_to_string(path) {
            Ok(content) => self.validate(&content, kind),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Validating file failed");
                ValidationReport {
                    valid: false,
                    errors: vec![format!("Failed to read file: {e}")],
                    warnings: Vec::new(),
                    score: 0,
                }
            }
        }
    }

    /// Validate every `.md` file under `dir`.
    pub fn validate_output(&self, dir: &Path) -> ProjectValidation {
        if !dir.exists() {
            return ProjectValidation::default();
        }

        let mut files = IndexMap::new();
        let entries = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"));

        for entry in entries {
            let kind = DocKind::from_file_name(&entry.file_name().to_string_lossy());
            let report = self.validate_file(entry.path(), kind);
            files.insert(entry.path().display().to_string(), report);
        }

        let total_files = files.len();
        let valid_files = files.values().filter(|r| r.valid).count();
        let average_score = if total_files == 0 {
            0.0
        } else {
            files.values().map(|r| f64::from(r.score)).sum::<f64>() / total_files as f64
        };

        tracing::info!(valid_files, total_files, "Validated project output");

        ProjectValidation {
            overall_valid: valid_files == total_files,
            files,
            summary: ValidationSummary { total_files, valid_files, average_score },
        }
    }
}
