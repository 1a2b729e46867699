//! Structured data extraction from generated text.
//!
//! Extraction is best-effort. The [`Extractor`] trait is the seam where a
//! different strategy can be plugged in; [`HeuristicExtractor`] is the
//! keyword-driven default used by the pipeline.

mod heuristics;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use heuristics::{
    extract_components, extract_feature_categories, extract_requirements, extract_sections,
    extract_technical_requirements, extract_technology_stack, extract_timeline,
};

/// Ordered mapping of heading title to body.
pub type Sections = IndexMap<String, String>;

/// Ordered mapping of timeline label to description.
pub type Timeline = IndexMap<String, String>;

/// Features bucketed by priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCategories {
    /// Must-have features
    pub core: Vec<String>,
    /// Should-have features
    pub enhanced: Vec<String>,
    /// Nice-to-have features
    pub optional: Vec<String>,
}

impl FeatureCategories {
    /// All features, core first, then enhanced, then optional.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.core.iter().chain(self.enhanced.iter()).chain(self.optional.iter())
    }

    /// Total number of features.
    pub fn len(&self) -> usize {
        self.core.len() + self.enhanced.len() + self.optional.len()
    }

    /// Whether no feature was found.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Technologies mentioned in an architecture, per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyStack {
    pub backend: Vec<String>,
    pub frontend: Vec<String>,
    pub mobile: Vec<String>,
    pub database: Vec<String>,
    pub infrastructure: Vec<String>,
}

impl TechnologyStack {
    /// Categories with display labels, in report order.
    pub fn categories(&self) -> [(&'static str, &[String]); 5] {
        [
            ("Backend", &self.backend),
            ("Frontend", &self.frontend),
            ("Mobile", &self.mobile),
            ("Database", &self.database),
            ("Infrastructure", &self.infrastructure),
        ]
    }
}

/// Strategy for turning generated text into structured data.
///
/// Every method has the heuristic behavior as its default, so an
/// alternative strategy only overrides what it changes.
pub trait Extractor: Send + Sync {
    fn sections(&self, text: &str) -> Sections {
        extract_sections(text)
    }

    fn requirements(&self, text: &str) -> Vec<String> {
        extract_requirements(text)
    }

    fn technical_requirements(&self, text: &str) -> Vec<String> {
        extract_technical_requirements(text)
    }

    fn feature_categories(&self, text: &str) -> FeatureCategories {
        extract_feature_categories(text)
    }

    fn timeline(&self, text: &str) -> Timeline {
        extract_timeline(text)
    }

    fn technology_stack(&self, text: &str) -> TechnologyStack {
        extract_technology_stack(text)
    }

    fn components(&self, text: &str) -> Vec<String> {
        extract_components(text)
    }
}

/// The keyword-heuristic extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicExtractor;

impl Extractor for HeuristicExtractor {}

/// Turn a feature name into a safe file stem.
///
/// Lowercases ASCII alphanumerics, collapses every other run of characters
/// into one `_`, trims separators from both ends and truncates to `max_len`.
/// Never yields an empty stem.
pub fn sanitize_feature_filename(feature: &str, max_len: usize) -> String {
    let mut stem = String::with_capacity(feature.len());
    let mut pending_separator = false;

    for c in feature.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !stem.is_empty() {
                stem.push('_');
            }
            pending_separator = false;
            stem.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    // Only ASCII was pushed, so byte truncation is char-safe.
    stem.truncate(max_len);
    let stem = stem.trim_end_matches('_');

    if stem.is_empty() {
        "feature".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_feature_filename() {
        assert_eq!(
            sanitize_feature_filename("Real-Time Chat/Notifications!", 50),
            "real_time_chat_notifications"
        );
    }

    #[test]
    fn test_sanitize_collapses_runs_and_trims() {
        assert_eq!(sanitize_feature_filename("  --User   Auth!!  ", 50), "user_auth");
    }

    #[test]
    fn test_sanitize_blocks_traversal() {
        let name = sanitize_feature_filename("../../etc/passwd", 50);
        assert_eq!(name, "etc_passwd");
        assert!(!name.contains('/') && !name.contains('.'));
    }

    #[test]
    fn test_sanitize_truncates() {
        let name = sanitize_feature_filename("Real-Time Chat/Notifications!", 10);
        assert_eq!(name, "real_time");
        assert!(name.len() <= 10);

        let long = "a".repeat(80);
        assert_eq!(sanitize_feature_filename(&long, 50).len(), 50);
    }

    #[test]
    fn test_sanitize_empty_fallback() {
        assert_eq!(sanitize_feature_filename("!!!", 50), "feature");
        assert_eq!(sanitize_feature_filename("日本語", 50), "feature");
    }

    #[test]
    fn test_feature_categories_order() {
        let cats = FeatureCategories {
            core: vec!["a".into()],
            enhanced: vec!["b".into()],
            optional: vec!["c".into()],
        };
        let all: Vec<_> = cats.all().cloned().collect();
        assert_eq!(all, ["a", "b", "c"]);
        assert_eq!(cats.len(), 3);
    }

    #[test]
    fn test_custom_extractor_overrides_one_method() {
        struct NoSections;
        impl Extractor for NoSections {
            fn sections(&self, _text: &str) -> Sections {
                Sections::new()
            }
        }

        let text = "# Core\n- Login flow for users";
        assert!(NoSections.sections(text).is_empty());
        assert_eq!(NoSections.feature_categories(text).core, ["Login flow for users"]);
        assert_eq!(HeuristicExtractor.sections(text).len(), 1);
    }
}
