//! Keyword heuristics over generated markdown.
//!
//! Every function here is pure and scans the whole text from scratch.
//! The rules are deliberately simple substring matches; a heading written
//! with different markup, or a keyword used in passing, is treated exactly
//! the way the rule says.

use super::{FeatureCategories, Sections, TechnologyStack, Timeline};

const REQUIREMENT_KEYWORDS: &[&str] = &["requirement", "functional", "business rule"];
const TECHNICAL_KEYWORDS: &[&str] = &["technical", "system", "performance", "security"];

const CORE_KEYWORDS: &[&str] = &["core", "must-have", "essential"];
const ENHANCED_KEYWORDS: &[&str] = &["enhanced", "should-have", "important"];
const OPTIONAL_KEYWORDS: &[&str] = &["optional", "nice-to-have", "future"];

const TIMELINE_KEYWORDS: &[&str] = &["phase", "sprint", "week", "month", "quarter"];
const COMPONENT_KEYWORDS: &[&str] = &["component", "service", "module", "layer"];

const BACKEND_TECHS: &[&str] = &["python", "java", "node.js", "go", "rust", "c#", ".net"];
const FRONTEND_TECHS: &[&str] = &["react", "vue", "angular", "svelte", "html", "css", "javascript"];
const MOBILE_TECHS: &[&str] =
    &["flutter", "react native", "swift", "kotlin", "java (android)", "objective-c"];
const DATABASE_TECHS: &[&str] =
    &["postgresql", "mysql", "mongodb", "redis", "sqlite", "elasticsearch"];
const INFRASTRUCTURE_TECHS: &[&str] =
    &["docker", "kubernetes", "aws", "azure", "gcp", "nginx", "apache"];

/// Requirements shorter than this (after stripping markers) are noise.
const MIN_REQUIREMENT_CHARS: usize = 10;
/// Feature lines at or above this length are prose, not feature names.
const MAX_FEATURE_CHARS: usize = 100;
/// Component names at or above this length are sentences.
const MAX_COMPONENT_CHARS: usize = 50;

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn is_heading(line: &str) -> bool {
    line.trim().starts_with('#')
}

/// A trimmed line starting with `-` or a digit 1-9.
fn is_list_item(line: &str) -> bool {
    line.starts_with('-') || line.starts_with(|c: char| ('1'..='9').contains(&c))
}

/// Strip leading dashes, then digits, then dots, then whitespace.
fn strip_list_marker(line: &str) -> &str {
    line.trim_start_matches('-')
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches('.')
        .trim()
}

/// Split text into heading-keyed sections.
///
/// Lines before the first heading are dropped. A repeated heading replaces
/// the earlier body but keeps its original position.
pub fn extract_sections(text: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in text.lines() {
        if is_heading(line) {
            if let Some(title) = current.take() {
                sections.insert(title, body.join("\n").trim().to_string());
            }
            current = Some(line.trim().trim_start_matches('#').trim().to_string());
            body.clear();
        } else if current.is_some() {
            body.push(line);
        }
    }

    if let Some(title) = current {
        sections.insert(title, body.join("\n").trim().to_string());
    }

    sections
}

/// Collect list items that follow a keyword line, until the next heading.
///
/// A keyword line only switches the capture on; it is never captured
/// itself, even when it is a list item.
fn keyword_list(text: &str, keywords: &[&str]) -> Vec<String> {
    let mut items = Vec::new();
    let mut in_section = false;

    for raw in text.lines() {
        let line = raw.trim();

        if contains_any(&line.to_lowercase(), keywords) {
            in_section = true;
            continue;
        }

        if in_section && is_list_item(line) {
            let item = strip_list_marker(line);
            if item.chars().count() > MIN_REQUIREMENT_CHARS {
                items.push(item.to_string());
            }
        }

        if in_section && line.starts_with('#') {
            in_section = false;
        }
    }

    items
}

/// Business requirements from a BRD.
pub fn extract_requirements(text: &str) -> Vec<String> {
    keyword_list(text, REQUIREMENT_KEYWORDS)
}

/// Technical requirements from an SRS.
pub fn extract_technical_requirements(text: &str) -> Vec<String> {
    keyword_list(text, TECHNICAL_KEYWORDS)
}

/// Bucket feature list items by the most recent category keyword line.
pub fn extract_feature_categories(text: &str) -> FeatureCategories {
    #[derive(Clone, Copy)]
    enum Bucket {
        Core,
        Enhanced,
        Optional,
    }

    let mut categories = FeatureCategories::default();
    let mut current: Option<Bucket> = None;

    for raw in text.lines() {
        let line = raw.trim();
        let lower = line.to_lowercase();

        if contains_any(&lower, CORE_KEYWORDS) {
            current = Some(Bucket::Core);
        } else if contains_any(&lower, ENHANCED_KEYWORDS) {
            current = Some(Bucket::Enhanced);
        } else if contains_any(&lower, OPTIONAL_KEYWORDS) {
            current = Some(Bucket::Optional);
        }

        let Some(bucket) = current else { continue };
        if !is_list_item(line) {
            continue;
        }

        let feature = strip_list_marker(line);
        if feature.is_empty() || feature.chars().count() >= MAX_FEATURE_CHARS {
            continue;
        }

        let target = match bucket {
            Bucket::Core => &mut categories.core,
            Bucket::Enhanced => &mut categories.enhanced,
            Bucket::Optional => &mut categories.optional,
        };
        target.push(feature.to_string());
    }

    categories
}

/// `label: description` lines mentioning a phase, sprint, week, month or quarter.
pub fn extract_timeline(text: &str) -> Timeline {
    let mut timeline = Timeline::new();

    for line in text.lines() {
        if !contains_any(&line.to_lowercase(), TIMELINE_KEYWORDS) {
            continue;
        }
        if let Some((label, description)) = line.split_once(':') {
            timeline.insert(label.trim().to_string(), description.trim().to_string());
        }
    }

    timeline
}

/// Technologies mentioned anywhere in the text, per category.
pub fn extract_technology_stack(text: &str) -> TechnologyStack {
    let lower = text.to_lowercase();
    let matches = |techs: &[&str]| -> Vec<String> {
        techs.iter().filter(|tech| lower.contains(*tech)).map(|tech| (*tech).to_string()).collect()
    };

    TechnologyStack {
        backend: matches(BACKEND_TECHS),
        frontend: matches(FRONTEND_TECHS),
        mobile: matches(MOBILE_TECHS),
        database: matches(DATABASE_TECHS),
        infrastructure: matches(INFRASTRUCTURE_TECHS),
    }
}

/// Component names: the text before the first colon of non-heading lines
/// that mention a component, service, module or layer.
pub fn extract_components(text: &str) -> Vec<String> {
    let mut components: Vec<String> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !contains_any(&line.to_lowercase(), COMPONENT_KEYWORDS) {
            continue;
        }

        let name = line.split(':').next().unwrap_or_default().trim();
        if !name.is_empty()
            && name.chars().count() < MAX_COMPONENT_CHARS
            && !components.iter().any(|c| c == name)
        {
            components.push(name.to_string());
        }
    }

    components
}
