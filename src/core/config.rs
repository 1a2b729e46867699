//! Configuration management for docforge.
//!
//! Handles loading configuration from TOML or YAML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::BuildError;

/// Local config file names, checked in order.
const LOCAL_CONFIG_FILES: &[&str] = &["docforge.toml", "docforge.yaml", "docforge.yml"];

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project description used in rendered documents
    pub project: ProjectConfig,

    /// Completion provider settings
    pub llm: LlmConfig,

    /// Output layout settings
    pub output: OutputConfig,

    /// Retrieval index settings
    pub retrieval: RetrievalConfig,

    /// Prompt template settings
    pub prompts: PromptsConfig,

    /// Feature planning settings
    pub features: FeaturesConfig,
}

/// Project metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Short description
    pub description: String,

    /// Author shown in the final report
    pub author: String,
}

/// Completion backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI chat completions
    OpenAI,
    /// Anthropic messages API
    Anthropic,
    /// Google Gemini
    Gemini,
}

impl ProviderKind {
    /// Provider name as written in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable holding the API key, if the backend needs one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::Ollama => None,
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend to use
    pub provider: ProviderKind,

    /// Model name passed to the backend
    pub model_name: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// API key (falls back to the provider's environment variable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Output layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Base directory for all versions
    pub base_path: PathBuf,

    /// Version label; one subdirectory per version
    pub current_version: String,

    /// Default log level when not verbose
    pub log_level: String,
}

/// Retrieval index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Directory holding the persisted index
    pub persist_directory: PathBuf,

    /// Collection name (file stem of the persisted index)
    pub collection_name: String,
}

/// Prompt template settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory containing `<name>.txt` templates
    pub directory: PathBuf,
}

/// Feature planning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Maximum length of a sanitized feature file stem
    pub max_filename_length: usize,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `docforge.toml` / `docforge.yaml` in the current directory
    /// 2. `~/.config/docforge/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, BuildError> {
        for name in LOCAL_CONFIG_FILES {
            let local = PathBuf::from(name);
            if local.exists() {
                return Self::load_from_file(&local);
            }
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// `.yaml` / `.yml` files are parsed as YAML, everything else as TOML.
    pub fn load_from_file(path: &Path) -> Result<Self, BuildError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BuildError::Config(format!("{}: {e}", path.display())))?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let config: Self = if is_yaml {
            serde_yaml::from_str(&content)
                .map_err(|e| BuildError::Config(format!("{}: {e}", path.display())))?
        } else {
            toml::from_str(&content)
                .map_err(|e| BuildError::Config(format!("{}: {e}", path.display())))?
        };

        Ok(config)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("docforge"))
    }

    /// Output directory for the current version.
    pub fn output_path(&self) -> PathBuf {
        expand_path(&self.output.base_path).join(&self.output.current_version)
    }

    /// Path of the persisted retrieval index.
    pub fn retrieval_path(&self) -> PathBuf {
        expand_path(&self.retrieval.persist_directory)
            .join(format!("{}.json", self.retrieval.collection_name))
    }

    /// Directory holding prompt templates.
    pub fn prompts_dir(&self) -> PathBuf {
        expand_path(&self.prompts.directory)
    }
}

/// Expand a leading `~` in a configured path.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "AI Builder Project".to_string(),
            description: String::new(),
            author: "AI Builder System".to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model_name: "llama3.2".to_string(),
            temperature: 0.2,
            max_tokens: 4000,
            api_key: None,
            base_url: None,
            timeout_secs: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./output"),
            current_version: "v1".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            persist_directory: PathBuf::from("./vector_store"),
            collection_name: "ai_builder_docs".to_string(),
        }
    }
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self { directory: PathBuf::from("prompts") }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self { max_filename_length: 50 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.provider, ProviderKind::Ollama);
        assert_eq!(config.output.current_version, "v1");
        assert_eq!(config.features.max_filename_length, 50);
        assert_eq!(config.project.name, "AI Builder Project");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[llm]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("provider = \"ollama\""));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
            [project]
            name = "Blog"

            [llm]
            provider = "anthropic"
            model_name = "claude-sonnet-4-20250514"
            timeout_secs = 30

            [output]
            current_version = "v2"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project.name, "Blog");
        assert_eq!(config.llm.provider, ProviderKind::Anthropic);
        assert_eq!(config.llm.timeout_secs, Some(30));
        assert_eq!(config.output.current_version, "v2");
        // Untouched sections keep their defaults
        assert_eq!(config.retrieval.collection_name, "ai_builder_docs");
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docforge.yaml");
        std::fs::write(
            &path,
            "llm:\n  provider: openai\n  model_name: gpt-4o\noutput:\n  base_path: ./out\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.llm.provider, ProviderKind::OpenAI);
        assert_eq!(config.llm.model_name, "gpt-4o");
        assert_eq!(config.output_path(), PathBuf::from("./out").join("v1"));
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docforge.toml");
        std::fs::write(&path, "[llm\nprovider = ").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn test_retrieval_path() {
        let config = Config::default();
        assert_eq!(
            config.retrieval_path(),
            PathBuf::from("./vector_store").join("ai_builder_docs.json")
        );
    }
}
