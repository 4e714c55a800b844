use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RegdiffError, Result};

/// Candidate file names searched in the working directory when no path is given
const CONFIG_CANDIDATES: [&str; 3] = ["regdiff.toml", "Regdiff.toml", ".regdiff.toml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How documents are split into sections
    pub segmentation: SegmentationConfig,

    /// Section diff settings
    pub diff: DiffConfig,

    /// LLM classification backend
    pub llm: LlmConfig,

    /// Background analysis settings
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Line prefixes (after trimming) that open a new section
    pub heading_markers: Vec<String>,
}

/// What happens when two sections of the same document share a fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// The later section replaces the earlier one's text, keeping the earlier position
    #[default]
    LastWriteWins,

    /// The earlier section is kept and later duplicates are ignored
    FirstSeenWins,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Context lines around each hunk of a modified section
    pub context_lines: usize,

    /// Resolution of duplicate fingerprints within one document
    pub collision_policy: CollisionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Whether to classify changes with an LLM
    pub enabled: bool,

    /// LLM provider (ollama, openai)
    pub provider: String,

    /// Model name (e.g., "mistral", "gpt-4o-mini")
    pub model: String,

    /// API key (for hosted providers)
    pub api_key: Option<String>,

    /// Base URL of the backend
    pub base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for LLM responses (0.0 to 1.0)
    pub temperature: Option<f32>,

    /// Maximum tokens for LLM responses
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of analysis jobs that may run at once
    pub workers: usize,

    /// Concurrent classifier requests within one job
    pub max_concurrent_requests: usize,

    /// Change content beyond this many characters is cut before prompting
    pub max_content_chars: usize,

    /// Finished jobs kept around for status polling
    pub retained_jobs: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            heading_markers: ["1.", "2.", "3.", "Section", "CHAPTER", "ARTICLE", "ADDENDUM"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: 3,
            collision_policy: CollisionPolicy::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "ollama".to_string(),
            model: "mistral".to_string(),
            api_key: None,
            base_url: Some("http://localhost:11435".to_string()),
            timeout_secs: 120,
            temperature: Some(0.1),
            max_tokens: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_concurrent_requests: 1,
            max_content_chars: 2000,
            retained_jobs: 64,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| RegdiffError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RegdiffError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                for candidate in &CONFIG_CANDIDATES {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.segmentation.heading_markers.is_empty() {
            return Err(RegdiffError::Config(
                "segmentation.heading_markers must not be empty".to_string(),
            ));
        }
        if self.analysis.workers == 0 {
            return Err(RegdiffError::Config("analysis.workers must be at least 1".to_string()));
        }
        if self.analysis.max_concurrent_requests == 0 {
            return Err(RegdiffError::Config(
                "analysis.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    #[test]
    fn test_defaults_match_heading_markers() {
        let config = Config::default();
        assert_eq!(
            config.segmentation.heading_markers,
            vec!["1.", "2.", "3.", "Section", "CHAPTER", "ARTICLE", "ADDENDUM"]
        );
        assert_eq!(config.diff.context_lines, 3);
        assert_eq!(config.diff.collision_policy, CollisionPolicy::LastWriteWins);
        assert_eq!(config.analysis.workers, 2);
        assert_eq!(config.analysis.retained_jobs, 64);
        assert_eq!(config.llm.base_url.as_deref(), Some("http://localhost:11435"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = assert_fs::TempDir::new().unwrap();
        let file = dir.child("regdiff.toml");
        file.write_str(
            r#"
[diff]
collision_policy = "first-seen-wins"

[llm]
model = "llama3"
"#,
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.diff.collision_policy, CollisionPolicy::FirstSeenWins);
        assert_eq!(config.diff.context_lines, 3);
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.provider, "ollama");
    }

    #[test]
    fn test_save_then_load() {
        let dir = assert_fs::TempDir::new().unwrap();
        let file = dir.child("saved.toml");

        let mut config = Config::default();
        config.analysis.workers = 4;
        config.save(file.path()).unwrap();

        file.assert(predicate::path::exists());
        file.assert(predicate::str::contains("heading_markers"));

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.analysis.workers, 4);
    }

    #[test]
    fn test_rejects_empty_markers() {
        let dir = assert_fs::TempDir::new().unwrap();
        let file = dir.child("bad.toml");
        file.write_str("[segmentation]\nheading_markers = []\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, RegdiffError::Config(_)));
    }

    #[test]
    fn test_missing_explicit_path_falls_back() {
        let dir = assert_fs::TempDir::new().unwrap();
        let config = Config::load_or_default(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.llm.model, "mistral");
    }
}
