//! Extraction configuration.
//!
//! Controls body truncation, the resolution similarity threshold and the
//! optional AI extraction provider. Loaded from YAML; every section has a
//! default, so an empty file is a valid configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! normalizer:
//!   max_body_chars: 1000
//! matching:
//!   similarity_threshold: 25.0
//! prefer_ai: true
//! ai:
//!   command: ["llm-extract", "--json"]
//!   timeout_ms: 30000
//!   system_prompt_path: ./system_prompt.txt
//! ```

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default maximum body length, in characters, kept after normalization.
pub const DEFAULT_MAX_BODY_CHARS: usize = 1000;

/// Default similarity threshold on the 0–100 combined scale.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 25.0;

/// Default AI provider timeout.
pub const DEFAULT_AI_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Bodies longer than this many characters are truncated and suffixed
    /// with `...`.
    pub max_body_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum combined similarity (0–100) for a fuzzy resolution match.
    pub similarity_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// External AI provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    /// Program and arguments; receives `{"system", "user"}` JSON on stdin and
    /// prints a JSON amendment object on stdout.
    pub command: Vec<String>,
    #[serde(default = "default_ai_timeout_ms")]
    pub timeout_ms: u64,
    /// Replaces the built-in system prompt when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<PathBuf>,
}

fn default_ai_timeout_ms() -> u64 {
    DEFAULT_AI_TIMEOUT_MS
}

/// Top-level extraction configuration.
///
/// # Examples
///
/// ```
/// use amendment_extract::config::ExtractConfig;
///
/// let config = ExtractConfig::from_yaml_str("matching:\n  similarity_threshold: 40\n").unwrap();
/// assert_eq!(config.matching.similarity_threshold, 40.0);
/// assert_eq!(config.normalizer.max_body_chars, 1000);
/// assert!(config.ai.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub normalizer: NormalizerConfig,
    pub matching: MatchingConfig,
    /// Use the AI provider first when one is configured.
    pub prefer_ai: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiConfig>,
}

impl ExtractConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if parsing fails and [`ConfigError::Invalid`]
    /// for out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = fs::File::open(path)?;
        let config: Self = serde_yaml::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = fs::File::create(path)?;
        serde_yaml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.normalizer.max_body_chars == 0 {
            return Err(ConfigError::Invalid(
                "normalizer.max_body_chars must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.matching.similarity_threshold) {
            return Err(ConfigError::Invalid(
                "matching.similarity_threshold must be between 0 and 100".to_string(),
            ));
        }
        if let Some(ai) = &self.ai {
            if ai.command.is_empty() {
                return Err(ConfigError::Invalid("ai.command cannot be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Reads the configured system prompt file, if any.
    pub fn system_prompt(&self) -> Result<Option<String>, ConfigError> {
        match self.ai.as_ref().and_then(|ai| ai.system_prompt_path.as_ref()) {
            Some(path) => Ok(Some(fs::read_to_string(path)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_yields_defaults() {
        let config = ExtractConfig::from_yaml_str("").unwrap();
        assert_eq!(config, ExtractConfig::default());
        assert!(!config.prefer_ai);
    }

    #[test]
    fn test_ai_section_defaults_timeout() {
        let config =
            ExtractConfig::from_yaml_str("prefer_ai: true\nai:\n  command: [\"cat\"]\n").unwrap();
        let ai = config.ai.unwrap();
        assert_eq!(ai.command, vec!["cat".to_string()]);
        assert_eq!(ai.timeout_ms, DEFAULT_AI_TIMEOUT_MS);
        assert!(ai.system_prompt_path.is_none());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(matches!(
            ExtractConfig::from_yaml_str("matching:\n  similarity_threshold: 140\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ExtractConfig::from_yaml_str("normalizer:\n  max_body_chars: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ExtractConfig::from_yaml_str("ai:\n  command: []\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extract.yaml");
        let mut config = ExtractConfig::default();
        config.prefer_ai = true;
        config.ai = Some(AiConfig {
            command: vec!["llm".into(), "--json".into()],
            timeout_ms: 500,
            system_prompt_path: None,
        });
        config.save(&path).unwrap();
        assert_eq!(ExtractConfig::load(&path).unwrap(), config);
    }
}
