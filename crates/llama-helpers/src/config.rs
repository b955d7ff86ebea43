//! Tokenizer configuration — persisted as JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chat::PromptFormat;
use crate::error::{HelperError, Result};

/// How prompts are tokenized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerParams {
    /// Prepend the BOS token when tokenizing.
    #[serde(default)]
    pub add_bos_token: bool,
    /// Parse special tokens (`<s>`, `[INST]`, …) embedded in the prompt.
    #[serde(default = "default_parse_special")]
    pub parse_special: bool,
    /// Tokens reserved for generated output.
    #[serde(default = "default_max_output_length")]
    pub max_output_length: u32,
    /// How chats are rendered before tokenization.
    #[serde(default)]
    pub prompt_format: PromptFormat,
}

fn default_parse_special() -> bool {
    true
}
fn default_max_output_length() -> u32 {
    512
}

impl Default for TokenizerParams {
    fn default() -> Self {
        Self {
            add_bos_token: false,
            parse_special: default_parse_special(),
            max_output_length: default_max_output_length(),
            prompt_format: PromptFormat::default(),
        }
    }
}

/// Size of the inference context the prompt must fit into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    #[serde(default = "default_context_window_size")]
    pub context_window_size: u32,
}

fn default_context_window_size() -> u32 {
    1024
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            context_window_size: default_context_window_size(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub tokenizer: TokenizerParams,
    #[serde(default)]
    pub context: ContextWindow,
}

impl TokenizerConfig {
    /// Load from `path`, or return defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No tokenizer config, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Persist to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The output reservation has to fit in the context window.
    pub fn validate(&self) -> Result<()> {
        let window = self.context.context_window_size;
        let reserved = self.tokenizer.max_output_length;
        if reserved > window {
            return Err(HelperError::ContextSizeMismatch {
                context_window_size: window,
                max_output_length: reserved,
            });
        }
        Ok(())
    }

    /// Tokens left for the prompt.
    pub fn prompt_budget(&self) -> usize {
        self.context
            .context_window_size
            .saturating_sub(self.tokenizer.max_output_length) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = TokenizerConfig::default();
        assert!(!cfg.tokenizer.add_bos_token);
        assert!(cfg.tokenizer.parse_special);
        assert_eq!(cfg.tokenizer.max_output_length, 512);
        assert_eq!(cfg.tokenizer.prompt_format, PromptFormat::Llama2);
        assert_eq!(cfg.context.context_window_size, 1024);
        assert_eq!(cfg.prompt_budget(), 512);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: TokenizerConfig =
            serde_json::from_str(r#"{"tokenizer":{"add_bos_token":true}}"#).unwrap();
        assert!(cfg.tokenizer.add_bos_token);
        assert!(cfg.tokenizer.parse_special);
        assert_eq!(cfg.context.context_window_size, 1024);
    }

    #[test]
    fn test_prompt_format_from_json() {
        let cfg: TokenizerConfig =
            serde_json::from_str(r#"{"tokenizer":{"prompt_format":"phi2"}}"#).unwrap();
        assert_eq!(cfg.tokenizer.prompt_format, PromptFormat::Phi2);
        assert_eq!(cfg.tokenizer.max_output_length, 512);
    }

    #[test]
    fn test_validate_rejects_oversized_output() {
        let mut cfg = TokenizerConfig::default();
        cfg.tokenizer.max_output_length = 2048;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            HelperError::ContextSizeMismatch {
                context_window_size: 1024,
                max_output_length: 2048
            }
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokenizer.json");

        let mut cfg = TokenizerConfig::default();
        cfg.context.context_window_size = 4096;
        cfg.tokenizer.add_bos_token = true;
        cfg.save(&path).unwrap();

        assert_eq!(TokenizerConfig::load_or_default(&path).unwrap(), cfg);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TokenizerConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(cfg, TokenizerConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            TokenizerConfig::load_or_default(&path),
            Err(HelperError::Json(_))
        ));

        std::fs::write(
            &path,
            r#"{"tokenizer":{"max_output_length":64},"context":{"context_window_size":32}}"#,
        )
        .unwrap();
        assert!(matches!(
            TokenizerConfig::load_or_default(&path),
            Err(HelperError::ContextSizeMismatch { .. })
        ));
    }
}
