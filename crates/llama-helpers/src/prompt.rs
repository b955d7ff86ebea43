//! Chat → prompt tokens, sized to the context window.

use tracing::{debug, warn};

use crate::chat::ChatEntry;
use crate::config::TokenizerConfig;
use crate::error::Result;
use crate::token::{LlamaToken, Tokenize};

/// Tokenizes prompts so that `max_output_length` tokens stay free in the
/// context window for generation.
#[derive(Debug, Clone)]
pub struct PromptTokenizer {
    config: TokenizerConfig,
}

impl PromptTokenizer {
    pub fn new(config: TokenizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Render `chat` in the configured prompt format and tokenize it.
    pub fn tokenize_chat<T: Tokenize + ?Sized>(
        &self,
        tokenizer: &T,
        chat: &[ChatEntry],
    ) -> Result<Vec<LlamaToken>> {
        let prompt = self.config.tokenizer.prompt_format.format(chat)?;
        self.tokenize_prompt(tokenizer, &prompt)
    }

    /// Tokenize an already formatted prompt.
    ///
    /// When the prompt is longer than the budget only its most recent
    /// tokens are kept. An empty result is replaced by the BOS token so
    /// generation never starts from nothing.
    pub fn tokenize_prompt<T: Tokenize + ?Sized>(
        &self,
        tokenizer: &T,
        prompt: &str,
    ) -> Result<Vec<LlamaToken>> {
        let params = &self.config.tokenizer;
        let mut tokens = tokenizer.tokenize(prompt, params.add_bos_token, params.parse_special)?;

        let budget = self.config.prompt_budget();
        if tokens.len() > budget {
            debug!(
                n_tokens = tokens.len(),
                budget, "Prompt exceeds budget, keeping the tail"
            );
            tokens.drain(..tokens.len() - budget);
        }

        if tokens.is_empty() {
            warn!(
                "Prompt mapped to no tokens; seeding it with BOS so generation has input"
            );
            tokens.push(tokenizer.token_bos()?);
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{PromptFormat, format_llama2_chat};
    use crate::error::HelperError;

    /// One token per byte, BOS = 1000.
    struct ByteTokenizer;

    impl Tokenize for ByteTokenizer {
        fn tokenize(&self, text: &str, add_bos: bool, _special: bool) -> Result<Vec<LlamaToken>> {
            let mut out: Vec<LlamaToken> = Vec::new();
            if add_bos {
                out.push(self.token_bos()?);
            }
            out.extend(text.bytes().map(LlamaToken::from));
            Ok(out)
        }

        fn token_to_piece(&self, token: LlamaToken) -> Result<String> {
            Ok(char::from(token as u8).to_string())
        }

        fn token_bos(&self) -> Result<LlamaToken> {
            Ok(1000)
        }
    }

    /// Vocabulary without a BOS token.
    struct NoBos;

    impl Tokenize for NoBos {
        fn tokenize(&self, _text: &str, _add_bos: bool, _special: bool) -> Result<Vec<LlamaToken>> {
            Ok(Vec::new())
        }

        fn token_to_piece(&self, _token: LlamaToken) -> Result<String> {
            Ok(String::new())
        }

        fn token_bos(&self) -> Result<LlamaToken> {
            Err(HelperError::Tokenization("vocabulary has no BOS token".into()))
        }
    }

    fn tokenizer_with(window: u32, reserved: u32, add_bos: bool) -> PromptTokenizer {
        let mut cfg = TokenizerConfig::default();
        cfg.context.context_window_size = window;
        cfg.tokenizer.max_output_length = reserved;
        cfg.tokenizer.add_bos_token = add_bos;
        PromptTokenizer::new(cfg).unwrap()
    }

    #[test]
    fn test_short_prompt_untouched() {
        let pt = tokenizer_with(16, 4, false);
        assert_eq!(pt.tokenize_prompt(&ByteTokenizer, "abc").unwrap(), vec![97, 98, 99]);
    }

    #[test]
    fn test_add_bos_is_forwarded() {
        let pt = tokenizer_with(16, 4, true);
        assert_eq!(
            pt.tokenize_prompt(&ByteTokenizer, "a").unwrap(),
            vec![1000, 97]
        );
    }

    #[test]
    fn test_long_prompt_keeps_tail() {
        let pt = tokenizer_with(8, 5, false);
        assert_eq!(
            pt.tokenize_prompt(&ByteTokenizer, "abcdef").unwrap(),
            vec![100, 101, 102]
        );
    }

    #[test]
    fn test_prompt_exactly_at_budget() {
        let pt = tokenizer_with(8, 5, false);
        assert_eq!(pt.tokenize_prompt(&ByteTokenizer, "abc").unwrap().len(), 3);
    }

    #[test]
    fn test_empty_prompt_gets_bos() {
        let pt = tokenizer_with(16, 4, false);
        assert_eq!(pt.tokenize_prompt(&ByteTokenizer, "").unwrap(), vec![1000]);
    }

    #[test]
    fn test_zero_budget_falls_back_to_bos() {
        let pt = tokenizer_with(4, 4, false);
        assert_eq!(pt.tokenize_prompt(&ByteTokenizer, "abc").unwrap(), vec![1000]);
    }

    #[test]
    fn test_empty_prompt_without_bos_is_an_error() {
        let pt = tokenizer_with(16, 4, false);
        assert!(matches!(
            pt.tokenize_prompt(&NoBos, "anything"),
            Err(HelperError::Tokenization(_))
        ));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut cfg = TokenizerConfig::default();
        cfg.tokenizer.max_output_length = cfg.context.context_window_size + 1;
        assert!(matches!(
            PromptTokenizer::new(cfg),
            Err(HelperError::ContextSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_tokenize_chat_requires_system_and_user() {
        let pt = tokenizer_with(1024, 0, false);
        let err = pt
            .tokenize_chat(&ByteTokenizer, &[ChatEntry::user("hi")])
            .unwrap_err();
        assert!(matches!(err, HelperError::IllegalContext(_)));
    }

    #[test]
    fn test_tokenize_chat_uses_configured_format() {
        let mut cfg = TokenizerConfig::default();
        cfg.tokenizer.max_output_length = 0;
        cfg.tokenizer.prompt_format = PromptFormat::Phi2;
        let pt = PromptTokenizer::new(cfg).unwrap();
        assert_eq!(pt.config().tokenizer.prompt_format, PromptFormat::Phi2);

        let chat = [ChatEntry::system("S"), ChatEntry::user("U")];
        let tokens = pt.tokenize_chat(&ByteTokenizer, &chat).unwrap();
        let expected: Vec<LlamaToken> = "System: S\nInstruct: U\nOutput: "
            .bytes()
            .map(LlamaToken::from)
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_tokenize_chat_matches_formatted_prompt() {
        let pt = tokenizer_with(1024, 0, false);
        let chat = [ChatEntry::system("s"), ChatEntry::user("u")];
        let expected = format_llama2_chat(&chat).unwrap();
        let tokens = pt.tokenize_chat(&ByteTokenizer, &chat).unwrap();
        assert_eq!(tokens.len(), expected.len());
    }
}
