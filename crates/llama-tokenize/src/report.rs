use std::fmt::Write;

use llama_helpers::LlamaToken;
use serde::Serialize;

/// What a tokenize run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenizeReport {
    pub n_tokens: usize,
    pub tokens: Vec<LlamaToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pieces: Option<Vec<String>>,
    /// Set when the prompt was decoded (`chat --eval`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_ctx: Option<u32>,
}

impl TokenizeReport {
    pub fn new(tokens: Vec<LlamaToken>) -> Self {
        Self {
            n_tokens: tokens.len(),
            tokens,
            ..Default::default()
        }
    }

    /// One token per line; `id<TAB>piece` when pieces are present.
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        match &self.pieces {
            Some(pieces) => {
                for (tok, piece) in self.tokens.iter().zip(pieces) {
                    let _ = writeln!(out, "{tok}\t{piece:?}");
                }
            }
            None => {
                for tok in &self.tokens {
                    let _ = writeln!(out, "{tok}");
                }
            }
        }
        let _ = writeln!(out, "# {} tokens", self.n_tokens);
        if let Some(n_ctx) = self.n_ctx {
            let _ = writeln!(out, "# decoded in a {n_ctx}-token context");
        }
        out
    }
}
