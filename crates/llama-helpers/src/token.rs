//! Tokenization / detokenization helpers.

use tracing::debug;

use crate::error::Result;

/// Native `llama_token`.
pub type LlamaToken = i32;

/// `LLAMA_TOKEN_NULL`: the vocabulary has no such token.
pub const TOKEN_NULL: LlamaToken = -1;

/// Anything that can turn text into tokens of a fixed vocabulary.
///
/// Implemented by the borrowed native handles (`ModelRef`, `ContextRef`
/// with the `native` feature). Output is exactly what the vocabulary
/// produces; implementations never post-process it.
pub trait Tokenize {
    /// Tokenize `text`.
    ///
    /// * `add_bos` — prepend the beginning-of-sequence token.
    /// * `special` — parse special/control tokens embedded in `text`.
    fn tokenize(&self, text: &str, add_bos: bool, special: bool) -> Result<Vec<LlamaToken>>;

    /// Tokenize with special-token parsing off.
    fn tokenize_plain(&self, text: &str, add_bos: bool) -> Result<Vec<LlamaToken>> {
        self.tokenize(text, add_bos, false)
    }

    /// Text piece for a single token.
    fn token_to_piece(&self, token: LlamaToken) -> Result<String>;

    /// Beginning-of-sequence token of the vocabulary.
    fn token_bos(&self) -> Result<LlamaToken>;
}

impl<T: Tokenize + ?Sized> Tokenize for &T {
    fn tokenize(&self, text: &str, add_bos: bool, special: bool) -> Result<Vec<LlamaToken>> {
        (**self).tokenize(text, add_bos, special)
    }

    fn token_to_piece(&self, token: LlamaToken) -> Result<String> {
        (**self).token_to_piece(token)
    }

    fn token_bos(&self) -> Result<LlamaToken> {
        (**self).token_bos()
    }
}

/// Pair every token with its text piece. Meant for debug output.
pub fn detokenize_pairs<T: Tokenize + ?Sized>(
    tokenizer: &T,
    tokens: &[LlamaToken],
) -> Result<Vec<(LlamaToken, String)>> {
    let pairs = tokens
        .iter()
        .map(|&tok| Ok((tok, tokenizer.token_to_piece(tok)?)))
        .collect::<Result<Vec<_>>>()?;
    debug!(n_tokens = pairs.len(), "Detokenized");
    Ok(pairs)
}

#[cfg(feature = "native")]
pub use native::{tokenize_vocab, token_to_piece_vocab};
#[cfg(all(test, feature = "native"))]
pub(crate) use native::tokenize_vocab_sized;

#[cfg(feature = "native")]
mod native {
    use std::ffi::c_char;

    use super::LlamaToken;
    use crate::error::{HelperError, Result};

    /// Tokenize `text` against a raw vocabulary pointer.
    ///
    /// # Safety
    /// `vocab` must be a live vocabulary owned by a loaded model.
    pub unsafe fn tokenize_vocab(
        vocab: *const llama_sys::llama_vocab,
        text: &str,
        add_special: bool,
        parse_special: bool,
    ) -> Result<Vec<LlamaToken>> {
        // Upper bound used by llama.cpp's own helpers; the native call
        // reports the exact size as a negative count when it is too small.
        let guess = text.len() + 2 * usize::from(add_special);
        unsafe { tokenize_vocab_sized(vocab, text, add_special, parse_special, guess) }
    }

    /// [`tokenize_vocab`] starting from a caller-chosen buffer size.
    ///
    /// # Safety
    /// `vocab` must be a live vocabulary owned by a loaded model.
    pub(crate) unsafe fn tokenize_vocab_sized(
        vocab: *const llama_sys::llama_vocab,
        text: &str,
        add_special: bool,
        parse_special: bool,
        initial_capacity: usize,
    ) -> Result<Vec<LlamaToken>> {
        let text_len = i32::try_from(text.len())
            .map_err(|_| HelperError::Tokenization("text longer than i32::MAX bytes".into()))?;

        let mut tokens: Vec<LlamaToken> = vec![0; initial_capacity];
        let mut n = unsafe { call_tokenize(vocab, text, text_len, &mut tokens, add_special, parse_special)? };

        if n < 0 {
            tokens.resize(n.unsigned_abs() as usize, 0);
            n = unsafe { call_tokenize(vocab, text, text_len, &mut tokens, add_special, parse_special)? };
        }

        if n < 0 {
            return Err(HelperError::Tokenization(format!(
                "llama_tokenize returned {n}"
            )));
        }

        tokens.truncate(n as usize);
        Ok(tokens)
    }

    unsafe fn call_tokenize(
        vocab: *const llama_sys::llama_vocab,
        text: &str,
        text_len: i32,
        tokens: &mut [LlamaToken],
        add_special: bool,
        parse_special: bool,
    ) -> Result<i32> {
        let n_max = i32::try_from(tokens.len())
            .map_err(|_| HelperError::Tokenization("token buffer exceeds i32::MAX".into()))?;
        Ok(unsafe {
            llama_sys::llama_tokenize(
                vocab,
                text.as_ptr() as *const c_char,
                text_len,
                tokens.as_mut_ptr(),
                n_max,
                add_special,
                parse_special,
            )
        })
    }

    /// Text piece of a single token.
    ///
    /// # Safety
    /// `vocab` must be a live vocabulary owned by a loaded model.
    pub unsafe fn token_to_piece_vocab(
        vocab: *const llama_sys::llama_vocab,
        token: LlamaToken,
        special: bool,
    ) -> Result<String> {
        let mut buf = vec![0u8; 32];
        let mut len = unsafe {
            llama_sys::llama_token_to_piece(
                vocab,
                token,
                buf.as_mut_ptr() as *mut c_char,
                buf.len() as i32,
                0,
                special,
            )
        };

        if len < 0 {
            buf.resize(len.unsigned_abs() as usize, 0);
            len = unsafe {
                llama_sys::llama_token_to_piece(
                    vocab,
                    token,
                    buf.as_mut_ptr() as *mut c_char,
                    buf.len() as i32,
                    0,
                    special,
                )
            };
        }

        if len < 0 {
            return Err(HelperError::Tokenization(format!(
                "llama_token_to_piece returned {len} for token {token}"
            )));
        }

        buf.truncate(len as usize);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
