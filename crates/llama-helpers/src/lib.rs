//! Tokenization helpers over the llama.cpp C API.
//!
//! The native model and context are owned elsewhere; this crate borrows
//! them to tokenize text and builds the sequence-id buffer used for
//! batch submission. Prompt formatting and context-window sizing are
//! pure Rust and work without the `native` feature.

pub mod batch;
pub mod chat;
pub mod config;
pub mod error;
pub mod prompt;
pub mod seq;
pub mod token;

#[cfg(feature = "native")]
pub mod backend;
#[cfg(feature = "native")]
pub mod handle;

pub use batch::{BatchShape, position};
pub use chat::{ChatEntry, PromptFormat, Role, format_llama2_chat, format_phi2_chat};
pub use config::{ContextWindow, TokenizerConfig, TokenizerParams};
pub use error::{HelperError, Result};
pub use prompt::PromptTokenizer;
pub use seq::{DEFAULT_SEQ_ID, LlamaSeqId, seq_id_vector, single_seq_id};
pub use token::{LlamaToken, TOKEN_NULL, Tokenize, detokenize_pairs};

#[cfg(feature = "native")]
pub use backend::LlamaBackend;
#[cfg(feature = "native")]
pub use batch::LlamaBatch;
#[cfg(feature = "native")]
pub use handle::{ContextRef, ModelRef, tokenize_with_context, tokenize_with_model};
