use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Illegal chat context: {0}")]
    IllegalContext(String),

    #[error(
        "max_output_length ({max_output_length}) exceeds the context window ({context_window_size})"
    )]
    ContextSizeMismatch {
        context_window_size: u32,
        max_output_length: u32,
    },

    #[error("Null pointer from FFI call")]
    NullPointer,

    #[error("Failed to load model from '{path}': {reason}")]
    ModelLoadFailed { path: String, reason: String },

    #[error("Failed to create context: {0}")]
    ContextCreationFailed(String),

    #[error("Batch capacity ({0}) exceeded")]
    BatchFull(usize),

    #[error("Token carries {n_seq_ids} sequence ids, batch allows {n_seq_max}")]
    SeqIdsExceeded { n_seq_ids: usize, n_seq_max: usize },

    #[error("Batch size out of range: {0}")]
    BatchRange(String),

    #[error("Decode failed with code {0}")]
    DecodeFailed(i32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HelperError>;
