//! Sequence-id buffers for batch submission.
//!
//! Every token of a single-session prompt lives on sequence `0`, so the
//! buffer handed to the batch is always the one-element vector `[0]`.

/// Native `llama_seq_id`.
pub type LlamaSeqId = i32;

/// The sequence every single-session token is assigned to.
pub const DEFAULT_SEQ_ID: LlamaSeqId = 0;

/// One-element sequence-id buffer `[0]` for any integer element type.
///
/// `single_seq_id::<i32>()` covers callers that cannot name
/// [`LlamaSeqId`] directly.
pub fn single_seq_id<T: From<u8>>() -> Vec<T> {
    vec![T::from(0)]
}

/// One-element buffer `[0]` typed as [`LlamaSeqId`].
pub fn seq_id_vector() -> Vec<LlamaSeqId> {
    single_seq_id()
}
