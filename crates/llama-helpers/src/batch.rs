//! Owned `llama_batch` for submitting a prompt to a borrowed context.

use crate::error::{HelperError, Result};

/// Slot limits a `llama_batch` was allocated with.
///
/// Every write into the native arrays goes through [`BatchShape::check_slot`]
/// first; the arrays themselves carry no length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchShape {
    capacity: usize,
    n_seq_max: usize,
}

impl BatchShape {
    pub fn new(capacity: usize, n_seq_max: usize) -> Result<Self> {
        i32::try_from(capacity)
            .map_err(|_| HelperError::BatchRange(format!("capacity {capacity} exceeds i32::MAX")))?;
        i32::try_from(n_seq_max)
            .map_err(|_| HelperError::BatchRange(format!("n_seq_max {n_seq_max} exceeds i32::MAX")))?;
        if n_seq_max == 0 {
            return Err(HelperError::BatchRange("n_seq_max must be at least 1".into()));
        }
        Ok(Self { capacity, n_seq_max })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn n_seq_max(&self) -> usize {
        self.n_seq_max
    }

    /// Can token slot `index` take `n_seq_ids` sequence ids?
    pub fn check_slot(&self, index: usize, n_seq_ids: usize) -> Result<()> {
        if index >= self.capacity {
            return Err(HelperError::BatchFull(self.capacity));
        }
        if n_seq_ids > self.n_seq_max {
            return Err(HelperError::SeqIdsExceeded {
                n_seq_ids,
                n_seq_max: self.n_seq_max,
            });
        }
        Ok(())
    }
}

/// Absolute position of the `offset`-th token of a run starting at `pos0`.
pub fn position(pos0: i32, offset: usize) -> Result<i32> {
    i32::try_from(offset)
        .ok()
        .and_then(|o| pos0.checked_add(o))
        .ok_or_else(|| HelperError::BatchRange(format!("position {pos0} + {offset} overflows i32")))
}

#[cfg(feature = "native")]
pub use native::LlamaBatch;

#[cfg(feature = "native")]
mod native {
    use tracing::debug;

    use super::{BatchShape, position};
    use crate::error::{HelperError, Result};
    use crate::handle::ContextRef;
    use crate::seq::{LlamaSeqId, seq_id_vector};
    use crate::token::LlamaToken;

    /// RAII batch of tokens; the native allocations are freed on drop.
    pub struct LlamaBatch {
        inner: llama_sys::llama_batch,
        shape: BatchShape,
    }

    impl LlamaBatch {
        /// Allocate a token batch for up to `capacity` tokens, each on at
        /// most one sequence.
        pub fn new(capacity: usize) -> Result<Self> {
            Self::with_seq_max(capacity, 1)
        }

        /// Allocate a token batch whose tokens may sit on up to `n_seq_max`
        /// sequences each.
        pub fn with_seq_max(capacity: usize, n_seq_max: usize) -> Result<Self> {
            let shape = BatchShape::new(capacity, n_seq_max)?;
            // Both fit i32, checked by BatchShape::new.
            let inner = unsafe {
                llama_sys::llama_batch_init(capacity as i32, 0, n_seq_max as i32)
            };
            if inner.token.is_null() {
                return Err(HelperError::NullPointer);
            }
            Ok(Self { inner, shape })
        }

        pub fn shape(&self) -> BatchShape {
            self.shape
        }

        pub fn len(&self) -> usize {
            self.inner.n_tokens as usize
        }

        pub fn is_empty(&self) -> bool {
            self.inner.n_tokens == 0
        }

        /// Push one token at absolute position `pos`.
        pub fn add(
            &mut self,
            token: LlamaToken,
            pos: i32,
            seq_ids: &[LlamaSeqId],
            logits: bool,
        ) -> Result<()> {
            let i = self.len();
            self.shape.check_slot(i, seq_ids.len())?;

            // i < capacity and seq_ids.len() <= n_seq_max, the sizes the
            // arrays were allocated with.
            unsafe {
                *self.inner.token.add(i) = token;
                *self.inner.pos.add(i) = pos;
                *self.inner.n_seq_id.add(i) = seq_ids.len() as i32;
                let slot = *self.inner.seq_id.add(i);
                for (j, &sid) in seq_ids.iter().enumerate() {
                    *slot.add(j) = sid;
                }
                *self.inner.logits.add(i) = i8::from(logits);
            }
            self.inner.n_tokens += 1;
            Ok(())
        }

        /// Push a whole prompt on sequence `[0]`, starting at `pos0`.
        /// Only the last token requests logits.
        pub fn add_sequence(&mut self, tokens: &[LlamaToken], pos0: i32) -> Result<()> {
            let seq_ids = seq_id_vector();
            let last = tokens.len().saturating_sub(1);
            for (i, &tok) in tokens.iter().enumerate() {
                self.add(tok, position(pos0, i)?, &seq_ids, i == last)?;
            }
            Ok(())
        }

        /// Logits flag of every queued token.
        pub fn logits_flags(&self) -> Vec<bool> {
            (0..self.len())
                .map(|i| unsafe { *self.inner.logits.add(i) != 0 })
                .collect()
        }

        /// Run the batch through `ctx`.
        pub fn decode(&self, ctx: &mut ContextRef<'_>) -> Result<()> {
            let rc = unsafe { llama_sys::llama_decode(ctx.as_ptr(), self.inner) };
            if rc != 0 {
                return Err(HelperError::DecodeFailed(rc));
            }
            debug!(n_tokens = self.len(), "Batch decoded");
            Ok(())
        }
    }

    impl Drop for LlamaBatch {
        fn drop(&mut self) {
            unsafe { llama_sys::llama_batch_free(self.inner) }
        }
    }

}
