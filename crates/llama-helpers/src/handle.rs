//! Borrowed views of caller-owned `llama_model` / `llama_context` handles.
//!
//! Loading, creating and freeing the native objects is the caller's job.
//! These types only forward calls while the lifetime `'a` keeps the owner
//! alive.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::error::{HelperError, Result};
use crate::token::{self, LlamaToken, TOKEN_NULL, Tokenize};

/// Non-owning reference to a loaded `llama_model`.
#[derive(Clone, Copy, Debug)]
pub struct ModelRef<'a> {
    ptr: NonNull<llama_sys::llama_model>,
    _owner: PhantomData<&'a llama_sys::llama_model>,
}

// Safety: llama_model is internally read-only after creation.
unsafe impl Send for ModelRef<'_> {}
unsafe impl Sync for ModelRef<'_> {}

impl<'a> ModelRef<'a> {
    /// Wrap a raw model pointer.
    ///
    /// # Safety
    /// `ptr` must point to a model that stays loaded for `'a`.
    pub unsafe fn from_raw(ptr: *const llama_sys::llama_model) -> Result<Self> {
        let ptr = NonNull::new(ptr.cast_mut()).ok_or(HelperError::NullPointer)?;
        Ok(Self {
            ptr,
            _owner: PhantomData,
        })
    }

    pub fn as_ptr(&self) -> *const llama_sys::llama_model {
        self.ptr.as_ptr()
    }

    /// Vocabulary handle (valid for the lifetime of the model).
    pub fn vocab(&self) -> *const llama_sys::llama_vocab {
        unsafe { llama_sys::llama_model_get_vocab(self.as_ptr()) }
    }

    pub fn n_vocab(&self) -> i32 {
        unsafe { llama_sys::llama_vocab_n_tokens(self.vocab()) }
    }

    pub fn n_ctx_train(&self) -> i32 {
        unsafe { llama_sys::llama_model_n_ctx_train(self.as_ptr()) }
    }
}

impl Tokenize for ModelRef<'_> {
    fn tokenize(&self, text: &str, add_bos: bool, special: bool) -> Result<Vec<LlamaToken>> {
        tokenize_with_model(*self, text, add_bos, special)
    }

    fn token_to_piece(&self, token: LlamaToken) -> Result<String> {
        unsafe { token::token_to_piece_vocab(self.vocab(), token, true) }
    }

    fn token_bos(&self) -> Result<LlamaToken> {
        let bos = unsafe { llama_sys::llama_vocab_bos(self.vocab()) };
        if bos == TOKEN_NULL {
            return Err(HelperError::Tokenization(
                "vocabulary has no BOS token".into(),
            ));
        }
        Ok(bos)
    }
}

/// Non-owning reference to a live `llama_context`.
#[derive(Debug)]
pub struct ContextRef<'a> {
    ptr: NonNull<llama_sys::llama_context>,
    _owner: PhantomData<&'a mut llama_sys::llama_context>,
}

// Safety: the borrow is exclusive to one thread at a time; the context
// itself is not shared.
unsafe impl Send for ContextRef<'_> {}

impl<'a> ContextRef<'a> {
    /// Wrap a raw context pointer.
    ///
    /// # Safety
    /// `ptr` must point to a context that stays alive for `'a` and is not
    /// used through any other path meanwhile.
    pub unsafe fn from_raw(ptr: *mut llama_sys::llama_context) -> Result<Self> {
        let ptr = NonNull::new(ptr).ok_or(HelperError::NullPointer)?;
        Ok(Self {
            ptr,
            _owner: PhantomData,
        })
    }

    pub fn as_ptr(&self) -> *mut llama_sys::llama_context {
        self.ptr.as_ptr()
    }

    /// Model the context was created from.
    pub fn model(&self) -> Result<ModelRef<'a>> {
        unsafe { ModelRef::from_raw(llama_sys::llama_get_model(self.as_ptr())) }
    }

    pub fn n_ctx(&self) -> u32 {
        unsafe { llama_sys::llama_n_ctx(self.as_ptr()) }
    }
}

impl Tokenize for ContextRef<'_> {
    fn tokenize(&self, text: &str, add_bos: bool, special: bool) -> Result<Vec<LlamaToken>> {
        tokenize_with_context(self, text, add_bos, special)
    }

    fn token_to_piece(&self, token: LlamaToken) -> Result<String> {
        self.model()?.token_to_piece(token)
    }

    fn token_bos(&self) -> Result<LlamaToken> {
        self.model()?.token_bos()
    }
}

/// Tokenize `text` with the vocabulary of the model behind `ctx`.
pub fn tokenize_with_context(
    ctx: &ContextRef<'_>,
    text: &str,
    add_bos: bool,
    special: bool,
) -> Result<Vec<LlamaToken>> {
    tokenize_with_model(ctx.model()?, text, add_bos, special)
}

/// Tokenize `text` with the vocabulary of `model`.
pub fn tokenize_with_model(
    model: ModelRef<'_>,
    text: &str,
    add_bos: bool,
    special: bool,
) -> Result<Vec<LlamaToken>> {
    unsafe { token::tokenize_vocab(model.vocab(), text, add_bos, special) }
}

#[cfg(test)]
mod tests {
    use std::ffi::{CString, c_char};

    use super::*;
    use crate::backend::LlamaBackend;
    use crate::token::tokenize_vocab_sized;

    /// Model + context loaded from `LLAMA_TEST_MODEL`, freed on drop.
    struct Loaded {
        model: *mut llama_sys::llama_model,
        ctx: *mut llama_sys::llama_context,
    }

    impl Loaded {
        fn from_env() -> Self {
            let path = std::env::var("LLAMA_TEST_MODEL")
                .expect("set LLAMA_TEST_MODEL to a GGUF file to run native tests");
            LlamaBackend::init();
            let c_path = CString::new(path).unwrap();
            let model = unsafe {
                llama_sys::llama_model_load_from_file(
                    c_path.as_ptr(),
                    llama_sys::llama_model_default_params(),
                )
            };
            assert!(!model.is_null(), "model failed to load");
            let mut params = unsafe { llama_sys::llama_context_default_params() };
            params.n_ctx = 256;
            let ctx = unsafe { llama_sys::llama_init_from_model(model, params) };
            assert!(!ctx.is_null(), "context creation failed");
            Self { model, ctx }
        }

        fn model(&self) -> ModelRef<'_> {
            unsafe { ModelRef::from_raw(self.model) }.unwrap()
        }

        fn ctx(&mut self) -> ContextRef<'_> {
            unsafe { ContextRef::from_raw(self.ctx) }.unwrap()
        }
    }

    impl Drop for Loaded {
        fn drop(&mut self) {
            unsafe {
                llama_sys::llama_free(self.ctx);
                llama_sys::llama_model_free(self.model);
            }
        }
    }

    const TEXT: &str = "The quick brown fox jumps over the lazy dog.";

    #[test]
    fn test_null_handles_are_rejected() {
        assert!(matches!(
            unsafe { ModelRef::from_raw(std::ptr::null()) },
            Err(HelperError::NullPointer)
        ));
        assert!(matches!(
            unsafe { ContextRef::from_raw(std::ptr::null_mut()) },
            Err(HelperError::NullPointer)
        ));
    }

    #[test]
    #[ignore = "needs LLAMA_TEST_MODEL"]
    fn test_empty_text_matches_native_call() {
        let loaded = Loaded::from_env();
        let model = loaded.model();

        let mut buf = [0 as LlamaToken; 8];
        let n = unsafe {
            llama_sys::llama_tokenize(
                model.vocab(),
                "".as_ptr() as *const c_char,
                0,
                buf.as_mut_ptr(),
                buf.len() as i32,
                false,
                false,
            )
        };
        assert!(n >= 0);
        let direct = buf[..n as usize].to_vec();

        assert_eq!(tokenize_with_model(model, "", false, false).unwrap(), direct);
    }

    #[test]
    #[ignore = "needs LLAMA_TEST_MODEL"]
    fn test_context_and_model_agree() {
        let mut loaded = Loaded::from_env();
        let via_model = tokenize_with_model(loaded.model(), TEXT, true, false).unwrap();
        let via_ctx = tokenize_with_context(&loaded.ctx(), TEXT, true, false).unwrap();
        assert_eq!(via_model, via_ctx);
        assert!(!via_model.is_empty());
    }

    #[test]
    #[ignore = "needs LLAMA_TEST_MODEL"]
    fn test_repeated_calls_are_identical() {
        let mut loaded = Loaded::from_env();
        let ctx = loaded.ctx();
        let first = ctx.tokenize(TEXT, false, true).unwrap();
        for _ in 0..3 {
            assert_eq!(ctx.tokenize(TEXT, false, true).unwrap(), first);
        }
    }

    #[test]
    #[ignore = "needs LLAMA_TEST_MODEL"]
    fn test_tokens_within_vocab() {
        let loaded = Loaded::from_env();
        let model = loaded.model();
        let n_vocab = model.n_vocab();
        assert!(n_vocab > 0);
        assert!(model.n_ctx_train() > 0);
        let tokens = model.tokenize(TEXT, true, false).unwrap();
        assert!(tokens.iter().all(|&t| (0..n_vocab).contains(&t)));
    }

    #[test]
    #[ignore = "needs LLAMA_TEST_MODEL"]
    fn test_undersized_buffer_is_retried() {
        let loaded = Loaded::from_env();
        let model = loaded.model();
        let expected = tokenize_with_model(model, TEXT, false, false).unwrap();
        assert!(expected.len() > 1);
        let retried = unsafe { tokenize_vocab_sized(model.vocab(), TEXT, false, false, 1) }.unwrap();
        assert_eq!(retried, expected);
    }
}
