//! Owners of the native model and context.
//!
//! The helpers library only borrows these; this binary is the layer
//! that loads and frees them.

use std::ffi::CString;
use std::marker::PhantomData;
use std::path::Path;

use llama_helpers::{ContextRef, HelperError, ModelRef, Result};
use tracing::{debug, info};

/// Owns a `llama_model` pointer and frees it on drop.
pub struct OwnedModel {
    ptr: *mut llama_sys::llama_model,
}

impl OwnedModel {
    /// Load a GGUF model from `path`.
    ///
    /// `vocab_only` skips the weights; enough for tokenization but not
    /// for creating a context.
    pub fn load_from_file(path: &Path, n_gpu_layers: i32, vocab_only: bool) -> Result<Self> {
        let path_str = path.to_str().ok_or_else(|| HelperError::ModelLoadFailed {
            path: path.display().to_string(),
            reason: "Invalid UTF-8 in path".into(),
        })?;
        let c_path = CString::new(path_str).map_err(|_| HelperError::ModelLoadFailed {
            path: path_str.into(),
            reason: "Path contains null byte".into(),
        })?;

        let mut raw = unsafe { llama_sys::llama_model_default_params() };
        raw.n_gpu_layers = n_gpu_layers;
        raw.vocab_only = vocab_only;

        info!(path = %path.display(), vocab_only, "Loading model");
        let ptr = unsafe { llama_sys::llama_model_load_from_file(c_path.as_ptr(), raw) };
        if ptr.is_null() {
            return Err(HelperError::ModelLoadFailed {
                path: path_str.into(),
                reason: "llama_model_load_from_file returned null".into(),
            });
        }
        Ok(Self { ptr })
    }

    pub fn borrow(&self) -> Result<ModelRef<'_>> {
        unsafe { ModelRef::from_raw(self.ptr) }
    }
}

impl Drop for OwnedModel {
    fn drop(&mut self) {
        debug!("Freeing llama model");
        unsafe { llama_sys::llama_model_free(self.ptr) }
    }
}

/// Owns a `llama_context`; cannot outlive its model.
pub struct OwnedContext<'m> {
    ptr: *mut llama_sys::llama_context,
    _model: PhantomData<&'m OwnedModel>,
}

impl<'m> OwnedContext<'m> {
    pub fn new(model: &'m OwnedModel, n_ctx: u32) -> Result<Self> {
        let mut raw = unsafe { llama_sys::llama_context_default_params() };
        raw.n_ctx = n_ctx;
        raw.n_batch = n_ctx;

        let ptr = unsafe { llama_sys::llama_init_from_model(model.ptr, raw) };
        if ptr.is_null() {
            return Err(HelperError::ContextCreationFailed(
                "llama_init_from_model returned null".into(),
            ));
        }
        debug!(n_ctx, "Context created");
        Ok(Self {
            ptr,
            _model: PhantomData,
        })
    }

    pub fn borrow(&mut self) -> Result<ContextRef<'_>> {
        unsafe { ContextRef::from_raw(self.ptr) }
    }
}

impl Drop for OwnedContext<'_> {
    fn drop(&mut self) {
        debug!("Freeing llama context");
        unsafe { llama_sys::llama_free(self.ptr) }
    }
}
