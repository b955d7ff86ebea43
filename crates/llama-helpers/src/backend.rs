//! Process-wide llama.cpp backend setup.

use std::ffi::{CStr, c_char, c_void};
use std::sync::Once;

use tracing::{debug, info};

static BACKEND_INIT: Once = Once::new();

/// Token proving the native backend has been initialized.
///
/// The first call to [`LlamaBackend::init`] initializes the C backend;
/// later calls are no-ops. The backend lives until process exit.
pub struct LlamaBackend {
    _private: (),
}

impl LlamaBackend {
    pub fn init() -> Self {
        BACKEND_INIT.call_once(|| {
            unsafe { llama_sys::llama_backend_init() };
            info!("llama.cpp backend initialized");
        });
        Self { _private: () }
    }

    /// Route llama.cpp log output into `tracing` (target `llama.cpp`).
    pub fn set_log_callback(&self) {
        unsafe {
            llama_sys::llama_log_set(Some(forward_log), std::ptr::null_mut());
        }
        debug!("llama.cpp log callback installed");
    }
}

unsafe extern "C" fn forward_log(
    level: llama_sys::ggml_log_level,
    text: *const c_char,
    _user_data: *mut c_void,
) {
    if text.is_null() {
        return;
    }
    let msg = unsafe { CStr::from_ptr(text) }.to_string_lossy();
    let msg = msg.trim();
    if msg.is_empty() {
        return;
    }
    // ggml_log_level: DEBUG=1, INFO=2, WARN=3, ERROR=4
    match level {
        4 => tracing::error!(target: "llama.cpp", "{msg}"),
        3 => tracing::warn!(target: "llama.cpp", "{msg}"),
        2 => tracing::info!(target: "llama.cpp", "{msg}"),
        _ => tracing::debug!(target: "llama.cpp", "{msg}"),
    }
}
