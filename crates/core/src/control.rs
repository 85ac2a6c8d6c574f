//! Control plane — pause/resume flag plus model metadata.
//!
//! Plain atomics: each field has a single logical writer and readers tolerate
//! one loop iteration of staleness.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::info;

/// Context window assumed when the model metadata lookup fails.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 128_000;

#[derive(Debug)]
pub struct ControlPlane {
    paused: AtomicBool,
    context_window: AtomicU64,
    model_name: String,
}

impl ControlPlane {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            paused: AtomicBool::new(false),
            context_window: AtomicU64::new(DEFAULT_CONTEXT_WINDOW),
            model_name: model_name.into(),
        }
    }

    /// Stop starting new decision passes. Idempotent.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::Release) {
            info!("Agent loop paused");
        }
    }

    /// Allow decision passes again. Idempotent.
    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::Release) {
            info!("Agent loop resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn context_window(&self) -> u64 {
        self.context_window.load(Ordering::Relaxed)
    }

    pub fn set_context_window(&self, tokens: u64) {
        self.context_window.store(tokens, Ordering::Relaxed);
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}
