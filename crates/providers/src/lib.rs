//! LLM provider implementations for cogloop.
//!
//! All providers implement the `cogloop_core::Provider` trait. The runtime
//! talks to a single OpenAI-compatible endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use cogloop_core::Provider;
use cogloop_core::control::{ControlPlane, DEFAULT_CONTEXT_WINDOW};
use tracing::{info, warn};

/// Look up the model's context window once and record it on the control plane.
///
/// Never fails: any lookup error or a model missing from the listing leaves
/// [`DEFAULT_CONTEXT_WINDOW`] in place.
pub async fn resolve_context_window(provider: &dyn Provider, control: &ControlPlane) -> u64 {
    let model = control.model_name();
    let tokens = match provider.context_window(model).await {
        Ok(Some(tokens)) => {
            info!(model, tokens, "Found context window");
            tokens
        }
        Ok(None) => {
            info!(model, "Model not found in listing, using default context window");
            DEFAULT_CONTEXT_WINDOW
        }
        Err(e) => {
            warn!(model, error = %e, "Context window lookup failed, using default");
            DEFAULT_CONTEXT_WINDOW
        }
    };
    control.set_context_window(tokens);
    tokens
}
