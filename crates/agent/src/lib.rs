//! The cognitive loop — the heart of cogloop.
//!
//! A single worker keeps one long-running conversation and cycles
//! **Observe → Decide → Consolidate**:
//!
//! 1. **Observe** user messages, heartbeats and the first-run wake-up
//! 2. **Decide** by calling the model, executing tool calls and feeding the
//!    results back until it answers in plain text
//! 3. **Consolidate** the history once it outgrows its cap
//!
//! Everything the agent tells the outside world goes through the outbound
//! bus; questions go through the request correlator.

pub mod decision;
pub mod driver;
pub mod prompt;

pub use decision::{DecisionFunction, ToolCallingDecider};
pub use driver::{CognitiveLoopDriver, LoopSettings, LoopState};
pub use prompt::{BOOTSTRAP_PROMPT, initial_history, load_system_prompt};
