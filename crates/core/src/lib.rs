//! # cogloop core
//!
//! Domain types and the concurrency fabric of the cogloop agent runtime.
//!
//! ## Layout
//!
//! - [`channel::BoundedChannel`]: bounded queue shared by threads and tasks
//! - [`bus::OutboundBus`]: agent output (primary + activity side channel)
//! - [`mailbox::InboundMailbox`]: user input and correlated answers
//! - [`correlator::RequestCorrelator`]: one outstanding human-in-the-loop question
//! - [`control::ControlPlane`]: pause flag and model metadata
//! - [`context::RuntimeContext`]: all of the above, built once and shared
//!
//! Provider and tool traits live here too, so the agent and gateway crates
//! depend inward on core only.

pub mod bus;
pub mod channel;
pub mod context;
pub mod control;
pub mod correlator;
pub mod error;
pub mod event;
pub mod mailbox;
pub mod message;
pub mod provider;
pub mod tool;

pub use bus::OutboundBus;
pub use channel::BoundedChannel;
pub use context::{QueueDepths, RuntimeContext};
pub use control::ControlPlane;
pub use correlator::{PendingRequest, RequestCorrelator};
pub use error::{ChannelError, CorrelatorError, DecisionError, ProviderError, ToolError};
pub use event::{EventKind, OutboundEvent};
pub use mailbox::{Delivery, InboundMailbox, InboundMessage};
pub use message::{ConversationHistory, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
