//! Inbound mailbox — what observers send to the agent.
//!
//! Free text becomes the next user turn. Answers to an agent question carry
//! the question's correlation identifier and go to a separate channel, but
//! only while that question is actually pending; anything else is accepted
//! and silently discarded.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channel::BoundedChannel;
use crate::correlator::PendingSlot;
use crate::error::ChannelError;

/// Default depth of both inbound channels.
pub const DEFAULT_INBOUND_DEPTH: usize = 10;

/// A message from an observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl InboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            request_id: None,
        }
    }

    pub fn response(request_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            request_id: Some(request_id.into()),
        }
    }
}

/// An answer tied to a specific question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedResponse {
    pub request_id: String,
    pub content: String,
}

/// What happened to a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued as the next user turn.
    Queued,
    /// Matched the pending question and was handed to the waiter.
    ResponseAccepted,
    /// Carried an identifier that matches no pending question.
    ResponseDiscarded,
}

pub struct InboundMailbox {
    text: BoundedChannel<String>,
    responses: BoundedChannel<CorrelatedResponse>,
    pending: Arc<PendingSlot>,
}

impl InboundMailbox {
    pub fn new(text_depth: usize, response_depth: usize, pending: Arc<PendingSlot>) -> Self {
        Self {
            text: BoundedChannel::new(text_depth),
            responses: BoundedChannel::new(response_depth),
            pending,
        }
    }

    /// Route a message without blocking.
    pub fn deliver(&self, message: InboundMessage) -> Result<Delivery, ChannelError> {
        let Some(request_id) = message.request_id else {
            self.text.put(message.content).inspect_err(|_| {
                warn!("Free-text inbound channel full, message dropped");
            })?;
            return Ok(Delivery::Queued);
        };

        if !self.pending.matches(&request_id) {
            debug!(request_id = %request_id, "No pending request with this id, response discarded");
            return Ok(Delivery::ResponseDiscarded);
        }

        self.responses
            .put(CorrelatedResponse {
                request_id: request_id.clone(),
                content: message.content,
            })
            .inspect_err(|_| {
                warn!(request_id = %request_id, "Response channel full, answer dropped");
            })?;
        Ok(Delivery::ResponseAccepted)
    }

    /// Blocking wait for the next free-text message (worker thread only).
    pub fn next_message(&self, timeout: Duration) -> Result<String, ChannelError> {
        self.text.get(timeout)
    }

    pub fn text_channel(&self) -> &BoundedChannel<String> {
        &self.text
    }

    pub fn responses(&self) -> &BoundedChannel<CorrelatedResponse> {
        &self.responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::PendingRequest;

    fn mailbox(depth: usize) -> (InboundMailbox, Arc<PendingSlot>) {
        let pending = Arc::new(PendingSlot::default());
        (InboundMailbox::new(depth, depth, pending.clone()), pending)
    }

    #[test]
    fn plain_text_is_queued() {
        let (mailbox, _) = mailbox(10);
        assert_eq!(
            mailbox.deliver(InboundMessage::text("hi")),
            Ok(Delivery::Queued)
        );
        assert_eq!(
            mailbox.next_message(Duration::from_millis(10)),
            Ok("hi".to_string())
        );
    }

    #[test]
    fn unmatched_response_is_discarded() {
        let (mailbox, _) = mailbox(10);
        assert_eq!(
            mailbox.deliver(InboundMessage::response("req_1", "42")),
            Ok(Delivery::ResponseDiscarded)
        );
        assert!(mailbox.responses().is_empty());
        assert!(mailbox.text_channel().is_empty());
    }

    #[test]
    fn matching_response_reaches_response_channel() {
        let (mailbox, pending) = mailbox(10);
        pending
            .install(PendingRequest::new("req_3", "Continue?", Duration::from_secs(5)))
            .unwrap();

        assert_eq!(
            mailbox.deliver(InboundMessage::response("req_3", "yes")),
            Ok(Delivery::ResponseAccepted)
        );
        assert_eq!(
            mailbox.responses().get_nowait(),
            Ok(CorrelatedResponse {
                request_id: "req_3".into(),
                content: "yes".into(),
            })
        );
    }

    #[test]
    fn full_text_channel_reports_full() {
        let (mailbox, _) = mailbox(1);
        mailbox.deliver(InboundMessage::text("a")).unwrap();
        assert_eq!(
            mailbox.deliver(InboundMessage::text("b")),
            Err(ChannelError::Full)
        );
    }

    #[test]
    fn inbound_message_parses_optional_request_id() {
        let plain: InboundMessage = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert!(plain.request_id.is_none());
        let answer: InboundMessage =
            serde_json::from_str(r#"{"content":"42","request_id":"req_1"}"#).unwrap();
        assert_eq!(answer.request_id.as_deref(), Some("req_1"));
    }
}
