//! Outbound events: everything the agent tells its observers.

use serde::{Deserialize, Serialize};

/// What an outbound event carries. The serialized name is the SSE event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Something the agent deliberately says to the user
    #[serde(rename = "say")]
    Utterance,
    /// A glimpse of the model's reasoning
    Think,
    /// A tool invocation
    Tool,
    /// A question awaiting a human answer
    InputRequest,
    /// Keep-alive emitted by an idle session
    Heartbeat,
    /// Session preamble with model metadata
    Config,
}

impl EventKind {
    /// SSE event name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utterance => "say",
            Self::Think => "think",
            Self::Tool => "tool",
            Self::InputRequest => "input_request",
            Self::Heartbeat => "heartbeat",
            Self::Config => "config",
        }
    }

    /// Activity kinds go to the side channel; they are informative only.
    pub fn is_activity(&self) -> bool {
        matches!(self, Self::Think | Self::Tool)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub kind: EventKind,
    pub payload: String,
    /// Correlation identifier, set on input requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl OutboundEvent {
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            request_id: None,
        }
    }

    pub fn say(payload: impl Into<String>) -> Self {
        Self::new(EventKind::Utterance, payload)
    }

    pub fn think(payload: impl Into<String>) -> Self {
        Self::new(EventKind::Think, payload)
    }

    pub fn tool(payload: impl Into<String>) -> Self {
        Self::new(EventKind::Tool, payload)
    }

    pub fn input_request(request_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..Self::new(EventKind::InputRequest, question)
        }
    }

    pub fn heartbeat() -> Self {
        Self::new(EventKind::Heartbeat, "")
    }

    /// Session preamble: `{"max_tokens": .., "model_name": ..}`.
    pub fn config(max_tokens: u64, model_name: &str) -> Self {
        let payload = serde_json::json!({
            "max_tokens": max_tokens,
            "model_name": model_name,
        });
        Self::new(EventKind::Config, payload.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_wire_protocol() {
        assert_eq!(EventKind::Utterance.as_str(), "say");
        assert_eq!(EventKind::InputRequest.as_str(), "input_request");
        assert_eq!(
            serde_json::to_string(&EventKind::Utterance).unwrap(),
            r#""say""#
        );
        assert_eq!(
            serde_json::to_string(&EventKind::InputRequest).unwrap(),
            r#""input_request""#
        );
    }

    #[test]
    fn activity_kinds() {
        assert!(EventKind::Think.is_activity());
        assert!(EventKind::Tool.is_activity());
        assert!(!EventKind::Utterance.is_activity());
        assert!(!EventKind::InputRequest.is_activity());
    }

    #[test]
    fn config_payload_is_json() {
        let event = OutboundEvent::config(128_000, "gpt-oss:120b");
        let parsed: serde_json::Value = serde_json::from_str(&event.payload).unwrap();
        assert_eq!(parsed["max_tokens"], 128_000);
        assert_eq!(parsed["model_name"], "gpt-oss:120b");
    }

    #[test]
    fn input_request_carries_id() {
        let event = OutboundEvent::input_request("req_1", "Proceed?");
        assert_eq!(event.kind, EventKind::InputRequest);
        assert_eq!(event.request_id.as_deref(), Some("req_1"));
        assert_eq!(event.payload, "Proceed?");
    }
}
