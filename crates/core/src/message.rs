//! Message and conversation-history domain types.
//!
//! A [`ConversationHistory`] is the agent's whole memory of the dialogue: one
//! system turn followed by user, assistant and tool turns. It is owned by the
//! loop driver and handed to the decision function by reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::DecisionError;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (also used for synthetic bootstrap and heartbeat turns)
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// Attach tool calls to an assistant message.
    pub fn with_tool_calls(mut self, tool_calls: Vec<MessageToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

/// Ordered turns of the single long-lived conversation.
///
/// Always starts with exactly one system turn; no other system turn may
/// appear. Append-only, except for [`ConversationHistory::consolidate`].
#[derive(Debug, Clone, Serialize)]
pub struct ConversationHistory {
    turns: Vec<Message>,
}

impl ConversationHistory {
    /// A history holding only the system turn.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Message::system(system_prompt)],
        }
    }

    /// Rebuild a history from raw turns, checking the system-turn invariant.
    pub fn from_turns(turns: Vec<Message>) -> Result<Self, DecisionError> {
        match turns.first() {
            Some(first) if first.role == Role::System => {}
            Some(_) => {
                return Err(DecisionError::InvalidHistory(
                    "first turn is not a system turn".into(),
                ));
            }
            None => return Err(DecisionError::InvalidHistory("history is empty".into())),
        }
        if turns.iter().skip(1).any(|m| m.role == Role::System) {
            return Err(DecisionError::InvalidHistory(
                "more than one system turn".into(),
            ));
        }
        Ok(Self { turns })
    }

    /// Append a turn. System turns are refused so the invariant holds.
    pub fn push(&mut self, message: Message) {
        if message.role == Role::System {
            warn!("Refusing to append a second system turn");
            return;
        }
        self.turns.push(message);
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    /// The leading system turn.
    pub fn system(&self) -> &Message {
        &self.turns[0]
    }

    pub fn last(&self) -> &Message {
        // never empty: the system turn is always present
        &self.turns[self.turns.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Trim to `[system] + last min(keep, cap - 1)` turns when longer than `cap`.
    ///
    /// Returns whether anything was removed. Idempotent once `len() <= cap`.
    pub fn consolidate(&mut self, cap: usize, keep: usize) -> bool {
        if self.turns.len() <= cap {
            return false;
        }
        let keep = keep.min(cap.saturating_sub(1));
        let tail_start = self.turns.len() - keep;
        let tail = self.turns.split_off(tail_start);
        self.turns.truncate(1);
        self.turns.extend(tail);
        true
    }
}
