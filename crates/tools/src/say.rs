//! Say tool — the agent's only way to talk to connected users.
//!
//! Everything else the model produces is internal thinking and reaches
//! observers only as best-effort activity.

use std::sync::Arc;

use async_trait::async_trait;
use cogloop_core::bus::OutboundBus;
use cogloop_core::error::ToolError;
use cogloop_core::event::OutboundEvent;
use cogloop_core::tool::{Tool, ToolResult};
use tracing::warn;

pub struct SayTool {
    bus: Arc<OutboundBus>,
}

impl SayTool {
    pub fn new(bus: Arc<OutboundBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Tool for SayTool {
    fn name(&self) -> &str {
        "say"
    }

    fn description(&self) -> &str {
        "Say something to connected users. This is your only way to communicate externally; your normal output is private thinking. Keep messages concise and direct."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to send to connected users"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let message = arguments["message"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'message' argument".into()))?;

        if self.bus.publish(OutboundEvent::say(message)).is_err() {
            warn!("Primary channel full, utterance dropped");
            return Ok(ToolResult::failed(
                "Message queue is full. Some users may not receive this message.",
            ));
        }

        let preview: String = message.chars().take(50).collect();
        Ok(ToolResult::ok(format!(
            "Message sent to connected users: {preview}..."
        )))
    }
}
