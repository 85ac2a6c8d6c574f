//! Human-in-the-loop: ask connected users a question and wait for the answer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cogloop_core::correlator::RequestCorrelator;
use cogloop_core::error::{CorrelatorError, ToolError};
use cogloop_core::tool::{Tool, ToolResult};
use tracing::warn;

pub struct RequestUserInputTool {
    correlator: Arc<RequestCorrelator>,
    default_timeout: Duration,
}

impl RequestUserInputTool {
    pub fn new(correlator: Arc<RequestCorrelator>, default_timeout: Duration) -> Self {
        Self {
            correlator,
            default_timeout,
        }
    }
}

#[async_trait]
impl Tool for RequestUserInputTool {
    fn name(&self) -> &str {
        "request_user_input"
    }

    fn description(&self) -> &str {
        "Ask the connected user a question and wait for their reply. Use it for clarification, confirmation before acting, or information only the user has. Blocks until an answer arrives or the timeout expires."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask. Be clear and specific."
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "How long to wait for a reply",
                    "default": self.default_timeout.as_secs()
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let question = arguments["question"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'question' argument".into()))?;
        let timeout = arguments["timeout_seconds"]
            .as_u64()
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        match self.correlator.issue(question, timeout).await {
            Ok(answer) => Ok(ToolResult::ok(answer)),
            Err(CorrelatorError::Busy { pending_id }) => Ok(ToolResult::failed(format!(
                "Another question ({pending_id}) is still waiting for an answer. Wait for it before asking again."
            ))),
            Err(CorrelatorError::Undelivered(e)) => {
                warn!(error = %e, "Question could not be queued");
                Ok(ToolResult::failed(
                    "Could not send question - message queue full.",
                ))
            }
        }
    }
}
