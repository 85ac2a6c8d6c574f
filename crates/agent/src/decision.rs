//! The decision function: one reasoning pass over the conversation.
//!
//! A decision takes the current history and returns the history it should
//! become. Every side effect (speaking, asking, running commands) goes
//! through the tools, which only touch the outbound bus and the correlator,
//! so a pass can be swapped for a scripted one in tests.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use cogloop_core::bus::OutboundBus;
use cogloop_core::error::DecisionError;
use cogloop_core::event::OutboundEvent;
use cogloop_core::message::{ConversationHistory, Message, Role};
use cogloop_core::provider::{Provider, ProviderRequest};
use cogloop_core::tool::{ToolCall, ToolRegistry};
use tracing::{debug, info, warn};

/// Maximum characters of model text shown as a `think` event.
const THINK_PREVIEW_CHARS: usize = 200;
/// Maximum characters of tool arguments shown as a `tool` event.
const TOOL_PREVIEW_CHARS: usize = 100;

#[async_trait]
pub trait DecisionFunction: Send + Sync {
    /// Run one pass. On error the caller keeps the history it passed in.
    async fn decide(
        &self,
        history: &ConversationHistory,
    ) -> Result<ConversationHistory, DecisionError>;
}

/// Provider-backed decisions with tool calling.
///
/// Calls the model with the history and tool definitions, executes any tool
/// calls and feeds their results back, until the model answers without
/// tool calls or `max_iterations` round-trips have been made.
pub struct ToolCallingDecider {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    bus: Arc<OutboundBus>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_iterations: u32,
}

impl ToolCallingDecider {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        bus: Arc<OutboundBus>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            bus,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            max_iterations: 25,
        }
    }

    /// Set the maximum number of model round-trips per pass.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: Option<u32>) -> Self {
        self.max_tokens = max;
        self
    }

    fn publish_activity(&self, event: OutboundEvent) {
        // Best effort: a full side channel just loses the glimpse.
        let _ = self.bus.publish(event);
    }
}

#[async_trait]
impl DecisionFunction for ToolCallingDecider {
    async fn decide(
        &self,
        history: &ConversationHistory,
    ) -> Result<ConversationHistory, DecisionError> {
        info!(turns = history.len(), "Running decision pass");

        let mut turns = history.turns().to_vec();
        let tool_definitions = self.tools.definitions();
        let mut iteration = 0;

        loop {
            iteration += 1;
            if iteration > self.max_iterations {
                warn!(
                    iterations = self.max_iterations,
                    "Max tool iterations reached, ending decision pass"
                );
                break;
            }

            debug!(iteration, "Decision iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: request_turns(&turns),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = self.provider.complete(request).await?;
            let message = response.message;

            if !message.content.is_empty() {
                self.publish_activity(OutboundEvent::think(preview(
                    &message.content,
                    THINK_PREVIEW_CHARS,
                    true,
                )));
            }

            if message.tool_calls.is_empty() {
                turns.push(message);
                break;
            }

            let tool_calls = message.tool_calls.clone();
            turns.push(message);

            for tc in &tool_calls {
                self.publish_activity(OutboundEvent::tool(format!(
                    "{}: {}",
                    tc.name,
                    preview(&tc.arguments, TOOL_PREVIEW_CHARS, false)
                )));

                let arguments = match parse_arguments(&tc.arguments) {
                    Ok(arguments) => arguments,
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool arguments are not valid JSON");
                        turns.push(Message::tool_result(
                            &tc.id,
                            format!("Error: invalid tool arguments: {e}"),
                        ));
                        continue;
                    }
                };

                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };

                match self.tools.execute(&call).await {
                    Ok(result) => {
                        debug!(tool = %tc.name, success = result.success, "Tool executed");
                        turns.push(Message::tool_result(&tc.id, result.output));
                    }
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        // Report error to the model so it can recover
                        turns.push(Message::tool_result(&tc.id, format!("Error: {e}")));
                    }
                }
            }
        }

        ConversationHistory::from_turns(turns)
    }
}

fn parse_arguments(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw)
}

/// First `max` chars of `text`, with `...` appended when cut and `ellipsis`.
fn preview(text: &str, max: usize, ellipsis: bool) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) if ellipsis => format!("{}...", &text[..cut]),
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Turns to send to the model.
///
/// Consolidation can cut an assistant turn while keeping its tool results;
/// providers reject tool turns without a preceding call, so those are
/// left out of the request. The stored history is not changed.
fn request_turns(turns: &[Message]) -> Vec<Message> {
    let mut issued: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(turns.len());
    for turn in turns {
        match turn.role {
            Role::Assistant => {
                issued.extend(turn.tool_calls.iter().map(|tc| tc.id.as_str()));
            }
            Role::Tool => {
                let answered = turn
                    .tool_call_id
                    .as_deref()
                    .is_some_and(|id| issued.contains(id));
                if !answered {
                    debug!("Dropping orphaned tool turn from request");
                    continue;
                }
            }
            _ => {}
        }
        out.push(turn.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogloop_core::error::ProviderError;
    use cogloop_core::event::EventKind;
    use cogloop_core::message::MessageToolCall;
    use cogloop_core::provider::ProviderResponse;
    use std::sync::Mutex;

    /// Replays canned responses in order and records each request.
    struct ScriptedProvider {
        responses: Mutex<Vec<Result<Message, ProviderError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(mut responses: Vec<Result<Message, ProviderError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let model = request.model.clone();
            self.requests.lock().unwrap().push(request);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Message::assistant("done")));
            next.map(|message| ProviderResponse {
                message,
                usage: None,
                model,
            })
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn decider(provider: Arc<ScriptedProvider>, bus: Arc<OutboundBus>) -> ToolCallingDecider {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(cogloop_tools::SayTool::new(bus.clone())));
        ToolCallingDecider::new(provider, Arc::new(tools), bus, "test-model")
    }

    #[tokio::test]
    async fn text_answer_ends_pass() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Message::assistant(
            "Nothing to do.",
        ))]));
        let bus = Arc::new(OutboundBus::default());
        let history = ConversationHistory::new("sys");

        let next = decider(provider, bus.clone())
            .decide(&history)
            .await
            .unwrap();
        assert_eq!(next.len(), 2);
        assert_eq!(next.last().content, "Nothing to do.");

        let think = bus.side().get_nowait().unwrap();
        assert_eq!(think.kind, EventKind::Think);
        assert_eq!(think.payload, "Nothing to do.");
    }

    #[tokio::test]
    async fn tool_calls_run_and_feed_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(Message::assistant("").with_tool_calls(vec![call(
                "c1",
                "say",
                r#"{"message":"hello"}"#,
            )])),
            Ok(Message::assistant("Said hello.")),
        ]));
        let bus = Arc::new(OutboundBus::default());
        let history = ConversationHistory::new("sys");

        let next = decider(provider.clone(), bus.clone())
            .decide(&history)
            .await
            .unwrap();

        let roles: Vec<_> = next.turns().iter().map(|m| m.role.clone()).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert!(next.turns()[2].content.starts_with("Message sent"));

        let said = bus.primary().get_nowait().unwrap();
        assert_eq!(said.payload, "hello");
        let activity = bus.side().drain();
        assert_eq!(activity[0].kind, EventKind::Tool);
        assert_eq!(activity[0].payload, r#"say: {"message":"hello"}"#);

        // second request saw the tool result
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[0].tools.len(), 1);
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Network(
            "refused".into(),
        ))]));
        let bus = Arc::new(OutboundBus::default());
        let result = decider(provider, bus)
            .decide(&ConversationHistory::new("sys"))
            .await;
        assert!(matches!(result, Err(DecisionError::Provider(_))));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(Message::assistant("").with_tool_calls(vec![call("c1", "teleport", "{}")])),
            Ok(Message::assistant("ok")),
        ]));
        let bus = Arc::new(OutboundBus::default());
        let next = decider(provider, bus)
            .decide(&ConversationHistory::new("sys"))
            .await
            .unwrap();
        assert!(next.turns()[2].content.contains("Tool not found"));
    }

    #[tokio::test]
    async fn iteration_cap_stops_tool_loop() {
        let looping: Vec<_> = (0..10)
            .map(|i| {
                Ok(Message::assistant("").with_tool_calls(vec![call(
                    &format!("c{i}"),
                    "say",
                    r#"{"message":"again"}"#,
                )]))
            })
            .collect();
        let provider = Arc::new(ScriptedProvider::new(looping));
        let bus = Arc::new(OutboundBus::default());
        let _ = decider(provider.clone(), bus)
            .with_max_iterations(3)
            .decide(&ConversationHistory::new("sys"))
            .await
            .unwrap();
        assert_eq!(provider.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn orphaned_tool_turns_are_not_sent() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Message::assistant("ok"))]));
        let bus = Arc::new(OutboundBus::default());
        let history = ConversationHistory::from_turns(vec![
            Message::system("sys"),
            Message::tool_result("lost_call", "stale output"),
            Message::user("hi"),
        ])
        .unwrap();

        let next = decider(provider.clone(), bus)
            .decide(&history)
            .await
            .unwrap();
        // stored history keeps the orphan
        assert_eq!(next.len(), 4);
        let requests = provider.requests.lock().unwrap();
        let roles: Vec<_> = requests[0].messages.iter().map(|m| m.role.clone()).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
    }

    #[test]
    fn think_preview_is_capped() {
        let long = "a".repeat(250);
        let shown = preview(&long, THINK_PREVIEW_CHARS, true);
        assert_eq!(shown.len(), 203);
        assert!(shown.ends_with("..."));
        assert_eq!(preview("short", THINK_PREVIEW_CHARS, true), "short");
        assert_eq!(preview(&long, TOOL_PREVIEW_CHARS, false).len(), 100);
    }

    #[test]
    fn empty_arguments_parse_as_object() {
        assert_eq!(parse_arguments("").unwrap(), serde_json::json!({}));
        assert!(parse_arguments("{not json").is_err());
    }
}
