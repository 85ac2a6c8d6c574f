//! HTTP gateway for cogloop.
//!
//! Observers talk to the running agent through five routes:
//! - `GET  /health`  — liveness
//! - `POST /message` — free text, or an answer to a pending question
//! - `GET  /stream`  — SSE feed of everything the agent says and does
//! - `POST /control` — pause / resume the loop
//! - `POST /shell`   — run a command directly, outside the loop
//!
//! Handlers never block on the cognitive loop: every exchange goes through
//! the bounded channels of the runtime context.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{
        Json,
        sse::{Event as SseEvent, Sse},
    },
    routing::{get, post},
};
use cogloop_core::context::RuntimeContext;
use cogloop_core::event::OutboundEvent;
use cogloop_core::mailbox::{Delivery, InboundMessage};
use cogloop_tools::{ShellOptions, run_shell};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub ctx: RuntimeContext,
    pub shell: ShellOptions,
    /// How long a stream waits for agent output before sending a heartbeat
    pub stream_idle_timeout: Duration,
}

impl GatewayState {
    pub fn from_config(ctx: RuntimeContext, config: &cogloop_config::AppConfig) -> Self {
        Self {
            ctx,
            shell: ShellOptions::from(&config.shell),
            stream_idle_timeout: config.gateway.stream_idle_timeout(),
        }
    }
}

type SharedState = Arc<GatewayState>;
type ApiError = (StatusCode, Json<ErrorResponse>);

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/message", post(message_handler))
        .route("/stream", get(stream_handler))
        .route("/control", post(control_handler))
        .route("/shell", post(shell_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the gateway until `shutdown` resolves.
pub async fn start(
    config: &cogloop_config::AppConfig,
    ctx: RuntimeContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let app = build_router(Arc::new(GatewayState::from_config(ctx, config)));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Gateway stopped");
    Ok(())
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

fn error(code: StatusCode, message: impl Into<String>) -> ApiError {
    (
        code,
        Json(ErrorResponse {
            status: "error".into(),
            message: message.into(),
        }),
    )
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    error(StatusCode::BAD_REQUEST, rejection.body_text())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
struct MessageResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

async fn message_handler(
    State(state): State<SharedState>,
    payload: Result<Json<InboundMessage>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(mut message) = payload.map_err(bad_json)?;
    message.request_id = message.request_id.filter(|id| !id.is_empty());

    let Some(request_id) = message.request_id.clone() else {
        return match state.ctx.mailbox.deliver(message) {
            Ok(_) => Ok(Json(MessageResponse {
                status: "message_queued",
                request_id: None,
            })),
            Err(e) => Err(error(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Message not queued: {e}"),
            )),
        };
    };

    // Answers are acknowledged whether or not anyone is still waiting.
    match state.ctx.mailbox.deliver(message) {
        Ok(Delivery::ResponseAccepted) => debug!(request_id = %request_id, "Response accepted"),
        Ok(_) => debug!(request_id = %request_id, "Response for no pending request"),
        Err(e) => warn!(request_id = %request_id, error = %e, "Response dropped"),
    }
    Ok(Json(MessageResponse {
        status: "response_received",
        request_id: Some(request_id),
    }))
}

/// SSE frame for `event`. CR and CRLF line breaks become LF so each payload
/// line maps to exactly one `data:` field.
fn to_sse(event: OutboundEvent) -> SseEvent {
    let payload = event.payload.replace("\r\n", "\n").replace('\r', "\n");
    let frame = SseEvent::default()
        .event(event.kind.as_str())
        .data(payload);
    match event.request_id {
        Some(id) => frame.id(id),
        None => frame,
    }
}

/// `GET /stream` — config frame, then agent output batches forever.
async fn stream_handler(
    State(state): State<SharedState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let control = &state.ctx.control;
    let preamble = OutboundEvent::config(control.context_window(), control.model_name());
    info!("Stream session opened");

    let batches = futures::stream::unfold(state.clone(), |state| async move {
        let batch = state
            .ctx
            .bus
            .next_for_session(state.stream_idle_timeout)
            .await;
        Some((futures::stream::iter(batch), state))
    })
    .flatten();

    let stream = futures::stream::once(async move { preamble })
        .chain(batches)
        .map(|event| Ok(to_sse(event)));

    Sse::new(stream)
}

#[derive(Deserialize)]
struct ControlRequest {
    #[serde(default)]
    action: Option<String>,
}

#[derive(Serialize)]
struct ControlResponse {
    status: &'static str,
}

async fn control_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_json)?;
    match request.action.as_deref() {
        Some("pause") => {
            state.ctx.control.pause();
            Ok(Json(ControlResponse { status: "paused" }))
        }
        Some("resume") => {
            state.ctx.control.resume();
            Ok(Json(ControlResponse { status: "resumed" }))
        }
        _ => Err(error(StatusCode::BAD_REQUEST, "Invalid action")),
    }
}

#[derive(Deserialize)]
struct ShellRequest {
    #[serde(default)]
    command: Option<String>,
}

#[derive(Serialize)]
struct ShellResponse {
    status: &'static str,
    output: String,
}

async fn shell_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ShellRequest>, JsonRejection>,
) -> Result<Json<ShellResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_json)?;
    let command = request
        .command
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "No command provided"))?;

    info!(command = %command, "Direct shell command");
    let output = run_shell(&command, &state.shell).await;
    Ok(Json(ShellResponse {
        status: "success",
        output,
    }))
}
