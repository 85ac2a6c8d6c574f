//! The cognitive loop driver.
//!
//! One long-lived worker owns the conversation history and cycles through
//! **Observe → Decide → Consolidate**:
//!
//! 1. **Observe**: wait briefly for a user message; otherwise wake up on the
//!    heartbeat, or once on the very first iteration
//! 2. **Decide**: hand the history to the decision function and adopt the
//!    history it returns
//! 3. **Consolidate**: trim the history to the system turn plus the most
//!    recent turns when it grows past the cap
//!
//! While paused the driver only sleeps. A panic inside an iteration is
//! caught, logged and followed by a short backoff.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cogloop_config::LoopConfig;
use cogloop_core::context::RuntimeContext;
use cogloop_core::message::{ConversationHistory, Message};
use tracing::{debug, error, info, warn};

use crate::decision::DecisionFunction;
use crate::prompt::heartbeat_prompt;

/// Where the driver is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Observing,
    Deciding,
    Consolidating,
    Paused,
    Faulted,
}

/// Timings and limits, usually built from [`LoopConfig`].
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub heartbeat_interval: Duration,
    pub history_cap: usize,
    pub history_keep: usize,
    pub inbound_poll: Duration,
    pub idle_sleep: Duration,
    pub pause_poll: Duration,
    pub fault_backoff: Duration,
}

impl From<&LoopConfig> for LoopSettings {
    fn from(config: &LoopConfig) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
            history_cap: config.history_cap,
            history_keep: config.history_keep,
            inbound_poll: Duration::from_millis(config.inbound_poll_ms),
            idle_sleep: Duration::from_millis(config.idle_sleep_ms),
            pause_poll: Duration::from_millis(config.pause_poll_ms),
            fault_backoff: Duration::from_millis(config.fault_backoff_ms),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&LoopConfig::default())
    }
}

/// Why a decision pass is about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    UserMessage,
    Heartbeat,
    FirstRun,
}

pub struct CognitiveLoopDriver {
    ctx: RuntimeContext,
    decider: Arc<dyn DecisionFunction>,
    settings: LoopSettings,
    history: ConversationHistory,
    state: LoopState,
    first_run: bool,
    last_heartbeat: Instant,
    runtime: tokio::runtime::Runtime,
}

impl CognitiveLoopDriver {
    /// Build a driver with its own single-threaded runtime for decisions.
    pub fn new(
        ctx: RuntimeContext,
        decider: Arc<dyn DecisionFunction>,
        settings: LoopSettings,
        history: ConversationHistory,
    ) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            ctx,
            decider,
            settings,
            history,
            state: LoopState::Observing,
            first_run: true,
            last_heartbeat: Instant::now(),
            runtime,
        })
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Run one iteration and return the last state it passed through.
    ///
    /// `Observing` means nothing happened, `Deciding` that a pass ran and
    /// the history stayed under the cap, `Consolidating` that it was trimmed.
    pub fn step(&mut self) -> LoopState {
        if self.ctx.control.is_paused() {
            std::thread::sleep(self.settings.pause_poll);
            self.state = LoopState::Paused;
            return self.state;
        }

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| self.iterate()));
        self.state = match outcome {
            Ok(state) => state,
            Err(panic) => {
                error!(reason = panic_message(panic.as_ref()), "Error in cognitive loop");
                std::thread::sleep(self.settings.fault_backoff);
                LoopState::Faulted
            }
        };
        self.state
    }

    /// Iterate until `shutdown` is set.
    pub fn run_until(&mut self, shutdown: &AtomicBool) {
        info!(turns = self.history.len(), "Starting cognitive loop");
        while !shutdown.load(Ordering::Relaxed) {
            let state = self.step();
            if state == LoopState::Paused {
                debug!("Loop paused");
            }
        }
        info!("Cognitive loop stopped");
    }

    /// Move the driver onto a dedicated OS thread.
    ///
    /// The thread yields the final history. The driver, and its runtime,
    /// are dropped on that thread.
    pub fn spawn(
        mut self,
        shutdown: Arc<AtomicBool>,
    ) -> std::io::Result<JoinHandle<ConversationHistory>> {
        std::thread::Builder::new()
            .name("cognitive-loop".into())
            .spawn(move || {
                self.run_until(&shutdown);
                self.history
            })
    }

    fn iterate(&mut self) -> LoopState {
        self.state = LoopState::Observing;
        let Some(trigger) = self.observe() else {
            std::thread::sleep(self.settings.idle_sleep);
            return LoopState::Observing;
        };
        self.first_run = false;

        self.state = LoopState::Deciding;
        self.decide(trigger);

        self.state = LoopState::Consolidating;
        if self
            .history
            .consolidate(self.settings.history_cap, self.settings.history_keep)
        {
            info!(turns = self.history.len(), "Trimmed message history");
            LoopState::Consolidating
        } else {
            LoopState::Deciding
        }
    }

    fn observe(&mut self) -> Option<Trigger> {
        if let Ok(content) = self.ctx.mailbox.next_message(self.settings.inbound_poll) {
            let preview: String = content.chars().take(100).collect();
            info!(message = %preview, "Received user message");
            self.history.push(Message::user(content));
            return Some(Trigger::UserMessage);
        }

        if self.last_heartbeat.elapsed() > self.settings.heartbeat_interval {
            self.last_heartbeat = Instant::now();
            self.history
                .push(Message::user(heartbeat_prompt(chrono::Utc::now())));
            return Some(Trigger::Heartbeat);
        }

        self.first_run.then_some(Trigger::FirstRun)
    }

    fn decide(&mut self, trigger: Trigger) {
        debug!(?trigger, turns = self.history.len(), "Running agent");
        let decider = self.decider.clone();
        let history = &self.history;
        match self.runtime.block_on(decider.decide(history)) {
            Ok(next) => {
                debug!(turns = next.len(), "Updated message history");
                self.history = next;
            }
            Err(e) => warn!(error = %e, "Decision pass failed, keeping history"),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic")
}
