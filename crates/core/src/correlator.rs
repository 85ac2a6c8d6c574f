//! Human-in-the-loop request correlation.
//!
//! The agent may ask the user one question at a time. The question goes out
//! on the [`OutboundBus`] tagged with a fresh identifier; the answer comes back
//! through the [`InboundMailbox`] response channel. A question nobody answers
//! resolves to a literal timeout string, so the decision function always gets
//! something usable back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bus::OutboundBus;
use crate::error::CorrelatorError;
use crate::event::OutboundEvent;
use crate::mailbox::InboundMailbox;

/// The question currently awaiting an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRequest {
    pub id: String,
    pub question: String,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(id: impl Into<String>, question: impl Into<String>, timeout: Duration) -> Self {
        let created_at = Utc::now();
        let deadline = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| created_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            id: id.into(),
            question: question.into(),
            created_at,
            deadline,
        }
    }
}

/// Holder of the single outstanding request, shared with the mailbox.
#[derive(Debug, Default)]
pub struct PendingSlot {
    slot: Mutex<Option<PendingRequest>>,
}

impl PendingSlot {
    fn lock(&self) -> MutexGuard<'_, Option<PendingRequest>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install `request`, or fail with `Busy` leaving the current one intact.
    pub fn install(&self, request: PendingRequest) -> Result<(), CorrelatorError> {
        let mut slot = self.lock();
        if let Some(current) = slot.as_ref() {
            return Err(CorrelatorError::Busy {
                pending_id: current.id.clone(),
            });
        }
        *slot = Some(request);
        Ok(())
    }

    /// Clear the slot if it still holds `id`.
    pub fn clear(&self, id: &str) {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|p| p.id == id) {
            *slot = None;
        }
    }

    pub fn matches(&self, id: &str) -> bool {
        self.lock().as_ref().is_some_and(|p| p.id == id)
    }

    pub fn current(&self) -> Option<PendingRequest> {
        self.lock().clone()
    }
}

/// Clears the pending slot when the wait ends, including on cancellation.
struct PendingGuard<'a> {
    slot: &'a PendingSlot,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.slot.clear(self.id);
    }
}

pub struct RequestCorrelator {
    bus: Arc<OutboundBus>,
    mailbox: Arc<InboundMailbox>,
    pending: Arc<PendingSlot>,
    next_id: AtomicU64,
}

impl RequestCorrelator {
    pub fn new(bus: Arc<OutboundBus>, mailbox: Arc<InboundMailbox>, pending: Arc<PendingSlot>) -> Self {
        Self {
            bus,
            mailbox,
            pending,
            next_id: AtomicU64::new(1),
        }
    }

    /// The message fed back to the agent when nobody answers in time.
    pub fn timeout_message(timeout: Duration) -> String {
        format!(
            "Timeout: No response received within {} seconds.",
            whole_secs(timeout)
        )
    }

    /// Ask the connected users `question` and wait up to `timeout` for an answer.
    ///
    /// Resolves to the answer, or to [`Self::timeout_message`] on expiry.
    /// Fails with `Busy` if another question is outstanding, and with
    /// `Undelivered` if the question could not be queued.
    pub async fn issue(&self, question: &str, timeout: Duration) -> Result<String, CorrelatorError> {
        let id = format!("req_{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let deadline = deadline_after(timeout);
        self.pending
            .install(PendingRequest::new(&id, question, timeout))?;
        let _guard = PendingGuard {
            slot: &self.pending,
            id: &id,
        };

        let stale = self.mailbox.responses().drain();
        if !stale.is_empty() {
            debug!(count = stale.len(), "Dropped stale responses");
        }

        self.bus
            .publish(OutboundEvent::input_request(&id, question))
            .map_err(CorrelatorError::Undelivered)?;
        info!(request_id = %id, timeout_secs = whole_secs(timeout), "Waiting for user input");

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.mailbox.responses().recv(remaining).await {
                Ok(response) if response.request_id == id => {
                    debug!(request_id = %id, "Received user input");
                    return Ok(response.content);
                }
                Ok(response) => {
                    debug!(request_id = %response.request_id, "Ignoring response for another request");
                }
                Err(_) => break,
            }
        }

        warn!(request_id = %id, "Timed out waiting for user input");
        Ok(Self::timeout_message(timeout))
    }

    pub fn pending(&self) -> Option<PendingRequest> {
        self.pending.current()
    }
}

/// Seconds in `timeout`, rounded up.
fn whole_secs(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

/// `now + timeout`, saturating at roughly thirty years out.
fn deadline_after(timeout: Duration) -> tokio::time::Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);
    let now = tokio::time::Instant::now();
    now.checked_add(timeout.min(FAR_FUTURE)).unwrap_or(now)
}
