//! Outbound bus — agent output on its way to observer sessions.
//!
//! Two independently bounded channels:
//! - **primary**: utterances and input requests, the things a user must see
//! - **side**: think/tool activity, best-effort
//!
//! Sessions compete for events: each event is delivered to whichever session
//! polls first. There is no replay for late or reconnecting observers.

use std::time::Duration;

use tracing::debug;

use crate::channel::BoundedChannel;
use crate::error::ChannelError;
use crate::event::{EventKind, OutboundEvent};

/// Default primary channel depth.
pub const DEFAULT_PRIMARY_DEPTH: usize = 100;
/// Default side (activity) channel depth.
pub const DEFAULT_SIDE_DEPTH: usize = 200;

pub struct OutboundBus {
    primary: BoundedChannel<OutboundEvent>,
    side: BoundedChannel<OutboundEvent>,
}

impl OutboundBus {
    pub fn new(primary_depth: usize, side_depth: usize) -> Self {
        Self {
            primary: BoundedChannel::new(primary_depth),
            side: BoundedChannel::new(side_depth),
        }
    }

    /// Route an event to its channel without blocking.
    ///
    /// Heartbeat and config frames are produced by sessions themselves and
    /// are rejected with `Unroutable`.
    pub fn publish(&self, event: OutboundEvent) -> Result<(), ChannelError> {
        let kind = event.kind;
        let result = match kind {
            EventKind::Heartbeat | EventKind::Config => {
                return Err(ChannelError::Unroutable(kind.as_str()));
            }
            _ if kind.is_activity() => self.side.put(event),
            _ => self.primary.put(event),
        };
        if result.is_err() {
            debug!(kind = %kind, "Outbound channel full, event dropped");
        }
        result
    }

    /// Next batch of frames for one session.
    ///
    /// Drains all queued activity, then waits up to `idle_timeout` for one
    /// primary event. If none arrives the batch ends with a heartbeat. The
    /// returned batch is never empty.
    pub async fn next_for_session(&self, idle_timeout: Duration) -> Vec<OutboundEvent> {
        let mut batch = self.side.drain();
        match self.primary.recv(idle_timeout).await {
            Ok(event) => batch.push(event),
            Err(_) => batch.push(OutboundEvent::heartbeat()),
        }
        batch
    }

    pub fn primary(&self) -> &BoundedChannel<OutboundEvent> {
        &self.primary
    }

    pub fn side(&self) -> &BoundedChannel<OutboundEvent> {
        &self.side
    }
}

impl Default for OutboundBus {
    fn default() -> Self {
        Self::new(DEFAULT_PRIMARY_DEPTH, DEFAULT_SIDE_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_routes_by_kind() {
        let bus = OutboundBus::new(10, 10);
        bus.publish(OutboundEvent::say("hello")).unwrap();
        bus.publish(OutboundEvent::input_request("req_1", "ok?")).unwrap();
        bus.publish(OutboundEvent::think("hmm")).unwrap();
        bus.publish(OutboundEvent::tool("shell: ls")).unwrap();

        assert_eq!(bus.primary().len(), 2);
        assert_eq!(bus.side().len(), 2);
    }

    #[test]
    fn session_frames_are_not_routable() {
        let bus = OutboundBus::default();
        assert_eq!(
            bus.publish(OutboundEvent::heartbeat()),
            Err(ChannelError::Unroutable("heartbeat"))
        );
        assert_eq!(
            bus.publish(OutboundEvent::config(1, "m")),
            Err(ChannelError::Unroutable("config"))
        );
    }

    #[test]
    fn third_say_into_capacity_two_is_dropped() {
        let bus = OutboundBus::new(2, 10);
        let results: Vec<_> = ["one", "two", "three"]
            .into_iter()
            .map(|text| bus.publish(OutboundEvent::say(text)))
            .collect();
        assert_eq!(results, vec![Ok(()), Ok(()), Err(ChannelError::Full)]);

        let drained: Vec<_> = bus.primary().drain().into_iter().map(|e| e.payload).collect();
        assert_eq!(drained, vec!["one", "two"]);
    }

    #[test]
    fn full_side_channel_does_not_affect_primary() {
        let bus = OutboundBus::new(2, 1);
        bus.publish(OutboundEvent::think("a")).unwrap();
        assert_eq!(
            bus.publish(OutboundEvent::think("b")),
            Err(ChannelError::Full)
        );
        bus.publish(OutboundEvent::say("still delivered")).unwrap();
    }

    #[tokio::test]
    async fn session_drains_activity_before_primary() {
        let bus = OutboundBus::default();
        bus.publish(OutboundEvent::say("answer")).unwrap();
        bus.publish(OutboundEvent::think("first")).unwrap();
        bus.publish(OutboundEvent::tool("second")).unwrap();

        let batch = bus.next_for_session(Duration::from_millis(50)).await;
        let kinds: Vec<_> = batch.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Think, EventKind::Tool, EventKind::Utterance]
        );
    }

    #[tokio::test]
    async fn idle_session_gets_heartbeat() {
        let bus = OutboundBus::default();
        let batch = bus.next_for_session(Duration::from_millis(20)).await;
        assert_eq!(batch, vec![OutboundEvent::heartbeat()]);
    }

    #[tokio::test]
    async fn activity_without_primary_still_ends_with_heartbeat() {
        let bus = OutboundBus::default();
        bus.publish(OutboundEvent::think("busy")).unwrap();
        let batch = bus.next_for_session(Duration::from_millis(20)).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].kind, EventKind::Think);
        assert_eq!(batch[1].kind, EventKind::Heartbeat);
    }

    #[tokio::test]
    async fn two_sessions_compete_for_one_event() {
        let bus = std::sync::Arc::new(OutboundBus::default());
        bus.publish(OutboundEvent::say("only once")).unwrap();

        let a = bus.next_for_session(Duration::from_millis(20)).await;
        let b = bus.next_for_session(Duration::from_millis(20)).await;
        let says = a
            .iter()
            .chain(b.iter())
            .filter(|e| e.kind == EventKind::Utterance)
            .count();
        assert_eq!(says, 1);
    }
}
