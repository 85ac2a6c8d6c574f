//! The runtime context — every piece of cross-domain state in one place.
//!
//! Built once at startup and shared by `Arc` between the loop worker and the
//! HTTP gateway. Tests build a fresh one per case.

use std::sync::Arc;

use crate::bus::{DEFAULT_PRIMARY_DEPTH, DEFAULT_SIDE_DEPTH, OutboundBus};
use crate::control::ControlPlane;
use crate::correlator::{PendingSlot, RequestCorrelator};
use crate::mailbox::{DEFAULT_INBOUND_DEPTH, InboundMailbox};

/// Depths of the four bounded channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepths {
    pub primary: usize,
    pub side: usize,
    pub text: usize,
    pub responses: usize,
}

impl Default for QueueDepths {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY_DEPTH,
            side: DEFAULT_SIDE_DEPTH,
            text: DEFAULT_INBOUND_DEPTH,
            responses: DEFAULT_INBOUND_DEPTH,
        }
    }
}

#[derive(Clone)]
pub struct RuntimeContext {
    pub bus: Arc<OutboundBus>,
    pub mailbox: Arc<InboundMailbox>,
    pub correlator: Arc<RequestCorrelator>,
    pub control: Arc<ControlPlane>,
}

impl RuntimeContext {
    pub fn new(depths: QueueDepths, model_name: impl Into<String>) -> Self {
        let pending = Arc::new(PendingSlot::default());
        let bus = Arc::new(OutboundBus::new(depths.primary, depths.side));
        let mailbox = Arc::new(InboundMailbox::new(
            depths.text,
            depths.responses,
            pending.clone(),
        ));
        let correlator = Arc::new(RequestCorrelator::new(
            bus.clone(),
            mailbox.clone(),
            pending,
        ));
        Self {
            bus,
            mailbox,
            correlator,
            control: Arc::new(ControlPlane::new(model_name)),
        }
    }
}
