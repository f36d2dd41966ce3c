//! Routing of decoded inbound messages onto recipient outbound queues.
//!
//! Delivery is fire-and-forget, at-most-once: a private message to an
//! unknown recipient vanishes without an error to the sender, and a full
//! outbound queue drops the newest frame rather than stalling the routing
//! task. Per-recipient order follows enqueue order; nothing is guaranteed
//! across senders.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::registry::{ConnectionHandle, ConnectionRegistry, EnqueueError};
use crate::websocket::{InboundMessage, MessageKind};

/// Counters for routing outcomes
#[derive(Debug, Default)]
pub struct RouterStats {
    /// Broadcast messages routed
    pub broadcasts: AtomicU64,
    /// Private messages delivered to a registered recipient
    pub private_delivered: AtomicU64,
    /// Private messages addressed to an absent recipient
    pub routing_misses: AtomicU64,
    /// Frames dropped on full or closed outbound queues
    pub frames_dropped: AtomicU64,
}

impl RouterStats {
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            private_delivered: self.private_delivered.load(Ordering::Relaxed),
            routing_misses: self.routing_misses.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of router statistics
#[derive(Debug, Clone, Serialize)]
pub struct RouterStatsSnapshot {
    pub broadcasts: u64,
    pub private_delivered: u64,
    pub routing_misses: u64,
    pub frames_dropped: u64,
}

/// Resolves each inbound message to its destination set and enqueues the
/// formatted payload. Never suspends: every enqueue is non-blocking.
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    stats: RouterStats,
}

impl MessageRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            stats: RouterStats::default(),
        }
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    #[tracing::instrument(
        name = "router.route",
        skip(self, msg),
        fields(kind = ?msg.kind, from = %msg.from)
    )]
    pub fn route(&self, msg: InboundMessage) {
        match msg.kind {
            MessageKind::Private => self.send_private(&msg),
            MessageKind::Public => self.broadcast(&msg),
        }
    }

    /// Deliver to exactly the named recipient. An absent recipient (or an
    /// empty `to`, which can never be registered) is a silent drop.
    fn send_private(&self, msg: &InboundMessage) {
        let recipient = msg.to.as_deref().unwrap_or_default();

        let Some(handle) = self.registry.lookup(recipient) else {
            self.stats.routing_misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(to = %recipient, "Private message to unknown recipient dropped");
            return;
        };

        if self.deliver(&handle, msg.private_payload()) {
            self.stats.private_delivered.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Deliver to every handle in a registry snapshot, the sender's own
    /// connection included. Unconditional: not recipient-filtered.
    fn broadcast(&self, msg: &InboundMessage) {
        let handles = self.registry.all_handles();
        let payload = msg.public_payload();

        for handle in &handles {
            self.deliver(handle, payload.clone());
        }

        self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(recipients = handles.len(), "Broadcast routed");
    }

    fn deliver(&self, handle: &Arc<ConnectionHandle>, payload: String) -> bool {
        match handle.enqueue(payload) {
            Ok(()) => true,
            Err(EnqueueError::QueueFull) => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    identity = %handle.identity,
                    connection_id = %handle.id,
                    "Outbound queue full, frame dropped"
                );
                false
            }
            Err(EnqueueError::Closed) => {
                // The owning session is tearing down and will deregister;
                // nothing for the router to clean up here.
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    identity = %handle.identity,
                    connection_id = %handle.id,
                    "Outbound queue closed, frame dropped"
                );
                false
            }
        }
    }
}
