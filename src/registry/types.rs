//! Connection handle and related types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::auth::Identity;

/// Handle for a single live connection: the identity it was admitted under
/// and the sending side of its outbound queue. The queue's receiving side is
/// owned by the connection's writer task; the socket itself never leaves the
/// session that created it.
pub struct ConnectionHandle {
    /// Distinguishes registrations that reuse an identity
    pub id: Uuid,
    pub identity: Identity,
    sender: mpsc::Sender<String>,
    pub connected_at: DateTime<Utc>,
    /// Frames discarded because the outbound queue was full - using AtomicU64
    /// for lock-free updates from any routing task
    dropped_frames: AtomicU64,
}

impl ConnectionHandle {
    pub fn new(identity: Identity, sender: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            sender,
            connected_at: Utc::now(),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Push a payload onto the outbound queue without suspending the caller.
    ///
    /// The queue is bounded: a recipient that reads slower than its peers
    /// write must never stall a sender's read loop. On overflow the newest
    /// frame is dropped and counted; a queue whose writer task has already
    /// exited is treated the same as a closed transport.
    pub fn enqueue(&self, payload: String) -> Result<(), EnqueueError> {
        match self.sender.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                Err(EnqueueError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            identity: self.identity.clone(),
            connected_at: self.connected_at,
            dropped_frames: self.dropped_frames(),
        }
    }
}

/// Why an enqueue attempt did not deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// Outbound queue at capacity; the frame was dropped
    QueueFull,
    /// Writer task has exited; the connection is dead
    Closed,
}

impl std::fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueueFull => write!(f, "outbound queue full"),
            Self::Closed => write!(f, "outbound queue closed"),
        }
    }
}

/// Per-connection view exposed by the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub identity: Identity,
    pub connected_at: DateTime<Utc>,
    pub dropped_frames: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_counts_overflow() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new("alice".to_string(), tx);

        assert!(handle.enqueue("first".to_string()).is_ok());
        assert_eq!(
            handle.enqueue("second".to_string()),
            Err(EnqueueError::QueueFull)
        );
        assert_eq!(handle.dropped_frames(), 1);

        // The queued frame is intact; only the overflowing one was dropped
        assert_eq!(rx.try_recv().unwrap(), "first");
    }

    #[test]
    fn test_enqueue_after_writer_exit() {
        let (tx, rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new("alice".to_string(), tx);

        drop(rx);
        assert_eq!(
            handle.enqueue("late".to_string()),
            Err(EnqueueError::Closed)
        );
        // Dead queues are not overflow
        assert_eq!(handle.dropped_frames(), 0);
    }
}
