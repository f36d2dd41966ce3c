use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Identity;

use super::types::{ConnectionHandle, ConnectionInfo};

/// Manages all live connections, keyed by identity.
///
/// This is the only cross-task shared mutable state in the relay. Writes are
/// exclusive per shard and lookups never observe a partial mutation; no
/// operation spans more than one map entry.
pub struct ConnectionRegistry {
    connections: DashMap<Identity, Arc<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection under its identity. If the identity is already
    /// taken, the new registration supersedes the old one and the superseded
    /// handle is returned; its session keeps running until its own transport
    /// closes, at which point its conditional unregister no-ops.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> Option<Arc<ConnectionHandle>> {
        let superseded = self
            .connections
            .insert(handle.identity.clone(), handle.clone());

        if let Some(ref old) = superseded {
            tracing::warn!(
                identity = %handle.identity,
                connection_id = %handle.id,
                superseded_id = %old.id,
                "Connection superseded an existing registration"
            );
        } else {
            tracing::info!(
                identity = %handle.identity,
                connection_id = %handle.id,
                "Connection registered"
            );
        }

        superseded
    }

    /// Remove the registration for `identity`, but only if it still refers to
    /// the connection named by `connection_id`. A session closing after its
    /// identity was reused must not evict the newer connection.
    pub fn unregister(&self, identity: &str, connection_id: Uuid) -> bool {
        let removed = self
            .connections
            .remove_if(identity, |_, handle| handle.id == connection_id)
            .is_some();

        if removed {
            tracing::info!(
                identity = %identity,
                connection_id = %connection_id,
                "Connection unregistered"
            );
        }

        removed
    }

    /// Current handle for `identity`, if any
    pub fn lookup(&self, identity: &str) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(identity).map(|h| h.clone())
    }

    /// Snapshot of every registered handle at the moment of the call.
    /// Registrations and deregistrations after the call are not reflected.
    pub fn all_handles(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> RegistryStats {
        let mut connections: Vec<ConnectionInfo> =
            self.connections.iter().map(|r| r.value().info()).collect();
        connections.sort_by(|a, b| a.identity.cmp(&b.identity));

        RegistryStats {
            total_connections: connections.len(),
            connections,
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_connections: usize,
    pub connections: Vec<ConnectionInfo>,
}
