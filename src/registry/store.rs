//! Connection registry implementation
//!
//! The set of tally clients currently connected to the server. Mutated by
//! the connection tasks and by failed-write cleanup, read by the
//! broadcaster.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::entry::ClientConnection;

/// Registry of connected tally clients
///
/// One `RwLock` guards the whole map. Client counts are in the tens, so
/// there is no per-entry locking; the broadcaster works on a snapshot and
/// never holds the lock while writing to sockets.
pub struct ConnectionRegistry {
    /// Map of peer identity to connection
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection under its identity
    ///
    /// Returns the entry it replaced, if any. Closing the replaced
    /// connection is the caller's job.
    pub async fn add(&self, connection: Arc<ClientConnection>) -> Option<Arc<ClientConnection>> {
        let mut connections = self.connections.write().await;
        let identity = connection.identity().to_string();

        tracing::debug!(
            peer = %identity,
            session_id = connection.id(),
            clients = connections.len() + 1,
            "Client registered"
        );

        connections.insert(identity, connection)
    }

    /// Remove whatever is registered under `identity`
    ///
    /// Absent entries are a no-op.
    pub async fn remove(&self, identity: &str) -> Option<Arc<ClientConnection>> {
        let removed = self.connections.write().await.remove(identity);

        if let Some(ref conn) = removed {
            tracing::debug!(peer = %identity, session_id = conn.id(), "Client removed");
        }

        removed
    }

    /// Remove `connection` only if it is still the registered entry
    ///
    /// A stale task must not evict a newer connection that reused the same
    /// identity. Returns whether anything was removed.
    pub async fn remove_connection(&self, connection: &ClientConnection) -> bool {
        let mut connections = self.connections.write().await;

        match connections.get(connection.identity()) {
            Some(current) if current.id() == connection.id() => {
                connections.remove(connection.identity());
                tracing::debug!(
                    peer = %connection.identity(),
                    session_id = connection.id(),
                    clients = connections.len(),
                    "Client removed"
                );
                true
            }
            _ => false,
        }
    }

    /// Point-in-time copy of all registered connections
    pub async fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, identity: &str) -> bool {
        self.connections.read().await.contains_key(identity)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Drain the registry and tell every connection to close
    ///
    /// Returns the number of connections closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<_> = self.connections.write().await.drain().collect();

        for (_, conn) in &drained {
            conn.close();
        }

        if !drained.is_empty() {
            tracing::info!(clients = drained.len(), "Closed all tally clients");
        }

        drained.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
