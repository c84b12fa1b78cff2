use std::sync::Arc;

use dashmap::DashMap;

use switchboard_core::ids::ConnectionId;
use switchboard_engine::transport::Connection;

use crate::connection::WsConnection;

/// Process-wide index of accepted connections across all namespaces,
/// backing direct publish targeting and the liveness sweep.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<WsConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: Arc<WsConnection>) {
        self.connections.insert(conn.id().clone(), conn);
    }

    pub fn unregister(&self, id: &ConnectionId) -> Option<Arc<WsConnection>> {
        self.connections.remove(id).map(|(_, conn)| conn)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<WsConnection>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// One liveness pass. A connection that missed its timeout is first
    /// suspended (a later pong turns that into a reconnect); one that is
    /// still unresponsive on the next pass is closed and removed. Returns
    /// the number removed.
    pub fn sweep(&self) -> usize {
        let mut expired = Vec::new();
        for entry in self.connections.iter() {
            let conn = entry.value();
            if conn.is_alive() {
                continue;
            }
            if conn.is_suspended() {
                expired.push(conn.id().clone());
            } else {
                conn.mark_suspended();
            }
        }

        let mut removed = 0;
        for id in expired {
            if let Some(conn) = self.unregister(&id) {
                conn.close();
                removed += 1;
                tracing::info!(connection_id = %id, "removed unresponsive connection");
            }
        }
        removed
    }
}
