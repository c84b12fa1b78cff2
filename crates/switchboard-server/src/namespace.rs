use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;

use switchboard_core::ids::ConnectionId;
use switchboard_engine::transport::{
    ConnectMiddleware, Connection, ConnectionCallback, NamespaceHandle,
};

use crate::connection::{WireFrame, WsConnection};

/// A live WebSocket namespace: the set of accepted connections on one
/// path, plus the middleware and connection callbacks registered on it.
pub struct WsNamespace {
    path: String,
    connections: DashMap<ConnectionId, Arc<WsConnection>>,
    middleware: RwLock<Vec<ConnectMiddleware>>,
    callbacks: RwLock<Vec<ConnectionCallback>>,
}

impl WsNamespace {
    pub fn new(path: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            connections: DashMap::new(),
            middleware: RwLock::new(Vec::new()),
            callbacks: RwLock::new(Vec::new()),
        })
    }

    /// Accept a connection into this namespace and notify the registered
    /// connection callbacks. Runs after admission has passed.
    pub fn accept(&self, conn: &Arc<WsConnection>) {
        self.connections
            .insert(conn.id().clone(), Arc::clone(conn));
        let callbacks: Vec<ConnectionCallback> = self.callbacks.read().clone();
        let as_dyn: Arc<dyn Connection> = Arc::clone(conn) as Arc<dyn Connection>;
        for callback in callbacks {
            callback(Arc::clone(&as_dyn));
        }
    }

    pub fn detach(&self, id: &ConnectionId) {
        self.connections.remove(id);
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<WsConnection>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub(crate) fn middleware_chain(&self) -> Vec<ConnectMiddleware> {
        self.middleware.read().clone()
    }

    /// Emit to every connection, optionally excluding one. The frame is
    /// serialized once and fanned out over each connection's send queue.
    pub fn emit_except(&self, event: &str, args: &[Value], except: Option<&ConnectionId>) {
        let Some(raw) = encode(event, args) else {
            return;
        };
        for entry in self.connections.iter() {
            if Some(entry.key()) == except {
                continue;
            }
            entry.value().send_raw(raw.clone());
        }
    }

    /// Emit to every member of `room`, optionally excluding one connection.
    pub fn emit_to_room_except(
        &self,
        room: &str,
        event: &str,
        args: &[Value],
        except: Option<&ConnectionId>,
    ) {
        let Some(raw) = encode(event, args) else {
            return;
        };
        for entry in self.connections.iter() {
            if Some(entry.key()) == except || !entry.value().in_room(room) {
                continue;
            }
            entry.value().send_raw(raw.clone());
        }
    }
}

fn encode(event: &str, args: &[Value]) -> Option<String> {
    let frame = WireFrame {
        event: event.to_string(),
        args: args.to_vec(),
    };
    match serde_json::to_string(&frame) {
        Ok(raw) => Some(raw),
        Err(err) => {
            tracing::warn!(error = %err, "frame serialization failed");
            None
        }
    }
}

impl NamespaceHandle for WsNamespace {
    fn path(&self) -> &str {
        &self.path
    }

    fn use_middleware(&self, middleware: ConnectMiddleware) {
        self.middleware.write().push(middleware);
    }

    fn on_connection(&self, callback: ConnectionCallback) {
        self.callbacks.write().push(callback);
    }

    fn emit(&self, event: &str, args: &[Value]) {
        self.emit_except(event, args, None);
    }

    fn emit_to_room(&self, room: &str, event: &str, args: &[Value]) {
        self.emit_to_room_except(room, event, args, None);
    }
}
