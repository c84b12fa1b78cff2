use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use switchboard_core::ids::ConnectionId;
use switchboard_engine::transport::{
    Connection, EventListener, LifecycleListener, Packet, PacketContinuation, PacketInterceptor,
};

use crate::namespace::WsNamespace;

pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// Control events a client sends to manage its own room membership.
const JOIN_EVENT: &str = "__join";
const LEAVE_EVENT: &str = "__leave";

/// The JSON frame exchanged over the socket: an event name plus its
/// ordered argument list. Both directions use the same shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// One accepted WebSocket connection. Outbound traffic goes through a
/// bounded channel drained by the socket's writer task; when the queue is
/// full the frame is dropped rather than blocking the emitter.
pub struct WsConnection {
    id: ConnectionId,
    namespace: Weak<WsNamespace>,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
    suspended: AtomicBool,
    pub(crate) last_pong: AtomicU64,
    rooms: RwLock<HashSet<String>>,
    event_listeners: RwLock<HashMap<String, Vec<EventListener>>>,
    reconnect_listeners: RwLock<Vec<LifecycleListener>>,
    disconnect_listeners: RwLock<Vec<LifecycleListener>>,
    interceptors: RwLock<Vec<PacketInterceptor>>,
}

impl WsConnection {
    pub fn new(namespace: Weak<WsNamespace>, tx: mpsc::Sender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            namespace,
            tx,
            connected: AtomicBool::new(true),
            suspended: AtomicBool::new(false),
            last_pong: AtomicU64::new(now_secs()),
            rooms: RwLock::new(HashSet::new()),
            event_listeners: RwLock::new(HashMap::new()),
            reconnect_listeners: RwLock::new(Vec::new()),
            disconnect_listeners: RwLock::new(Vec::new()),
            interceptors: RwLock::new(Vec::new()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.rooms.read().contains(room)
    }

    /// Any inbound traffic counts as liveness. A connection whose liveness
    /// lapsed and then resumed fires its reconnect listeners.
    pub fn record_liveness(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
        if self.suspended.swap(false, Ordering::Relaxed) {
            let listeners: Vec<LifecycleListener> = self.reconnect_listeners.read().clone();
            for listener in listeners {
                listener();
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < CLIENT_TIMEOUT.as_secs()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Relaxed)
    }

    pub fn mark_suspended(&self) {
        self.suspended.store(true, Ordering::Relaxed);
    }

    /// Serialize and queue an outbound frame. Returns false when the frame
    /// was dropped (queue full or writer gone).
    pub fn send_frame(&self, event: &str, args: &[Value]) -> bool {
        let frame = WireFrame {
            event: event.to_string(),
            args: args.to_vec(),
        };
        match serde_json::to_string(&frame) {
            Ok(raw) => self.send_raw(raw),
            Err(err) => {
                tracing::warn!(connection_id = %self.id, error = %err, "frame serialization failed");
                false
            }
        }
    }

    pub(crate) fn send_raw(&self, raw: String) -> bool {
        match self.tx.try_send(raw) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    msg_len = msg.len(),
                    "send queue full, dropping frame"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Handle one raw inbound text frame: room control events are applied
    /// directly, everything else runs the interceptor chain and then event
    /// dispatch. Malformed frames are logged and ignored.
    pub fn handle_frame(self: &Arc<Self>, raw: &str) {
        let frame: WireFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(connection_id = %self.id, error = %err, "ignoring malformed frame");
                return;
            }
        };

        match frame.event.as_str() {
            JOIN_EVENT => {
                if let Some(room) = frame.args.first().and_then(Value::as_str) {
                    self.join(room);
                }
            }
            LEAVE_EVENT => {
                if let Some(room) = frame.args.first().and_then(Value::as_str) {
                    self.leave(room);
                }
            }
            _ => self.deliver(Packet::new(frame.event, frame.args)),
        }
    }

    /// Run a packet through the interceptor chain, in installation order,
    /// ending at event dispatch. An interceptor that never invokes its
    /// continuation drops the packet.
    pub fn deliver(self: &Arc<Self>, packet: Packet) {
        let chain: Vec<PacketInterceptor> = self.interceptors.read().clone();
        let conn = Arc::clone(self);
        let terminal: PacketContinuation = Arc::new(move |p: Packet| conn.fire_event(&p.event, p.args));

        let entry = chain.into_iter().rev().fold(terminal, |next, interceptor| {
            Arc::new(move |p: Packet| interceptor(p, Arc::clone(&next))) as PacketContinuation
        });
        entry(packet);
    }

    fn fire_event(&self, event: &str, args: Vec<Value>) {
        let listeners: Vec<EventListener> = self
            .event_listeners
            .read()
            .get(event)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener(args.clone());
        }
    }

    /// Tear the connection down: detach from the namespace and fire the
    /// disconnect listeners. Runs at most once.
    pub fn close(&self) {
        if !self.connected.swap(false, Ordering::Relaxed) {
            return;
        }
        if let Some(ns) = self.namespace.upgrade() {
            ns.detach(&self.id);
        }
        let listeners: Vec<LifecycleListener> = self.disconnect_listeners.read().clone();
        for listener in listeners {
            listener();
        }
    }
}

impl Connection for WsConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn join(&self, room: &str) {
        self.rooms.write().insert(room.to_string());
    }

    fn leave(&self, room: &str) {
        self.rooms.write().remove(room);
    }

    fn on_event(&self, event: &str, listener: EventListener) {
        self.event_listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    fn on_reconnect(&self, listener: LifecycleListener) {
        self.reconnect_listeners.write().push(listener);
    }

    fn on_disconnect(&self, listener: LifecycleListener) {
        self.disconnect_listeners.write().push(listener);
    }

    fn intercept(&self, interceptor: PacketInterceptor) {
        self.interceptors.write().push(interceptor);
    }

    fn emit(&self, event: &str, args: &[Value]) {
        self.send_frame(event, args);
    }

    fn emit_to_room(&self, room: &str, event: &str, args: &[Value]) {
        if let Some(ns) = self.namespace.upgrade() {
            ns.emit_to_room_except(room, event, args, Some(&self.id));
        }
    }

    fn emit_broadcast(&self, event: &str, args: &[Value]) {
        if let Some(ns) = self.namespace.upgrade() {
            ns.emit_except(event, args, Some(&self.id));
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
