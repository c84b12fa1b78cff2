//! In-memory transport doubles for engine tests. They record every emit
//! into a shared log so tests can assert on the exact delivery that
//! happened.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use switchboard_core::ids::ConnectionId;

use crate::transport::{
    AdmissionContinuation, ConnectMiddleware, Connection, ConnectionCallback, EventListener,
    LifecycleListener, NamespaceHandle, Packet, PacketContinuation, PacketInterceptor, Transport,
};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Emission {
    Namespace {
        path: String,
        event: String,
        args: Vec<Value>,
    },
    Room {
        path: String,
        room: String,
        event: String,
        args: Vec<Value>,
    },
    Direct {
        id: String,
        event: String,
        args: Vec<Value>,
    },
    ConnectionRoom {
        id: String,
        room: String,
        event: String,
        args: Vec<Value>,
    },
    BroadcastFrom {
        id: String,
        event: String,
        args: Vec<Value>,
    },
}

pub(crate) struct MockNamespace {
    path: String,
    log: Arc<Mutex<Vec<Emission>>>,
    middleware: Mutex<Vec<ConnectMiddleware>>,
    callbacks: Mutex<Vec<ConnectionCallback>>,
}

impl MockNamespace {
    pub fn new(path: &str) -> Arc<Self> {
        Self::with_log(path, Arc::new(Mutex::new(Vec::new())))
    }

    pub fn with_log(path: &str, log: Arc<Mutex<Vec<Emission>>>) -> Arc<Self> {
        Arc::new(Self {
            path: path.to_string(),
            log,
            middleware: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
        })
    }

    pub fn emissions(&self) -> Vec<Emission> {
        self.log.lock().clone()
    }

    pub fn middleware_count(&self) -> usize {
        self.middleware.lock().len()
    }

    /// Simulate transport acceptance: fire the connection-accepted callbacks.
    pub fn accept(&self, conn: &Arc<MockConnection>) {
        let callbacks = self.callbacks.lock().clone();
        let as_dyn: Arc<dyn Connection> = Arc::clone(conn) as Arc<dyn Connection>;
        for cb in callbacks {
            cb(Arc::clone(&as_dyn));
        }
    }

    /// Simulate a connection attempt: run the installed middleware chain.
    pub fn run_middleware(&self, conn: &Arc<MockConnection>, next: AdmissionContinuation) {
        let chain = self.middleware.lock().clone();
        let as_dyn: Arc<dyn Connection> = Arc::clone(conn) as Arc<dyn Connection>;
        for mw in chain {
            mw(Arc::clone(&as_dyn), Arc::clone(&next));
        }
    }
}

impl NamespaceHandle for MockNamespace {
    fn path(&self) -> &str {
        &self.path
    }

    fn use_middleware(&self, middleware: ConnectMiddleware) {
        self.middleware.lock().push(middleware);
    }

    fn on_connection(&self, callback: ConnectionCallback) {
        self.callbacks.lock().push(callback);
    }

    fn emit(&self, event: &str, args: &[Value]) {
        self.log.lock().push(Emission::Namespace {
            path: self.path.clone(),
            event: event.to_string(),
            args: args.to_vec(),
        });
    }

    fn emit_to_room(&self, room: &str, event: &str, args: &[Value]) {
        self.log.lock().push(Emission::Room {
            path: self.path.clone(),
            room: room.to_string(),
            event: event.to_string(),
            args: args.to_vec(),
        });
    }
}

pub(crate) struct MockConnection {
    id: ConnectionId,
    log: Arc<Mutex<Vec<Emission>>>,
    open: AtomicBool,
    rooms: Mutex<HashSet<String>>,
    listeners: Mutex<HashMap<String, Vec<EventListener>>>,
    reconnect_listeners: Mutex<Vec<LifecycleListener>>,
    disconnect_listeners: Mutex<Vec<LifecycleListener>>,
    interceptors: Mutex<Vec<PacketInterceptor>>,
}

impl MockConnection {
    pub fn new(id: &str, ns: &Arc<MockNamespace>) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::from_raw(id),
            log: Arc::clone(&ns.log),
            open: AtomicBool::new(true),
            rooms: Mutex::new(HashSet::new()),
            listeners: Mutex::new(HashMap::new()),
            reconnect_listeners: Mutex::new(Vec::new()),
            disconnect_listeners: Mutex::new(Vec::new()),
            interceptors: Mutex::new(Vec::new()),
        })
    }

    /// Feed an inbound packet through the interceptor chain and then the
    /// registered event listeners, the way a transport would.
    pub fn deliver(self: &Arc<Self>, packet: Packet) {
        let interceptors = self.interceptors.lock().clone();
        let this = Arc::clone(self);
        let mut next: PacketContinuation =
            Arc::new(move |p: Packet| this.fire_event(&p.event, p.args));
        for interceptor in interceptors.into_iter().rev() {
            let inner = next;
            next = Arc::new(move |p: Packet| interceptor(p, Arc::clone(&inner)));
        }
        next(packet);
    }

    fn fire_event(&self, event: &str, args: Vec<Value>) {
        let listeners = self
            .listeners
            .lock()
            .get(event)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener(args.clone());
        }
    }

    pub fn fire_reconnect(&self) {
        for listener in self.reconnect_listeners.lock().clone() {
            listener();
        }
    }

    pub fn fire_disconnect(&self) {
        if self.open.swap(false, Ordering::Relaxed) {
            for listener in self.disconnect_listeners.lock().clone() {
                listener();
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.rooms.lock().contains(room)
    }
}

impl Connection for MockConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn join(&self, room: &str) {
        self.rooms.lock().insert(room.to_string());
    }

    fn leave(&self, room: &str) {
        self.rooms.lock().remove(room);
    }

    fn on_event(&self, event: &str, listener: EventListener) {
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    fn on_reconnect(&self, listener: LifecycleListener) {
        self.reconnect_listeners.lock().push(listener);
    }

    fn on_disconnect(&self, listener: LifecycleListener) {
        self.disconnect_listeners.lock().push(listener);
    }

    fn intercept(&self, interceptor: PacketInterceptor) {
        self.interceptors.lock().push(interceptor);
    }

    fn emit(&self, event: &str, args: &[Value]) {
        self.log.lock().push(Emission::Direct {
            id: self.id.as_str().to_string(),
            event: event.to_string(),
            args: args.to_vec(),
        });
    }

    fn emit_to_room(&self, room: &str, event: &str, args: &[Value]) {
        self.log.lock().push(Emission::ConnectionRoom {
            id: self.id.as_str().to_string(),
            room: room.to_string(),
            event: event.to_string(),
            args: args.to_vec(),
        });
    }

    fn emit_broadcast(&self, event: &str, args: &[Value]) {
        self.log.lock().push(Emission::BroadcastFrom {
            id: self.id.as_str().to_string(),
            event: event.to_string(),
            args: args.to_vec(),
        });
    }
}

pub(crate) struct MockTransport {
    root: Arc<MockNamespace>,
    namespaces: Mutex<HashMap<String, Arc<MockNamespace>>>,
    connections: Mutex<HashMap<ConnectionId, Arc<MockConnection>>>,
    log: Arc<Mutex<Vec<Emission>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let log = Arc::new(Mutex::new(Vec::new()));
        Arc::new(Self {
            root: MockNamespace::with_log("/", Arc::clone(&log)),
            namespaces: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
            log,
        })
    }

    pub fn root_mock(&self) -> Arc<MockNamespace> {
        Arc::clone(&self.root)
    }

    /// Register a live connection in the global registry, attached to `ns`.
    pub fn add_connection(&self, ns: &Arc<MockNamespace>, id: &str) -> Arc<MockConnection> {
        let conn = MockConnection::new(id, ns);
        self.connections
            .lock()
            .insert(conn.id.clone(), Arc::clone(&conn));
        conn
    }

    pub fn emissions(&self) -> Vec<Emission> {
        self.log.lock().clone()
    }
}

impl Transport for MockTransport {
    fn root(&self) -> Arc<dyn NamespaceHandle> {
        Arc::clone(&self.root) as Arc<dyn NamespaceHandle>
    }

    fn namespace(&self, path: &str) -> Arc<dyn NamespaceHandle> {
        if path == "/" {
            return self.root();
        }
        let mut namespaces = self.namespaces.lock();
        let ns = namespaces
            .entry(path.to_string())
            .or_insert_with(|| MockNamespace::with_log(path, Arc::clone(&self.log)));
        Arc::clone(ns) as Arc<dyn NamespaceHandle>
    }

    fn connection(&self, id: &ConnectionId) -> Option<Arc<dyn Connection>> {
        self.connections
            .lock()
            .get(id)
            .map(|c| Arc::clone(c) as Arc<dyn Connection>)
    }
}
