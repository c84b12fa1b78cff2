use std::sync::Arc;

use serde_json::Value;
use switchboard_core::ids::ConnectionId;

use crate::service::Admission;

/// One inbound message unit: a named event with its ordered argument list.
/// Packet interceptors see these before normal event dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub event: String,
    pub args: Vec<Value>,
}

impl Packet {
    pub fn new(event: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            args,
        }
    }
}

/// Listener for a named event on one connection. Receives the event's
/// ordered argument list.
pub type EventListener = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// Listener for a connection lifecycle signal (reconnect, disconnect).
pub type LifecycleListener = Arc<dyn Fn() + Send + Sync>;

/// Continuation an interceptor invokes to let a packet proceed to event
/// dispatch. Not invoking it drops the packet.
pub type PacketContinuation = Arc<dyn Fn(Packet) + Send + Sync>;

/// Inbound-packet interceptor installed on a connection.
pub type PacketInterceptor = Arc<dyn Fn(Packet, PacketContinuation) + Send + Sync>;

/// Continuation a pre-connection middleware invokes to admit or reject a
/// pending connection. The first decision wins; later calls are ignored.
pub type AdmissionContinuation = Arc<dyn Fn(Admission) + Send + Sync>;

/// Pre-connection middleware installed on a namespace. Runs for every
/// connection attempt, before acceptance.
pub type ConnectMiddleware = Arc<dyn Fn(Arc<dyn Connection>, AdmissionContinuation) + Send + Sync>;

/// Callback fired when a connection is accepted into a namespace.
pub type ConnectionCallback = Arc<dyn Fn(Arc<dyn Connection>) + Send + Sync>;

/// The realtime transport collaborator. The engine only ever talks to the
/// transport through this seam; the reference implementation lives in
/// `switchboard-server`.
pub trait Transport: Send + Sync {
    /// The root namespace handle, backing the default namespace.
    fn root(&self) -> Arc<dyn NamespaceHandle>;

    /// Create-or-get a sub-namespace by path (e.g. `/chat`).
    fn namespace(&self, path: &str) -> Arc<dyn NamespaceHandle>;

    /// Process-wide connection lookup by identifier.
    fn connection(&self, id: &ConnectionId) -> Option<Arc<dyn Connection>>;
}

/// A live namespace: registration surface for middleware and accepted
/// connections plus the namespace-scoped emit operations.
pub trait NamespaceHandle: Send + Sync {
    fn path(&self) -> &str;

    fn use_middleware(&self, middleware: ConnectMiddleware);

    fn on_connection(&self, callback: ConnectionCallback);

    /// Emit to every connection in the namespace.
    fn emit(&self, event: &str, args: &[Value]);

    /// Emit to every member of `room` within this namespace.
    fn emit_to_room(&self, room: &str, event: &str, args: &[Value]);
}

/// One accepted duplex connection.
pub trait Connection: Send + Sync {
    fn id(&self) -> &ConnectionId;

    fn join(&self, room: &str);
    fn leave(&self, room: &str);

    fn on_event(&self, event: &str, listener: EventListener);
    fn on_reconnect(&self, listener: LifecycleListener);
    fn on_disconnect(&self, listener: LifecycleListener);

    /// Install an inbound-packet interceptor running before event dispatch.
    fn intercept(&self, interceptor: PacketInterceptor);

    /// Emit to this connection only.
    fn emit(&self, event: &str, args: &[Value]);

    /// Emit to the members of `room`, excluding this connection.
    fn emit_to_room(&self, room: &str, event: &str, args: &[Value]);

    /// Emit to every other connection in this connection's namespace.
    fn emit_broadcast(&self, event: &str, args: &[Value]);
}
