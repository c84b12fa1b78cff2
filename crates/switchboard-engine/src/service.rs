use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::transport::{AdmissionContinuation, Connection, NamespaceHandle, Packet, PacketContinuation};

/// Outcome a middleware hook passes to its continuation for a pending
/// connection attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Reject(String),
}

/// Handler bound to a connect, reconnect, or disconnect slot.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    async fn handle(
        &self,
        ns: Arc<dyn NamespaceHandle>,
        socket: Arc<dyn Connection>,
    ) -> anyhow::Result<()>;
}

/// Handler bound to a named event. Receives the inbound ordered argument
/// list; validating its shape is the handler's job.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        ns: Arc<dyn NamespaceHandle>,
        socket: Arc<dyn Connection>,
        args: Vec<Value>,
    ) -> anyhow::Result<()>;
}

/// Pre-connection hook bound to the `use` or `handshake` slot. Must invoke
/// `next` to admit or reject the pending connection.
#[async_trait]
pub trait MiddlewareHandler: Send + Sync {
    async fn handle(
        &self,
        ns: Arc<dyn NamespaceHandle>,
        socket: Arc<dyn Connection>,
        next: AdmissionContinuation,
    ) -> anyhow::Result<()>;
}

/// Inbound-packet hook bound to the `use_socket` slot. The packet proceeds
/// to event dispatch only if the handler invokes `next`.
#[async_trait]
pub trait PacketHandler: Send + Sync {
    async fn handle(
        &self,
        ns: Arc<dyn NamespaceHandle>,
        packet: Packet,
        next: PacketContinuation,
    ) -> anyhow::Result<()>;
}

/// A service's handlers, keyed by the names used in declarations. The
/// routing table binds by name; resolution to a typed handler happens here,
/// once per use site, and a name with no entry is simply inert.
#[derive(Default)]
pub struct ServiceHandlers {
    lifecycle: HashMap<String, Arc<dyn LifecycleHandler>>,
    events: HashMap<String, Arc<dyn EventHandler>>,
    middleware: HashMap<String, Arc<dyn MiddlewareHandler>>,
    packets: HashMap<String, Arc<dyn PacketHandler>>,
}

impl ServiceHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lifecycle(mut self, name: &str, handler: Arc<dyn LifecycleHandler>) -> Self {
        self.lifecycle.insert(name.to_string(), handler);
        self
    }

    pub fn with_event(mut self, name: &str, handler: Arc<dyn EventHandler>) -> Self {
        self.events.insert(name.to_string(), handler);
        self
    }

    pub fn with_middleware(mut self, name: &str, handler: Arc<dyn MiddlewareHandler>) -> Self {
        self.middleware.insert(name.to_string(), handler);
        self
    }

    pub fn with_packet(mut self, name: &str, handler: Arc<dyn PacketHandler>) -> Self {
        self.packets.insert(name.to_string(), handler);
        self
    }

    pub fn lifecycle(&self, name: &str) -> Option<Arc<dyn LifecycleHandler>> {
        self.lifecycle.get(name).cloned()
    }

    pub fn event(&self, name: &str) -> Option<Arc<dyn EventHandler>> {
        self.events.get(name).cloned()
    }

    pub fn middleware(&self, name: &str) -> Option<Arc<dyn MiddlewareHandler>> {
        self.middleware.get(name).cloned()
    }

    pub fn packet(&self, name: &str) -> Option<Arc<dyn PacketHandler>> {
        self.packets.get(name).cloned()
    }
}

/// Resolves a declared service reference to its live handlers. Resolution
/// happens once per connection-accepted event, so per-request service
/// instances are possible.
pub trait ServiceResolver: Send + Sync {
    fn resolve(&self, service: &str) -> Option<Arc<ServiceHandlers>>;
}

/// Fixed service map, for hosts whose services live for the whole process.
#[derive(Default)]
pub struct StaticResolver {
    services: HashMap<String, Arc<ServiceHandlers>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, name: &str, handlers: ServiceHandlers) -> Self {
        self.services.insert(name.to_string(), Arc::new(handlers));
        self
    }
}

impl ServiceResolver for StaticResolver {
    fn resolve(&self, service: &str) -> Option<Arc<ServiceHandlers>> {
        self.services.get(service).cloned()
    }
}
