pub mod bridge;
pub mod dispatch;
pub mod init;
pub mod publish;
pub mod service;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use bridge::{start_bridge, LocalBus, MessageBus, Publisher};
pub use init::{initialize, initialize_namespace, NamespaceRegistry};
pub use publish::{deliver, resolve, Delivery, SkipReason};
pub use service::{
    Admission, EventHandler, LifecycleHandler, MiddlewareHandler, PacketHandler, ServiceHandlers,
    ServiceResolver, StaticResolver,
};
pub use transport::{Connection, NamespaceHandle, Packet, Transport};
