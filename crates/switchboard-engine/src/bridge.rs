use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use switchboard_core::errors::SwitchboardError;
use switchboard_core::messages::BridgeMessage;
use switchboard_core::publish::{PublishOptions, PublishRequest};

use crate::init::NamespaceRegistry;
use crate::publish;
use crate::transport::Transport;

/// Injected inter-process channel capability. `send` fans a message out to
/// every sibling worker (the sender included, so the resolver runs once on
/// each process that might hold the target connection); `subscribe` yields
/// this worker's inbound stream.
pub trait MessageBus: Send + Sync {
    fn send(&self, message: BridgeMessage) -> Result<(), SwitchboardError>;
    fn subscribe(&self) -> broadcast::Receiver<BridgeMessage>;
}

/// In-process loopback bus. Stands in for the host's worker channel in
/// tests and single-machine setups; every subscriber sees every message.
pub struct LocalBus {
    tx: broadcast::Sender<BridgeMessage>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MessageBus for LocalBus {
    fn send(&self, message: BridgeMessage) -> Result<(), SwitchboardError> {
        // No subscribers is an expected state (no other worker listening),
        // not a failure.
        let _ = self.tx.send(message);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BridgeMessage> {
        self.tx.subscribe()
    }
}

/// Start this worker's bridge listener: decode inbound publish messages
/// and feed them to the resolver against this process's own registry.
/// Delivery is at-most-once; messages with an empty event name are skipped.
pub fn start_bridge(
    bus: &dyn MessageBus,
    registry: Arc<NamespaceRegistry>,
    transport: Arc<dyn Transport>,
) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(BridgeMessage::Publish(req)) => {
                    if req.event.is_empty() {
                        continue;
                    }
                    publish::deliver(&req, &registry, transport.as_ref());
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "bridge listener lagged, dropped publishes");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("bridge channel closed");
                    break;
                }
            }
        }
    })
}

enum PublishMode {
    /// Single worker process: resolve in-process, no inter-process hop.
    Local {
        registry: Arc<NamespaceRegistry>,
        transport: Arc<dyn Transport>,
    },
    /// Multiple workers: fan the request out over the bus.
    Bus { bus: Arc<dyn MessageBus> },
}

/// The public call-site API for publishing events. Fire-and-forget: no
/// return value, no delivery confirmation.
pub struct Publisher {
    mode: PublishMode,
}

impl Publisher {
    pub fn local(registry: Arc<NamespaceRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            mode: PublishMode::Local { registry, transport },
        }
    }

    pub fn over_bus(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            mode: PublishMode::Bus { bus },
        }
    }

    pub fn publish(&self, event: &str, payload: Vec<Value>, options: PublishOptions) {
        let req = PublishRequest::new(event, payload).with_options(options);
        self.publish_request(req);
    }

    pub fn publish_request(&self, req: PublishRequest) {
        match &self.mode {
            PublishMode::Local { registry, transport } => {
                publish::deliver(&req, registry, transport.as_ref());
            }
            PublishMode::Bus { bus } => {
                if let Err(err) = bus.send(BridgeMessage::publish(req)) {
                    tracing::warn!(kind = err.error_kind(), error = %err, "publish send failed");
                }
            }
        }
    }
}
