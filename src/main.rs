use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde_json::{json, Value};

use switchboard_core::publish::PublishOptions;
use switchboard_core::routing::{HookSlot, RoutingTableBuilder};
use switchboard_engine::bridge::{start_bridge, LocalBus, MessageBus, Publisher};
use switchboard_engine::init;
use switchboard_engine::service::{
    Admission, EventHandler, LifecycleHandler, MiddlewareHandler, ServiceHandlers,
    ServiceResolver, StaticResolver,
};
use switchboard_engine::transport::{
    AdmissionContinuation, Connection, NamespaceHandle, Transport,
};
use switchboard_server::{ServerConfig, WsTransport};
use switchboard_telemetry::logging::{init_logging, LoggingConfig};
use switchboard_telemetry::metrics::MetricsRecorder;

#[derive(Parser)]
#[command(name = "switchboard", about = "Namespace-routed realtime event server")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 9092)]
    port: u16,

    /// Default log level (overridden by RUST_LOG).
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Greets a newly accepted connection with its identifier.
struct Welcome;

#[async_trait]
impl LifecycleHandler for Welcome {
    async fn handle(
        &self,
        _ns: Arc<dyn NamespaceHandle>,
        socket: Arc<dyn Connection>,
    ) -> anyhow::Result<()> {
        socket.emit("welcome", &[json!({ "id": socket.id().to_string() })]);
        Ok(())
    }
}

struct Goodbye;

#[async_trait]
impl LifecycleHandler for Goodbye {
    async fn handle(
        &self,
        _ns: Arc<dyn NamespaceHandle>,
        socket: Arc<dyn Connection>,
    ) -> anyhow::Result<()> {
        tracing::info!(connection_id = %socket.id(), "chat member left");
        Ok(())
    }
}

/// Admits every connection attempt after logging it.
struct Guard;

#[async_trait]
impl MiddlewareHandler for Guard {
    async fn handle(
        &self,
        ns: Arc<dyn NamespaceHandle>,
        socket: Arc<dyn Connection>,
        next: AdmissionContinuation,
    ) -> anyhow::Result<()> {
        tracing::debug!(connection_id = %socket.id(), namespace = %ns.path(), "connection attempt");
        next(Admission::Admit);
        Ok(())
    }
}

/// Relays `{"room": ..., "text": ...}` payloads to the named room, or to
/// the whole namespace when no room is given.
struct Relay;

#[async_trait]
impl EventHandler for Relay {
    async fn handle(
        &self,
        ns: Arc<dyn NamespaceHandle>,
        socket: Arc<dyn Connection>,
        args: Vec<Value>,
    ) -> anyhow::Result<()> {
        let Some(payload) = args.first() else {
            anyhow::bail!("message event without payload");
        };
        let text = payload.get("text").and_then(Value::as_str).unwrap_or_default();
        let out = json!({ "from": socket.id().to_string(), "text": text });

        match payload.get("room").and_then(Value::as_str) {
            Some(room) => socket.emit_to_room(room, "message", &[out]),
            None => ns.emit("message", &[out]),
        }
        Ok(())
    }
}

fn chat_service() -> ServiceHandlers {
    ServiceHandlers::new()
        .with_lifecycle("welcome", Arc::new(Welcome))
        .with_lifecycle("goodbye", Arc::new(Goodbye))
        .with_middleware("guard", Arc::new(Guard))
        .with_event("relay", Arc::new(Relay))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    init_logging(&LoggingConfig {
        log_level,
        ..Default::default()
    });

    tracing::info!("starting switchboard server");

    // Declare the routing table: the chat service owns the /chat namespace.
    let mut builder = RoutingTableBuilder::new();
    builder.register(["chat"], HookSlot::Use, "guard", "chat");
    builder.register(["chat"], HookSlot::Connect, "welcome", "chat");
    builder.register(["chat"], HookSlot::Disconnect, "goodbye", "chat");
    builder.register_event(["chat"], "message", "relay", "chat");
    let table = builder.build();

    let resolver: Arc<dyn ServiceResolver> =
        Arc::new(StaticResolver::new().with_service("chat", chat_service()));

    let transport = WsTransport::new();
    let registry = Arc::new(init::initialize(transport.as_ref(), &table, &resolver));

    // Single process, so the loopback bus stands in for a worker channel.
    let bus: Arc<dyn MessageBus> = Arc::new(LocalBus::default());
    let _bridge = start_bridge(
        bus.as_ref(),
        Arc::clone(&registry),
        Arc::clone(&transport) as Arc<dyn Transport>,
    );

    // Periodic server-time publish, routed over the bus like any
    // cross-process publish would be.
    let publisher = Publisher::over_bus(Arc::clone(&bus));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            publisher.publish(
                "server_time",
                vec![json!(now_secs())],
                PublishOptions {
                    namespace: Some("chat".into()),
                    ..Default::default()
                },
            );
        }
    });

    let config = ServerConfig {
        port: args.port,
        ..Default::default()
    };
    let port = config.port;
    let metrics = Arc::new(MetricsRecorder::new());
    let _handle = switchboard_server::start(config, transport, metrics)
        .await
        .expect("failed to start server");

    tracing::info!(port = port, "switchboard ready");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");

    tracing::info!("shutting down");
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
