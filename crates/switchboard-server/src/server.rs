use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use switchboard_engine::service::Admission;
use switchboard_engine::transport::{AdmissionContinuation, Connection, NamespaceHandle};
use switchboard_telemetry::metrics::MetricsRecorder;

use crate::connection::WsConnection;
use crate::namespace::WsNamespace;
use crate::registry::ConnectionRegistry;
use crate::transport::WsTransport;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const ADMISSION_TIMEOUT: Duration = Duration::from_secs(10);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9092,
            max_send_queue: 256,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub transport: Arc<WsTransport>,
    pub metrics: Arc<MetricsRecorder>,
    pub max_send_queue: usize,
}

/// Build the Axum router with all routes. `/ws` attaches to the default
/// namespace; `/ws/{namespace}` attaches to a named one.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(root_ws_handler))
        .route("/ws/{namespace}", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps the listener
/// and the liveness sweep alive.
pub async fn start(
    config: ServerConfig,
    transport: Arc<WsTransport>,
    metrics: Arc<MetricsRecorder>,
) -> Result<ServerHandle, std::io::Error> {
    let cleanup = start_cleanup_task(Arc::clone(transport.registry()), CLEANUP_INTERVAL);

    let state = AppState {
        transport,
        metrics,
        max_send_queue: config.max_send_queue,
    };
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "switchboard server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
        _cleanup: cleanup,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

async fn root_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let ns = state.transport.namespace_handle("/");
    ws.on_upgrade(move |socket| handle_socket(socket, ns, state))
}

async fn ws_handler(
    Path(namespace): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let path = namespace_path(&namespace);
    let ns = state.transport.namespace_handle(&path);
    ws.on_upgrade(move |socket| handle_socket(socket, ns, state))
}

fn namespace_path(namespace: &str) -> String {
    if namespace.is_empty() || namespace == switchboard_core::routing::DEFAULT_NAMESPACE {
        "/".to_string()
    } else {
        format!("/{namespace}")
    }
}

/// Handle a new WebSocket connection: run admission, then accept into the
/// namespace and drive the socket until either side closes.
async fn handle_socket(mut socket: WebSocket, ns: Arc<WsNamespace>, state: AppState) {
    let (tx, rx) = mpsc::channel(state.max_send_queue);
    let conn = Arc::new(WsConnection::new(Arc::downgrade(&ns), tx));

    match run_admission(&ns, &conn).await {
        Admission::Admit => {}
        Admission::Reject(reason) => {
            tracing::info!(
                connection_id = %conn.id(),
                namespace = %ns.path(),
                reason = %reason,
                "connection rejected"
            );
            state.metrics.incr("connections_rejected");
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
    }

    state.transport.registry().register(Arc::clone(&conn));
    ns.accept(&conn);
    state.metrics.incr("connections_opened");
    state.metrics.gauge_add("connections_active", 1);
    tracing::info!(connection_id = %conn.id(), namespace = %ns.path(), "connection accepted");

    run_socket_loops(socket, Arc::clone(&conn), rx, Arc::clone(&state.metrics)).await;

    state.transport.registry().unregister(conn.id());
    conn.close();
    state.metrics.incr("connections_closed");
    state.metrics.gauge_add("connections_active", -1);
    tracing::info!(connection_id = %conn.id(), "connection closed");
}

/// Run the namespace's admission middleware for one connection attempt.
/// The first decision passed to the continuation wins; an empty chain
/// admits, and a chain that never decides fails open after a timeout.
async fn run_admission(ns: &Arc<WsNamespace>, conn: &Arc<WsConnection>) -> Admission {
    let chain = ns.middleware_chain();
    if chain.is_empty() {
        return Admission::Admit;
    }

    let (tx, mut rx) = mpsc::channel::<Admission>(chain.len() * 2);
    let decide: AdmissionContinuation = Arc::new(move |decision| {
        let _ = tx.try_send(decision);
    });
    let as_dyn: Arc<dyn Connection> = Arc::clone(conn) as Arc<dyn Connection>;
    for middleware in chain {
        middleware(Arc::clone(&as_dyn), Arc::clone(&decide));
    }

    match tokio::time::timeout(ADMISSION_TIMEOUT, rx.recv()).await {
        Ok(Some(decision)) => decision,
        _ => Admission::Admit,
    }
}

/// Split the socket into reader/writer tasks with a heartbeat, the same
/// lifecycle either way: the first task to finish tears the pair down.
async fn run_socket_loops(
    socket: WebSocket,
    conn: Arc<WsConnection>,
    mut rx: mpsc::Receiver<String>,
    metrics: Arc<MetricsRecorder>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: forward queued frames to the socket + periodic ping.
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader task: dispatch inbound frames, track liveness.
    let reader_conn = Arc::clone(&conn);
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    reader_conn.record_liveness();
                    metrics.incr("frames_in");
                    reader_conn.handle_frame(text.as_str());
                }
                WsMessage::Pong(_) => reader_conn.record_liveness(),
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum answers pings automatically
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }
}

/// Start a background task that periodically sweeps unresponsive
/// connections out of the registry.
pub fn start_cleanup_task(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.sweep();
            if removed > 0 {
                tracing::info!(removed = removed, "liveness sweep");
            }
        }
    })
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "connections": state.transport.registry().count(),
        "metrics": state.metrics.snapshot(),
    }))
}
