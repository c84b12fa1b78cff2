use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use switchboard_core::routing::NamespaceConfig;

use crate::service::ServiceHandlers;
use crate::transport::{Connection, NamespaceHandle};

/// Wire one accepted connection to its service handlers.
///
/// Handler names are resolved to typed handlers here, once, and captured
/// into the registered listeners; names with no matching handler register
/// nothing. Every invocation is spawned fire-and-forget and isolated: an
/// `Err` or a panic is logged with the firing event's identity and never
/// reaches the connection, the namespace, or other handlers.
///
/// With a `use_socket` interceptor configured, each packet's interceptor
/// runs on its own spawned task, so named-event firing order across
/// packets on one connection is not guaranteed.
pub fn bind_connection(
    ns: &Arc<dyn NamespaceHandle>,
    socket: &Arc<dyn Connection>,
    config: &NamespaceConfig,
    handlers: &Arc<ServiceHandlers>,
) {
    if let Some(handler) = config.connect.as_deref().and_then(|n| handlers.lifecycle(n)) {
        let ns = Arc::clone(ns);
        let socket = Arc::clone(socket);
        spawn_isolated("connect", None, async move {
            handler.handle(ns, socket).await
        });
    }

    if let Some(handler) = config.reconnect.as_deref().and_then(|n| handlers.lifecycle(n)) {
        let ns = Arc::clone(ns);
        let weak = Arc::downgrade(socket);
        socket.on_reconnect(Arc::new(move || {
            let Some(socket) = weak.upgrade() else { return };
            let handler = Arc::clone(&handler);
            let ns = Arc::clone(&ns);
            spawn_isolated("reconnect", None, async move {
                handler.handle(ns, socket).await
            });
        }));
    }

    if let Some(handler) = config.use_socket.as_deref().and_then(|n| handlers.packet(n)) {
        let ns = Arc::clone(ns);
        socket.intercept(Arc::new(move |packet, next| {
            let handler = Arc::clone(&handler);
            let ns = Arc::clone(&ns);
            let data = packet.args.clone();
            spawn_isolated("use_socket", Some(data), async move {
                handler.handle(ns, packet, next).await
            });
        }));
    }

    if let Some(handler) = config.disconnect.as_deref().and_then(|n| handlers.lifecycle(n)) {
        let ns = Arc::clone(ns);
        let weak = Arc::downgrade(socket);
        socket.on_disconnect(Arc::new(move || {
            let Some(socket) = weak.upgrade() else { return };
            let handler = Arc::clone(&handler);
            let ns = Arc::clone(&ns);
            spawn_isolated("disconnect", None, async move {
                handler.handle(ns, socket).await
            });
        }));
    }

    for (event, handler_name) in &config.events {
        let Some(handler) = handlers.event(handler_name) else {
            continue;
        };
        let ns = Arc::clone(ns);
        let weak = Arc::downgrade(socket);
        let event_name = event.clone();
        socket.on_event(event, Arc::new(move |args: Vec<Value>| {
            let Some(socket) = weak.upgrade() else { return };
            let handler = Arc::clone(&handler);
            let ns = Arc::clone(&ns);
            let data = args.clone();
            let event_name = event_name.clone();
            tokio::spawn(async move {
                isolate(&event_name, Some(data), handler.handle(ns, socket, args)).await;
            });
        }));
    }
}

/// Run a handler future to completion, converting `Err` results and panics
/// into error logs. This is the only failure boundary for user handlers.
pub(crate) async fn isolate<F>(event: &str, data: Option<Vec<Value>>, fut: F)
where
    F: Future<Output = anyhow::Result<()>>,
{
    match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::error!(event = %event, data = ?data, error = %err, "handler failed");
        }
        Err(_) => {
            tracing::error!(event = %event, data = ?data, "handler panicked");
        }
    }
}

fn spawn_isolated<F>(event: &'static str, data: Option<Vec<Value>>, fut: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        isolate(event, data, fut).await;
    });
}
