use std::collections::HashMap;
use std::sync::Arc;

use switchboard_core::routing::{NamespaceConfig, RoutingTable, DEFAULT_NAMESPACE};

use crate::dispatch;
use crate::service::{Admission, ServiceResolver};
use crate::transport::{NamespaceHandle, Transport};

/// Live namespace handles keyed by namespace name. Written once during
/// initialization, read-only for the rest of the process; `"default"` is
/// always present afterwards.
#[derive(Default)]
pub struct NamespaceRegistry {
    namespaces: HashMap<String, Arc<dyn NamespaceHandle>>,
}

impl NamespaceRegistry {
    pub fn get(&self, name: &str) -> Option<&Arc<dyn NamespaceHandle>> {
        self.namespaces.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

/// Initialize every configured namespace against the transport and return
/// the registry. Runs once at startup, before any connection is accepted.
pub fn initialize(
    transport: &dyn Transport,
    table: &RoutingTable,
    resolver: &Arc<dyn ServiceResolver>,
) -> NamespaceRegistry {
    let mut namespaces = HashMap::new();
    for (name, config) in table.iter() {
        let ns = initialize_namespace(transport, name, config, resolver);
        namespaces.insert(name.to_string(), ns);
    }

    // The default namespace is mandatory: fall back to the root handle
    // when no declaration configured it.
    namespaces
        .entry(DEFAULT_NAMESPACE.to_string())
        .or_insert_with(|| transport.root());

    tracing::info!(namespaces = namespaces.len(), "namespace registry initialized");
    NamespaceRegistry { namespaces }
}

/// Wire one namespace: resolve its transport handle, install the
/// pre-connection middleware when `use`/`handshake` is configured, and
/// install the connection-accepted hook that binds the dispatch engine.
pub fn initialize_namespace(
    transport: &dyn Transport,
    name: &str,
    config: &NamespaceConfig,
    resolver: &Arc<dyn ServiceResolver>,
) -> Arc<dyn NamespaceHandle> {
    let ns = if name == DEFAULT_NAMESPACE {
        transport.root()
    } else {
        transport.namespace(&format!("/{name}"))
    };

    if config.r#use.is_some() || config.handshake.is_some() {
        install_admission_middleware(&ns, config, resolver);
    }

    let bind_config = config.clone();
    let bind_resolver = Arc::clone(resolver);
    let bind_ns = Arc::clone(&ns);
    ns.on_connection(Arc::new(move |socket| {
        // Service resolution happens here, once per accepted connection.
        let Some(handlers) = bind_resolver.resolve(&bind_config.service) else {
            tracing::warn!(
                service = %bind_config.service,
                namespace = %bind_ns.path(),
                "service not resolvable, connection left unbound"
            );
            return;
        };
        dispatch::bind_connection(&bind_ns, &socket, &bind_config, &handlers);
    }));

    ns
}

/// Install the namespace middleware that runs the `use` hook and then the
/// `handshake` hook for every connection attempt. Both hooks always run,
/// `use` first; each receives the admission continuation, and the first
/// decision passed to it wins. When neither hook resolves to a handler the
/// attempt is admitted outright.
fn install_admission_middleware(
    ns: &Arc<dyn NamespaceHandle>,
    config: &NamespaceConfig,
    resolver: &Arc<dyn ServiceResolver>,
) {
    let use_name = config.r#use.clone();
    let handshake_name = config.handshake.clone();
    let service = config.service.clone();
    let resolver = Arc::clone(resolver);
    let ns_ref = Arc::clone(ns);

    ns.use_middleware(Arc::new(move |socket, next| {
        let handlers = resolver.resolve(&service);
        let use_hook = handlers
            .as_ref()
            .and_then(|h| use_name.as_deref().and_then(|n| h.middleware(n)));
        let handshake_hook = handlers
            .as_ref()
            .and_then(|h| handshake_name.as_deref().and_then(|n| h.middleware(n)));

        if use_hook.is_none() && handshake_hook.is_none() {
            next(Admission::Admit);
            return;
        }

        let ns = Arc::clone(&ns_ref);
        tokio::spawn(async move {
            if let Some(hook) = use_hook {
                let fut = hook.handle(Arc::clone(&ns), Arc::clone(&socket), Arc::clone(&next));
                dispatch::isolate("use", None, fut).await;
            }
            if let Some(hook) = handshake_hook {
                let fut = hook.handle(ns, socket, next);
                dispatch::isolate("handshake", None, fut).await;
            }
        });
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MiddlewareHandler, ServiceHandlers, StaticResolver};
    use crate::testutil::{MockConnection, MockTransport};
    use crate::transport::{AdmissionContinuation, Connection};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use switchboard_core::routing::RoutingTableBuilder;

    struct NamedHook {
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
        decision: Admission,
    }

    #[async_trait]
    impl MiddlewareHandler for NamedHook {
        async fn handle(
            &self,
            _ns: Arc<dyn NamespaceHandle>,
            _socket: Arc<dyn Connection>,
            next: AdmissionContinuation,
        ) -> anyhow::Result<()> {
            self.order.lock().push(self.name);
            next(self.decision.clone());
            Ok(())
        }
    }

    fn resolver_with(service: &str, handlers: ServiceHandlers) -> Arc<dyn ServiceResolver> {
        Arc::new(StaticResolver::new().with_service(service, handlers))
    }

    #[test]
    fn default_namespace_always_present() {
        let transport = MockTransport::new();
        let table = RoutingTableBuilder::new().build();
        let resolver: Arc<dyn ServiceResolver> = Arc::new(StaticResolver::new());

        let registry = initialize(transport.as_ref(), &table, &resolver);

        assert!(registry.contains(DEFAULT_NAMESPACE));
        assert_eq!(registry.get(DEFAULT_NAMESPACE).unwrap().path(), "/");
    }

    #[test]
    fn named_namespace_maps_to_prefixed_path() {
        let transport = MockTransport::new();
        let mut builder = RoutingTableBuilder::new();
        builder.register_event(["chat"], "message", "on_message", "svc");
        let table = builder.build();
        let resolver: Arc<dyn ServiceResolver> = Arc::new(StaticResolver::new());

        let registry = initialize(transport.as_ref(), &table, &resolver);

        assert_eq!(registry.get("chat").unwrap().path(), "/chat");
        assert!(registry.contains(DEFAULT_NAMESPACE));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn explicit_default_config_keeps_root_handle() {
        let transport = MockTransport::new();
        let mut builder = RoutingTableBuilder::new();
        builder.register_event([], "ping", "on_ping", "svc");
        let table = builder.build();
        let resolver: Arc<dyn ServiceResolver> = Arc::new(StaticResolver::new());

        let registry = initialize(transport.as_ref(), &table, &resolver);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(DEFAULT_NAMESPACE).unwrap().path(), "/");
    }

    #[test]
    fn no_middleware_installed_without_use_or_handshake() {
        let transport = MockTransport::new();
        let config = NamespaceConfig {
            service: "svc".into(),
            connect: Some("on_connect".into()),
            ..Default::default()
        };
        let resolver = resolver_with("svc", ServiceHandlers::new());

        initialize_namespace(transport.as_ref(), DEFAULT_NAMESPACE, &config, &resolver);

        assert_eq!(transport.root_mock().middleware_count(), 0);
    }

    #[tokio::test]
    async fn use_runs_before_handshake_and_both_run() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let handlers = ServiceHandlers::new()
            .with_middleware(
                "guard",
                Arc::new(NamedHook {
                    name: "use",
                    order: Arc::clone(&order),
                    decision: Admission::Admit,
                }),
            )
            .with_middleware(
                "shake",
                Arc::new(NamedHook {
                    name: "handshake",
                    order: Arc::clone(&order),
                    decision: Admission::Admit,
                }),
            );
        let resolver = resolver_with("svc", handlers);

        let transport = MockTransport::new();
        let config = NamespaceConfig {
            service: "svc".into(),
            r#use: Some("guard".into()),
            handshake: Some("shake".into()),
            ..Default::default()
        };
        initialize_namespace(transport.as_ref(), DEFAULT_NAMESPACE, &config, &resolver);

        let root = transport.root_mock();
        assert_eq!(root.middleware_count(), 1);

        let conn = MockConnection::new("conn_1", &root);
        let decisions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&decisions);
        root.run_middleware(&conn, Arc::new(move |d| sink.lock().push(d)));
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(*order.lock(), vec!["use", "handshake"]);
        // Both hooks called the continuation; the server treats the first
        // decision as authoritative.
        assert_eq!(decisions.lock().len(), 2);
    }

    #[tokio::test]
    async fn rejecting_use_still_runs_handshake() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let handlers = ServiceHandlers::new()
            .with_middleware(
                "guard",
                Arc::new(NamedHook {
                    name: "use",
                    order: Arc::clone(&order),
                    decision: Admission::Reject("nope".into()),
                }),
            )
            .with_middleware(
                "shake",
                Arc::new(NamedHook {
                    name: "handshake",
                    order: Arc::clone(&order),
                    decision: Admission::Admit,
                }),
            );
        let resolver = resolver_with("svc", handlers);

        let transport = MockTransport::new();
        let config = NamespaceConfig {
            service: "svc".into(),
            r#use: Some("guard".into()),
            handshake: Some("shake".into()),
            ..Default::default()
        };
        initialize_namespace(transport.as_ref(), DEFAULT_NAMESPACE, &config, &resolver);

        let root = transport.root_mock();
        let conn = MockConnection::new("conn_1", &root);
        let decisions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&decisions);
        root.run_middleware(&conn, Arc::new(move |d| sink.lock().push(d)));
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(*order.lock(), vec!["use", "handshake"]);
        assert_eq!(decisions.lock()[0], Admission::Reject("nope".into()));
    }

    #[tokio::test]
    async fn missing_middleware_handlers_admit_outright() {
        let resolver = resolver_with("svc", ServiceHandlers::new());

        let transport = MockTransport::new();
        let config = NamespaceConfig {
            service: "svc".into(),
            r#use: Some("not_registered".into()),
            ..Default::default()
        };
        initialize_namespace(transport.as_ref(), DEFAULT_NAMESPACE, &config, &resolver);

        let root = transport.root_mock();
        let conn = MockConnection::new("conn_1", &root);
        let decisions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&decisions);
        root.run_middleware(&conn, Arc::new(move |d| sink.lock().push(d)));

        assert_eq!(*decisions.lock(), vec![Admission::Admit]);
    }
}
