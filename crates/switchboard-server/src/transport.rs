use std::sync::Arc;

use dashmap::DashMap;

use switchboard_core::ids::ConnectionId;
use switchboard_engine::transport::{Connection, NamespaceHandle, Transport};

use crate::namespace::WsNamespace;
use crate::registry::ConnectionRegistry;

/// The WebSocket transport: the root namespace, the sub-namespaces keyed
/// by path, and the process-wide connection registry.
pub struct WsTransport {
    root: Arc<WsNamespace>,
    namespaces: DashMap<String, Arc<WsNamespace>>,
    registry: Arc<ConnectionRegistry>,
}

impl WsTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            root: WsNamespace::new("/"),
            namespaces: DashMap::new(),
            registry: Arc::new(ConnectionRegistry::new()),
        })
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Create-or-get the concrete namespace for a path. `/` is the root.
    pub fn namespace_handle(&self, path: &str) -> Arc<WsNamespace> {
        if path == "/" {
            return Arc::clone(&self.root);
        }
        Arc::clone(
            self.namespaces
                .entry(path.to_string())
                .or_insert_with(|| WsNamespace::new(path))
                .value(),
        )
    }
}

impl Transport for WsTransport {
    fn root(&self) -> Arc<dyn NamespaceHandle> {
        Arc::clone(&self.root) as Arc<dyn NamespaceHandle>
    }

    fn namespace(&self, path: &str) -> Arc<dyn NamespaceHandle> {
        self.namespace_handle(path) as Arc<dyn NamespaceHandle>
    }

    fn connection(&self, id: &ConnectionId) -> Option<Arc<dyn Connection>> {
        self.registry.get(id).map(|conn| conn as Arc<dyn Connection>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::WsConnection;
    use tokio::sync::mpsc;

    #[test]
    fn root_namespace_has_root_path() {
        let transport = WsTransport::new();
        assert_eq!(transport.root().path(), "/");
        assert_eq!(transport.namespace("/").path(), "/");
    }

    #[test]
    fn namespace_is_created_once_per_path() {
        let transport = WsTransport::new();
        let a = transport.namespace_handle("/chat");
        let b = transport.namespace_handle("/chat");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.path(), "/chat");
    }

    #[test]
    fn connection_lookup_goes_through_registry() {
        let transport = WsTransport::new();
        let ns = transport.namespace_handle("/chat");
        let (tx, _rx) = mpsc::channel(8);
        let conn = Arc::new(WsConnection::new(Arc::downgrade(&ns), tx));
        let id = conn.id().clone();

        assert!(transport.connection(&id).is_none());

        transport.registry().register(Arc::clone(&conn));
        assert!(transport.connection(&id).is_some());
    }
}
