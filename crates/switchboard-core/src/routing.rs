use std::collections::HashMap;

/// Canonical name of the namespace used when a declaration or publish
/// request names none. Every component uses this single literal.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Lifecycle slots a handler can be bound to. Each namespace holds at most
/// one handler name per slot; named events live in a separate map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookSlot {
    Connect,
    Reconnect,
    Handshake,
    Use,
    UseSocket,
    Disconnect,
}

/// Declared bindings for one namespace: which service owns the handlers,
/// which handler name (if any) fills each lifecycle slot, and the
/// event-name → handler-name map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceConfig {
    pub service: String,
    pub connect: Option<String>,
    pub reconnect: Option<String>,
    pub handshake: Option<String>,
    pub r#use: Option<String>,
    pub use_socket: Option<String>,
    pub disconnect: Option<String>,
    pub events: HashMap<String, String>,
}

impl NamespaceConfig {
    pub fn slot(&self, slot: HookSlot) -> Option<&str> {
        match slot {
            HookSlot::Connect => self.connect.as_deref(),
            HookSlot::Reconnect => self.reconnect.as_deref(),
            HookSlot::Handshake => self.handshake.as_deref(),
            HookSlot::Use => self.r#use.as_deref(),
            HookSlot::UseSocket => self.use_socket.as_deref(),
            HookSlot::Disconnect => self.disconnect.as_deref(),
        }
    }

    fn set_slot(&mut self, slot: HookSlot, handler: String) {
        let target = match slot {
            HookSlot::Connect => &mut self.connect,
            HookSlot::Reconnect => &mut self.reconnect,
            HookSlot::Handshake => &mut self.handshake,
            HookSlot::Use => &mut self.r#use,
            HookSlot::UseSocket => &mut self.use_socket,
            HookSlot::Disconnect => &mut self.disconnect,
        };
        *target = Some(handler);
    }
}

/// Accumulates declarations into per-namespace configs. Owned by the
/// startup routine; `build()` freezes it into the process-wide table.
///
/// Registration is permissive: handler names are not checked against any
/// service here. A name that resolves to nothing is simply inert at
/// dispatch time.
#[derive(Debug, Default)]
pub struct RoutingTableBuilder {
    namespaces: HashMap<String, NamespaceConfig>,
}

impl RoutingTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` into `slot` for each named namespace. An empty
    /// namespace list means the default namespace. Last declaration wins.
    pub fn register<'a, I>(&mut self, namespaces: I, slot: HookSlot, handler: &str, service: &str)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for ns in Self::or_default(namespaces) {
            let config = self.ensure(&ns, service);
            config.set_slot(slot, handler.to_string());
        }
    }

    /// Bind `handler` to inbound occurrences of `event` in each named
    /// namespace. Last declaration wins per event name.
    pub fn register_event<'a, I>(&mut self, namespaces: I, event: &str, handler: &str, service: &str)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for ns in Self::or_default(namespaces) {
            let config = self.ensure(&ns, service);
            config.events.insert(event.to_string(), handler.to_string());
        }
    }

    pub fn build(self) -> RoutingTable {
        RoutingTable {
            namespaces: self.namespaces,
        }
    }

    fn ensure(&mut self, namespace: &str, service: &str) -> &mut NamespaceConfig {
        let config = self.namespaces.entry(namespace.to_string()).or_default();
        config.service = service.to_string();
        config
    }

    fn or_default<'a, I>(namespaces: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<String> = namespaces.into_iter().map(str::to_string).collect();
        if names.is_empty() {
            vec![DEFAULT_NAMESPACE.to_string()]
        } else {
            names
        }
    }
}

/// Immutable namespace-name → config map, built once before the transport
/// starts accepting connections.
#[derive(Clone, Debug, Default)]
pub struct RoutingTable {
    namespaces: HashMap<String, NamespaceConfig>,
}

impl RoutingTable {
    pub fn get(&self, namespace: &str) -> Option<&NamespaceConfig> {
        self.namespaces.get(namespace)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NamespaceConfig)> {
        self.namespaces.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}
