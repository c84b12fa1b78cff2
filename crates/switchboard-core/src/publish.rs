use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ConnectionId;
use crate::routing::DEFAULT_NAMESPACE;

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// One publish invocation: a named event with an ordered argument list and
/// the targeting qualifiers. Constructed per call, consumed once by the
/// resolver, never reused.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub event: String,
    #[serde(default)]
    pub payload: Vec<Value>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    #[serde(default)]
    pub broadcast: bool,
}

impl PublishRequest {
    pub fn new(event: impl Into<String>, payload: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            payload,
            namespace: default_namespace(),
            room: None,
            connection_id: None,
            broadcast: false,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn to_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn to_connection(mut self, id: ConnectionId) -> Self {
        self.connection_id = Some(id);
        self
    }

    pub fn with_broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }

    pub fn with_options(mut self, options: PublishOptions) -> Self {
        if let Some(ns) = options.namespace {
            self.namespace = ns;
        }
        self.room = options.room;
        self.connection_id = options.connection_id;
        self.broadcast = options.broadcast;
        self
    }
}

/// Call-site options for `Publisher::publish`. All optional; the default
/// publishes namespace-wide to the default namespace.
#[derive(Clone, Debug, Default)]
pub struct PublishOptions {
    pub namespace: Option<String>,
    pub room: Option<String>,
    pub connection_id: Option<ConnectionId>,
    pub broadcast: bool,
}
