use serde::{Deserialize, Serialize};

use crate::publish::PublishRequest;

/// Inter-process message envelope. Internally tagged so the wire shape is
/// `{"tag":"publish", "event":..., "payload":[...], ...}`; receivers drop
/// anything that does not carry a known tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum BridgeMessage {
    Publish(PublishRequest),
}

impl BridgeMessage {
    pub fn publish(request: PublishRequest) -> Self {
        Self::Publish(request)
    }
}
