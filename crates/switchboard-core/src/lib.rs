pub mod errors;
pub mod ids;
pub mod messages;
pub mod publish;
pub mod routing;

pub use errors::SwitchboardError;
pub use ids::{ConnectionId, WorkerId};
pub use messages::BridgeMessage;
pub use publish::{PublishOptions, PublishRequest};
pub use routing::{HookSlot, NamespaceConfig, RoutingTable, RoutingTableBuilder, DEFAULT_NAMESPACE};
