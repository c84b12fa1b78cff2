pub mod connection;
pub mod namespace;
pub mod registry;
pub mod server;
pub mod transport;

pub use connection::{WireFrame, WsConnection};
pub use namespace::WsNamespace;
pub use registry::ConnectionRegistry;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
pub use transport::WsTransport;
