pub mod connections;
pub mod frame;
pub mod heartbeat;
pub mod hub;
pub mod server;

pub use connections::{ConnectionId, ConnectionRegistry};
pub use frame::{parse_inbound, FrameError, InboundFrame};
pub use heartbeat::PongTracker;
pub use hub::{WsHub, WsHubConfig};
pub use server::ws_handler;
