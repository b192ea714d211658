//! Price/gas subscription hub: bidirectional client/symbol index plus
//! upstream fan-out (spec §4.H).

pub mod adapter;
pub mod hub;
pub mod sink;

pub use adapter::{PriceFeedAdapter, PriceFeedError, UpstreamEvent};
pub use hub::{run_dispatcher, ClientId, PriceHub};
pub use sink::ClientSink;
