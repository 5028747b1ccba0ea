//! Routing RPC: lookups, admission and the UDP transport they run on.

mod config;
mod events;
mod iterative_lookup;
mod network;
mod protocol;
mod socket;

pub use config::{
    Config, LookupConfig, ProtocolConfig, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_PING_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use events::{Events, PeerCallback};
pub use iterative_lookup::IterativeLookup;
pub use network::Network;
pub use protocol::Protocol;
pub use socket::{IncomingRequest, KrpcSocket, MAX_THREAD_BLOCK_DURATION};
