//! The seam between the routing logic and whatever carries its messages.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::Span;

use crate::common::{Message, Node};
use crate::Result;

/// A transport able to run one request/response exchange with a remote node.
///
/// [crate::rpc::KrpcSocket] is the UDP implementation; tests plug in simulated networks.
pub trait Network: Send + Sync {
    /// This node's own [Node] record, as advertised to others.
    fn local(&self) -> &Node;

    /// Sends `message` to `address` and blocks until the matching response arrives.
    ///
    /// Implementations must give up after `timeout`, cancel whatever is pending for this
    /// exchange, and return [crate::Error::Timeout]. An unreachable peer is an error too.
    fn request(&self, address: SocketAddr, message: Message, timeout: Duration) -> Result<Message>;

    /// Span every component bound to this network records its events under.
    fn span(&self) -> Span {
        tracing::debug_span!("kademlia", id = %self.local().id)
    }
}
