//! Routing and discovery side of the Kademlia protocol.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, trace, Span};

use crate::common::{Id, Message, Node, RoutingTable, BUCKET_SIZE};
use crate::{Error, Result};

use super::{Events, IterativeLookup, LookupConfig, Network, ProtocolConfig};

/// Kademlia routing and discovery for one node.
///
/// Owns the node's [RoutingTable], admits observed peers into it through
/// [Protocol::ack], and runs lookups through the [Network] it is bound to.
#[derive(Debug)]
pub struct Protocol<N: Network> {
    network: Arc<N>,
    table: Arc<RoutingTable>,
    config: ProtocolConfig,
    span: Span,
}

impl<N: Network> Protocol<N> {
    /// Creates a protocol with an empty routing table for the network's local node.
    pub fn new(network: Arc<N>, config: ProtocolConfig) -> Result<Self> {
        let table = Arc::new(RoutingTable::new(network.local().clone()));

        Self::with_table(network, table, config)
    }

    /// Creates a protocol around an existing routing table.
    pub fn with_table(
        network: Arc<N>,
        table: Arc<RoutingTable>,
        config: ProtocolConfig,
    ) -> Result<Self> {
        config.validate()?;

        if table.id() != &network.local().id {
            return Err(Error::InvalidConfig(
                "routing table must belong to the network's local node",
            ));
        }

        let span = network.span();

        Ok(Self {
            network,
            table,
            config,
            span,
        })
    }

    // === Getters ===

    /// Returns the routing table.
    pub fn table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    pub fn local(&self) -> &Node {
        self.network.local()
    }

    pub fn events(&self) -> &Events {
        &self.config.events
    }

    // === Public Methods ===

    /// Finds the closest responding nodes to `target`, closest first.
    ///
    /// Every node that responds during the lookup is passed through [Self::ack].
    pub fn find(&self, target: Id) -> Vec<Node> {
        self.lookup(target, self.config.lookup.clone())
    }

    /// Same as [Self::find] with a lookup configuration for this call only.
    pub fn find_with(&self, target: Id, config: LookupConfig) -> Result<Vec<Node>> {
        config.validate()?;

        Ok(self.lookup(target, config))
    }

    /// Looks up this node's own Id, populating the routing table with nearby nodes.
    pub fn discover(&self) -> Vec<Node> {
        self.find(self.local().id)
    }

    /// Same as [Self::discover] with a lookup configuration for this call only.
    pub fn discover_with(&self, config: LookupConfig) -> Result<Vec<Node>> {
        self.find_with(self.local().id, config)
    }

    /// Pings `address`, succeeding only if a pong comes back within the ping timeout.
    pub fn ping(&self, address: SocketAddr) -> Result<()> {
        match self
            .network
            .request(address, Message::Ping, self.config.ping_timeout)?
        {
            Message::Pong => Ok(()),
            other => Err(Error::UnexpectedResponse {
                expected: "pong",
                got: other.kind(),
            }),
        }
    }

    /// Updates the routing table with a node that was just seen alive.
    ///
    /// A new node is admitted, a known one is marked as most recently seen. If its
    /// bucket is full, the bucket's least recently seen node is pinged and evicted
    /// if it does not answer. The observed node is then reported as evicted and
    /// dropped either way; it is not inserted into the freed slot.
    pub fn ack(&self, node: Node) {
        let _entered = self.span.enter();

        match self.table.update(node.clone()) {
            Ok(true) => {
                trace!(peer = ?node.id, address = ?node.address, "Admitted peer");
                self.config.events.peer_admitted(&node);
            }
            Ok(false) => {
                self.config.events.peer_activity(&node);
            }
            Err(Error::BucketFull) => {
                if let Some(last) = self.table.last(&node.id) {
                    self.probe(last);
                }

                self.config.events.peer_evicted(&node);
            }
            Err(error) => {
                trace!(peer = ?node.id, ?error, "Ignoring observed peer");
            }
        }
    }

    /// Response to an incoming request, if it is one.
    pub fn respond(&self, message: &Message) -> Option<Message> {
        match message {
            Message::Ping => Some(Message::Pong),
            Message::FindNodeRequest { target } => Some(Message::FindNodeResponse {
                nodes: self.table.find_closest(target, BUCKET_SIZE),
            }),
            Message::Pong | Message::FindNodeResponse { .. } => None,
        }
    }

    /// Acks `from` and responds to its `message`.
    ///
    /// [Self::ack] may block on a ping; transports that must answer promptly call
    /// [Self::respond] first and ack later.
    pub fn handle(&self, from: &Node, message: &Message) -> Option<Message> {
        self.ack(from.clone());
        self.respond(message)
    }

    // === Private Methods ===

    fn lookup(&self, target: Id, config: LookupConfig) -> Vec<Node> {
        IterativeLookup::with_span(self.network.as_ref(), &self.table, config, self.span.clone())
            .find_with_observer(target, |node| self.ack(node.clone()))
    }

    /// Pings the least recently seen node of a full bucket, evicting it if it is gone.
    fn probe(&self, last: Node) {
        if let Err(error) = self.ping(last.address) {
            debug!(peer = ?last.id, ?error, "Least recently seen peer failed to respond");

            if let Some(evicted) = self.table.delete(&last.id) {
                self.config.events.peer_evicted(&evicted);
            }
        }
    }
}
