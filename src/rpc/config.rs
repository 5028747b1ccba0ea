use std::net::SocketAddr;
use std::time::Duration;

use ed25519_dalek::SigningKey;

use crate::common::BUCKET_SIZE;
use crate::{Error, Result};

use super::Events;

/// Default timeout for a single FIND_NODE request during a lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);
/// Default timeout for the liveness probe sent before evicting a node.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(3);
/// Default timeout for requests sent by a [crate::Dht] outside of lookups and probes.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
/// Iterative lookup configurations
pub struct LookupConfig {
    /// Maximum number of closest responding nodes a lookup returns.
    ///
    /// Defaults to [BUCKET_SIZE]
    pub max_num_results: usize,
    /// Number of disjoint candidate queues searched in parallel.
    ///
    /// Defaults to `3`
    pub num_parallel_lookups: usize,
    /// Number of concurrent requests per candidate queue.
    ///
    /// Defaults to `8`
    pub num_parallel_requests_per_lookup: usize,
    /// Timeout of each FIND_NODE request.
    ///
    /// The longer this duration is, the longer lookups take to drain when
    /// peers stop responding.
    ///
    /// Defaults to [DEFAULT_LOOKUP_TIMEOUT]
    pub lookup_timeout: Duration,
}

impl LookupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_parallel_lookups == 0 {
            return Err(Error::InvalidConfig("num_parallel_lookups must be at least 1"));
        }
        if self.num_parallel_requests_per_lookup == 0 {
            return Err(Error::InvalidConfig(
                "num_parallel_requests_per_lookup must be at least 1",
            ));
        }
        if self.lookup_timeout.is_zero() {
            return Err(Error::InvalidConfig("lookup_timeout must be non-zero"));
        }

        Ok(())
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_num_results: BUCKET_SIZE,
            num_parallel_lookups: 3,
            num_parallel_requests_per_lookup: 8,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
/// Protocol configurations
pub struct ProtocolConfig {
    /// Routing table observers.
    ///
    /// Defaults to no callbacks.
    pub events: Events,
    /// Timeout of the ping sent to the least recently seen node of a full bucket.
    ///
    /// Defaults to [DEFAULT_PING_TIMEOUT]
    pub ping_timeout: Duration,
    /// Configuration of lookups started by [crate::rpc::Protocol::find] and
    /// [crate::rpc::Protocol::discover].
    pub lookup: LookupConfig,
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ping_timeout.is_zero() {
            return Err(Error::InvalidConfig("ping_timeout must be non-zero"));
        }

        self.lookup.validate()
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            events: Events::default(),
            ping_timeout: DEFAULT_PING_TIMEOUT,
            lookup: LookupConfig::default(),
        }
    }
}

#[derive(Debug)]
/// Dht node configurations
pub struct Config {
    /// Local address to bind the UDP socket to.
    ///
    /// Defaults to `0.0.0.0:0`
    pub bind_address: SocketAddr,
    /// Address advertised to other nodes.
    ///
    /// Defaults to None, where the bound local address is advertised.
    pub public_address: Option<SocketAddr>,
    /// Key this node's [crate::Id] is derived from.
    ///
    /// Defaults to None, where a fresh key is generated.
    pub signing_key: Option<SigningKey>,
    /// Nodes pinged and used to seed the routing table on [crate::Dht::new].
    ///
    /// Defaults to an empty list.
    pub bootstrap: Vec<SocketAddr>,
    /// Timeout of requests sent directly through [crate::Dht::ping] and while bootstrapping.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
    /// Routing protocol configurations.
    pub protocol: ProtocolConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig("request_timeout must be non-zero"));
        }

        self.protocol.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 0)),
            public_address: None,
            signing_key: None,
            bootstrap: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            protocol: ProtocolConfig::default(),
        }
    }
}
