//! Callbacks fired by [crate::rpc::Protocol::ack].

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::common::Node;

/// Callback receiving the node an event is about.
pub type PeerCallback = Arc<dyn Fn(&Node) + Send + Sync>;

#[derive(Clone, Default)]
/// Observers of routing table admission, activity and eviction.
///
/// Callbacks run synchronously on the thread calling [crate::rpc::Protocol::ack].
pub struct Events {
    /// Called when a peer is admitted into the routing table.
    pub on_peer_admitted: Option<PeerCallback>,
    /// Called when a peer already in the routing table is seen again and moved to
    /// the most recently seen end of its bucket.
    pub on_peer_activity: Option<PeerCallback>,
    /// Called when a peer is evicted from, or refused by, the routing table.
    pub on_peer_evicted: Option<PeerCallback>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    // === Options ===

    pub fn with_peer_admitted(mut self, callback: impl Fn(&Node) + Send + Sync + 'static) -> Self {
        self.on_peer_admitted = Some(Arc::new(callback));
        self
    }

    pub fn with_peer_activity(mut self, callback: impl Fn(&Node) + Send + Sync + 'static) -> Self {
        self.on_peer_activity = Some(Arc::new(callback));
        self
    }

    pub fn with_peer_evicted(mut self, callback: impl Fn(&Node) + Send + Sync + 'static) -> Self {
        self.on_peer_evicted = Some(Arc::new(callback));
        self
    }

    // === Private Methods ===

    pub(crate) fn peer_admitted(&self, node: &Node) {
        if let Some(callback) = &self.on_peer_admitted {
            callback(node)
        }
    }

    pub(crate) fn peer_activity(&self, node: &Node) {
        if let Some(callback) = &self.on_peer_activity {
            callback(node)
        }
    }

    pub(crate) fn peer_evicted(&self, node: &Node) {
        if let Some(callback) = &self.on_peer_evicted {
            callback(node)
        }
    }
}

impl Debug for Events {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("on_peer_admitted", &self.on_peer_admitted.is_some())
            .field("on_peer_activity", &self.on_peer_activity.is_some())
            .field("on_peer_evicted", &self.on_peer_evicted.is_some())
            .finish()
    }
}
