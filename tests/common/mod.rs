#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Formatter};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use kademlia_routing::rpc::{Network, Protocol, ProtocolConfig};
use kademlia_routing::{Error, Id, Message, Node, Result};

/// A request as seen by the simulated network: `(from, to, message kind, sent at)`.
pub type Request = (Id, SocketAddr, &'static str, Instant);

/// In-memory swarm of protocols calling each other's [Protocol::handle] directly.
#[derive(Default)]
pub struct Registry {
    nodes: RwLock<HashMap<SocketAddr, Arc<Protocol<SimNetwork>>>>,
    unreachable: RwLock<HashSet<SocketAddr>>,
    silent: RwLock<HashSet<SocketAddr>>,
    requests: Mutex<Vec<Request>>,
    next_port: AtomicU16,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a protocol for `id` at a fresh address and registers it.
    pub fn spawn(self: &Arc<Self>, id: Id, config: ProtocolConfig) -> Arc<Protocol<SimNetwork>> {
        let node = Node::new(id, self.address());
        let network = Arc::new(SimNetwork {
            local: node.clone(),
            registry: self.clone(),
        });

        let protocol = Arc::new(Protocol::new(network, config).unwrap());
        self.nodes.write().insert(node.address, protocol.clone());

        protocol
    }

    /// A node at a fresh address that nothing in the registry answers for.
    pub fn ghost(&self, id: Id) -> Node {
        Node::new(id, self.address())
    }

    pub fn set_unreachable(&self, address: SocketAddr, unreachable: bool) {
        let mut set = self.unreachable.write();
        if unreachable {
            set.insert(address);
        } else {
            set.remove(&address);
        }
    }

    /// Requests to `address` are never answered, the requester waits out its full timeout.
    pub fn set_silent(&self, address: SocketAddr) {
        self.silent.write().insert(address);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, address: SocketAddr) -> Vec<&'static str> {
        self.requests
            .lock()
            .iter()
            .filter(|(_, to, _, _)| *to == address)
            .map(|(_, _, kind, _)| *kind)
            .collect()
    }

    /// When the last request of this kind was sent.
    pub fn last_sent(&self, kind: &str) -> Option<Instant> {
        self.requests
            .lock()
            .iter()
            .filter(|(_, _, k, _)| *k == kind)
            .map(|(_, _, _, at)| *at)
            .max()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    fn address(&self) -> SocketAddr {
        let port = self.next_port.fetch_add(1, Ordering::Relaxed) + 1;
        SocketAddr::from(([10, 0, 0, 1], port))
    }

    fn get(&self, address: &SocketAddr) -> Option<Arc<Protocol<SimNetwork>>> {
        self.nodes.read().get(address).cloned()
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("nodes", &self.nodes.read().len())
            .finish()
    }
}

#[derive(Debug)]
pub struct SimNetwork {
    local: Node,
    registry: Arc<Registry>,
}

impl Network for SimNetwork {
    fn local(&self) -> &Node {
        &self.local
    }

    fn request(&self, address: SocketAddr, message: Message, timeout: Duration) -> Result<Message> {
        self.registry
            .requests
            .lock()
            .push((self.local.id, address, message.kind(), Instant::now()));

        if self.registry.unreachable.read().contains(&address) {
            return Err(Error::Timeout(address));
        }

        if self.registry.silent.read().contains(&address) {
            thread::sleep(timeout);
            return Err(Error::Timeout(address));
        }

        let remote = self
            .registry
            .get(&address)
            .ok_or(Error::Unreachable(address))?;

        remote
            .handle(&self.local, &message)
            .ok_or(Error::Timeout(address))
    }
}

/// An Id whose first byte is `first`, the rest zeros except for the last byte `last`.
pub fn id(first: u8, last: u8) -> Id {
    let mut bytes = [0; 32];
    bytes[0] = first;
    bytes[31] = last;
    Id(bytes)
}

/// Records every node passed to an event callback.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Id>>>);

impl Recorder {
    pub fn callback(&self) -> impl Fn(&Node) + Send + Sync + 'static {
        let inner = self.0.clone();
        move |node: &Node| inner.lock().push(node.id)
    }

    pub fn ids(&self) -> Vec<Id> {
        self.0.lock().clone()
    }
}
