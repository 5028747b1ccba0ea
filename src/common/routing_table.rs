//! Kademlia routing table

use std::fmt::{self, Debug, Formatter};
use std::net::SocketAddr;

use parking_lot::RwLock;

use crate::common::{sort_by_distance, Id, Node, ID_BITS};
use crate::{Error, Result};

/// K = the maximum number of nodes in a single k-bucket.
pub const BUCKET_SIZE: usize = 16;

/// Kademlia routing table, partitioning nodes into [ID_BITS] buckets by the
/// length of the prefix they share with the local node.
///
/// All methods take `&self`; the buckets sit behind a single [RwLock] so the
/// table can be shared by lookups and acks running on different threads.
pub struct RoutingTable {
    local: Node,
    buckets: RwLock<Vec<KBucket>>,
}

impl RoutingTable {
    /// Create a new [RoutingTable] for the given local node.
    pub fn new(local: Node) -> Self {
        RoutingTable {
            local,
            buckets: RwLock::new((0..ID_BITS).map(|_| KBucket::new()).collect()),
        }
    }

    // === Getters ===

    /// Returns the local [Node], where distance is measured from.
    pub fn local(&self) -> &Node {
        &self.local
    }

    /// Returns the [Id] of the local node.
    pub fn id(&self) -> &Id {
        &self.local.id
    }

    // === Public Methods ===

    /// Inserts `node`, or marks it as the most recently seen if it is already present.
    ///
    /// Returns `Ok(true)` if the node was inserted, `Ok(false)` if it was refreshed,
    /// and [Error::BucketFull] without touching the table if its bucket has no room.
    pub fn update(&self, node: Node) -> Result<bool> {
        if node.id == self.local.id {
            return Err(Error::LocalNode);
        }

        let index = self.bucket_index(&node.id);
        let mut buckets = self.buckets.write();

        buckets[index].update(node)
    }

    /// Returns the least recently seen node in the bucket that `id` maps to.
    ///
    /// `id` only selects the bucket, it does not need to be in the table.
    pub fn last(&self, id: &Id) -> Option<Node> {
        let index = self.bucket_index(id);

        self.buckets.read()[index].least_recently_seen().cloned()
    }

    /// Removes the node with this `id`, returning it if it was present.
    pub fn delete(&self, id: &Id) -> Option<Node> {
        let index = self.bucket_index(id);

        self.buckets.write()[index].remove(id)
    }

    /// Removes the first node found at `address`, returning it if any.
    pub fn delete_by_address(&self, address: SocketAddr) -> Option<Node> {
        let mut buckets = self.buckets.write();

        buckets.iter_mut().find_map(|bucket| {
            let id = bucket.iter().find(|n| n.address == address)?.id;
            bucket.remove(&id)
        })
    }

    /// Snapshot of every node in the table, bucket by bucket, least recently seen first.
    pub fn peers(&self) -> Vec<Node> {
        self.buckets
            .read()
            .iter()
            .flat_map(|bucket| bucket.iter().cloned())
            .collect()
    }

    /// Snapshot of the bucket that `id` maps to, least recently seen first.
    pub fn bucket(&self, id: &Id) -> Vec<Node> {
        let index = self.bucket_index(id);

        self.buckets.read()[index].iter().cloned().collect()
    }

    /// Up to `k` nodes closest to `target`, nearest first.
    pub fn find_closest(&self, target: &Id, k: usize) -> Vec<Node> {
        let mut nodes = self.peers();

        sort_by_distance(target, &mut nodes);
        nodes.truncate(k);

        nodes
    }

    /// Returns true if a node with this `id` is in the table.
    pub fn contains(&self, id: &Id) -> bool {
        let index = self.bucket_index(id);

        self.buckets.read()[index].contains(id)
    }

    /// Return the number of nodes in this routing table.
    pub fn len(&self) -> usize {
        self.buckets.read().iter().map(|bucket| bucket.len()).sum()
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.read().iter().all(|bucket| bucket.is_empty())
    }

    // === Private Methods ===

    /// The local Id shares all [ID_BITS] bits with itself, which is clamped into the last bucket.
    fn bucket_index(&self, id: &Id) -> usize {
        self.local.id.common_prefix_len(id).min(ID_BITS - 1)
    }
}

impl Debug for RoutingTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RoutingTable{{ id: {}, nodes: {} }}", self.local.id, self.len())
    }
}

/// Kbuckets are similar to LRU caches that checks and evicts unresponsive nodes,
/// without dropping any responsive nodes in the process.
#[derive(Debug, Clone, Default)]
pub(crate) struct KBucket {
    /// Nodes in the k-bucket, sorted by the least recently seen.
    nodes: Vec<Node>,
}

impl KBucket {
    pub fn new() -> Self {
        KBucket {
            nodes: Vec::with_capacity(BUCKET_SIZE),
        }
    }

    pub fn update(&mut self, incoming: Node) -> Result<bool> {
        if let Some(index) = self.nodes.iter().position(|n| n.id == incoming.id) {
            // Keep the most recent address for this Id.
            self.nodes.remove(index);
            self.nodes.push(incoming);

            Ok(false)
        } else if self.nodes.len() < BUCKET_SIZE {
            self.nodes.push(incoming);

            Ok(true)
        } else {
            Err(Error::BucketFull)
        }
    }

    pub fn least_recently_seen(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn remove(&mut self, id: &Id) -> Option<Node> {
        let index = self.nodes.iter().position(|n| &n.id == id)?;

        Some(self.nodes.remove(index))
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.nodes.iter().any(|n| &n.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;

    use super::*;
    use crate::common::ID_SIZE;

    fn local() -> Node {
        Node::new(Id([0; ID_SIZE]), SocketAddr::from(([127, 0, 0, 1], 1)))
    }

    /// A node landing in bucket `bucket` of a table owned by [local], distinguished by `n`.
    fn node_in_bucket(bucket: usize, n: u8) -> Node {
        let mut bytes = [0; ID_SIZE];
        bytes[bucket / 8] = 0b1000_0000 >> (bucket % 8);
        bytes[ID_SIZE - 1] |= n;

        Node::new(Id(bytes), SocketAddr::from(([10, 0, 0, n], 6881)))
    }

    #[test]
    fn table_is_empty() {
        let table = RoutingTable::new(local());
        assert!(table.is_empty());

        table.update(Node::random()).unwrap();
        assert!(!table.is_empty());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn nodes_land_in_their_prefix_bucket() {
        let table = RoutingTable::new(local());

        for bucket in [0, 1, 7, 8, 100, 200] {
            let node = node_in_bucket(bucket, 1);
            assert_eq!(table.id().common_prefix_len(&node.id), bucket);

            table.update(node.clone()).unwrap();
            assert_eq!(table.bucket(&node.id), vec![node]);
        }
    }

    #[test]
    fn should_not_add_self() {
        let table = RoutingTable::new(local());

        assert!(matches!(table.update(local()), Err(Error::LocalNode)));
        assert!(table.is_empty());
    }

    #[test]
    fn should_not_add_more_than_k() {
        let table = RoutingTable::new(local());

        for i in 0..BUCKET_SIZE as u8 {
            assert!(table.update(node_in_bucket(3, i + 1)).unwrap());
        }

        let before = table.peers();

        assert!(matches!(
            table.update(node_in_bucket(3, 100)),
            Err(Error::BucketFull)
        ));
        assert_eq!(table.peers(), before, "full bucket is left untouched");

        // Other buckets are unaffected.
        assert!(table.update(node_in_bucket(4, 1)).unwrap());
    }

    #[test]
    fn should_update_existing_node() {
        let table = RoutingTable::new(local());

        let first = node_in_bucket(0, 1);
        table.update(first.clone()).unwrap();
        table.update(node_in_bucket(0, 2)).unwrap();
        table.update(node_in_bucket(0, 3)).unwrap();

        assert_eq!(table.last(&first.id), Some(first.clone()));

        let moved = Node::new(first.id, SocketAddr::from(([10, 0, 0, 9], 1)));
        assert!(!table.update(moved.clone()).unwrap());

        let bucket = table.bucket(&first.id);
        assert_eq!(bucket.len(), 3, "refresh never grows the bucket");
        assert_eq!(bucket.last(), Some(&moved), "most recently seen, new address");
        assert_eq!(table.last(&first.id), Some(node_in_bucket(0, 2)));
    }

    #[test]
    fn last_selects_bucket_by_id() {
        let table = RoutingTable::new(local());
        let node = node_in_bucket(5, 1);
        table.update(node.clone()).unwrap();

        assert_eq!(table.last(&node_in_bucket(5, 200).id), Some(node));
        assert_eq!(table.last(&node_in_bucket(6, 1).id), None);
    }

    #[test]
    fn delete() {
        let table = RoutingTable::new(local());
        let node = node_in_bucket(9, 1);

        table.update(node.clone()).unwrap();
        assert!(table.contains(&node.id));

        assert_eq!(table.delete(&node.id), Some(node.clone()));
        assert!(!table.contains(&node.id));

        table.update(node_in_bucket(9, 2)).unwrap();
        let before = table.peers();
        assert_eq!(table.delete(&node.id), None);
        assert_eq!(table.peers(), before);
    }

    #[test]
    fn delete_by_address() {
        let table = RoutingTable::new(local());
        let node = node_in_bucket(2, 4);
        table.update(node.clone()).unwrap();

        assert_eq!(table.delete_by_address(node.address), Some(node));
        assert_eq!(table.delete_by_address(node_in_bucket(2, 5).address), None);
        assert!(table.is_empty());
    }

    #[test]
    fn find_closest() {
        let table = RoutingTable::new(Node::random());

        for _ in 0..200 {
            let _ = table.update(Node::random());
        }

        let target = Id::random();
        let closest = table.find_closest(&target, BUCKET_SIZE);

        assert_eq!(closest.len(), BUCKET_SIZE);

        let mut expected = table.peers();
        sort_by_distance(&target, &mut expected);
        assert_eq!(closest, expected[..BUCKET_SIZE]);
    }
}
