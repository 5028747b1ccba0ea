//! Iterative, parallel FIND_NODE lookups.

use std::collections::{HashSet, VecDeque};
use std::thread;

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, Span};

use crate::common::{sort_by_distance, Id, Message, Node, RoutingTable};
use crate::Result;

use super::{LookupConfig, Network};

/// One iterative lookup bound to a network and a routing table.
///
/// The routing table's current nodes seed [LookupConfig::num_parallel_lookups]
/// disjoint candidate queues. Each queue is drained by its own pool of
/// [LookupConfig::num_parallel_requests_per_lookup] requesters, sending FIND_NODE
/// to candidates and queueing the nodes they return, until no queue has candidates
/// left and nothing is in flight. Nodes that responded are the results.
#[derive(Debug)]
pub struct IterativeLookup<'a, N: Network> {
    network: &'a N,
    table: &'a RoutingTable,
    config: LookupConfig,
    span: Span,
}

/// State shared by every queue of a single lookup, behind one lock.
#[derive(Debug)]
struct Session {
    /// Every Id ever queued, plus the local node and the target.
    visited: HashSet<Id>,
    /// Candidates waiting to be requested, one queue per parallel lookup.
    queues: Vec<VecDeque<Node>>,
}

impl Session {
    fn new(local: Id, target: Id, seeds: Vec<Node>, num_queues: usize) -> Self {
        let mut visited = HashSet::from([local, target]);
        let mut queues = vec![VecDeque::new(); num_queues];

        for (i, node) in seeds.into_iter().enumerate() {
            visited.insert(node.id);
            queues[i % num_queues].push_back(node);
        }

        Session { visited, queues }
    }

    /// Queue every node in `discovered` not seen before in this session onto queue `index`.
    fn enqueue(&mut self, index: usize, discovered: Vec<Node>) {
        for node in discovered {
            if self.visited.insert(node.id) {
                self.queues[index].push_back(node);
            }
        }
    }
}

impl<'a, N: Network> IterativeLookup<'a, N> {
    pub fn new(network: &'a N, table: &'a RoutingTable, config: LookupConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            network,
            table,
            config,
            span: network.span(),
        })
    }

    /// Lookup recording under `span`, with an already validated `config`.
    pub(crate) fn with_span(
        network: &'a N,
        table: &'a RoutingTable,
        config: LookupConfig,
        span: Span,
    ) -> Self {
        Self {
            network,
            table,
            config,
            span,
        }
    }

    // === Getters ===

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    // === Public Methods ===

    /// Blocks until the lookup for `target` is done, and returns up to
    /// [LookupConfig::max_num_results] responding nodes, closest to `target` first.
    pub fn find(&self, target: Id) -> Vec<Node> {
        self.find_with_observer(target, |_| {})
    }

    /// Same as [Self::find], calling `observer` on the calling thread for every node
    /// that responded, as soon as it does.
    ///
    /// Requesters never wait on `observer`: responders are buffered until it catches up,
    /// and the call returns once the lookup is done and every responder was observed.
    pub fn find_with_observer(&self, target: Id, mut observer: impl FnMut(&Node)) -> Vec<Node> {
        let _entered = self.span.enter();

        let seeds = self.table.peers();
        trace!(?target, seeds = seeds.len(), "New lookup");

        let session = Mutex::new(Session::new(
            self.network.local().id,
            target,
            seeds,
            self.config.num_parallel_lookups,
        ));

        // Each node responds at most once per lookup, which bounds the stream.
        let (results_tx, results_rx) = flume::unbounded::<Node>();
        let mut closest = Vec::new();

        thread::scope(|scope| {
            for index in 0..self.config.num_parallel_lookups {
                let results_tx = results_tx.clone();
                let session = &session;

                scope.spawn(move || {
                    let _entered = self.span.enter();
                    self.process_queue(index, target, session, results_tx)
                });
            }
            // Only the queues hold senders now, the stream closes once they all drain.
            drop(results_tx);

            for node in results_rx.iter() {
                observer(&node);
                closest.push(node);
            }
        });

        let responders = closest.len();

        sort_by_distance(&target, &mut closest);
        closest.truncate(self.config.max_num_results);

        debug!(
            ?target,
            responders,
            visited = session.lock().visited.len(),
            "Done lookup"
        );

        closest
    }

    // === Private Methods ===

    /// Drains queue `index` with its own pool of requesters.
    fn process_queue(
        &self,
        index: usize,
        target: Id,
        session: &Mutex<Session>,
        results: Sender<Node>,
    ) {
        let workers = self.config.num_parallel_requests_per_lookup;

        let (queue_tx, queue_rx) = flume::bounded::<Node>(workers);
        let (replies_tx, replies_rx) = flume::bounded::<Vec<Node>>(workers);

        thread::scope(|scope| {
            for _ in 0..workers {
                let queue_rx = queue_rx.clone();
                let replies_tx = replies_tx.clone();
                let results = results.clone();

                scope.spawn(move || {
                    let _entered = self.span.enter();
                    self.process_requests(target, queue_rx, replies_tx, results)
                });
            }

            let mut pending = 0;

            loop {
                {
                    let mut session = session.lock();

                    while pending < workers {
                        let Some(node) = session.queues[index].pop_front() else {
                            break;
                        };

                        if queue_tx.send(node).is_err() {
                            break;
                        }
                        pending += 1;
                    }
                }

                if pending == 0 {
                    break;
                }

                let Ok(discovered) = replies_rx.recv() else {
                    break;
                };

                session.lock().enqueue(index, discovered);
                pending -= 1;
            }

            trace!(index, "Queue drained");

            // Closing the queue stops this queue's requesters.
            drop(queue_tx);
        });
    }

    /// Requester loop: one FIND_NODE at a time until the queue closes.
    ///
    /// Always replies exactly once per candidate, with an empty list on failure,
    /// so the queue's in-flight count stays exact.
    fn process_requests(
        &self,
        target: Id,
        queue: Receiver<Node>,
        replies: Sender<Vec<Node>>,
        results: Sender<Node>,
    ) {
        for node in queue.iter() {
            let discovered = match self.request(&node, target) {
                Some(discovered) => {
                    let _ = results.send(node);
                    discovered
                }
                None => Vec::new(),
            };

            if replies.send(discovered).is_err() {
                break;
            }
        }
    }

    fn request(&self, node: &Node, target: Id) -> Option<Vec<Node>> {
        let request = Message::FindNodeRequest { target };

        match self
            .network
            .request(node.address, request, self.config.lookup_timeout)
        {
            Ok(Message::FindNodeResponse { nodes }) => Some(nodes),
            Ok(other) => {
                debug!(node = ?node.id, response = other.kind(), "Unexpected find_node response");
                None
            }
            Err(error) => {
                trace!(node = ?node.id, ?error, "find_node request failed");
                None
            }
        }
    }
}
