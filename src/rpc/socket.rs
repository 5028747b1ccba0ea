//! UDP socket layer correlating outgoing requests with their responses.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use flume::Sender;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{Id, Message, Node, ID_SIZE};
use crate::{DecodeError, Error, Result};

use super::Network;

const MTU: usize = 2048;
/// `transaction_id (2) | sender id (32)` prefixed to every message.
const HEADER_SIZE: usize = 2 + ID_SIZE;

/// The maximum duration [KrpcSocket::recv_from] blocks waiting for a datagram.
///
/// Bounds how long a receive loop takes to notice it should stop.
pub const MAX_THREAD_BLOCK_DURATION: Duration = Duration::from_millis(50);

/// A UdpSocket wrapper that formats and correlates requests and responses.
///
/// Requests block the calling thread until the matching response is routed to
/// them by whichever thread is running [KrpcSocket::recv_from].
#[derive(Debug)]
pub struct KrpcSocket {
    socket: UdpSocket,
    local: Node,
    local_addr: SocketAddr,
    next_tid: AtomicU16,
    inflight_requests: Mutex<HashMap<u16, InflightRequest>>,
}

/// A registered Sender for an inflight request waiting for a response,
/// removed once it is answered or its requester gives up.
#[derive(Debug)]
struct InflightRequest {
    to: SocketAddr,
    sender: Sender<(Id, Message)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A request received from another node, to be answered with [KrpcSocket::respond].
pub struct IncomingRequest {
    pub from: Node,
    pub transaction_id: u16,
    pub message: Message,
}

impl KrpcSocket {
    /// Binds to `bind_address`, advertising `public_address` (or the bound address) under `id`.
    pub fn bind(bind_address: SocketAddr, id: Id, public_address: Option<SocketAddr>) -> Result<Self> {
        let socket = UdpSocket::bind(bind_address)?;
        socket.set_read_timeout(Some(MAX_THREAD_BLOCK_DURATION))?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local: Node::new(id, public_address.unwrap_or(local_addr)),
            local_addr,
            next_tid: AtomicU16::new(0),
            inflight_requests: Mutex::new(HashMap::new()),
        })
    }

    // === Getters ===

    /// Returns the address the socket is bound to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of requests still waiting for a response.
    pub fn inflight(&self) -> usize {
        self.inflight_requests.lock().len()
    }

    // === Public Methods ===

    /// Sends `message` to `address` and waits up to `timeout` for the response.
    ///
    /// Returns the responding node along with its response.
    pub fn exchange(
        &self,
        address: SocketAddr,
        message: Message,
        timeout: Duration,
    ) -> Result<(Node, Message)> {
        let transaction_id = self.tid();
        let (sender, receiver) = flume::bounded(1);

        self.inflight_requests.lock().insert(
            transaction_id,
            InflightRequest {
                to: address,
                sender,
            },
        );

        trace!(?address, transaction_id, message = message.kind(), "Sending request");

        if let Err(error) = self.send(address, transaction_id, &message) {
            self.inflight_requests.lock().remove(&transaction_id);
            return Err(error);
        }

        match receiver.recv_timeout(timeout) {
            Ok((id, response)) => Ok((Node::new(id, address), response)),
            Err(_) => {
                self.inflight_requests.lock().remove(&transaction_id);
                Err(Error::Timeout(address))
            }
        }
    }

    /// Send a response to the given address.
    pub fn respond(&self, address: SocketAddr, transaction_id: u16, response: &Message) -> Result<()> {
        trace!(?address, transaction_id, message = response.kind(), "Sending response");

        self.send(address, transaction_id, response)
    }

    /// Receives a single datagram, waiting at most [MAX_THREAD_BLOCK_DURATION].
    ///
    /// Responses are handed to the inflight request they answer; requests are returned.
    pub fn recv_from(&self) -> Option<IncomingRequest> {
        let mut buf = [0_u8; MTU];

        let (amt, from) = match self.socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(error)
                if matches!(
                    error.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return None;
            }
            Err(error) => {
                trace!(?error, "recv_from failed unexpectedly");
                return None;
            }
        };

        let (transaction_id, sender, message) = match decode_datagram(&buf[..amt]) {
            Ok(decoded) => decoded,
            Err(error) => {
                trace!(?error, ?from, "Received invalid message");
                return None;
            }
        };

        if message.is_request() {
            trace!(?from, transaction_id, message = message.kind(), "Received request");

            return Some(IncomingRequest {
                from: Node::new(sender, from),
                transaction_id,
                message,
            });
        }

        let mut inflight_requests = self.inflight_requests.lock();

        match inflight_requests.get(&transaction_id) {
            Some(request) if compare_socket_addr(&request.to, &from) => {
                if let Some(request) = inflight_requests.remove(&transaction_id) {
                    let _ = request.sender.send((sender, message));
                }
            }
            Some(_) => trace!(?from, transaction_id, "Response from wrong address"),
            None => trace!(?from, transaction_id, "Unexpected response id"),
        }

        None
    }

    // === Private Methods ===

    /// Increments next_tid and returns the previous value.
    fn tid(&self) -> u16 {
        self.next_tid.fetch_add(1, Ordering::Relaxed)
    }

    fn send(&self, address: SocketAddr, transaction_id: u16, message: &Message) -> Result<()> {
        let payload = message.to_bytes()?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_u16(transaction_id);
        buf.put_slice(self.local.id.as_bytes());
        buf.put_slice(&payload);

        self.socket.send_to(&buf, address).map_err(|error| {
            debug!(?error, ?address, "Error sending message");
            Error::from(error)
        })?;

        Ok(())
    }
}

impl Network for KrpcSocket {
    fn local(&self) -> &Node {
        &self.local
    }

    fn request(&self, address: SocketAddr, message: Message, timeout: Duration) -> Result<Message> {
        self.exchange(address, message, timeout)
            .map(|(_, response)| response)
    }
}

/// Splits a datagram into `(transaction_id, sender, message)`.
fn decode_datagram(bytes: &[u8]) -> Result<(u16, Id, Message)> {
    if bytes.len() < HEADER_SIZE + 1 {
        return Err(DecodeError::UnexpectedEof {
            expected: HEADER_SIZE + 1,
            got: bytes.len(),
        }
        .into());
    }

    let transaction_id = u16::from_be_bytes([bytes[0], bytes[1]]);
    let sender = Id::from_bytes(&bytes[2..HEADER_SIZE])?;
    let message = Message::from_bytes(&bytes[HEADER_SIZE..])?;

    Ok((transaction_id, sender, message))
}

/// Responses to requests sent to an unspecified ip are accepted from any ip on that port.
fn compare_socket_addr(to: &SocketAddr, from: &SocketAddr) -> bool {
    if to.port() != from.port() {
        return false;
    }

    to.ip().is_unspecified() || to.ip() == from.ip()
}
