//! Struct and implementation of the Node entry in the Kademlia routing table
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::BufMut;

use crate::common::{Id, ID_SIZE};
use crate::{DecodeError, Result};

const FAMILY_V4: u8 = 4;
const FAMILY_V6: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Node entry in Kademlia routing table
///
/// Tables key nodes by [Id] alone, the address is whatever it was last seen at.
pub struct Node {
    pub id: Id,
    pub address: SocketAddr,
}

impl Node {
    /// Creates a new Node from an id and socket address.
    pub fn new(id: Id, address: SocketAddr) -> Node {
        Node { id, address }
    }

    /// Creates a node with random Id for testing purposes.
    pub fn random() -> Node {
        Node {
            id: Id::random(),
            address: SocketAddr::from(([0, 0, 0, 0], 0)),
        }
    }

    // === Getters ===

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    // === Public Methods ===

    /// Returns true if both nodes have the same [Id], regardless of addresses.
    pub fn same_peer(&self, other: &Node) -> bool {
        self.id == other.id
    }

    /// Number of bytes [Node::encode] writes for this node.
    pub fn encoded_len(&self) -> usize {
        match self.address.ip() {
            IpAddr::V4(_) => ID_SIZE + 1 + 4 + 2,
            IpAddr::V6(_) => ID_SIZE + 1 + 16 + 2,
        }
    }

    /// Appends `id | family | ip | port` to `buf`.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.id.as_bytes());

        match self.address.ip() {
            IpAddr::V4(ip) => {
                buf.put_u8(FAMILY_V4);
                buf.put_slice(&ip.octets());
            }
            IpAddr::V6(ip) => {
                buf.put_u8(FAMILY_V6);
                buf.put_slice(&ip.octets());
            }
        }

        buf.put_u16(self.address.port());
    }

    /// Decodes a node from the start of `bytes`, returning it and the number of bytes read.
    pub fn decode(bytes: &[u8]) -> Result<(Node, usize)> {
        let id = Id::from_bytes(take(bytes, 0, ID_SIZE)?)?;

        let family = take(bytes, ID_SIZE, 1)?[0];
        let ip_len = match family {
            FAMILY_V4 => 4,
            FAMILY_V6 => 16,
            other => return Err(DecodeError::UnknownAddressFamily(other).into()),
        };

        let ip_bytes = take(bytes, ID_SIZE + 1, ip_len)?;
        let ip = if ip_len == 4 {
            let mut octets = [0_u8; 4];
            octets.copy_from_slice(ip_bytes);
            IpAddr::V4(Ipv4Addr::from(octets))
        } else {
            let mut octets = [0_u8; 16];
            octets.copy_from_slice(ip_bytes);
            IpAddr::V6(Ipv6Addr::from(octets))
        };

        let port_bytes = take(bytes, ID_SIZE + 1 + ip_len, 2)?;
        let port = u16::from_be_bytes([port_bytes[0], port_bytes[1]]);

        Ok((
            Node::new(id, SocketAddr::new(ip, port)),
            ID_SIZE + 1 + ip_len + 2,
        ))
    }
}

/// `bytes[offset..offset + len]` or an [DecodeError::UnexpectedEof].
fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], DecodeError> {
    bytes
        .get(offset..offset + len)
        .ok_or(DecodeError::UnexpectedEof {
            expected: offset + len,
            got: bytes.len(),
        })
}
