//! Serialize and deserialize routing RPC messages.

use bytes::{BufMut, Bytes, BytesMut};

use crate::common::{Id, Node, ID_SIZE};
use crate::{DecodeError, Error, Result};

const TAG_PING: u8 = 0;
const TAG_PONG: u8 = 1;
const TAG_FIND_NODE_REQUEST: u8 = 2;
const TAG_FIND_NODE_RESPONSE: u8 = 3;

#[derive(Debug, PartialEq, Eq, Clone)]
/// Every message two nodes exchange, encoded as a one byte tag followed by the payload.
pub enum Message {
    Ping,
    Pong,
    /// FIND_NODE request for the nodes closest to `target`.
    FindNodeRequest { target: Id },
    /// Nodes the responder knows closest to the requested target.
    FindNodeResponse { nodes: Vec<Node> },
}

impl Message {
    /// Short name of this message kind, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Ping => "ping",
            Message::Pong => "pong",
            Message::FindNodeRequest { .. } => "find_node_request",
            Message::FindNodeResponse { .. } => "find_node_response",
        }
    }

    /// Returns true for messages that expect a reply.
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Ping | Message::FindNodeRequest { .. })
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(1 + self.payload_len());

        buf.put_u8(self.tag());
        self.encode_payload(&mut buf)?;

        Ok(buf.freeze())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Message> {
        let (tag, payload) = bytes.split_first().ok_or(DecodeError::UnexpectedEof {
            expected: 1,
            got: 0,
        })?;

        Message::decode_payload(*tag, payload)
    }

    /// Decodes the payload of a message of kind `tag`.
    pub fn decode_payload(tag: u8, payload: &[u8]) -> Result<Message> {
        match tag {
            TAG_PING => Ok(Message::Ping),
            TAG_PONG => Ok(Message::Pong),
            TAG_FIND_NODE_REQUEST => {
                if payload.len() != ID_SIZE {
                    return Err(DecodeError::UnexpectedEof {
                        expected: ID_SIZE,
                        got: payload.len(),
                    }
                    .into());
                }

                Ok(Message::FindNodeRequest {
                    target: Id::from_bytes(payload)?,
                })
            }
            TAG_FIND_NODE_RESPONSE => {
                let (count, mut rest) = payload.split_first().ok_or(DecodeError::UnexpectedEof {
                    expected: 1,
                    got: 0,
                })?;

                let mut nodes = Vec::with_capacity(*count as usize);

                for _ in 0..*count {
                    let (node, read) = Node::decode(rest)?;
                    nodes.push(node);
                    rest = &rest[read..];
                }

                Ok(Message::FindNodeResponse { nodes })
            }
            other => Err(DecodeError::UnknownMessageTag(other).into()),
        }
    }

    // === Private Methods ===

    fn tag(&self) -> u8 {
        match self {
            Message::Ping => TAG_PING,
            Message::Pong => TAG_PONG,
            Message::FindNodeRequest { .. } => TAG_FIND_NODE_REQUEST,
            Message::FindNodeResponse { .. } => TAG_FIND_NODE_RESPONSE,
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            Message::Ping | Message::Pong => 0,
            Message::FindNodeRequest { .. } => ID_SIZE,
            Message::FindNodeResponse { nodes } => {
                1 + nodes.iter().map(Node::encoded_len).sum::<usize>()
            }
        }
    }

    fn encode_payload(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            Message::Ping | Message::Pong => {}
            Message::FindNodeRequest { target } => buf.put_slice(target.as_bytes()),
            Message::FindNodeResponse { nodes } => {
                let count = u8::try_from(nodes.len()).map_err(|_| Error::TooManyNodes(nodes.len()))?;

                buf.put_u8(count);
                for node in nodes {
                    node.encode(buf);
                }
            }
        }

        Ok(())
    }
}
