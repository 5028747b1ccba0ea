//! Main Crate Error

use std::net::SocketAddr;

#[derive(thiserror::Error, Debug)]
/// Kademlia routing crate error enum.
pub enum Error {
    /// The bucket a peer maps to already holds [crate::BUCKET_SIZE] peers.
    #[error("bucket is full")]
    BucketFull,

    /// The local node never goes into its own routing table.
    #[error("refusing to insert the local node into its own routing table")]
    LocalNode,

    #[error(transparent)]
    /// Malformed payload, see [DecodeError].
    Decode(#[from] DecodeError),

    /// No response arrived before the request deadline.
    #[error("request to {0} timed out")]
    Timeout(SocketAddr),

    /// The transport could not reach the peer at all.
    #[error("peer at {0} is unreachable")]
    Unreachable(SocketAddr),

    /// The peer replied, but with the wrong kind of message.
    #[error("expected {expected} response, but got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },

    /// FindNodeResponse carries its count in a single byte.
    #[error("cannot encode {0} nodes in a single response, the limit is 255")]
    TooManyNodes(usize),

    /// Configuration rejected at construction.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors decoding identifiers, peer records and messages.
pub enum DecodeError {
    #[error("expected {expected} bytes, but got {got} bytes: unexpected end of input")]
    UnexpectedEof { expected: usize, got: usize },

    #[error("unknown message tag: {0}")]
    UnknownMessageTag(u8),

    #[error("unknown address family: {0}")]
    UnknownAddressFamily(u8),

    #[error("invalid hex encoded identifier")]
    InvalidHex,
}

/// Alias for results returned by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
