#![doc = include_str!("../README.md")]

// Public modules
mod common;
mod dht;
mod error;
pub mod rpc;

pub use crate::common::{
    messages, prefix_len, sort_by_distance, xor, Id, Message, Node, RoutingTable, BUCKET_SIZE,
    ID_BITS, ID_SIZE,
};
pub use dht::Dht;
pub use error::{DecodeError, Error, Result};

pub use ed25519_dalek::SigningKey;
