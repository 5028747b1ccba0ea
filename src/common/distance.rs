//! XOR metric over raw identifiers.

use crate::common::{Id, Node};

/// Byte-wise exclusive-or of `a` and `b`.
///
/// Operands of different lengths are not an error: `a` is returned unchanged.
pub fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    if a.len() != b.len() {
        return a.to_vec();
    }

    a.iter().zip(b).map(|(a, b)| a ^ b).collect()
}

/// Number of leading zero bits in `bytes`.
pub fn prefix_len(bytes: &[u8]) -> usize {
    for (i, byte) in bytes.iter().enumerate() {
        if *byte != 0 {
            return i * 8 + byte.leading_zeros() as usize;
        }
    }

    bytes.len() * 8
}

/// Sorts `nodes` nearest first by XOR distance to `target`.
pub fn sort_by_distance(target: &Id, nodes: &mut [Node]) {
    nodes.sort_unstable_by_key(|node| node.id.xor(target));
}
