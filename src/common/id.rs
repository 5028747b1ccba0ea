//! Kademlia node Id or a lookup target
use ed25519_dalek::VerifyingKey;
use rand::Rng;
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use crate::{DecodeError, Result};

/// The size of node IDs in bytes.
pub const ID_SIZE: usize = 32;
/// The size of node IDs in bits, which is also the number of buckets in a routing table.
pub const ID_BITS: usize = ID_SIZE * 8;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
/// Kademlia node Id or a lookup target
///
/// Ordering is byte-lexicographic, so comparing two [Id::xor] results orders
/// them by XOR distance.
pub struct Id(pub [u8; ID_SIZE]);

impl Id {
    pub fn random() -> Id {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        Id(random_bytes)
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(DecodeError::UnexpectedEof {
                expected: ID_SIZE,
                got: bytes.len(),
            }
            .into());
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(Id(tmp))
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// XOR distance between this Id and another, as an Id.
    pub fn xor(&self, other: &Id) -> Id {
        let mut result = [0_u8; ID_SIZE];

        for (i, (a, b)) in self.0.iter().zip(other.0.iter()).enumerate() {
            result[i] = a ^ b;
        }

        Id(result)
    }

    /// Number of leading zero bits of this Id.
    ///
    /// The all-zero Id returns [ID_BITS].
    pub fn prefix_len(&self) -> usize {
        super::prefix_len(&self.0)
    }

    /// Number of leading bits this Id shares with `other`.
    ///
    /// This is the index of the bucket `other` lands in, in a routing table owned by `self`.
    pub fn common_prefix_len(&self, other: &Id) -> usize {
        self.xor(other).prefix_len()
    }
}

impl From<&VerifyingKey> for Id {
    fn from(public_key: &VerifyingKey) -> Self {
        Id(public_key.to_bytes())
    }
}

impl From<[u8; ID_SIZE]> for Id {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        Id(bytes)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }

        Ok(())
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

impl FromStr for Id {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Id, DecodeError> {
        if s.len() != ID_SIZE * 2 || !s.is_ascii() {
            return Err(DecodeError::InvalidHex);
        }

        let mut bytes = [0_u8; ID_SIZE];

        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| DecodeError::InvalidHex)?;
        }

        Ok(Id(bytes))
    }
}
