use crate::BYTES_PER_COMMITMENT;
use fixed_bytes::Hash256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

pub const VERSIONED_HASH_VERSION_KZG: u8 = 1;

/// A KZG polynomial commitment to a blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KzgCommitment(pub [u8; BYTES_PER_COMMITMENT]);

impl KzgCommitment {
    pub fn empty_for_testing() -> Self {
        Self([0; BYTES_PER_COMMITMENT])
    }

    /// `VERSIONED_HASH_VERSION_KZG || sha256(commitment)[1..]`.
    pub fn calculate_versioned_hash(&self) -> Hash256 {
        let mut versioned_hash: [u8; 32] = Sha256::digest(&self.0).into();
        versioned_hash[0] = VERSIONED_HASH_VERSION_KZG;
        Hash256::from(versioned_hash)
    }
}

impl From<KzgCommitment> for [u8; BYTES_PER_COMMITMENT] {
    fn from(c: KzgCommitment) -> Self {
        c.0
    }
}

impl fmt::Display for KzgCommitment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for KzgCommitment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Default for KzgCommitment {
    fn default() -> Self {
        Self::empty_for_testing()
    }
}

impl Encode for KzgCommitment {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        BYTES_PER_COMMITMENT
    }

    fn ssz_bytes_len(&self) -> usize {
        BYTES_PER_COMMITMENT
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0)
    }
}

impl Decode for KzgCommitment {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        BYTES_PER_COMMITMENT
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let expected = BYTES_PER_COMMITMENT;
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected,
            })
    }
}

impl TreeHash for KzgCommitment {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Vector
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_root(&self) -> tree_hash::Hash256 {
        tree_hash::merkle_root(&self.0, 0)
    }
}

impl Serialize for KzgCommitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KzgCommitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        bytes
            .as_slice()
            .try_into()
            .map(Self)
            .map_err(|_| serde::de::Error::custom("invalid commitment length"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_hash_replaces_first_byte() {
        let commitment = KzgCommitment([7; BYTES_PER_COMMITMENT]);
        let hash = commitment.calculate_versioned_hash();
        assert_eq!(hash[0], VERSIONED_HASH_VERSION_KZG);
        let sha: [u8; 32] = Sha256::digest(commitment.0).into();
        assert_eq!(&hash[1..], &sha[1..]);
    }
}
