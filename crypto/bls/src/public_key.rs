use crate::{Error, PUBLIC_KEY_BYTES_LEN};
use fixed_bytes::Hash256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use std::hash::{Hash, Hasher};
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

/// A decompressed, subgroup-checked BLS12-381 G1 public key.
#[derive(Clone)]
pub struct PublicKey(blst::min_pk::PublicKey);

impl PublicKey {
    pub(crate) fn from_point(point: blst::min_pk::PublicKey) -> Self {
        Self(point)
    }

    pub(crate) fn point(&self) -> &blst::min_pk::PublicKey {
        &self.0
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let point = blst::min_pk::PublicKey::key_validate(bytes)?;
        Ok(Self(point))
    }

    pub fn compress(&self) -> PublicKeyBytes {
        PublicKeyBytes(self.0.compress())
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.compress() == other.0.compress()
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.compress()))
    }
}

/// An aggregate of one or more public keys.
#[derive(Clone)]
pub struct AggregatePublicKey(blst::min_pk::PublicKey);

impl AggregatePublicKey {
    /// Aggregate `pubkeys`, erroring on an empty list.
    pub fn aggregate(pubkeys: &[PublicKey]) -> Result<Self, Error> {
        if pubkeys.is_empty() {
            return Err(Error::ZeroSizedInput);
        }
        let points: Vec<&blst::min_pk::PublicKey> = pubkeys.iter().map(|pk| pk.point()).collect();
        // Points were subgroup-checked on decompression.
        let agg = blst::min_pk::AggregatePublicKey::aggregate(&points, false)?;
        Ok(Self(agg.to_public_key()))
    }

    pub fn to_public_key(&self) -> PublicKey {
        PublicKey::from_point(self.0.clone())
    }
}

/// The 48-byte compressed encoding of a public key, as stored in SSZ containers.
///
/// Not guaranteed to describe a valid curve point; validity is checked on `decompress`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyBytes([u8; PUBLIC_KEY_BYTES_LEN]);

impl PublicKeyBytes {
    /// All-zero bytes. Note: *not* a valid public key.
    pub fn empty() -> Self {
        Self([0; PUBLIC_KEY_BYTES_LEN])
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != PUBLIC_KEY_BYTES_LEN {
            return Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: PUBLIC_KEY_BYTES_LEN,
            });
        }
        let mut array = [0; PUBLIC_KEY_BYTES_LEN];
        array.copy_from_slice(bytes);
        Ok(Self(array))
    }

    pub fn decompress(&self) -> Result<PublicKey, Error> {
        PublicKey::deserialize(&self.0)
    }

    pub fn as_serialized(&self) -> &[u8] {
        &self.0
    }

    /// Hash of the compressed representation, handy as a deterministic map key.
    pub fn tree_hash(&self) -> Hash256 {
        TreeHash::tree_hash_root(self)
    }
}

impl From<&PublicKey> for PublicKeyBytes {
    fn from(pk: &PublicKey) -> Self {
        pk.compress()
    }
}

impl Hash for PublicKeyBytes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Default for PublicKeyBytes {
    fn default() -> Self {
        Self::empty()
    }
}

impl Encode for PublicKeyBytes {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        PUBLIC_KEY_BYTES_LEN
    }

    fn ssz_bytes_len(&self) -> usize {
        PUBLIC_KEY_BYTES_LEN
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0)
    }
}

impl Decode for PublicKeyBytes {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        PUBLIC_KEY_BYTES_LEN
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::deserialize(bytes).map_err(|_| DecodeError::InvalidByteLength {
            len: bytes.len(),
            expected: PUBLIC_KEY_BYTES_LEN,
        })
    }
}

impl TreeHash for PublicKeyBytes {
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

impl Serialize for PublicKeyBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}", self))
    }
}

impl<'de> Deserialize<'de> for PublicKeyBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        Self::deserialize(&bytes).map_err(|e| serde::de::Error::custom(format!("{:?}", e)))
    }
}
