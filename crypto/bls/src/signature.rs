use crate::{AggregateSignature, Error, PublicKey, DST, INFINITY_SIGNATURE, SIGNATURE_BYTES_LEN};
use fixed_bytes::Hash256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

/// A decompressed, subgroup-checked BLS12-381 G2 signature.
#[derive(Clone)]
pub struct Signature(blst::min_pk::Signature);

impl Signature {
    pub(crate) fn from_point(point: blst::min_pk::Signature) -> Self {
        Self(point)
    }

    pub(crate) fn point(&self) -> &blst::min_pk::Signature {
        &self.0
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let point = blst::min_pk::Signature::sig_validate(bytes, true)?;
        Ok(Self(point))
    }

    pub fn compress(&self) -> SignatureBytes {
        SignatureBytes(self.0.compress())
    }

    /// Verify `self` against a single public key.
    pub fn verify(&self, msg: Hash256, pubkey: &PublicKey) -> bool {
        self.0
            .verify(true, msg.as_slice(), DST, &[], pubkey.point(), true)
            == blst::BLST_ERROR::BLST_SUCCESS
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.0.compress() == other.0.compress()
    }
}

impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.compress()))
    }
}

/// The 96-byte compressed encoding of a signature, as stored in SSZ containers.
///
/// May be the point at infinity (`SignatureBytes::empty`), which is meaningful for empty
/// sync aggregates; `decompress` on it fails, callers special-case it explicitly.
#[derive(Clone, Copy)]
pub struct SignatureBytes([u8; SIGNATURE_BYTES_LEN]);

impl SignatureBytes {
    /// The compressed G2 point at infinity.
    pub fn empty() -> Self {
        Self(INFINITY_SIGNATURE)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != SIGNATURE_BYTES_LEN {
            return Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: SIGNATURE_BYTES_LEN,
            });
        }
        let mut array = [0; SIGNATURE_BYTES_LEN];
        array.copy_from_slice(bytes);
        Ok(Self(array))
    }

    pub fn decompress(&self) -> Result<Signature, Error> {
        Signature::deserialize(&self.0)
    }

    pub fn as_serialized(&self) -> &[u8] {
        &self.0
    }

    pub fn is_infinity(&self) -> bool {
        self.0 == INFINITY_SIGNATURE
    }
}

impl PartialEq for SignatureBytes {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

impl Eq for SignatureBytes {}

impl std::hash::Hash for SignatureBytes {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Default for SignatureBytes {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&Signature> for SignatureBytes {
    fn from(sig: &Signature) -> Self {
        sig.compress()
    }
}

impl From<&AggregateSignature> for SignatureBytes {
    fn from(agg: &AggregateSignature) -> Self {
        agg.compress()
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Encode for SignatureBytes {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        SIGNATURE_BYTES_LEN
    }

    fn ssz_bytes_len(&self) -> usize {
        SIGNATURE_BYTES_LEN
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0)
    }
}

impl Decode for SignatureBytes {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        SIGNATURE_BYTES_LEN
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::deserialize(bytes).map_err(|_| DecodeError::InvalidByteLength {
            len: bytes.len(),
            expected: SIGNATURE_BYTES_LEN,
        })
    }
}

impl TreeHash for SignatureBytes {
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

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}", self))
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        Self::deserialize(&bytes).map_err(|e| serde::de::Error::custom(format!("{:?}", e)))
    }
}
