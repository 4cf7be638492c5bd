//! A wrapper around the `blst` BLS12-381 implementation, exposing only the operations the
//! consensus layer needs: signing, verification, aggregation and batched verification of
//! heterogeneous signature sets.
//!
//! Points are validated on decompression and cached in their decompressed form. The compressed
//! `*Bytes` variants are used inside SSZ containers where decompression would be wasteful; they
//! are lazily decompressed at verification time.

mod aggregate_signature;
mod public_key;
mod secret_key;
mod signature;
mod signature_set;

pub use aggregate_signature::AggregateSignature;
pub use public_key::{AggregatePublicKey, PublicKey, PublicKeyBytes};
pub use secret_key::SecretKey;
pub use signature::{Signature, SignatureBytes};
pub use signature_set::{verify_signature_sets, SignatureSet};

use fixed_bytes::Hash256;

pub const SECRET_KEY_BYTES_LEN: usize = 32;
pub const PUBLIC_KEY_BYTES_LEN: usize = 48;
pub const SIGNATURE_BYTES_LEN: usize = 96;

/// The compressed bytes of a G2 point at infinity, used as the "empty" aggregate signature.
pub const INFINITY_SIGNATURE: [u8; SIGNATURE_BYTES_LEN] = [
    0xc0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0,
];

/// The domain separation tag for hash-to-G2, per the proof-of-possession scheme.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// The number of random bytes mixed into each signature during batch verification.
pub const RAND_BITS: usize = 64;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Error {
    /// The point or scalar bytes did not describe a valid group element.
    InvalidBytes(blst::BLST_ERROR),
    /// The provided byte slice had an incorrect length.
    InvalidByteLength { got: usize, expected: usize },
    /// An aggregate was requested over zero signatures.
    ZeroSizedInput,
}

impl From<blst::BLST_ERROR> for Error {
    fn from(e: blst::BLST_ERROR) -> Self {
        Error::InvalidBytes(e)
    }
}

/// Returns `true` if `signature` is valid for `msg` against the single `pubkey`.
pub fn verify(signature: &Signature, msg: Hash256, pubkey: &PublicKey) -> bool {
    signature.verify(msg, pubkey)
}

/// A convenience for places that need a keypair (tests, interop genesis).
#[derive(Clone)]
pub struct Keypair {
    pub sk: SecretKey,
    pub pk: PublicKey,
}

impl Keypair {
    pub fn random() -> Self {
        let sk = SecretKey::random();
        let pk = sk.public_key();
        Self { sk, pk }
    }

    /// Deterministic keypair derived from a low-entropy integer. Strictly for tests.
    pub fn deterministic(index: u64) -> Self {
        let mut ikm = [0x42u8; 32];
        ikm[24..].copy_from_slice(&index.to_be_bytes());
        let sk = SecretKey::from_ikm(&ikm).expect("fixed-length ikm is valid");
        let pk = sk.public_key();
        Self { sk, pk }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixed_bytes::FixedBytesExtended;

    #[test]
    fn sign_and_verify() {
        let keypair = Keypair::deterministic(1);
        let msg = Hash256::from_low_u64_be(42);
        let sig = keypair.sk.sign(msg);
        assert!(verify(&sig, msg, &keypair.pk));
        assert!(!verify(&sig, Hash256::from_low_u64_be(43), &keypair.pk));
    }

    #[test]
    fn deterministic_keypairs_are_stable_and_distinct() {
        assert_eq!(
            Keypair::deterministic(7).pk.compress(),
            Keypair::deterministic(7).pk.compress()
        );
        assert_ne!(
            Keypair::deterministic(7).pk.compress(),
            Keypair::deterministic(8).pk.compress()
        );
    }

    #[test]
    fn infinity_signature_round_trips_through_bytes() {
        let bytes = SignatureBytes::empty();
        assert_eq!(bytes.as_serialized(), &INFINITY_SIGNATURE[..]);
        let agg = AggregateSignature::infinity();
        assert_eq!(SignatureBytes::from(&agg), bytes);
    }
}
