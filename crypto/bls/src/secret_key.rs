use crate::{Error, PublicKey, Signature, DST, SECRET_KEY_BYTES_LEN};
use fixed_bytes::Hash256;

/// A BLS12-381 secret scalar.
///
/// Deliberately opaque: it cannot be printed, serialized or compared, only used to sign and to
/// derive the corresponding public key.
#[derive(Clone)]
pub struct SecretKey(blst::min_pk::SecretKey);

impl SecretKey {
    pub fn random() -> Self {
        let mut ikm = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut ikm);
        Self::from_ikm(&ikm).expect("32 bytes of ikm is always sufficient")
    }

    /// Derive a secret key from input key material via the RFC 5869 `KeyGen` procedure.
    pub fn from_ikm(ikm: &[u8]) -> Result<Self, Error> {
        blst::min_pk::SecretKey::key_gen(ikm, &[])
            .map(Self)
            .map_err(Into::into)
    }

    /// Interpret `bytes` as a big-endian scalar.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != SECRET_KEY_BYTES_LEN {
            return Err(Error::InvalidByteLength {
                got: bytes.len(),
                expected: SECRET_KEY_BYTES_LEN,
            });
        }
        blst::min_pk::SecretKey::from_bytes(bytes)
            .map(Self)
            .map_err(Into::into)
    }

    pub fn serialize(&self) -> [u8; SECRET_KEY_BYTES_LEN] {
        self.0.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_point(self.0.sk_to_pk())
    }

    pub fn sign(&self, msg: Hash256) -> Signature {
        Signature::from_point(self.0.sign(msg.as_slice(), DST, &[]))
    }
}
