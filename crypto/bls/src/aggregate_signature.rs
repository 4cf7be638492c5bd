use crate::{Error, PublicKey, Signature, SignatureBytes, DST};
use fixed_bytes::Hash256;
use std::fmt;

/// An aggregate of one or more BLS signatures.
///
/// `None` internally encodes the point at infinity, the identity of aggregation, so that an empty
/// aggregate (e.g. an empty sync aggregate) round-trips through its SSZ encoding.
#[derive(Clone, Default)]
pub struct AggregateSignature(Option<blst::min_pk::AggregateSignature>);

impl AggregateSignature {
    /// The aggregate of zero signatures: the point at infinity.
    pub fn infinity() -> Self {
        Self(None)
    }

    pub fn is_infinity(&self) -> bool {
        self.0.is_none()
    }

    /// Add `signature` into the aggregate.
    pub fn add_assign(&mut self, signature: &Signature) {
        match &mut self.0 {
            Some(agg) => {
                // The point was validated when the signature was decompressed.
                let _ = agg.add_signature(signature.point(), false);
            }
            None => {
                self.0 = Some(blst::min_pk::AggregateSignature::from_signature(
                    signature.point(),
                ))
            }
        }
    }

    /// Add another aggregate into the aggregate.
    pub fn add_assign_aggregate(&mut self, other: &AggregateSignature) {
        if let Some(other_agg) = &other.0 {
            let other_sig = other_agg.to_signature();
            match &mut self.0 {
                Some(agg) => {
                    let _ = agg.add_signature(&other_sig, false);
                }
                None => self.0 = Some(blst::min_pk::AggregateSignature::from_signature(&other_sig)),
            }
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let sig_bytes = SignatureBytes::deserialize(bytes)?;
        Self::try_from(&sig_bytes)
    }

    pub fn compress(&self) -> SignatureBytes {
        match &self.0 {
            Some(agg) => SignatureBytes::deserialize(&agg.to_signature().compress())
                .expect("compressed aggregate has the correct length"),
            None => SignatureBytes::empty(),
        }
    }

    /// Verify the aggregate against a single message signed by every one of `pubkeys`.
    pub fn fast_aggregate_verify(&self, msg: Hash256, pubkeys: &[&PublicKey]) -> bool {
        let Some(agg) = &self.0 else {
            // The point at infinity verifies nothing.
            return false;
        };
        if pubkeys.is_empty() {
            return false;
        }
        let points: Vec<&blst::min_pk::PublicKey> =
            pubkeys.iter().map(|pk| pk.point()).collect();
        agg.to_signature()
            .fast_aggregate_verify(true, msg.as_slice(), DST, &points)
            == blst::BLST_ERROR::BLST_SUCCESS
    }

    /// Verify the aggregate where each `pubkeys[i]` signed `msgs[i]`.
    pub fn aggregate_verify(&self, msgs: &[Hash256], pubkeys: &[&PublicKey]) -> bool {
        let Some(agg) = &self.0 else {
            return false;
        };
        if msgs.is_empty() || msgs.len() != pubkeys.len() {
            return false;
        }
        let msg_slices: Vec<&[u8]> = msgs.iter().map(|m| m.as_slice()).collect();
        let points: Vec<&blst::min_pk::PublicKey> =
            pubkeys.iter().map(|pk| pk.point()).collect();
        agg.to_signature()
            .aggregate_verify(true, &msg_slices, DST, &points, true)
            == blst::BLST_ERROR::BLST_SUCCESS
    }

    /// Flatten the aggregate to a plain signature point, if it is not the point at infinity.
    pub fn to_signature(&self) -> Option<Signature> {
        self.0.as_ref().map(|agg| Signature::from_point(agg.to_signature()))
    }
}

impl TryFrom<&SignatureBytes> for AggregateSignature {
    type Error = Error;

    fn try_from(bytes: &SignatureBytes) -> Result<Self, Error> {
        if bytes.is_infinity() {
            return Ok(Self::infinity());
        }
        let sig = bytes.decompress()?;
        let mut agg = Self::infinity();
        agg.add_assign(&sig);
        Ok(agg)
    }
}

impl From<&Signature> for AggregateSignature {
    fn from(sig: &Signature) -> Self {
        let mut agg = Self::infinity();
        agg.add_assign(sig);
        agg
    }
}

impl PartialEq for AggregateSignature {
    fn eq(&self, other: &Self) -> bool {
        self.compress() == other.compress()
    }
}

impl Eq for AggregateSignature {}

impl fmt::Debug for AggregateSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.compress())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Keypair;
    use fixed_bytes::FixedBytesExtended;

    #[test]
    fn aggregate_of_two_verifies() {
        let msg = Hash256::from_low_u64_be(7);
        let kp1 = Keypair::deterministic(1);
        let kp2 = Keypair::deterministic(2);

        let mut agg = AggregateSignature::infinity();
        agg.add_assign(&kp1.sk.sign(msg));
        agg.add_assign(&kp2.sk.sign(msg));

        assert!(agg.fast_aggregate_verify(msg, &[&kp1.pk, &kp2.pk]));
        // Missing participant.
        assert!(!agg.fast_aggregate_verify(msg, &[&kp1.pk]));
    }

    #[test]
    fn infinity_does_not_verify() {
        let msg = Hash256::from_low_u64_be(7);
        let kp = Keypair::deterministic(1);
        assert!(!AggregateSignature::infinity().fast_aggregate_verify(msg, &[&kp.pk]));
    }
}
