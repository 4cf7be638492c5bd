use crate::{AggregateSignature, PublicKey, RAND_BITS, DST};
use fixed_bytes::Hash256;
use std::borrow::Cow;

/// A signature, its message, and the key(s) that allegedly produced it, bundled for deferred
/// (batch) verification.
///
/// Multiple signing keys model an aggregate over one message (e.g. a sync aggregate); they are
/// aggregated into a single key before verification.
#[derive(Clone)]
pub struct SignatureSet<'a> {
    pub signature: Cow<'a, AggregateSignature>,
    pub signing_keys: Vec<Cow<'a, PublicKey>>,
    pub message: Hash256,
}

impl<'a> SignatureSet<'a> {
    /// A signature set for a single signer.
    pub fn single_pubkey(
        signature: Cow<'a, AggregateSignature>,
        signing_key: Cow<'a, PublicKey>,
        message: Hash256,
    ) -> Self {
        Self {
            signature,
            signing_keys: vec![signing_key],
            message,
        }
    }

    /// A signature set for an aggregate over a single message.
    pub fn multiple_pubkeys(
        signature: Cow<'a, AggregateSignature>,
        signing_keys: Vec<Cow<'a, PublicKey>>,
        message: Hash256,
    ) -> Self {
        Self {
            signature,
            signing_keys,
            message,
        }
    }

    /// Verify this set on its own, without batching.
    pub fn verify(&self) -> bool {
        let pubkeys: Vec<&PublicKey> = self.signing_keys.iter().map(|pk| pk.as_ref()).collect();
        self.signature.fast_aggregate_verify(self.message, &pubkeys)
    }

    fn aggregate_pubkey(&self) -> Option<blst::min_pk::PublicKey> {
        let points: Vec<&blst::min_pk::PublicKey> =
            self.signing_keys.iter().map(|pk| pk.point()).collect();
        if points.is_empty() {
            return None;
        }
        blst::min_pk::AggregatePublicKey::aggregate(&points, false)
            .ok()
            .map(|agg| agg.to_public_key())
    }
}

/// Verify all `sets` in a single batched pairing, mixing in a random coefficient per set so that
/// no combination of individually-invalid signatures can cancel out.
///
/// Returns `true` iff every set would verify on its own. Falls back over nothing: an empty
/// iterator verifies trivially.
pub fn verify_signature_sets<'a>(
    sets: impl ExactSizeIterator<Item = &'a SignatureSet<'a>>,
) -> bool {
    let sets = sets.collect::<Vec<_>>();
    if sets.is_empty() {
        return true;
    }

    // A single set does not benefit from the batching machinery.
    if sets.len() == 1 {
        return sets[0].verify();
    }

    let mut rng = rand::thread_rng();
    let mut rands: Vec<blst::blst_scalar> = Vec::with_capacity(sets.len());
    let mut msgs: Vec<&[u8]> = Vec::with_capacity(sets.len());
    let mut sigs: Vec<blst::min_pk::Signature> = Vec::with_capacity(sets.len());
    let mut pks: Vec<blst::min_pk::PublicKey> = Vec::with_capacity(sets.len());

    for set in &sets {
        let Some(sig) = set.signature.to_signature() else {
            // Point at infinity: can never be a valid signature over a message.
            return false;
        };
        let Some(pk) = set.aggregate_pubkey() else {
            return false;
        };

        // A random non-zero 64-bit scalar per set.
        let mut scalar_bytes = [0u8; 32];
        let rand_u64: u64 = loop {
            let candidate = rand::Rng::gen::<u64>(&mut rng);
            if candidate != 0 {
                break candidate;
            }
        };
        scalar_bytes[..8].copy_from_slice(&rand_u64.to_le_bytes());
        let mut scalar = blst::blst_scalar::default();
        // Safety: `scalar_bytes` is exactly 32 bytes, as required.
        unsafe {
            blst::blst_scalar_from_lendian(&mut scalar, scalar_bytes.as_ptr());
        }

        rands.push(scalar);
        msgs.push(set.message.as_slice());
        sigs.push(sig.point().clone());
        pks.push(pk);
    }

    let sig_refs: Vec<&blst::min_pk::Signature> = sigs.iter().collect();
    let pk_refs: Vec<&blst::min_pk::PublicKey> = pks.iter().collect();

    let msgs_owned: Vec<&[u8]> = msgs;

    blst::min_pk::Signature::verify_multiple_aggregate_signatures(
        &msgs_owned,
        DST,
        &pk_refs,
        false,
        &sig_refs,
        true,
        &rands,
        RAND_BITS,
    ) == blst::BLST_ERROR::BLST_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Keypair;
    use fixed_bytes::FixedBytesExtended;

    fn set_for<'a>(kp: &'a Keypair, msg_int: u64) -> SignatureSet<'a> {
        let msg = Hash256::from_low_u64_be(msg_int);
        let sig = kp.sk.sign(msg);
        SignatureSet::single_pubkey(
            Cow::Owned(AggregateSignature::from(&sig)),
            Cow::Borrowed(&kp.pk),
            msg,
        )
    }

    #[test]
    fn batch_of_valid_sets_verifies() {
        let kp1 = Keypair::deterministic(1);
        let kp2 = Keypair::deterministic(2);
        let kp3 = Keypair::deterministic(3);
        let sets = vec![set_for(&kp1, 1), set_for(&kp2, 2), set_for(&kp3, 3)];
        assert!(verify_signature_sets(sets.iter()));
    }

    #[test]
    fn batch_with_one_bad_set_fails() {
        let kp1 = Keypair::deterministic(1);
        let kp2 = Keypair::deterministic(2);
        let mut bad = set_for(&kp2, 2);
        bad.message = Hash256::from_low_u64_be(99);
        let sets = vec![set_for(&kp1, 1), bad];
        assert!(!verify_signature_sets(sets.iter()));
    }

    #[test]
    fn empty_batch_verifies() {
        assert!(verify_signature_sets(std::iter::empty::<&SignatureSet>().into_iter()));
    }
}
