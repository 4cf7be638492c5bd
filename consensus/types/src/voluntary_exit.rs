use crate::{ChainSpec, Domain, Epoch, ForkName, Hash256, SignedRoot};
use bls::SecretKey;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// An exit voluntarily submitted a validator who wishes to withdraw.
///
/// Spec v0.12.1
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct VoluntaryExit {
    /// Earliest epoch when voluntary exit can be processed.
    pub epoch: Epoch,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
}

impl SignedRoot for VoluntaryExit {}

impl VoluntaryExit {
    pub fn sign(
        self,
        secret_key: &SecretKey,
        genesis_validators_root: Hash256,
        spec: &ChainSpec,
    ) -> SignedVoluntaryExit {
        let fork_name = spec.fork_name_at_epoch(self.epoch);
        // In deneb and beyond, the voluntary exit domain is locked to the capella fork version.
        let fork_version = if fork_name.deneb_enabled() {
            spec.fork_version_for_name(ForkName::Capella)
        } else {
            spec.fork_version_for_name(fork_name)
        };
        let domain =
            spec.compute_domain(Domain::VoluntaryExit, fork_version, genesis_validators_root);

        let message = self.signing_root(domain);
        SignedVoluntaryExit {
            message: self,
            signature: (&secret_key.sign(message)).into(),
        }
    }
}

/// A `VoluntaryExit` with an accompanying signature.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct SignedVoluntaryExit {
    pub message: VoluntaryExit,
    pub signature: bls::SignatureBytes,
}
