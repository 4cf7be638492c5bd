use crate::{Epoch, ExecutionBlockHash, Hash256, SignedRoot, Slot, Withdrawal};
use bls::SignatureBytes;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// A builder's bid to supply the execution payload for a slot (ePBS).
///
/// The winning bid is committed into the beacon block; the payload itself is revealed later in
/// the slot via the execution-payload envelope.
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct ExecutionPayloadBid {
    pub parent_block_hash: ExecutionBlockHash,
    pub parent_block_root: Hash256,
    pub block_hash: ExecutionBlockHash,
    pub prev_randao: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub builder_index: u64,
    pub slot: Slot,
    #[serde(with = "serde_utils::quoted_u64")]
    pub value: u64,
    pub blob_kzg_commitments_root: Hash256,
}

impl SignedRoot for ExecutionPayloadBid {}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct SignedExecutionPayloadBid {
    pub message: ExecutionPayloadBid,
    pub signature: SignatureBytes,
}

/// A builder payment pending the payload-timeliness check.
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct BuilderPendingPayment {
    #[serde(with = "serde_utils::quoted_u64")]
    pub weight: u64,
    pub withdrawal: BuilderPendingWithdrawal,
}

/// A withdrawal owed to a builder, deferred until its withdrawable epoch.
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct BuilderPendingWithdrawal {
    pub fee_recipient: crate::Address,
    #[serde(with = "serde_utils::quoted_u64")]
    pub amount: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub builder_index: u64,
    pub withdrawable_epoch: Epoch,
}

impl BuilderPendingWithdrawal {
    /// Convert into the `Withdrawal` that is pushed into the payload once withdrawable.
    pub fn into_withdrawal(&self, withdrawal_index: u64) -> Withdrawal {
        Withdrawal {
            index: withdrawal_index,
            validator_index: self.builder_index,
            address: self.fee_recipient,
            amount: self.amount,
        }
    }
}
