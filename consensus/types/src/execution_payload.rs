use crate::{
    Address, EthSpec, ExecutionBlockHash, Hash256, Uint256, VariableList, Withdrawal,
};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::FixedVector;
use superstruct::superstruct;
use tree_hash_derive::TreeHash;

pub type Transaction<N> = VariableList<u8, N>;
pub type Transactions<E> = VariableList<
    Transaction<<E as EthSpec>::MaxBytesPerTransaction>,
    <E as EthSpec>::MaxTransactionsPerPayload,
>;

pub type Withdrawals<E> = VariableList<Withdrawal, <E as EthSpec>::MaxWithdrawalsPerPayload>;

/// The execution-layer block embedded in a post-merge beacon block body.
///
/// One structural variant per fork; fields only ever accrete.
#[superstruct(
    variants(Bellatrix, Capella, Deneb, Electra, Fulu),
    variant_attributes(
        derive(
            Default,
            Debug,
            Clone,
            Serialize,
            Deserialize,
            Encode,
            Decode,
            TreeHash,
            Derivative,
        ),
        derivative(PartialEq, Hash(bound = "E: EthSpec")),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    ref_attributes(derive(Debug)),
    partial_getter_error(ty = "crate::BeaconStateError", expr = "crate::BeaconStateError::IncorrectStateVariant")
)]
#[derive(Debug, Clone, Serialize, Encode, TreeHash, Derivative)]
#[derivative(PartialEq, Hash(bound = "E: EthSpec"))]
#[serde(bound = "E: EthSpec", untagged)]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct ExecutionPayload<E: EthSpec> {
    #[superstruct(getter(copy))]
    pub parent_hash: ExecutionBlockHash,
    #[superstruct(getter(copy))]
    pub fee_recipient: Address,
    #[superstruct(getter(copy))]
    pub state_root: Hash256,
    #[superstruct(getter(copy))]
    pub receipts_root: Hash256,
    #[serde(with = "ssz_types::serde_utils::hex_fixed_vec")]
    pub logs_bloom: FixedVector<u8, E::BytesPerLogsBloom>,
    #[superstruct(getter(copy))]
    pub prev_randao: Hash256,
    #[serde(with = "serde_utils::quoted_u64")]
    #[superstruct(getter(copy))]
    pub block_number: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    #[superstruct(getter(copy))]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    #[superstruct(getter(copy))]
    pub gas_used: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    #[superstruct(getter(copy))]
    pub timestamp: u64,
    #[serde(with = "ssz_types::serde_utils::hex_var_list")]
    pub extra_data: VariableList<u8, E::MaxExtraDataBytes>,
    #[serde(with = "serde_utils::quoted_u256")]
    #[superstruct(getter(copy))]
    pub base_fee_per_gas: Uint256,
    #[superstruct(getter(copy))]
    pub block_hash: ExecutionBlockHash,
    #[serde(with = "ssz_types::serde_utils::list_of_hex_var_list")]
    pub transactions: Transactions<E>,
    #[superstruct(only(Capella, Deneb, Electra, Fulu))]
    pub withdrawals: Withdrawals<E>,
    #[superstruct(only(Deneb, Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub blob_gas_used: u64,
    #[superstruct(only(Deneb, Electra, Fulu), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub excess_blob_gas: u64,
}

impl<E: EthSpec> ExecutionPayload<E> {
    pub fn fork_name(&self) -> crate::ForkName {
        match self {
            ExecutionPayload::Bellatrix(_) => crate::ForkName::Bellatrix,
            ExecutionPayload::Capella(_) => crate::ForkName::Capella,
            ExecutionPayload::Deneb(_) => crate::ForkName::Deneb,
            ExecutionPayload::Electra(_) => crate::ForkName::Electra,
            ExecutionPayload::Fulu(_) => crate::ForkName::Fulu,
        }
    }

    pub fn is_default_with_empty_roots(&self) -> bool {
        // Note: a default payload has a zero block hash.
        self.block_hash() == ExecutionBlockHash::zero()
    }
}

impl<'a, E: EthSpec> ExecutionPayloadRef<'a, E> {
    pub fn fork_name(&self) -> crate::ForkName {
        match self {
            ExecutionPayloadRef::Bellatrix(_) => crate::ForkName::Bellatrix,
            ExecutionPayloadRef::Capella(_) => crate::ForkName::Capella,
            ExecutionPayloadRef::Deneb(_) => crate::ForkName::Deneb,
            ExecutionPayloadRef::Electra(_) => crate::ForkName::Electra,
            ExecutionPayloadRef::Fulu(_) => crate::ForkName::Fulu,
        }
    }

    pub fn clone_from_ref(&self) -> ExecutionPayload<E> {
        match self {
            ExecutionPayloadRef::Bellatrix(payload) => {
                ExecutionPayload::Bellatrix((*payload).clone())
            }
            ExecutionPayloadRef::Capella(payload) => ExecutionPayload::Capella((*payload).clone()),
            ExecutionPayloadRef::Deneb(payload) => ExecutionPayload::Deneb((*payload).clone()),
            ExecutionPayloadRef::Electra(payload) => ExecutionPayload::Electra((*payload).clone()),
            ExecutionPayloadRef::Fulu(payload) => ExecutionPayload::Fulu((*payload).clone()),
        }
    }
}
