//! Types used throughout the consensus node, with SSZ encodings per fork.
//!
//! Every container that changes shape across hard forks is a `superstruct` enum with one
//! structural variant per fork; code that is generic over the fork matches on the enum or on
//! `ForkName` ordinal comparisons.

// Required for big type-level numbers
#![recursion_limit = "128"]

pub mod attestation;
pub mod attestation_data;
pub mod attester_slashing;
pub mod beacon_block;
pub mod beacon_block_body;
pub mod beacon_block_header;
pub mod beacon_committee;
pub mod beacon_state;
pub mod blob_sidecar;
pub mod bls_to_execution_change;
pub mod chain_spec;
pub mod checkpoint;
pub mod consts;
pub mod data_column_sidecar;
pub mod deposit;
pub mod deposit_data;
pub mod deposit_message;
pub mod eth1_data;
pub mod eth_spec;
pub mod execution_block_hash;
pub mod execution_payload;
pub mod execution_payload_bid;
pub mod execution_payload_header;
pub mod execution_requests;
pub mod fork;
pub mod fork_name;
pub mod historical_summary;
pub mod indexed_attestation;
pub mod participation_flags;
pub mod payload_attestation;
pub mod pending_attestation;
pub mod proposer_slashing;
pub mod relative_epoch;
pub mod signed_beacon_block_header;
pub mod signing_data;
pub mod slot_epoch;
pub mod sync_aggregate;
pub mod sync_committee;
pub mod sync_committee_contribution;
pub mod test_utils;
pub mod validator;
pub mod voluntary_exit;
pub mod withdrawal;

mod signed_beacon_block;

pub use crate::attestation::{
    Attestation, AttestationBase, AttestationElectra, AttestationRef, Error as AttestationError,
};
pub use crate::attestation_data::AttestationData;
pub use crate::attester_slashing::{
    AttesterSlashing, AttesterSlashingBase, AttesterSlashingElectra, AttesterSlashingRef,
};
pub use crate::beacon_block::{
    BeaconBlock, BeaconBlockAltair, BeaconBlockBase, BeaconBlockBellatrix, BeaconBlockCapella,
    BeaconBlockDeneb, BeaconBlockElectra, BeaconBlockFulu, BeaconBlockGloas, BeaconBlockRef,
};
pub use crate::beacon_block_body::{
    BeaconBlockBody, BeaconBlockBodyAltair, BeaconBlockBodyBase, BeaconBlockBodyBellatrix,
    BeaconBlockBodyCapella, BeaconBlockBodyDeneb, BeaconBlockBodyElectra, BeaconBlockBodyFulu,
    BeaconBlockBodyGloas, BeaconBlockBodyRef,
};
pub use crate::beacon_block_header::BeaconBlockHeader;
pub use crate::beacon_committee::{
    AttestationShufflingId, BeaconCommittee, OwnedBeaconCommittee, SyncDuty,
};
pub use crate::beacon_state::{
    compute_committee_index_in_epoch, compute_committee_range_in_epoch,
    compute_epoch_total_balances_seed, epoch_committee_count, get_active_validator_indices,
    AttestationDuty, BeaconState, BeaconStateAltair, BeaconStateBase, BeaconStateBellatrix,
    BeaconStateCapella, BeaconStateDeneb, BeaconStateElectra, BeaconStateFulu, BeaconStateGloas,
    CommitteeCache, EffectiveBalanceIncrement, EpochCache, EpochCacheKey, Error as BeaconStateError,
    ExitCache, ProgressiveBalancesCache, PubkeyCache, CACHED_EPOCHS,
};
pub use crate::blob_sidecar::{
    Blob, BlobIdentifier, BlobSidecar, BlobSidecarList, FixedBlobSidecarList, KzgCommitments,
    KzgProofs,
};
pub use crate::bls_to_execution_change::{BlsToExecutionChange, SignedBlsToExecutionChange};
pub use crate::chain_spec::{compute_fork_data_root, BlobParameters, ChainSpec, Domain};
pub use crate::checkpoint::Checkpoint;
pub use crate::data_column_sidecar::{
    Cell, ColumnIndex, DataColumn, DataColumnIdentifier, DataColumnSidecar, DataColumnSidecarList,
    KzgCommitmentsInclusionProofDepth,
};
pub use crate::deposit::{Deposit, DEPOSIT_TREE_DEPTH};
pub use crate::deposit_data::DepositData;
pub use crate::deposit_message::DepositMessage;
pub use crate::eth1_data::Eth1Data;
pub use crate::eth_spec::{EthSpec, EthSpecId, MainnetEthSpec, MinimalEthSpec};
pub use crate::execution_block_hash::ExecutionBlockHash;
pub use crate::execution_payload::{
    ExecutionPayload, ExecutionPayloadBellatrix, ExecutionPayloadCapella, ExecutionPayloadDeneb,
    ExecutionPayloadElectra, ExecutionPayloadFulu, ExecutionPayloadRef, Transaction, Transactions,
    Withdrawals,
};
pub use crate::execution_payload_bid::{
    BuilderPendingPayment, BuilderPendingWithdrawal, ExecutionPayloadBid,
    SignedExecutionPayloadBid,
};
pub use crate::execution_payload_header::{
    ExecutionPayloadHeader, ExecutionPayloadHeaderBellatrix, ExecutionPayloadHeaderCapella,
    ExecutionPayloadHeaderDeneb, ExecutionPayloadHeaderElectra, ExecutionPayloadHeaderFulu,
    ExecutionPayloadHeaderRef,
};
pub use crate::execution_requests::{
    ConsolidationRequest, DepositRequest, ExecutionRequests, WithdrawalRequest,
};
pub use crate::fork::Fork;
pub use crate::fork_name::{ForkName, InconsistentFork};
pub use crate::historical_summary::HistoricalSummary;
pub use crate::indexed_attestation::{
    IndexedAttestation, IndexedAttestationBase, IndexedAttestationElectra, IndexedAttestationRef,
};
pub use crate::participation_flags::ParticipationFlags;
pub use crate::payload_attestation::{
    PayloadAttestation, PayloadAttestationData, PayloadAttestationMessage,
};
pub use crate::pending_attestation::PendingAttestation;
pub use crate::proposer_slashing::ProposerSlashing;
pub use crate::relative_epoch::{Error as RelativeEpochError, RelativeEpoch};
pub use crate::signed_beacon_block::{
    SignedBeaconBlock, SignedBeaconBlockAltair, SignedBeaconBlockBase,
    SignedBeaconBlockBellatrix, SignedBeaconBlockCapella, SignedBeaconBlockDeneb,
    SignedBeaconBlockElectra, SignedBeaconBlockFulu, SignedBeaconBlockGloas,
    SignedBeaconBlockRef,
};
pub use crate::signed_beacon_block_header::SignedBeaconBlockHeader;
pub use crate::signing_data::{SignedRoot, SigningData};
pub use crate::slot_epoch::{Epoch, Slot};
pub use crate::sync_aggregate::SyncAggregate;
pub use crate::sync_committee::SyncCommittee;
pub use crate::sync_committee_contribution::{SyncCommitteeContribution, SyncCommitteeMessage};
pub use crate::validator::Validator;
pub use crate::voluntary_exit::{SignedVoluntaryExit, VoluntaryExit};
pub use crate::withdrawal::{
    PendingConsolidation, PendingDeposit, PendingPartialWithdrawal, Withdrawal,
};

pub type CommitteeIndex = u64;
pub type Hash256 = fixed_bytes::Hash256;
pub type Uint256 = fixed_bytes::Uint256;
pub type Address = fixed_bytes::Address;
pub type ForkVersion = [u8; 4];
pub type Graffiti = Hash256;
/// The index of a sync-committee gossip subnet.
pub type SyncSubnetId = u64;

pub use bls::{
    AggregatePublicKey, AggregateSignature, Keypair, PublicKey, PublicKeyBytes, SecretKey,
    Signature, SignatureBytes,
};
pub use fixed_bytes::FixedBytesExtended;
pub use kzg::{KzgCommitment, KzgProof, VERSIONED_HASH_VERSION_KZG};
pub use ssz_types::{typenum, typenum::Unsigned, BitList, BitVector, FixedVector, VariableList};
