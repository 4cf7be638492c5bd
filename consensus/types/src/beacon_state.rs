use crate::historical_summary::HistoricalSummary;
use crate::*;
use bls::AggregatePublicKey;
use derivative::Derivative;
use ethereum_hashing::hash;
use int_to_bytes::{int_to_bytes4, int_to_bytes8};
use safe_arith::{ArithError, SafeArith};
use serde::{Deserialize, Serialize};
use ssz::{ssz_encode, Decode, Encode};
use ssz_derive::{Decode, Encode};
use std::sync::Arc;
use superstruct::superstruct;
use swap_or_not_shuffle::compute_shuffled_index;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

pub use self::committee_cache::{
    compute_committee_index_in_epoch, compute_committee_range_in_epoch, epoch_committee_count,
    get_active_validator_indices, AttestationDuty, CommitteeCache, NonZeroUsizeOption,
};
pub use self::epoch_cache::{EffectiveBalanceIncrement, EpochCache, EpochCacheKey};
pub use self::exit_cache::ExitCache;
pub use self::progressive_balances_cache::{
    compute_epoch_total_balances_seed, ProgressiveBalancesCache,
};
pub use self::pubkey_cache::PubkeyCache;

mod committee_cache;
mod epoch_cache;
mod exit_cache;
mod progressive_balances_cache;
mod pubkey_cache;

pub const CACHED_EPOCHS: usize = 3;
const MAX_RANDOM_BYTE: u64 = u8::MAX as u64;
const MAX_RANDOM_VALUE: u64 = u16::MAX as u64;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// A state for a different hard-fork was required -- a severe logic error.
    IncorrectStateVariant,
    EpochOutOfBounds,
    SlotOutOfBounds,
    UnknownValidator(usize),
    UnableToDetermineProducer,
    InvalidBitfield,
    ValidatorIsWithdrawable,
    ValidatorIsInactive {
        val_index: usize,
    },
    UnableToShuffle,
    ShuffleIndexOutOfBounds(usize),
    IsAggregatorOutOfBounds,
    BlockRootsOutOfBounds(usize),
    StateRootsOutOfBounds(usize),
    SlashingsOutOfBounds(usize),
    BalancesOutOfBounds(usize),
    RandaoMixesOutOfBounds(usize),
    CommitteeCachesOutOfBounds(usize),
    ParticipationOutOfBounds(usize),
    InactivityScoresOutOfBounds(usize),
    TooManyValidators,
    InsufficientValidators,
    InsufficientRandaoMixes,
    NoCommittee {
        slot: Slot,
        index: u64,
    },
    ZeroSlotsPerEpoch,
    PubkeyCacheInconsistent,
    PubkeyCacheIncomplete {
        cache_len: usize,
        registry_len: usize,
    },
    CommitteeCacheUninitialized(Option<RelativeEpoch>),
    SyncCommitteeCacheUninitialized,
    ExitCacheUninitialized,
    ExitCacheInvalidEpoch {
        max_exit_epoch: Epoch,
        request_epoch: Epoch,
    },
    EpochCacheUninitialized,
    EpochCacheInvalidEpoch {
        cache_epoch: Epoch,
        state_epoch: Epoch,
    },
    EpochCacheInvalidDecisionBlock,
    ProgressiveBalancesCacheNotInitialized,
    ProgressiveBalancesCacheInconsistent,
    TotalActiveBalanceCacheUninitialized,
    TotalActiveBalanceCacheInconsistent {
        initialized_epoch: Epoch,
        current_epoch: Epoch,
    },
    RelativeEpochError(RelativeEpochError),
    ArithError(ArithError),
    MissingBeaconBlock(Hash256),
    MissingBeaconState(Hash256),
    SszTypesError(ssz_types::Error),
    BlsError(bls::Error),
    TreeHashError(tree_hash::Error),
    InvalidValidatorPubkey(String),
    ValidatorRegistryShrunk,
    NonExecutionAddressWithdrawalCredential,
    NoCommitteeFound(u64),
    InvalidCommitteeIndex(u64),
    InconsistentFork(InconsistentFork),
    PartialWithdrawalCountInvalid(usize),
    MaxCommitteesPerSlotOutOfBounds,
    MerkleTreeError,
}

impl From<RelativeEpochError> for Error {
    fn from(e: RelativeEpochError) -> Error {
        Error::RelativeEpochError(e)
    }
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Error {
        Error::SszTypesError(e)
    }
}

impl From<bls::Error> for Error {
    fn from(e: bls::Error) -> Error {
        Error::BlsError(e)
    }
}

impl From<tree_hash::Error> for Error {
    fn from(e: tree_hash::Error) -> Error {
        Error::TreeHashError(e)
    }
}

impl From<ArithError> for Error {
    fn from(e: ArithError) -> Error {
        Error::ArithError(e)
    }
}

/// The state of the `BeaconChain` at some slot.
#[superstruct(
    variants(Base, Altair, Bellatrix, Capella, Deneb, Electra, Fulu, Gloas),
    variant_attributes(
        derive(
            Derivative,
            Debug,
            Clone,
            Serialize,
            Deserialize,
            Encode,
            Decode,
            TreeHash,
        ),
        derivative(PartialEq),
        serde(bound = "E: EthSpec", deny_unknown_fields),
    ),
    partial_getter_error(ty = "Error", expr = "Error::IncorrectStateVariant")
)]
#[derive(Debug, Clone, Serialize, Encode, TreeHash, Derivative)]
#[derivative(PartialEq)]
#[serde(bound = "E: EthSpec", untagged)]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct BeaconState<E>
where
    E: EthSpec,
{
    // Versioning
    #[superstruct(getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub genesis_time: u64,
    #[superstruct(getter(copy))]
    pub genesis_validators_root: Hash256,
    #[superstruct(getter(copy))]
    pub slot: Slot,
    #[superstruct(getter(copy))]
    pub fork: Fork,

    // History
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: FixedVector<Hash256, E::SlotsPerHistoricalRoot>,
    pub state_roots: FixedVector<Hash256, E::SlotsPerHistoricalRoot>,
    // Frozen in Capella, replaced by `historical_summaries`
    pub historical_roots: VariableList<Hash256, E::HistoricalRootsLimit>,

    // Ethereum 1.0 chain data
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: VariableList<Eth1Data, E::SlotsPerEth1VotingPeriod>,
    #[superstruct(getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub eth1_deposit_index: u64,

    // Registry
    pub validators: VariableList<Validator, E::ValidatorRegistryLimit>,
    #[serde(with = "ssz_types::serde_utils::quoted_u64_var_list")]
    pub balances: VariableList<u64, E::ValidatorRegistryLimit>,

    // Randomness
    pub randao_mixes: FixedVector<Hash256, E::EpochsPerHistoricalVector>,

    // Slashings
    #[serde(with = "ssz_types::serde_utils::quoted_u64_fixed_vec")]
    pub slashings: FixedVector<u64, E::EpochsPerSlashingsVector>,

    // Attestations (genesis fork only)
    #[superstruct(only(Base))]
    pub previous_epoch_attestations:
        VariableList<PendingAttestation<E>, E::MaxPendingAttestations>,
    #[superstruct(only(Base))]
    pub current_epoch_attestations: VariableList<PendingAttestation<E>, E::MaxPendingAttestations>,

    // Participation (Altair and later)
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu, Gloas))]
    pub previous_epoch_participation: VariableList<ParticipationFlags, E::ValidatorRegistryLimit>,
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu, Gloas))]
    pub current_epoch_participation: VariableList<ParticipationFlags, E::ValidatorRegistryLimit>,

    // Finality
    pub justification_bits: BitVector<E::JustificationBitsLength>,
    #[superstruct(getter(copy))]
    pub previous_justified_checkpoint: Checkpoint,
    #[superstruct(getter(copy))]
    pub current_justified_checkpoint: Checkpoint,
    #[superstruct(getter(copy))]
    pub finalized_checkpoint: Checkpoint,

    // Inactivity
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu, Gloas))]
    #[serde(with = "ssz_types::serde_utils::quoted_u64_var_list")]
    pub inactivity_scores: VariableList<u64, E::ValidatorRegistryLimit>,

    // Light-client sync committees
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu, Gloas))]
    pub current_sync_committee: Arc<SyncCommittee<E>>,
    #[superstruct(only(Altair, Bellatrix, Capella, Deneb, Electra, Fulu, Gloas))]
    pub next_sync_committee: Arc<SyncCommittee<E>>,

    // Execution
    #[superstruct(
        only(Bellatrix),
        partial_getter(rename = "latest_execution_payload_header_bellatrix")
    )]
    pub latest_execution_payload_header: ExecutionPayloadHeaderBellatrix<E>,
    #[superstruct(
        only(Capella),
        partial_getter(rename = "latest_execution_payload_header_capella")
    )]
    pub latest_execution_payload_header: ExecutionPayloadHeaderCapella<E>,
    #[superstruct(
        only(Deneb),
        partial_getter(rename = "latest_execution_payload_header_deneb")
    )]
    pub latest_execution_payload_header: ExecutionPayloadHeaderDeneb<E>,
    #[superstruct(
        only(Electra),
        partial_getter(rename = "latest_execution_payload_header_electra")
    )]
    pub latest_execution_payload_header: ExecutionPayloadHeaderElectra<E>,
    #[superstruct(
        only(Fulu),
        partial_getter(rename = "latest_execution_payload_header_fulu")
    )]
    pub latest_execution_payload_header: ExecutionPayloadHeaderFulu<E>,
    #[superstruct(only(Gloas))]
    pub latest_execution_payload_bid: ExecutionPayloadBid,

    // Capella
    #[superstruct(
        only(Capella, Deneb, Electra, Fulu, Gloas),
        partial_getter(copy)
    )]
    #[serde(with = "serde_utils::quoted_u64")]
    pub next_withdrawal_index: u64,
    #[superstruct(
        only(Capella, Deneb, Electra, Fulu, Gloas),
        partial_getter(copy)
    )]
    #[serde(with = "serde_utils::quoted_u64")]
    pub next_withdrawal_validator_index: u64,
    #[superstruct(only(Capella, Deneb, Electra, Fulu, Gloas))]
    pub historical_summaries: VariableList<HistoricalSummary, E::HistoricalRootsLimit>,

    // Electra
    #[superstruct(only(Electra, Fulu, Gloas), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub deposit_requests_start_index: u64,
    #[superstruct(only(Electra, Fulu, Gloas), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub deposit_balance_to_consume: u64,
    #[superstruct(only(Electra, Fulu, Gloas), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub exit_balance_to_consume: u64,
    #[superstruct(only(Electra, Fulu, Gloas), partial_getter(copy))]
    pub earliest_exit_epoch: Epoch,
    #[superstruct(only(Electra, Fulu, Gloas), partial_getter(copy))]
    #[serde(with = "serde_utils::quoted_u64")]
    pub consolidation_balance_to_consume: u64,
    #[superstruct(only(Electra, Fulu, Gloas), partial_getter(copy))]
    pub earliest_consolidation_epoch: Epoch,
    #[superstruct(only(Electra, Fulu, Gloas))]
    pub pending_deposits: VariableList<PendingDeposit, E::PendingDepositsLimit>,
    #[superstruct(only(Electra, Fulu, Gloas))]
    pub pending_partial_withdrawals:
        VariableList<PendingPartialWithdrawal, E::PendingPartialWithdrawalsLimit>,
    #[superstruct(only(Electra, Fulu, Gloas))]
    pub pending_consolidations: VariableList<PendingConsolidation, E::PendingConsolidationsLimit>,

    // Gloas (ePBS)
    #[superstruct(only(Gloas))]
    pub execution_payload_availability: BitVector<E::SlotsPerHistoricalRoot>,
    #[superstruct(only(Gloas))]
    pub builder_pending_payments:
        FixedVector<BuilderPendingPayment, E::BuilderPendingPaymentsLimit>,
    #[superstruct(only(Gloas))]
    pub builder_pending_withdrawals:
        VariableList<BuilderPendingWithdrawal, E::BuilderPendingWithdrawalsLimit>,
    #[superstruct(only(Gloas), partial_getter(copy))]
    pub latest_block_hash: ExecutionBlockHash,
    #[superstruct(only(Gloas), partial_getter(copy))]
    pub latest_full_slot: Slot,

    // Caching (not in the spec)
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    #[derivative(PartialEq = "ignore")]
    pub total_active_balance: Option<(Epoch, u64)>,
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    #[derivative(PartialEq = "ignore")]
    pub committee_caches: [Arc<CommitteeCache>; CACHED_EPOCHS],
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    #[derivative(PartialEq = "ignore")]
    pub pubkey_cache: PubkeyCache,
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    #[derivative(PartialEq = "ignore")]
    pub exit_cache: ExitCache,
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    #[derivative(PartialEq = "ignore")]
    pub progressive_balances_cache: ProgressiveBalancesCache,
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    #[derivative(PartialEq = "ignore")]
    pub epoch_cache: EpochCache,
}

impl<E: EthSpec> BeaconState<E> {
    /// Create a new state at genesis of the base fork.
    ///
    /// Not a complete genesis state, it must be initialized by `initialize_beacon_state_from_eth1`.
    pub fn new(genesis_time: u64, eth1_data: Eth1Data, spec: &ChainSpec) -> Self {
        BeaconState::Base(BeaconStateBase {
            // Versioning
            genesis_time,
            genesis_validators_root: Hash256::default(), // Set later.
            slot: spec.genesis_slot,
            fork: Fork {
                previous_version: spec.genesis_fork_version,
                current_version: spec.genesis_fork_version,
                epoch: E::genesis_epoch(),
            },

            // History
            latest_block_header: BeaconBlock::<E>::empty(spec).temporary_block_header(),
            block_roots: FixedVector::from_elem(Hash256::default()),
            state_roots: FixedVector::from_elem(Hash256::default()),
            historical_roots: VariableList::empty(),

            // Eth1
            eth1_data,
            eth1_data_votes: VariableList::empty(),
            eth1_deposit_index: 0,

            // Validator registry
            validators: VariableList::empty(),
            balances: VariableList::empty(),

            // Randomness
            randao_mixes: FixedVector::from_elem(Hash256::default()),

            // Slashings
            slashings: FixedVector::from_elem(0),

            // Attestations
            previous_epoch_attestations: VariableList::empty(),
            current_epoch_attestations: VariableList::empty(),

            // Finality
            justification_bits: BitVector::new(),
            previous_justified_checkpoint: Checkpoint::default(),
            current_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),

            // Caching (not in spec)
            total_active_balance: None,
            committee_caches: [
                Arc::new(CommitteeCache::default()),
                Arc::new(CommitteeCache::default()),
                Arc::new(CommitteeCache::default()),
            ],
            pubkey_cache: PubkeyCache::default(),
            exit_cache: ExitCache::default(),
            progressive_balances_cache: ProgressiveBalancesCache::default(),
            epoch_cache: EpochCache::default(),
        })
    }

    /// Returns the name of the fork pertaining to `self`.
    ///
    /// Will return an `Err` if `self` has been instantiated to a variant conflicting with the
    /// fork at `self.slot()`.
    pub fn fork_name(&self, spec: &ChainSpec) -> Result<ForkName, InconsistentFork> {
        let fork_at_slot = spec.fork_name_at_slot::<E>(self.slot());
        let object_fork = self.fork_name_unchecked();

        if fork_at_slot == object_fork {
            Ok(object_fork)
        } else {
            Err(InconsistentFork {
                fork_at_slot,
                object_fork,
            })
        }
    }

    /// Returns the name of the fork pertaining to `self`, without checking the fork schedule.
    pub fn fork_name_unchecked(&self) -> ForkName {
        match self {
            BeaconState::Base { .. } => ForkName::Base,
            BeaconState::Altair { .. } => ForkName::Altair,
            BeaconState::Bellatrix { .. } => ForkName::Bellatrix,
            BeaconState::Capella { .. } => ForkName::Capella,
            BeaconState::Deneb { .. } => ForkName::Deneb,
            BeaconState::Electra { .. } => ForkName::Electra,
            BeaconState::Fulu { .. } => ForkName::Fulu,
            BeaconState::Gloas { .. } => ForkName::Gloas,
        }
    }

    /// SSZ decode with fork variant determined by the fork schedule at the state's slot.
    pub fn from_ssz_bytes(bytes: &[u8], spec: &ChainSpec) -> Result<Self, ssz::DecodeError> {
        // The genesis time (u64) and genesis validators root (Hash256) precede the slot.
        let slot_start = <u64 as Decode>::ssz_fixed_len() + <Hash256 as Decode>::ssz_fixed_len();
        let slot_end = slot_start + <Slot as Decode>::ssz_fixed_len();

        let slot_bytes =
            bytes
                .get(slot_start..slot_end)
                .ok_or(ssz::DecodeError::InvalidByteLength {
                    len: bytes.len(),
                    expected: slot_end,
                })?;

        let slot = Slot::from_ssz_bytes(slot_bytes)?;
        let fork_at_slot = spec.fork_name_at_slot::<E>(slot);

        Ok(match fork_at_slot {
            ForkName::Base => Self::Base(BeaconStateBase::from_ssz_bytes(bytes)?),
            ForkName::Altair => Self::Altair(BeaconStateAltair::from_ssz_bytes(bytes)?),
            ForkName::Bellatrix => Self::Bellatrix(BeaconStateBellatrix::from_ssz_bytes(bytes)?),
            ForkName::Capella => Self::Capella(BeaconStateCapella::from_ssz_bytes(bytes)?),
            ForkName::Deneb => Self::Deneb(BeaconStateDeneb::from_ssz_bytes(bytes)?),
            ForkName::Electra => Self::Electra(BeaconStateElectra::from_ssz_bytes(bytes)?),
            ForkName::Fulu => Self::Fulu(BeaconStateFulu::from_ssz_bytes(bytes)?),
            ForkName::Gloas => Self::Gloas(BeaconStateGloas::from_ssz_bytes(bytes)?),
        })
    }

    /// The epoch corresponding to `self.slot()`.
    pub fn current_epoch(&self) -> Epoch {
        self.slot().epoch(E::slots_per_epoch())
    }

    /// The epoch prior to `self.current_epoch()`.
    ///
    /// If the current epoch is the genesis epoch, the genesis_epoch is returned.
    pub fn previous_epoch(&self) -> Epoch {
        let current_epoch = self.current_epoch();
        if let Ok(prev_epoch) = current_epoch.safe_sub(1) {
            prev_epoch
        } else {
            current_epoch
        }
    }

    /// The epoch following `self.current_epoch()`.
    pub fn next_epoch(&self) -> Result<Epoch, Error> {
        Ok(self.current_epoch().safe_add(1)?)
    }

    /// The number of committees at `slot`.
    pub fn get_committee_count_at_slot(&self, slot: Slot) -> Result<u64, Error> {
        let cache = self.committee_cache_at_slot(slot)?;
        Ok(cache.committees_per_slot())
    }

    /// Compute the number of committees in an entire epoch.
    pub fn get_epoch_committee_count(&self, relative_epoch: RelativeEpoch) -> Result<u64, Error> {
        Ok(self.committee_cache(relative_epoch)?.epoch_committee_count() as u64)
    }

    /// Returns the active validator indices for the given epoch.
    ///
    /// Does not utilize the cache, performs a full iteration over the validator registry.
    pub fn get_active_validator_indices(&self, epoch: Epoch) -> Vec<usize> {
        get_active_validator_indices(self.validators(), epoch)
    }

    /// Return the cached active validator indices at some epoch.
    ///
    /// Note: the indices are shuffled (i.e., not in ascending order).
    pub fn get_cached_active_validator_indices(
        &self,
        relative_epoch: RelativeEpoch,
    ) -> Result<&[usize], Error> {
        let cache = self.committee_cache(relative_epoch)?;
        Ok(cache.active_validator_indices())
    }

    /// Returns the crosslink committees for some slot.
    pub fn get_beacon_committees_at_slot(
        &self,
        slot: Slot,
    ) -> Result<Vec<BeaconCommittee<'_>>, Error> {
        let cache = self.committee_cache_at_slot(slot)?;
        cache.get_beacon_committees_at_slot(slot)
    }

    /// Returns the crosslink committees for some epoch.
    pub fn get_beacon_committees_at_epoch(
        &self,
        relative_epoch: RelativeEpoch,
    ) -> Result<Vec<BeaconCommittee<'_>>, Error> {
        let cache = self.committee_cache(relative_epoch)?;
        cache.get_all_beacon_committees()
    }

    /// Get the committee for the given `slot` and `index`.
    pub fn get_beacon_committee(
        &self,
        slot: Slot,
        index: u64,
    ) -> Result<BeaconCommittee<'_>, Error> {
        let epoch = slot.epoch(E::slots_per_epoch());
        let relative_epoch = RelativeEpoch::from_epoch(self.current_epoch(), epoch)?;

        let cache = self.committee_cache(relative_epoch)?;
        cache
            .get_beacon_committee(slot, index)
            .ok_or(Error::NoCommittee { slot, index })
    }

    /// Returns the beacon proposer index for the `slot` in `self.current_epoch()`.
    pub fn get_beacon_proposer_index(&self, slot: Slot, spec: &ChainSpec) -> Result<usize, Error> {
        // Proposer indices are only known for the current epoch, due to the dependence on the
        // effective balances of validators, which change at every epoch transition.
        let epoch = slot.epoch(E::slots_per_epoch());
        if epoch != self.current_epoch() {
            return Err(Error::SlotOutOfBounds);
        }

        let seed = self.get_beacon_proposer_seed(slot, spec)?;
        let indices = self.get_active_validator_indices(epoch);

        self.compute_proposer_index(&indices, &seed, spec)
    }

    /// Compute the seed to use for the beacon proposer selection at the given `slot`.
    pub fn get_beacon_proposer_seed(&self, slot: Slot, spec: &ChainSpec) -> Result<Vec<u8>, Error> {
        let epoch = slot.epoch(E::slots_per_epoch());
        let mut preimage = self
            .get_seed(epoch, Domain::BeaconProposer, spec)?
            .as_slice()
            .to_vec();
        preimage.append(&mut int_to_bytes8(slot.as_u64()));
        Ok(hash(&preimage))
    }

    /// Compute the proposer (not necessarily for the Beacon chain) from a list of indices.
    ///
    /// `compute_proposer_index` from the consensus spec; the sampling threshold widens from
    /// a byte to two bytes in electra to accommodate larger effective balances.
    pub fn compute_proposer_index(
        &self,
        indices: &[usize],
        seed: &[u8],
        spec: &ChainSpec,
    ) -> Result<usize, Error> {
        if indices.is_empty() {
            return Err(Error::InsufficientValidators);
        }

        let max_effective_balance = spec.max_effective_balance_for_fork(self.fork_name_unchecked());
        let max_random_value = if self.fork_name_unchecked().electra_enabled() {
            MAX_RANDOM_VALUE
        } else {
            MAX_RANDOM_BYTE
        };

        let mut i = 0;
        loop {
            let shuffled_index = compute_shuffled_index(
                i.safe_rem(indices.len())?,
                indices.len(),
                seed,
                spec.shuffle_round_count,
            )
            .ok_or(Error::UnableToShuffle)?;
            let candidate_index = *indices
                .get(shuffled_index)
                .ok_or(Error::ShuffleIndexOutOfBounds(shuffled_index))?;
            let random_value = self.shuffling_random_value(i, seed)?;
            let effective_balance = self.get_effective_balance(candidate_index)?;
            if effective_balance.safe_mul(max_random_value)?
                >= max_effective_balance.safe_mul(random_value)?
            {
                return Ok(candidate_index);
            }
            i.safe_add_assign(1)?;
        }
    }

    /// Get a random value from the given `seed`, for candidate sampling.
    fn shuffling_random_value(&self, i: usize, seed: &[u8]) -> Result<u64, Error> {
        if self.fork_name_unchecked().electra_enabled() {
            Self::shuffling_random_u16(i, seed).map(u64::from)
        } else {
            Self::shuffling_random_byte(i, seed).map(u64::from)
        }
    }

    /// Get a random byte from the given `seed`.
    ///
    /// Used by the proposer & sync committee selection functions.
    fn shuffling_random_byte(i: usize, seed: &[u8]) -> Result<u8, Error> {
        let mut preimage = seed.to_vec();
        preimage.append(&mut int_to_bytes8(i.safe_div(32)? as u64));
        let index = i.safe_rem(32)?;
        hash(&preimage)
            .get(index)
            .copied()
            .ok_or(Error::ShuffleIndexOutOfBounds(index))
    }

    /// Get two random bytes from the given `seed`, little-endian.
    fn shuffling_random_u16(i: usize, seed: &[u8]) -> Result<u16, Error> {
        let mut preimage = seed.to_vec();
        preimage.append(&mut int_to_bytes8(i.safe_div(16)? as u64));
        let offset = i.safe_rem(16)?.safe_mul(2)?;
        hash(&preimage)
            .get(offset..offset.safe_add(2)?)
            .and_then(|bytes| bytes.try_into().ok())
            .map(u16::from_le_bytes)
            .ok_or(Error::ShuffleIndexOutOfBounds(offset))
    }

    /// Returns the block root which decided the proposer shuffling for the current epoch. This
    /// root can be used to key this proposer shuffling.
    ///
    /// The `block_root` covers the one-off scenario where the genesis block decides its own
    /// shuffling. It should be set to the latest block applied to `self` or the genesis block
    /// root.
    pub fn proposer_shuffling_decision_root(
        &self,
        block_root: Hash256,
    ) -> Result<Hash256, Error> {
        let decision_slot = self.proposer_shuffling_decision_slot();
        if self.slot() <= decision_slot {
            Ok(block_root)
        } else {
            self.get_block_root(decision_slot).copied()
        }
    }

    /// Returns the slot at which the proposer shuffling was decided. The block root at this slot
    /// can be used to key the proposer shuffling for the current epoch.
    fn proposer_shuffling_decision_slot(&self) -> Slot {
        self.current_epoch()
            .start_slot(E::slots_per_epoch())
            .saturating_sub(1_u64)
    }

    /// Returns the block root which decided the attester shuffling for the given `relative_epoch`.
    /// This root can be used to key that attester shuffling.
    ///
    /// The `block_root` covers the one-off scenario where the genesis block decides its own
    /// shuffling. It should be set to the latest block applied to `self` or the genesis block
    /// root.
    pub fn attester_shuffling_decision_root(
        &self,
        block_root: Hash256,
        relative_epoch: RelativeEpoch,
    ) -> Result<Hash256, Error> {
        let decision_slot = self.attester_shuffling_decision_slot(relative_epoch);
        if self.slot() <= decision_slot {
            Ok(block_root)
        } else {
            self.get_block_root(decision_slot).copied()
        }
    }

    /// Returns the slot at which the attester shuffling was decided. The block root at this slot
    /// can be used to key the attester shuffling for the given epoch.
    fn attester_shuffling_decision_slot(&self, relative_epoch: RelativeEpoch) -> Slot {
        match relative_epoch {
            RelativeEpoch::Next => self.current_epoch(),
            RelativeEpoch::Current => self.previous_epoch(),
            RelativeEpoch::Previous => self.previous_epoch().saturating_sub(1_u64),
        }
        .start_slot(E::slots_per_epoch())
        .saturating_sub(1_u64)
    }

    /// Safely obtains the index for latest block roots, given some `slot`.
    fn get_latest_block_roots_index(&self, slot: Slot) -> Result<usize, Error> {
        if slot < self.slot() && self.slot() <= slot + self.block_roots().len() as u64 {
            Ok(slot.as_usize().safe_rem(self.block_roots().len())?)
        } else {
            Err(Error::SlotOutOfBounds)
        }
    }

    /// Return the block root at a recent `slot`.
    pub fn get_block_root(&self, slot: Slot) -> Result<&Hash256, Error> {
        let i = self.get_latest_block_roots_index(slot)?;
        self.block_roots()
            .get(i)
            .ok_or(Error::BlockRootsOutOfBounds(i))
    }

    /// Return the block root at a recent `epoch`.
    ///
    /// Note that the spec calls this `get_block_root`.
    pub fn get_block_root_at_epoch(&self, epoch: Epoch) -> Result<&Hash256, Error> {
        self.get_block_root(epoch.start_slot(E::slots_per_epoch()))
    }

    /// Sets the block root for some given slot.
    pub fn set_block_root(&mut self, slot: Slot, block_root: Hash256) -> Result<(), Error> {
        let i = self.get_latest_block_roots_index(slot)?;
        *self
            .block_roots_mut()
            .get_mut(i)
            .ok_or(Error::BlockRootsOutOfBounds(i))? = block_root;
        Ok(())
    }

    /// Fill `randao_mixes` with
    pub fn fill_randao_mixes_with(&mut self, index_root: Hash256) {
        *self.randao_mixes_mut() = FixedVector::from_elem(index_root);
    }

    /// Safely obtains the index for `randao_mixes`
    fn get_randao_mix_index(&self, epoch: Epoch, allow_next_epoch: AllowNextEpoch) -> Result<usize, Error> {
        let current_epoch = self.current_epoch();
        let len = E::EpochsPerHistoricalVector::to_u64();

        if current_epoch < epoch.safe_add(len)?
            && epoch <= allow_next_epoch.upper_bound_of(current_epoch)?
        {
            Ok(epoch.as_usize().safe_rem(len as usize)?)
        } else {
            Err(Error::EpochOutOfBounds)
        }
    }

    /// XOR-assigns the existing `epoch` randao mix with the hash of the `signature`.
    ///
    /// # Errors:
    ///
    /// See `Self::get_randao_mix`.
    pub fn update_randao_mix(
        &mut self,
        epoch: Epoch,
        signature: &bls::SignatureBytes,
    ) -> Result<(), Error> {
        let i = epoch
            .as_usize()
            .safe_rem(E::EpochsPerHistoricalVector::to_usize())?;

        let signature_hash = Hash256::from_slice(&hash(&ssz_encode(signature)));

        let mix = self
            .randao_mixes()
            .get(i)
            .copied()
            .ok_or(Error::RandaoMixesOutOfBounds(i))?;

        *self
            .randao_mixes_mut()
            .get_mut(i)
            .ok_or(Error::RandaoMixesOutOfBounds(i))? =
            Hash256::from_slice(&xor_hashes(&mix, &signature_hash));

        Ok(())
    }

    /// Return the randao mix at a recent ``epoch``.
    pub fn get_randao_mix(&self, epoch: Epoch) -> Result<&Hash256, Error> {
        let i = self.get_randao_mix_index(epoch, AllowNextEpoch::False)?;
        self.randao_mixes()
            .get(i)
            .ok_or(Error::RandaoMixesOutOfBounds(i))
    }

    /// Set the randao mix at a recent ``epoch``.
    pub fn set_randao_mix(&mut self, epoch: Epoch, mix: Hash256) -> Result<(), Error> {
        let i = self.get_randao_mix_index(epoch, AllowNextEpoch::True)?;
        *self
            .randao_mixes_mut()
            .get_mut(i)
            .ok_or(Error::RandaoMixesOutOfBounds(i))? = mix;
        Ok(())
    }

    /// Safely obtains the index for latest state roots, given some `slot`.
    fn get_latest_state_roots_index(&self, slot: Slot) -> Result<usize, Error> {
        if slot < self.slot() && self.slot() <= slot + self.state_roots().len() as u64 {
            Ok(slot.as_usize().safe_rem(self.state_roots().len())?)
        } else {
            Err(Error::SlotOutOfBounds)
        }
    }

    /// Gets the state root for some slot.
    pub fn get_state_root(&self, slot: Slot) -> Result<&Hash256, Error> {
        let i = self.get_latest_state_roots_index(slot)?;
        self.state_roots()
            .get(i)
            .ok_or(Error::StateRootsOutOfBounds(i))
    }

    /// Sets the latest state root for slot.
    pub fn set_state_root(&mut self, slot: Slot, state_root: Hash256) -> Result<(), Error> {
        let i = self.get_latest_state_roots_index(slot)?;
        *self
            .state_roots_mut()
            .get_mut(i)
            .ok_or(Error::StateRootsOutOfBounds(i))? = state_root;
        Ok(())
    }

    /// Generate a seed for the given `epoch`.
    pub fn get_seed(
        &self,
        epoch: Epoch,
        domain_type: Domain,
        spec: &ChainSpec,
    ) -> Result<Hash256, Error> {
        // Bypass the safe getter for RANDAO so we can gracefully handle the scenario where
        // `epoch == 0`.
        let mix = {
            let i = epoch
                .safe_add(E::EpochsPerHistoricalVector::to_u64())?
                .safe_sub(spec.min_seed_lookahead)?
                .safe_sub(1)?;
            let i_mod = i.as_usize().safe_rem(self.randao_mixes().len())?;
            self.randao_mixes()
                .get(i_mod)
                .ok_or(Error::RandaoMixesOutOfBounds(i_mod))?
        };
        let domain_bytes = int_to_bytes4(spec.get_domain_constant(domain_type));
        let epoch_bytes = int_to_bytes8(epoch.as_u64());

        const NUM_DOMAIN_BYTES: usize = 4;
        const NUM_EPOCH_BYTES: usize = 8;
        const MIX_OFFSET: usize = NUM_DOMAIN_BYTES + NUM_EPOCH_BYTES;
        const NUM_MIX_BYTES: usize = 32;

        let mut preimage = [0; NUM_DOMAIN_BYTES + NUM_EPOCH_BYTES + NUM_MIX_BYTES];
        preimage[0..NUM_DOMAIN_BYTES].copy_from_slice(&domain_bytes);
        preimage[NUM_DOMAIN_BYTES..MIX_OFFSET].copy_from_slice(&epoch_bytes);
        preimage[MIX_OFFSET..].copy_from_slice(mix.as_slice());

        Ok(Hash256::from_slice(&hash(&preimage)))
    }

    /// Safely obtain the validator at `index`.
    pub fn get_validator(&self, validator_index: usize) -> Result<&Validator, Error> {
        self.validators()
            .get(validator_index)
            .ok_or(Error::UnknownValidator(validator_index))
    }

    /// Safely obtain a mutable reference to the validator at `index`.
    pub fn get_validator_mut(&mut self, validator_index: usize) -> Result<&mut Validator, Error> {
        self.validators_mut()
            .get_mut(validator_index)
            .ok_or(Error::UnknownValidator(validator_index))
    }

    /// Return the effective balance for a validator with the given `validator_index`.
    pub fn get_effective_balance(&self, validator_index: usize) -> Result<u64, Error> {
        self.get_validator(validator_index)
            .map(|v| v.effective_balance)
    }

    /// Returns `true` if `val` is eligible for rewards and penalties in the epoch after
    /// `previous_epoch`.
    ///
    /// Passing `previous_epoch` rather than computing it internally provides a tangible speed
    /// improvement in state processing.
    pub fn is_eligible_validator(
        &self,
        previous_epoch: Epoch,
        val: &Validator,
    ) -> Result<bool, Error> {
        Ok(val.is_active_at(previous_epoch)
            || (val.slashed
                && previous_epoch.safe_add(Epoch::new(1))? < val.withdrawable_epoch))
    }

    /// Get the inactivity score for a single validator.
    ///
    /// Will error if the state lacks an `inactivity_scores` field.
    pub fn get_inactivity_score(&self, validator_index: usize) -> Result<u64, Error> {
        self.inactivity_scores()?
            .get(validator_index)
            .copied()
            .ok_or(Error::InactivityScoresOutOfBounds(validator_index))
    }

    /// Get a mutable reference to the inactivity score for a single validator.
    ///
    /// Will error if the state lacks an `inactivity_scores` field.
    pub fn get_inactivity_score_mut(&mut self, validator_index: usize) -> Result<&mut u64, Error> {
        self.inactivity_scores_mut()?
            .get_mut(validator_index)
            .ok_or(Error::InactivityScoresOutOfBounds(validator_index))
    }

    /// Safely obtain the balance at `index`.
    pub fn get_balance(&self, validator_index: usize) -> Result<u64, Error> {
        self.balances()
            .get(validator_index)
            .copied()
            .ok_or(Error::BalancesOutOfBounds(validator_index))
    }

    /// Safely obtain a mutable reference to the balance at `index`.
    pub fn get_balance_mut(&mut self, validator_index: usize) -> Result<&mut u64, Error> {
        self.balances_mut()
            .get_mut(validator_index)
            .ok_or(Error::BalancesOutOfBounds(validator_index))
    }

    /// If a validator pubkey exists in the validator registry, returns `Some(i)`, otherwise
    /// returns `None`.
    ///
    /// Requires a fully up-to-date `pubkey_cache`, returns an error if this is not the case.
    pub fn get_validator_index(&self, pubkey: &PublicKeyBytes) -> Result<Option<usize>, Error> {
        if self.pubkey_cache().len() == self.validators().len() {
            Ok(self.pubkey_cache().get(pubkey))
        } else {
            Err(Error::PubkeyCacheIncomplete {
                cache_len: self.pubkey_cache().len(),
                registry_len: self.validators().len(),
            })
        }
    }

    /// The total effective balance of the given validator indices.
    ///
    /// Never less than a single effective balance increment.
    pub fn get_total_balance<'a, I: IntoIterator<Item = &'a usize>>(
        &'a self,
        validator_indices: I,
        spec: &ChainSpec,
    ) -> Result<u64, Error> {
        let total_balance = validator_indices.into_iter().try_fold(0_u64, |acc, i| {
            self.get_effective_balance(*i)
                .and_then(|bal| Ok(acc.safe_add(bal)?))
        })?;
        Ok(std::cmp::max(
            total_balance,
            spec.effective_balance_increment,
        ))
    }

    /// Implementation of `get_total_active_balance`, matching the spec.
    ///
    /// Requires the total active balance cache to be initialised, which is initialised whenever
    /// the current committee cache is.
    pub fn get_total_active_balance(&self) -> Result<u64, Error> {
        self.get_total_active_balance_at_epoch(self.current_epoch())
    }

    /// Get the cached total active balance while checking that it is for the correct `epoch`.
    pub fn get_total_active_balance_at_epoch(&self, epoch: Epoch) -> Result<u64, Error> {
        let (initialized_epoch, balance) = self
            .total_active_balance()
            .ok_or(Error::TotalActiveBalanceCacheUninitialized)?;

        if initialized_epoch == epoch {
            Ok(balance)
        } else {
            Err(Error::TotalActiveBalanceCacheInconsistent {
                initialized_epoch,
                current_epoch: epoch,
            })
        }
    }

    /// Build the total active balance cache for the current epoch if it is not already built.
    pub fn build_total_active_balance_cache(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        if self
            .get_total_active_balance_at_epoch(self.current_epoch())
            .is_err()
        {
            self.force_build_total_active_balance_cache(spec)?;
        }
        Ok(())
    }

    /// Build the total active balance cache, even if it is already built.
    pub fn force_build_total_active_balance_cache(
        &mut self,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let current_epoch = self.current_epoch();
        let total_active_balance = self.compute_total_active_balance_slow(current_epoch, spec)?;
        *self.total_active_balance_mut() = Some((current_epoch, total_active_balance));
        Ok(())
    }

    /// Compute the total active balance from scratch.
    pub fn compute_total_active_balance_slow(
        &self,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<u64, Error> {
        let indices = self.get_active_validator_indices(epoch);
        self.get_total_balance(&indices, spec)
    }

    /// Manually set the total active balance.
    ///
    /// This should only be called when the total active balance has been computed as part of
    /// epoch processing.
    pub fn set_total_active_balance(&mut self, epoch: Epoch, balance: u64) {
        *self.total_active_balance_mut() = Some((epoch, balance));
    }

    /// Get a mutable reference to the epoch participation flags for `epoch`.
    pub fn get_epoch_participation_mut(
        &mut self,
        epoch: Epoch,
    ) -> Result<&mut VariableList<ParticipationFlags, E::ValidatorRegistryLimit>, Error> {
        if epoch == self.current_epoch() {
            self.current_epoch_participation_mut()
        } else if epoch == self.previous_epoch() {
            self.previous_epoch_participation_mut()
        } else {
            Err(Error::EpochOutOfBounds)
        }
    }

    /// Get the number of outstanding deposits.
    ///
    /// Returns `Err` if the state is invalid.
    pub fn get_outstanding_deposit_len(&self) -> Result<u64, Error> {
        self.eth1_data()
            .deposit_count
            .checked_sub(self.eth1_deposit_index())
            .ok_or(Error::InvalidBitfield)
    }

    /// Return the churn limit for the current epoch (number of validators who can leave per
    /// epoch).
    ///
    /// Uses the current epoch committee cache, and will error if it isn't initialized.
    pub fn get_validator_churn_limit(&self, spec: &ChainSpec) -> Result<u64, Error> {
        Ok(std::cmp::max(
            spec.min_per_epoch_churn_limit,
            (self
                .committee_cache(RelativeEpoch::Current)?
                .active_validator_count() as u64)
                .safe_div(spec.churn_limit_quotient)?,
        ))
    }

    /// Return the activation churn limit for the current epoch (number of validators who can
    /// enter per epoch).
    ///
    /// Uses the current epoch committee cache, and will error if it isn't initialized.
    pub fn get_activation_churn_limit(&self, spec: &ChainSpec) -> Result<u64, Error> {
        Ok(match self.fork_name_unchecked() {
            ForkName::Base | ForkName::Altair | ForkName::Bellatrix | ForkName::Capella => {
                self.get_validator_churn_limit(spec)?
            }
            ForkName::Deneb
            | ForkName::Electra
            | ForkName::Fulu
            | ForkName::Gloas => std::cmp::min(
                spec.max_per_epoch_activation_churn_limit,
                self.get_validator_churn_limit(spec)?,
            ),
        })
    }

    /// Get the balance churn limit in Gwei (electra and later).
    pub fn get_balance_churn_limit(&self, spec: &ChainSpec) -> Result<u64, Error> {
        let total_active_balance = self.get_total_active_balance()?;
        let churn = std::cmp::max(
            spec.min_per_epoch_churn_limit_electra,
            total_active_balance.safe_div(spec.churn_limit_quotient)?,
        );

        Ok(churn.safe_sub(churn.safe_rem(spec.effective_balance_increment)?)?)
    }

    /// Get the churn limit for validator activations and exits in Gwei (electra and later).
    pub fn get_activation_exit_churn_limit(&self, spec: &ChainSpec) -> Result<u64, Error> {
        Ok(std::cmp::min(
            spec.max_per_epoch_activation_exit_churn_limit,
            self.get_balance_churn_limit(spec)?,
        ))
    }

    /// Get the consolidation churn limit in Gwei (electra and later).
    pub fn get_consolidation_churn_limit(&self, spec: &ChainSpec) -> Result<u64, Error> {
        self.get_balance_churn_limit(spec)?
            .safe_sub(self.get_activation_exit_churn_limit(spec)?)
            .map_err(Into::into)
    }

    /// `compute_exit_epoch_and_update_churn` from the electra spec.
    pub fn compute_exit_epoch_and_update_churn(
        &mut self,
        exit_balance: u64,
        spec: &ChainSpec,
    ) -> Result<Epoch, Error> {
        let mut earliest_exit_epoch = std::cmp::max(
            self.earliest_exit_epoch()?,
            self.compute_activation_exit_epoch(self.current_epoch(), spec)?,
        );

        let per_epoch_churn = self.get_activation_exit_churn_limit(spec)?;
        // New epoch for exits
        let mut exit_balance_to_consume = if self.earliest_exit_epoch()? < earliest_exit_epoch {
            per_epoch_churn
        } else {
            self.exit_balance_to_consume()?
        };

        // Exit doesn't fit in the current earliest epoch
        if exit_balance > exit_balance_to_consume {
            let balance_to_process = exit_balance.safe_sub(exit_balance_to_consume)?;
            let additional_epochs = balance_to_process
                .safe_sub(1)?
                .safe_div(per_epoch_churn)?
                .safe_add(1)?;
            earliest_exit_epoch.safe_add_assign(additional_epochs)?;
            exit_balance_to_consume
                .safe_add_assign(additional_epochs.safe_mul(per_epoch_churn)?)?;
        }
        let state = self.as_electra_base_mut()?;
        // Consume the balance and update state variables
        state.exit_balance_to_consume = exit_balance_to_consume.safe_sub(exit_balance)?;
        state.earliest_exit_epoch = earliest_exit_epoch;

        Ok(earliest_exit_epoch)
    }

    /// `compute_consolidation_epoch_and_update_churn` from the electra spec.
    pub fn compute_consolidation_epoch_and_update_churn(
        &mut self,
        consolidation_balance: u64,
        spec: &ChainSpec,
    ) -> Result<Epoch, Error> {
        let mut earliest_consolidation_epoch = std::cmp::max(
            self.earliest_consolidation_epoch()?,
            self.compute_activation_exit_epoch(self.current_epoch(), spec)?,
        );

        let per_epoch_consolidation_churn = self.get_consolidation_churn_limit(spec)?;

        // New epoch for consolidations
        let mut consolidation_balance_to_consume =
            if self.earliest_consolidation_epoch()? < earliest_consolidation_epoch {
                per_epoch_consolidation_churn
            } else {
                self.consolidation_balance_to_consume()?
            };

        // Consolidation doesn't fit in the current earliest epoch
        if consolidation_balance > consolidation_balance_to_consume {
            let balance_to_process =
                consolidation_balance.safe_sub(consolidation_balance_to_consume)?;
            let additional_epochs = balance_to_process
                .safe_sub(1)?
                .safe_div(per_epoch_consolidation_churn)?
                .safe_add(1)?;
            earliest_consolidation_epoch.safe_add_assign(additional_epochs)?;
            consolidation_balance_to_consume
                .safe_add_assign(additional_epochs.safe_mul(per_epoch_consolidation_churn)?)?;
        }

        // Consume the balance and update state variables
        let state = self.as_electra_base_mut()?;
        state.consolidation_balance_to_consume =
            consolidation_balance_to_consume.safe_sub(consolidation_balance)?;
        state.earliest_consolidation_epoch = earliest_consolidation_epoch;

        Ok(earliest_consolidation_epoch)
    }

    /// Returns the epoch at which an activation or exit triggered in ``epoch`` takes effect.
    ///
    /// Spec v0.12.1
    pub fn compute_activation_exit_epoch(
        &self,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<Epoch, Error> {
        Ok(epoch.safe_add(1)?.safe_add(spec.max_seed_lookahead)?)
    }

    /// Return the combined effective balance of an array of validators.
    pub fn get_slashings_sum(&self) -> Result<u64, Error> {
        self.slashings()
            .iter()
            .copied()
            .try_fold(0u64, |acc, s| acc.safe_add(s))
            .map_err(Into::into)
    }

    /// Get the slashed balances for the given epoch.
    pub fn get_slashings_at(&self, epoch: Epoch) -> Result<u64, Error> {
        let i = epoch
            .as_usize()
            .safe_rem(E::EpochsPerSlashingsVector::to_usize())?;
        self.slashings()
            .get(i)
            .copied()
            .ok_or(Error::SlashingsOutOfBounds(i))
    }

    /// Set the slashed balances for the given epoch.
    pub fn set_slashings_at(&mut self, epoch: Epoch, value: u64) -> Result<(), Error> {
        let i = epoch
            .as_usize()
            .safe_rem(E::EpochsPerSlashingsVector::to_usize())?;
        *self
            .slashings_mut()
            .get_mut(i)
            .ok_or(Error::SlashingsOutOfBounds(i))? = value;
        Ok(())
    }

    /// Convert a sync committee's pubkeys into validator indices.
    pub fn get_sync_committee_indices(
        &self,
        sync_committee: &SyncCommittee<E>,
    ) -> Result<Vec<usize>, Error> {
        sync_committee
            .pubkeys
            .iter()
            .map(|pubkey| {
                self.get_validator_index(pubkey)?
                    .ok_or_else(|| Error::InvalidValidatorPubkey(format!("{:?}", pubkey)))
            })
            .collect()
    }

    /// Compute the sync committee indices for the next sync committee.
    fn get_next_sync_committee_indices(&self, spec: &ChainSpec) -> Result<Vec<usize>, Error> {
        let epoch = self.current_epoch().safe_add(1)?;

        let active_validator_indices = self.get_active_validator_indices(epoch);
        let active_validator_count = active_validator_indices.len();
        if active_validator_count == 0 {
            return Err(Error::InsufficientValidators);
        }

        let seed = self.get_seed(epoch, Domain::SyncCommittee, spec)?;

        let max_effective_balance = spec.max_effective_balance_for_fork(self.fork_name_unchecked());
        let max_random_value = if self.fork_name_unchecked().electra_enabled() {
            MAX_RANDOM_VALUE
        } else {
            MAX_RANDOM_BYTE
        };

        let mut i = 0;
        let mut sync_committee_indices = Vec::with_capacity(E::SyncCommitteeSize::to_usize());
        while sync_committee_indices.len() < E::SyncCommitteeSize::to_usize() {
            let shuffled_index = compute_shuffled_index(
                i.safe_rem(active_validator_count)?,
                active_validator_count,
                seed.as_slice(),
                spec.shuffle_round_count,
            )
            .ok_or(Error::UnableToShuffle)?;
            let candidate_index = *active_validator_indices
                .get(shuffled_index)
                .ok_or(Error::ShuffleIndexOutOfBounds(shuffled_index))?;
            let random_value = self.shuffling_random_value(i, seed.as_slice())?;
            let effective_balance = self.get_validator(candidate_index)?.effective_balance;
            if effective_balance.safe_mul(max_random_value)?
                >= max_effective_balance.safe_mul(random_value)?
            {
                sync_committee_indices.push(candidate_index);
            }
            i.safe_add_assign(1)?;
        }
        Ok(sync_committee_indices)
    }

    /// Compute the next sync committee.
    pub fn get_next_sync_committee(&self, spec: &ChainSpec) -> Result<SyncCommittee<E>, Error> {
        let sync_committee_indices = self.get_next_sync_committee_indices(spec)?;

        let pubkeys = sync_committee_indices
            .iter()
            .map(|&index| {
                self.validators()
                    .get(index)
                    .map(|v| v.pubkey)
                    .ok_or(Error::UnknownValidator(index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let decompressed_pubkeys = pubkeys
            .iter()
            .map(|pk| pk.decompress())
            .collect::<Result<Vec<_>, _>>()?;
        let aggregate_pubkey = AggregatePublicKey::aggregate(&decompressed_pubkeys)?;

        Ok(SyncCommittee {
            pubkeys: FixedVector::new(pubkeys)?,
            aggregate_pubkey: aggregate_pubkey.to_public_key().compress(),
        })
    }

    /// Get the sync committee duties for a list of validator indices.
    pub fn get_sync_committee_duties(
        &self,
        epoch: Epoch,
        validator_indices: &[u64],
        spec: &ChainSpec,
    ) -> Result<Vec<Option<SyncDuty>>, Error> {
        let sync_committee = self.get_built_sync_committee(epoch, spec)?;

        validator_indices
            .iter()
            .map(|&validator_index| {
                let pubkey = self.get_validator(validator_index as usize)?.pubkey;

                let positions = sync_committee
                    .subcommittee_positions_for_public_key(&pubkey)
                    .map_err(|_| Error::SyncCommitteeCacheUninitialized)?;
                if positions.is_empty() {
                    Ok(None)
                } else {
                    let mut all_positions = positions
                        .into_iter()
                        .flat_map(|(subcommittee, positions)| {
                            positions.into_iter().map(move |pos| {
                                subcommittee
                                    * E::SyncSubcommitteeSize::to_u64()
                                    + pos as u64
                            })
                        })
                        .collect::<Vec<_>>();
                    all_positions.sort_unstable();
                    Ok(Some(SyncDuty {
                        validator_index,
                        validator_sync_committee_indices: all_positions,
                    }))
                }
            })
            .collect()
    }

    /// Get the already-built current or next sync committee from the state.
    pub fn get_built_sync_committee(
        &self,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<&Arc<SyncCommittee<E>>, Error> {
        let sync_committee_period = epoch.safe_div(spec.epochs_per_sync_committee_period)?;
        let current_sync_committee_period = self
            .current_epoch()
            .safe_div(spec.epochs_per_sync_committee_period)?;
        let next_sync_committee_period = current_sync_committee_period.safe_add(1)?;

        if sync_committee_period == current_sync_committee_period {
            self.current_sync_committee()
        } else if sync_committee_period == next_sync_committee_period {
            self.next_sync_committee()
        } else {
            Err(Error::SyncCommitteeCacheUninitialized)
        }
    }

    /// Get the execution payload header, on states that have one.
    pub fn latest_execution_payload_header(
        &self,
    ) -> Result<ExecutionPayloadHeaderRef<'_, E>, Error> {
        match self {
            BeaconState::Base(_) | BeaconState::Altair(_) | BeaconState::Gloas(_) => {
                Err(Error::IncorrectStateVariant)
            }
            BeaconState::Bellatrix(state) => Ok(ExecutionPayloadHeaderRef::Bellatrix(
                &state.latest_execution_payload_header,
            )),
            BeaconState::Capella(state) => Ok(ExecutionPayloadHeaderRef::Capella(
                &state.latest_execution_payload_header,
            )),
            BeaconState::Deneb(state) => Ok(ExecutionPayloadHeaderRef::Deneb(
                &state.latest_execution_payload_header,
            )),
            BeaconState::Electra(state) => Ok(ExecutionPayloadHeaderRef::Electra(
                &state.latest_execution_payload_header,
            )),
            BeaconState::Fulu(state) => Ok(ExecutionPayloadHeaderRef::Fulu(
                &state.latest_execution_payload_header,
            )),
        }
    }

    /// Access the electra-and-later fields shared by every post-electra variant, mutably.
    ///
    /// A convenience grouping because superstruct partial getters borrow the whole state.
    fn as_electra_base_mut(&mut self) -> Result<ElectraFieldsMut<'_, E>, Error> {
        match self {
            BeaconState::Electra(state) => Ok(ElectraFieldsMut {
                exit_balance_to_consume: &mut state.exit_balance_to_consume,
                earliest_exit_epoch: &mut state.earliest_exit_epoch,
                consolidation_balance_to_consume: &mut state.consolidation_balance_to_consume,
                earliest_consolidation_epoch: &mut state.earliest_consolidation_epoch,
                pending_deposits: &mut state.pending_deposits,
                pending_partial_withdrawals: &mut state.pending_partial_withdrawals,
                pending_consolidations: &mut state.pending_consolidations,
            }),
            BeaconState::Fulu(state) => Ok(ElectraFieldsMut {
                exit_balance_to_consume: &mut state.exit_balance_to_consume,
                earliest_exit_epoch: &mut state.earliest_exit_epoch,
                consolidation_balance_to_consume: &mut state.consolidation_balance_to_consume,
                earliest_consolidation_epoch: &mut state.earliest_consolidation_epoch,
                pending_deposits: &mut state.pending_deposits,
                pending_partial_withdrawals: &mut state.pending_partial_withdrawals,
                pending_consolidations: &mut state.pending_consolidations,
            }),
            BeaconState::Gloas(state) => Ok(ElectraFieldsMut {
                exit_balance_to_consume: &mut state.exit_balance_to_consume,
                earliest_exit_epoch: &mut state.earliest_exit_epoch,
                consolidation_balance_to_consume: &mut state.consolidation_balance_to_consume,
                earliest_consolidation_epoch: &mut state.earliest_consolidation_epoch,
                pending_deposits: &mut state.pending_deposits,
                pending_partial_withdrawals: &mut state.pending_partial_withdrawals,
                pending_consolidations: &mut state.pending_consolidations,
            }),
            _ => Err(Error::IncorrectStateVariant),
        }
    }

    /// Build all caches (except the tree hash cache), if they need to be built.
    pub fn build_caches(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        self.build_all_committee_caches(spec)?;
        self.update_pubkey_cache()?;
        self.build_exit_cache(spec)?;
        self.build_total_active_balance_cache(spec)?;
        Ok(())
    }

    /// Build all committee caches, if they need to be built.
    pub fn build_all_committee_caches(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        self.build_committee_cache(RelativeEpoch::Previous, spec)?;
        self.build_committee_cache(RelativeEpoch::Current, spec)?;
        self.build_committee_cache(RelativeEpoch::Next, spec)?;
        Ok(())
    }

    /// Build the exit cache, if it needs to be built.
    pub fn build_exit_cache(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        if self.exit_cache().check_initialized().is_err() {
            *self.exit_cache_mut() = ExitCache::new(self.validators().iter(), spec)?;
        }
        Ok(())
    }

    /// Drop all caches on the state.
    pub fn drop_all_caches(&mut self) {
        for relative_epoch in [
            RelativeEpoch::Previous,
            RelativeEpoch::Current,
            RelativeEpoch::Next,
        ] {
            self.drop_committee_cache(relative_epoch);
        }
        *self.total_active_balance_mut() = None;
        *self.pubkey_cache_mut() = PubkeyCache::default();
        *self.exit_cache_mut() = ExitCache::default();
        *self.progressive_balances_cache_mut() = ProgressiveBalancesCache::default();
        *self.epoch_cache_mut() = EpochCache::default();
    }

    /// Returns `true` if the committee cache for `relative_epoch` is built and ready to use.
    pub fn committee_cache_is_initialized(&self, relative_epoch: RelativeEpoch) -> bool {
        let i = Self::committee_cache_index(relative_epoch);

        self.committee_caches()
            .get(i)
            .map_or(false, |cache| {
                cache.is_initialized_at(relative_epoch.into_epoch(self.current_epoch()))
            })
    }

    /// Build an epoch cache, unless it is has already been built.
    pub fn build_committee_cache(
        &mut self,
        relative_epoch: RelativeEpoch,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let i = Self::committee_cache_index(relative_epoch);
        let is_initialized = self
            .committee_cache_at_index(i)?
            .is_initialized_at(relative_epoch.into_epoch(self.current_epoch()));

        if !is_initialized {
            self.force_build_committee_cache(relative_epoch, spec)?;
        }

        if self.total_active_balance().is_none() && relative_epoch == RelativeEpoch::Current {
            self.build_total_active_balance_cache(spec)?;
        }
        Ok(())
    }

    /// Always builds the requested committee cache, even if it is already initialized.
    pub fn force_build_committee_cache(
        &mut self,
        relative_epoch: RelativeEpoch,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let epoch = relative_epoch.into_epoch(self.current_epoch());
        let i = Self::committee_cache_index(relative_epoch);

        let committee_cache = Arc::new(CommitteeCache::initialized(self, epoch, spec)?);
        *self
            .committee_caches_mut()
            .get_mut(i)
            .ok_or(Error::CommitteeCachesOutOfBounds(i))? = committee_cache;
        Ok(())
    }

    /// Advances the cache for this state into the next epoch.
    ///
    /// This should be used if the `slot` of this state is advanced beyond an epoch boundary.
    ///
    /// Note: whilst this function will preserve already-built caches, it will not build any.
    pub fn advance_caches(&mut self) -> Result<(), Error> {
        self.committee_caches_mut().rotate_left(1);

        let next = Self::committee_cache_index(RelativeEpoch::Next);
        *self
            .committee_caches_mut()
            .get_mut(next)
            .ok_or(Error::CommitteeCachesOutOfBounds(next))? =
            Arc::new(CommitteeCache::default());
        Ok(())
    }

    fn committee_cache_index(relative_epoch: RelativeEpoch) -> usize {
        match relative_epoch {
            RelativeEpoch::Previous => 0,
            RelativeEpoch::Current => 1,
            RelativeEpoch::Next => 2,
        }
    }

    /// Get the committee cache for some `slot`.
    ///
    /// Return an error if the cache for the slot's epoch is not initialized.
    fn committee_cache_at_slot(&self, slot: Slot) -> Result<&Arc<CommitteeCache>, Error> {
        let epoch = slot.epoch(E::slots_per_epoch());
        let relative_epoch = RelativeEpoch::from_epoch(self.current_epoch(), epoch)?;
        self.committee_cache(relative_epoch)
    }

    /// Get the committee cache at a given index.
    fn committee_cache_at_index(&self, index: usize) -> Result<&Arc<CommitteeCache>, Error> {
        self.committee_caches()
            .get(index)
            .ok_or(Error::CommitteeCachesOutOfBounds(index))
    }

    /// Returns the cache for some `RelativeEpoch`. Returns an error if the cache has not been
    /// initialized.
    pub fn committee_cache(
        &self,
        relative_epoch: RelativeEpoch,
    ) -> Result<&Arc<CommitteeCache>, Error> {
        let i = Self::committee_cache_index(relative_epoch);
        let cache = self.committee_cache_at_index(i)?;

        if cache.is_initialized_at(relative_epoch.into_epoch(self.current_epoch())) {
            Ok(cache)
        } else {
            Err(Error::CommitteeCacheUninitialized(Some(relative_epoch)))
        }
    }

    /// Drops the cache, leaving a new, empty cache.
    fn drop_committee_cache(&mut self, relative_epoch: RelativeEpoch) {
        let i = Self::committee_cache_index(relative_epoch);
        if let Some(cache) = self.committee_caches_mut().get_mut(i) {
            *cache = Arc::new(CommitteeCache::default());
        }
    }

    /// Updates the pubkey cache, if required.
    ///
    /// Adds all `pubkeys` from the `validators` which are not already in the cache. Will
    /// never re-add a pubkey.
    pub fn update_pubkey_cache(&mut self) -> Result<(), Error> {
        let start_index = self.pubkey_cache().len();
        let validators = self.validators().to_vec();

        for (i, validator) in validators.iter().enumerate().skip(start_index) {
            let success = self.pubkey_cache_mut().insert(validator.pubkey, i);
            if !success {
                return Err(Error::PubkeyCacheInconsistent);
            }
        }

        Ok(())
    }

    /// Completely drops the `pubkey_cache`, replacing it with a new, empty cache.
    pub fn drop_pubkey_cache(&mut self) {
        *self.pubkey_cache_mut() = PubkeyCache::default()
    }

    /// Compute the tree hash root of the state, which is the canonical state root.
    ///
    /// Internal hash caches are maintained by the SSZ containers, so repeated calls after small
    /// mutations are cheaper than a full re-hash.
    pub fn update_tree_hash_cache(&mut self) -> Result<Hash256, Error> {
        Ok(self.tree_hash_root())
    }

    /// Compute the tree hash root of the state.
    pub fn canonical_root(&self) -> Result<Hash256, Error> {
        Ok(self.tree_hash_root())
    }

    /// Get the number of pending attestations (base fork only, used by epoch processing).
    pub fn num_pending_attestations(&self) -> usize {
        match self {
            BeaconState::Base(state) => {
                state.previous_epoch_attestations.len() + state.current_epoch_attestations.len()
            }
            _ => 0,
        }
    }
}

/// A mutable view over the electra accounting fields shared by post-electra variants.
pub struct ElectraFieldsMut<'a, E: EthSpec> {
    pub exit_balance_to_consume: &'a mut u64,
    pub earliest_exit_epoch: &'a mut Epoch,
    pub consolidation_balance_to_consume: &'a mut u64,
    pub earliest_consolidation_epoch: &'a mut Epoch,
    pub pending_deposits: &'a mut VariableList<PendingDeposit, E::PendingDepositsLimit>,
    pub pending_partial_withdrawals:
        &'a mut VariableList<PendingPartialWithdrawal, E::PendingPartialWithdrawalsLimit>,
    pub pending_consolidations:
        &'a mut VariableList<PendingConsolidation, E::PendingConsolidationsLimit>,
}

/// Allow the next epoch to be used in some index calculations, e.g. when setting the randao mix
/// for the next epoch during epoch processing.
#[derive(Clone, Copy, PartialEq)]
enum AllowNextEpoch {
    True,
    False,
}

impl AllowNextEpoch {
    fn upper_bound_of(self, current_epoch: Epoch) -> Result<Epoch, ArithError> {
        match self {
            AllowNextEpoch::True => current_epoch.safe_add(1),
            AllowNextEpoch::False => Ok(current_epoch),
        }
    }
}

fn xor_hashes(a: &Hash256, b: &Hash256) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = a[i] ^ b[i];
    }
    out
}
