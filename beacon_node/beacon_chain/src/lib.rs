//! The core chain service: accepts blocks, sidecars and attestations from the outside world,
//! verifies them, and maintains the fork-choice-selected canonical head.

pub mod beacon_fork_choice_store;
pub mod beacon_proposer_cache;
pub mod block_verification;
pub mod chain_config;
pub mod data_availability_checker;
pub mod errors;
pub mod events;
pub mod execution_bid_pool;
pub mod kzg_utils;
mod metrics;
pub mod naive_aggregation_pool;
pub mod payload_attestation_pool;
pub mod shuffling_cache;
pub mod sync_contribution_pool;

pub use beacon_fork_choice_store::BeaconForkChoiceStore;
pub use beacon_proposer_cache::{BeaconProposerCache, ProposerPreparationData};
pub use block_verification::{
    BlockError, ConsensusVerifiedBlock, ExecutionPayloadError, SanityCheckedBlock,
};
pub use chain_config::ChainConfig;
pub use data_availability_checker::{
    Availability, AvailabilityCheckError, AvailableBlock, DataAvailabilityChecker,
};
pub use errors::BeaconChainError;
pub use events::EventHandler;
pub use naive_aggregation_pool::InsertOutcome;

use crate::execution_bid_pool::ExecutionPayloadBidPool;
use crate::naive_aggregation_pool::NaiveAggregationPool;
use crate::payload_attestation_pool::PayloadAttestationPool;
use crate::shuffling_cache::ShufflingCache;
use crate::sync_contribution_pool::SyncContributionAndProofPool;
use execution_layer::{EngineApiError, EngineStateMachine, ExecutionEngine};
use fork_choice::{
    AttestationFromBlock, DataAvailabilityStatus, ForkChoice, PayloadVerificationStatus,
};
use parking_lot::{Mutex, RwLock};
use proto_array::{ProposerHeadError, ProposerHeadInfo};
use slog::{debug, error, info, Logger};
use slot_clock::SlotClock;
use state_processing::{
    state_transition, BlockSignatureStrategy, ExternalBlockData,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use store::{BeaconStore, KeyValueStore};
use types::{
    AttestationRef, AttesterSlashingRef, BeaconState, ChainSpec, Epoch, EthSpec, Hash256,
    IndexedAttestationRef, SignedBeaconBlock, Slot,
};

type BeaconForkChoice<E> = ForkChoice<BeaconForkChoiceStore<E>, E>;

/// The result of offering a block to `process_block`.
#[derive(Debug)]
pub enum BlockProcessStatus {
    /// The block was fully imported and applied to fork choice.
    Imported { block_root: Hash256 },
    /// The block passed verification but is parked awaiting sidecar data.
    PendingAvailability { block_root: Hash256 },
}

/// The number of recent post-states retained in memory, keyed by block root.
const STATE_CACHE_SIZE: usize = 32;

pub struct BeaconChain<E: EthSpec, KV: KeyValueStore, S: SlotClock> {
    pub spec: Arc<ChainSpec>,
    pub config: ChainConfig,
    pub log: Logger,
    pub store: Arc<BeaconStore<E, KV>>,
    pub slot_clock: S,
    /// Serialized fork choice: `on_block`, `on_attestation`, `on_tick` and `get_head` are
    /// mutually exclusive behind this lock.
    pub fork_choice: RwLock<BeaconForkChoice<E>>,
    /// The block root most recently returned by `recompute_head`.
    canonical_head: RwLock<Hash256>,
    /// Recent post-states, keyed by block root. The parent lookup of almost every imported
    /// block hits this map.
    state_cache: Mutex<HashMap<Hash256, BeaconState<E>>>,
    /// Blocks that passed consensus verification and are awaiting sidecar data.
    pending_blocks: Mutex<HashMap<Hash256, ConsensusVerifiedBlock<E>>>,
    pub attestation_pool: Mutex<NaiveAggregationPool<E>>,
    pub sync_contribution_pool: Mutex<SyncContributionAndProofPool<E>>,
    pub payload_attestation_pool: Mutex<PayloadAttestationPool<E>>,
    pub execution_bid_pool: Mutex<ExecutionPayloadBidPool>,
    pub data_availability_checker: DataAvailabilityChecker<E>,
    pub shuffling_cache: Mutex<ShufflingCache>,
    pub beacon_proposer_cache: Mutex<BeaconProposerCache>,
    pub execution_engine: Option<Arc<dyn ExecutionEngine<E>>>,
    pub engine_state: Mutex<EngineStateMachine>,
    pub event_handler: Arc<EventHandler<E>>,
}

impl<E: EthSpec, KV: KeyValueStore, S: SlotClock> BeaconChain<E, KV, S> {
    /// Assemble a chain from its collaborators.
    ///
    /// The fork choice instance is expected to have been created via
    /// `ForkChoice::from_anchor` (or restored from disk) over a `BeaconForkChoiceStore` whose
    /// justification/finalization callbacks are wired to `event_handler` by the caller.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spec: Arc<ChainSpec>,
        config: ChainConfig,
        store: Arc<BeaconStore<E, KV>>,
        slot_clock: S,
        fork_choice: BeaconForkChoice<E>,
        data_availability_checker: DataAvailabilityChecker<E>,
        execution_engine: Option<Arc<dyn ExecutionEngine<E>>>,
        suggested_fee_recipient: types::Address,
        log: Logger,
    ) -> Self {
        let head_block_root = fork_choice.cached_fork_choice_view().head_block_root;
        let shuffling_cache_size = config.shuffling_cache_size;
        Self {
            spec,
            config,
            log: log.clone(),
            store,
            slot_clock,
            fork_choice: RwLock::new(fork_choice),
            canonical_head: RwLock::new(head_block_root),
            state_cache: Mutex::new(HashMap::new()),
            pending_blocks: Mutex::new(HashMap::new()),
            attestation_pool: Mutex::new(NaiveAggregationPool::default()),
            sync_contribution_pool: Mutex::new(SyncContributionAndProofPool::default()),
            payload_attestation_pool: Mutex::new(PayloadAttestationPool::default()),
            execution_bid_pool: Mutex::new(ExecutionPayloadBidPool::default()),
            data_availability_checker,
            shuffling_cache: Mutex::new(ShufflingCache::new(shuffling_cache_size)),
            beacon_proposer_cache: Mutex::new(BeaconProposerCache::new(suggested_fee_recipient)),
            execution_engine,
            engine_state: Mutex::new(EngineStateMachine::new(log.clone())),
            event_handler: Arc::new(EventHandler::new(log)),
        }
    }

    /// The wall-clock slot, or the genesis slot before genesis.
    pub fn current_slot(&self) -> Slot {
        self.slot_clock.now().unwrap_or(self.spec.genesis_slot)
    }

    pub fn current_epoch(&self) -> Epoch {
        self.current_slot().epoch(E::slots_per_epoch())
    }

    /// The head block root as of the last `recompute_head`.
    pub fn head_block_root(&self) -> Hash256 {
        *self.canonical_head.read()
    }

    /*
     * Import pipeline: Received -> SanityChecked.
     */

    /// Cheap structural checks performed before anything expensive: slot bounds, uniqueness,
    /// and parent presence.
    pub fn sanity_check_block(
        &self,
        block_root: Hash256,
        block: Arc<SignedBeaconBlock<E>>,
    ) -> Result<SanityCheckedBlock<E>, BlockError> {
        let fork_choice = self.fork_choice.read();

        if block.slot() == self.spec.genesis_slot {
            return Err(BlockError::GenesisBlock);
        }

        let present_slot = self.current_slot();
        if block.slot() > present_slot {
            return Err(BlockError::FutureSlot {
                present_slot,
                block_slot: block.slot(),
            });
        }

        let finalized_slot = fork_choice
            .finalized_checkpoint()
            .epoch
            .start_slot(E::slots_per_epoch());
        if block.slot() <= finalized_slot {
            return Err(BlockError::WouldRevertFinalizedSlot {
                block_slot: block.slot(),
                finalized_slot,
            });
        }

        if fork_choice.contains_block(&block_root) {
            return Err(BlockError::BlockIsAlreadyKnown(block_root));
        }

        let parent_block = fork_choice
            .get_block(&block.parent_root())
            .ok_or(BlockError::ParentUnknown {
                parent_root: block.parent_root(),
            })?;

        Ok(SanityCheckedBlock {
            block,
            block_root,
            parent_block,
        })
    }

    /*
     * Import pipeline: SanityChecked -> ConsensusVerified.
     */

    /// Apply the state transition with batched signature verification, producing the
    /// post-state.
    pub fn consensus_verify_block(
        &self,
        sanity_checked: SanityCheckedBlock<E>,
    ) -> Result<ConsensusVerifiedBlock<E>, BlockError> {
        let SanityCheckedBlock {
            block,
            block_root,
            parent_block,
        } = sanity_checked;

        let mut state = self.load_parent_state(&parent_block.root)?;

        // The engine verdict and the data-availability verdict are resolved by the later
        // pipeline stages; the transition itself runs under the optimistic assumption.
        state_transition(
            &mut state,
            &block,
            BlockSignatureStrategy::VerifyBulk,
            ExternalBlockData::assume_valid(),
            &self.spec,
        )?;

        let consensus_context = state_processing::ConsensusContext::new(block.slot())
            .set_current_block_root(block_root)
            .set_proposer_index(block.message().proposer_index());

        Ok(ConsensusVerifiedBlock {
            block,
            block_root,
            parent_block,
            post_state: state,
            consensus_context,
        })
    }

    /*
     * Import pipeline: ConsensusVerified -> ExecutionEngineNotified
     *     -> DataAvailabilityChecked -> ForkChoiceApplied -> Persisted -> Notified.
     */

    /// Run a block through the whole import pipeline.
    pub fn process_block(
        &self,
        block_root: Hash256,
        block: Arc<SignedBeaconBlock<E>>,
    ) -> Result<BlockProcessStatus, BlockError> {
        let _timer = metrics::start_timer(&metrics::BLOCK_PROCESSING_TIMES);

        let sanity_checked = self.sanity_check_block(block_root, block)?;
        let verified = self.consensus_verify_block(sanity_checked)?;

        // Notify the execution engine (post-merge blocks with a payload only).
        let payload_verification_status = self.notify_execution_engine(&verified.block)?;

        // Check data availability.
        let current_epoch = self.current_epoch();
        let availability = self.data_availability_checker.put_block(
            block_root,
            verified.block.clone(),
            current_epoch,
        )?;

        match availability {
            Availability::Available(available) => {
                let status = self.import_available_block(
                    verified,
                    *available,
                    payload_verification_status,
                )?;
                metrics::inc_counter(&metrics::BLOCK_PROCESSING_SUCCESSES);
                Ok(status)
            }
            Availability::MissingComponents(block_root) => {
                debug!(
                    self.log,
                    "Block awaiting sidecar data";
                    "block_root" => ?block_root,
                    "slot" => %verified.block.slot(),
                );
                self.pending_blocks.lock().insert(block_root, verified);
                Ok(BlockProcessStatus::PendingAvailability { block_root })
            }
        }
    }

    /// Offer a blob sidecar; completes the import of its block if it was the last missing
    /// piece.
    pub fn process_blob(
        &self,
        blob: Arc<types::BlobSidecar<E>>,
    ) -> Result<Option<BlockProcessStatus>, BlockError> {
        let block_root = blob.block_root();
        let availability =
            self.data_availability_checker
                .put_blob(block_root, blob, self.current_epoch())?;
        self.on_availability(block_root, availability)
    }

    /// Offer a data-column sidecar; completes the import of its block if its arrival (or the
    /// reconstruction it triggered) satisfied the sampling requirement.
    pub fn process_data_column(
        &self,
        column: Arc<types::DataColumnSidecar<E>>,
    ) -> Result<Option<BlockProcessStatus>, BlockError> {
        let block_root = column.block_root();
        let availability = self.data_availability_checker.put_data_column(
            block_root,
            column,
            self.current_epoch(),
        )?;
        self.on_availability(block_root, availability)
    }

    fn on_availability(
        &self,
        block_root: Hash256,
        availability: Availability<E>,
    ) -> Result<Option<BlockProcessStatus>, BlockError> {
        match availability {
            Availability::Available(available) => {
                let Some(verified) = self.pending_blocks.lock().remove(&block_root) else {
                    // Data complete but the block has not arrived (or was imported already).
                    return Ok(None);
                };
                // The engine was already notified when the block arrived; an optimistic
                // verdict is refined later via `on_execution_new_payload_result`.
                let payload_status = self.payload_status_from_fork_choice(&verified.block);
                let status =
                    self.import_available_block(verified, *available, payload_status)?;
                Ok(Some(status))
            }
            Availability::MissingComponents(_) => Ok(None),
        }
    }

    /// The remaining stages for a block whose data is complete: fork choice, persistence and
    /// notifications.
    fn import_available_block(
        &self,
        verified: ConsensusVerifiedBlock<E>,
        available: AvailableBlock<E>,
        payload_verification_status: PayloadVerificationStatus,
    ) -> Result<BlockProcessStatus, BlockError> {
        let ConsensusVerifiedBlock {
            block,
            block_root,
            parent_block: _,
            post_state,
            consensus_context: _,
        } = verified;

        let current_slot = self.current_slot();
        let block_delay = self.block_delay(block.slot());
        let data_availability_status = self.data_availability_status(&block);

        // Fork choice application. Only now does the block become an ancestor candidate for
        // attestations.
        {
            let mut fork_choice = self.fork_choice.write();
            fork_choice
                .on_block(
                    current_slot,
                    block.message(),
                    block_root,
                    block_delay,
                    &post_state,
                    payload_verification_status,
                    data_availability_status,
                    &self.spec,
                )
                .map_err(|e| BlockError::BeaconChainError(Box::new(e.into())))?;
        }

        // Persistence: idempotent on block root.
        self.store
            .put_block_and_sidecars(
                &block_root,
                &block,
                available.blobs.as_ref(),
                available.data_columns.as_ref(),
            )
            .map_err(|e| BlockError::BeaconChainError(Box::new(e.into())))?;

        // Persist the post-state at the configured epoch frequency.
        let state_slot = post_state.slot();
        if state_slot
            .as_u64()
            .checked_rem(self.config.epochs_per_state_persist * E::slots_per_epoch())
            == Some(0)
        {
            self.store
                .put_state(state_slot, &post_state)
                .map_err(|e| BlockError::BeaconChainError(Box::new(e.into())))?;
        }

        // Cache the post-state for descendant imports.
        {
            let mut cache = self.state_cache.lock();
            if cache.len() >= STATE_CACHE_SIZE {
                // Evict the state with the lowest slot.
                if let Some(lowest_root) = cache
                    .iter()
                    .min_by_key(|(_, state)| state.slot())
                    .map(|(root, _)| *root)
                {
                    cache.remove(&lowest_root);
                }
            }
            cache.insert(block_root, post_state);
        }

        // Notifications.
        let execution_optimistic = payload_verification_status.is_optimistic();
        self.event_handler
            .register_block(&block, block_root, execution_optimistic);
        if !execution_optimistic {
            self.event_handler
                .register_light_client_optimistic_update(block.slot(), block_root);
        }

        info!(
            self.log,
            "Block imported";
            "slot" => %block.slot(),
            "block_root" => ?block_root,
            "optimistic" => execution_optimistic,
        );

        Ok(BlockProcessStatus::Imported { block_root })
    }

    /// Notify the engine about a single block's payload, updating the engine state machine
    /// from the outcome.
    fn notify_execution_engine(
        &self,
        block: &SignedBeaconBlock<E>,
    ) -> Result<PayloadVerificationStatus, BlockError> {
        if block.message().body().execution_payload().is_err() {
            return Ok(PayloadVerificationStatus::Irrelevant);
        }

        let Some(engine) = &self.execution_engine else {
            // Optimistic sync without a local engine (e.g. the finalized portion of the
            // chain).
            return Ok(PayloadVerificationStatus::Optimistic);
        };

        let result = block_verification::notify_new_payload(engine.as_ref(), block);

        // Feed the engine state machine.
        match &result {
            Ok(PayloadVerificationStatus::Verified) => self
                .engine_state
                .lock()
                .on_payload_status(execution_layer::PayloadStatusV1Status::Valid),
            Ok(PayloadVerificationStatus::Optimistic) => self
                .engine_state
                .lock()
                .on_payload_status(execution_layer::PayloadStatusV1Status::Syncing),
            Err(BlockError::ExecutionPayloadError(ExecutionPayloadError::EngineError(
                EngineApiError::Transport(kind),
            ))) => self.engine_state.lock().on_transport_error(kind),
            _ => {}
        }

        // An INVALID verdict invalidates descendants in fork choice.
        if let Err(BlockError::ExecutionPayloadError(
            ExecutionPayloadError::RejectedByExecutionEngine { status },
        )) = &result
        {
            if let Some(latest_valid_hash) = status.latest_valid_hash {
                let op = proto_array::InvalidationOperation::InvalidateMany {
                    head_block_root: block.parent_root(),
                    always_invalidate_head: false,
                    latest_valid_ancestor: latest_valid_hash,
                };
                if let Err(e) = self.fork_choice.write().on_invalid_execution_payload(&op) {
                    error!(
                        self.log,
                        "Failed to process payload invalidation";
                        "error" => ?e,
                    );
                }
            }
        }

        result
    }

    /// A late engine verdict for an optimistically imported block.
    pub fn on_execution_new_payload_result(
        &self,
        block_root: Hash256,
        status: execution_layer::PayloadStatusV1,
    ) -> Result<(), BeaconChainError> {
        let mut fork_choice = self.fork_choice.write();
        match status.status {
            execution_layer::PayloadStatusV1Status::Valid => {
                fork_choice.on_valid_execution_payload(block_root)?;
            }
            execution_layer::PayloadStatusV1Status::Invalid
            | execution_layer::PayloadStatusV1Status::InvalidBlockHash => {
                let op = match status.latest_valid_hash {
                    Some(latest_valid_hash) => {
                        proto_array::InvalidationOperation::InvalidateMany {
                            head_block_root: block_root,
                            always_invalidate_head: true,
                            latest_valid_ancestor: latest_valid_hash,
                        }
                    }
                    None => proto_array::InvalidationOperation::InvalidateOne {
                        block_root,
                    },
                };
                fork_choice.on_invalid_execution_payload(&op)?;
            }
            execution_layer::PayloadStatusV1Status::Syncing
            | execution_layer::PayloadStatusV1Status::Accepted => {}
        }
        Ok(())
    }

    /*
     * Attestations and slashings.
     */

    /// Apply a verified attestation to fork choice and, if unaggregated, to the naive
    /// aggregation pool.
    pub fn apply_attestation_to_fork_choice(
        &self,
        attestation: IndexedAttestationRef<'_, E>,
        is_from_block: AttestationFromBlock,
    ) -> Result<(), BeaconChainError> {
        self.fork_choice
            .write()
            .on_attestation(self.current_slot(), attestation, is_from_block)
            .map_err(Into::into)
    }

    /// Add a gossip-verified unaggregated attestation to the aggregation pool.
    pub fn add_to_naive_aggregation_pool(
        &self,
        attestation: AttestationRef<'_, E>,
    ) -> Result<InsertOutcome, naive_aggregation_pool::Error> {
        self.attestation_pool.lock().insert(attestation)
    }

    /// Feed an attester slashing into fork choice so the culprits stop contributing weight.
    pub fn process_attester_slashing(&self, slashing: AttesterSlashingRef<'_, E>) {
        self.fork_choice.write().on_attester_slashing(slashing);
    }

    /*
     * Head maintenance.
     */

    /// Re-run fork choice and update the cached head.
    pub fn recompute_head(&self) -> Result<Hash256, BeaconChainError> {
        let current_slot = self.current_slot();
        let new_head = self
            .fork_choice
            .write()
            .get_head(current_slot, &self.spec)?;

        let old_head = std::mem::replace(&mut *self.canonical_head.write(), new_head);
        if old_head != new_head {
            debug!(
                self.log,
                "New chain head";
                "old_head" => ?old_head,
                "new_head" => ?new_head,
            );
        }

        Ok(new_head)
    }

    /// The block to build on for a proposal at `current_slot`, possibly re-orging a weak,
    /// late head (deterministic in the current slot, head and votes).
    pub fn get_proposer_head(
        &self,
        current_slot: Slot,
    ) -> Result<ProposerHeadInfo, ProposerHeadError<fork_choice::Error<proto_array::Error>>> {
        let canonical_head = self.head_block_root();
        let (Some(re_org_head_threshold), Some(re_org_parent_threshold)) = (
            self.config.re_org_head_threshold,
            self.config.re_org_parent_threshold,
        ) else {
            return Err(ProposerHeadError::DoNotReOrg(
                proto_array::DoNotReOrg::ReOrgsDisabled,
            ));
        };

        self.fork_choice.read().get_proposer_head(
            current_slot,
            canonical_head,
            re_org_head_threshold,
            re_org_parent_threshold,
            &self.config.re_org_disallowed_offsets,
            self.config.re_org_max_epochs_since_finalization,
        )
    }

    /// Per-slot housekeeping, run at every slot boundary: advance fork choice time, prune
    /// pools and caches.
    pub fn per_slot_task(&self) -> Result<(), BeaconChainError> {
        let slot = self.current_slot();

        self.fork_choice.write().update_time(slot)?;

        self.attestation_pool.lock().prune(slot);
        self.sync_contribution_pool.lock().prune(slot);
        self.payload_attestation_pool.lock().prune(slot);
        self.execution_bid_pool.lock().prune(slot);
        self.beacon_proposer_cache
            .lock()
            .prune(slot.epoch(E::slots_per_epoch()));

        Ok(())
    }

    /// Prune fork choice and drop below-finalization states after finality advances.
    pub fn prune_after_finalization(&self) -> Result<(), BeaconChainError> {
        let finalized_epoch = {
            let mut fork_choice = self.fork_choice.write();
            fork_choice.prune()?;
            fork_choice.finalized_checkpoint().epoch
        };
        let finalized_slot = finalized_epoch.start_slot(E::slots_per_epoch());
        self.state_cache
            .lock()
            .retain(|_, state| state.slot() >= finalized_slot);
        self.pending_blocks
            .lock()
            .retain(|_, pending| pending.block.slot() >= finalized_slot);
        Ok(())
    }

    /*
     * Committee lookups through the shuffling cache.
     */

    /// The committee cache for `(epoch, decision_root)`, computed from `state` under
    /// single-flight control if missing: concurrent callers for the same shuffling block on
    /// the first caller's promise instead of recomputing.
    pub fn committee_cache_for(
        &self,
        shuffling_id: types::AttestationShufflingId,
        state: &BeaconState<E>,
    ) -> Result<Arc<types::CommitteeCache>, BeaconChainError> {
        use crate::shuffling_cache::ShufflingLookup;

        let lookup = self
            .shuffling_cache
            .lock()
            .lookup_or_promise(shuffling_id)?;

        match lookup {
            ShufflingLookup::Ready(cache) => Ok(cache),
            ShufflingLookup::WaitFor(receiver) => receiver
                .recv()
                .map_err(|_| shuffling_cache::Error::PromiseAbandoned.into()),
            ShufflingLookup::Compute(sender) => {
                let committee_cache = Arc::new(types::CommitteeCache::initialized::<E>(
                    state,
                    shuffling_id.shuffling_epoch,
                    &self.spec,
                )?);
                self.shuffling_cache
                    .lock()
                    .insert_committee_cache(shuffling_id, &committee_cache);
                sender.send(committee_cache.clone());
                Ok(committee_cache)
            }
        }
    }

    /// The attesting indices of an attestation, resolved through the shuffling cache.
    pub fn get_attesting_indices(
        &self,
        attestation: AttestationRef<'_, E>,
        shuffling_id: types::AttestationShufflingId,
        state: &BeaconState<E>,
    ) -> Result<Vec<u64>, BeaconChainError> {
        let committee_cache = self.committee_cache_for(shuffling_id, state)?;
        let data = attestation.data();

        match attestation {
            AttestationRef::Base(att) => {
                let committee = committee_cache
                    .get_beacon_committee(data.slot, data.index)
                    .ok_or(types::BeaconStateError::NoCommitteeFound(data.index))?;
                state_processing::common::attesting_indices_base::<E>(
                    &att.aggregation_bits,
                    &committee,
                )
                .map_err(|_| types::BeaconStateError::InvalidBitfield.into())
            }
            AttestationRef::Electra(att) => {
                let committees = committee_cache
                    .get_beacon_committees_at_slot(data.slot)
                    .map_err(BeaconChainError::BeaconStateError)?;
                state_processing::common::attesting_indices_electra::<E>(
                    &att.aggregation_bits,
                    &att.committee_bits,
                    &committees,
                )
                .map_err(|_| types::BeaconStateError::InvalidBitfield.into())
            }
        }
    }

    /*
     * Helpers.
     */

    fn load_parent_state(&self, parent_root: &Hash256) -> Result<BeaconState<E>, BlockError> {
        if let Some(state) = self.state_cache.lock().get(parent_root) {
            return Ok(state.clone());
        }

        // Fall back to the state archive via the parent block's slot.
        let parent_block = self
            .fork_choice
            .read()
            .get_block(parent_root)
            .ok_or(BlockError::ParentUnknown {
                parent_root: *parent_root,
            })?;
        self.store
            .get_state(parent_block.slot)
            .map_err(BeaconChainError::from)?
            .ok_or_else(|| {
                BlockError::BeaconChainError(Box::new(BeaconChainError::MissingBeaconState(
                    parent_block.slot,
                )))
            })
    }

    /// How long after the start of its slot the block arrived.
    fn block_delay(&self, block_slot: Slot) -> Duration {
        self.slot_clock
            .start_of(block_slot)
            .and_then(|slot_start| {
                self.slot_clock
                    .now_duration()
                    .map(|now| now.saturating_sub(slot_start))
            })
            // An unknown delay must never count as timely.
            .unwrap_or_else(|| Duration::from_secs(self.spec.seconds_per_slot))
    }

    fn data_availability_status(&self, block: &SignedBeaconBlock<E>) -> DataAvailabilityStatus {
        if block.num_expected_blobs() == 0 {
            DataAvailabilityStatus::PreData
        } else if block_verification::is_da_out_of_range(
            &self.spec,
            block.epoch(),
            self.current_epoch(),
        ) {
            DataAvailabilityStatus::OutOfRange
        } else {
            DataAvailabilityStatus::Available
        }
    }

    fn payload_status_from_fork_choice(
        &self,
        block: &SignedBeaconBlock<E>,
    ) -> PayloadVerificationStatus {
        if block.message().body().execution_payload().is_err() {
            PayloadVerificationStatus::Irrelevant
        } else {
            // The verdict recorded when the engine was notified; optimistic when unknown.
            match self
                .fork_choice
                .read()
                .get_block_execution_status(&block.canonical_root())
            {
                Some(status) if status.is_valid_and_post_bellatrix() => {
                    PayloadVerificationStatus::Verified
                }
                _ => PayloadVerificationStatus::Optimistic,
            }
        }
    }
}
