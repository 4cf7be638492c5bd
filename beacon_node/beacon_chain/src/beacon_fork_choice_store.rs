//! Defines the `BeaconForkChoiceStore` which provides the persistent storage and side-effects
//! (balance lookups, justification/finalization callbacks) for the `fork_choice` crate.

use fork_choice::ForkChoiceStore;
use proto_array::JustifiedBalances;
use ssz_derive::{Decode, Encode};
use std::collections::BTreeSet;
use std::sync::Arc;
use types::{BeaconBlockRef, BeaconState, Checkpoint, Epoch, EthSpec, Hash256, Slot};

/// Callback fired when a checkpoint advances.
pub type CheckpointCallback = Arc<dyn Fn(Checkpoint) + Send + Sync>;

#[derive(Debug)]
pub enum Error {
    UnableToReadSlot,
    /// The balances for the new justified checkpoint were in neither the cache nor the state
    /// archive.
    MissingBalancesForJustifiedCheckpoint(Checkpoint),
    BeaconStateError(types::BeaconStateError),
    Arith(safe_arith::ArithError),
}

impl From<types::BeaconStateError> for Error {
    fn from(e: types::BeaconStateError) -> Self {
        Error::BeaconStateError(e)
    }
}

impl From<safe_arith::ArithError> for Error {
    fn from(e: safe_arith::ArithError) -> Self {
        Error::Arith(e)
    }
}

/// The number of validator-balance sets cached.
const MAX_BALANCE_CACHE_SIZE: usize = 4;

/// Effective balances at an epoch boundary, keyed by the epoch-boundary block root.
///
/// Fork choice needs the justified state's balances whenever justification advances; states at
/// epoch boundaries are cached here as blocks are verified so that lookup rarely (never, in
/// practice) touches the state archive.
#[derive(Default)]
pub struct BalancesCache {
    items: Vec<CacheItem>,
}

struct CacheItem {
    block_root: Hash256,
    epoch: Epoch,
    balances: JustifiedBalances,
}

impl BalancesCache {
    /// Inspect the given `state`: if it is at an epoch boundary, cache its balances keyed by
    /// the boundary block root.
    pub fn process_state<E: EthSpec>(
        &mut self,
        block_root: Hash256,
        state: &BeaconState<E>,
    ) -> Result<(), Error> {
        let epoch = state.current_epoch();
        let epoch_boundary_slot = epoch.start_slot(E::slots_per_epoch());
        let epoch_boundary_root = if epoch_boundary_slot == state.slot() {
            block_root
        } else {
            // The block root at the epoch boundary is the checkpoint root for this epoch.
            *state.get_block_root(epoch_boundary_slot)?
        };

        if self.position(epoch_boundary_root, epoch).is_none() {
            let balances = JustifiedBalances::from_justified_state(state)?;
            self.items.push(CacheItem {
                block_root: epoch_boundary_root,
                epoch,
                balances,
            });
            if self.items.len() > MAX_BALANCE_CACHE_SIZE {
                self.items.remove(0);
            }
        }

        Ok(())
    }

    fn position(&self, block_root: Hash256, epoch: Epoch) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.block_root == block_root && item.epoch == epoch)
    }

    /// Take the balances for the given checkpoint, if cached.
    pub fn get(&mut self, block_root: Hash256, epoch: Epoch) -> Option<JustifiedBalances> {
        let position = self.position(block_root, epoch)?;
        Some(self.items.remove(position).balances)
    }
}

/// Implements `fork_choice::ForkChoiceStore` with balance caching and checkpoint callbacks.
pub struct BeaconForkChoiceStore<E: EthSpec> {
    time: Slot,
    finalized_checkpoint: Checkpoint,
    justified_checkpoint: Checkpoint,
    justified_balances: JustifiedBalances,
    unrealized_justified_checkpoint: Checkpoint,
    unrealized_finalized_checkpoint: Checkpoint,
    proposer_boost_root: Hash256,
    equivocating_indices: BTreeSet<u64>,
    balances_cache: BalancesCache,
    /// Fired whenever the justified checkpoint advances.
    on_justified: Option<CheckpointCallback>,
    /// Fired whenever the finalized checkpoint advances.
    on_finalized: Option<CheckpointCallback>,
    _phantom: std::marker::PhantomData<E>,
}

impl<E: EthSpec> BeaconForkChoiceStore<E> {
    /// Initializes `Self` from the anchor block and state, as per the spec's
    /// `get_forkchoice_store`.
    pub fn get_forkchoice_store(
        anchor_block_root: Hash256,
        anchor_state: &BeaconState<E>,
    ) -> Result<Self, Error> {
        let anchor_checkpoint = Checkpoint {
            epoch: anchor_state.current_epoch(),
            root: anchor_block_root,
        };
        let justified_balances = JustifiedBalances::from_justified_state(anchor_state)?;

        Ok(Self {
            time: anchor_state.slot(),
            justified_checkpoint: anchor_checkpoint,
            justified_balances,
            finalized_checkpoint: anchor_checkpoint,
            unrealized_justified_checkpoint: anchor_checkpoint,
            unrealized_finalized_checkpoint: anchor_checkpoint,
            proposer_boost_root: Hash256::zero(),
            equivocating_indices: BTreeSet::new(),
            balances_cache: BalancesCache::default(),
            on_justified: None,
            on_finalized: None,
            _phantom: std::marker::PhantomData,
        })
    }

    pub fn set_on_justified_callback(&mut self, callback: CheckpointCallback) {
        self.on_justified = Some(callback);
    }

    pub fn set_on_finalized_callback(&mut self, callback: CheckpointCallback) {
        self.on_finalized = Some(callback);
    }
}

impl<E: EthSpec> ForkChoiceStore<E> for BeaconForkChoiceStore<E> {
    type Error = Error;

    fn get_current_slot(&self) -> Slot {
        self.time
    }

    fn set_current_slot(&mut self, slot: Slot) {
        self.time = slot
    }

    fn on_verified_block(
        &mut self,
        _block: BeaconBlockRef<'_, E>,
        block_root: Hash256,
        state: &BeaconState<E>,
    ) -> Result<(), Self::Error> {
        self.balances_cache.process_state(block_root, state)
    }

    fn justified_checkpoint(&self) -> &Checkpoint {
        &self.justified_checkpoint
    }

    fn justified_balances(&self) -> &JustifiedBalances {
        &self.justified_balances
    }

    fn finalized_checkpoint(&self) -> &Checkpoint {
        &self.finalized_checkpoint
    }

    fn unrealized_justified_checkpoint(&self) -> &Checkpoint {
        &self.unrealized_justified_checkpoint
    }

    fn unrealized_finalized_checkpoint(&self) -> &Checkpoint {
        &self.unrealized_finalized_checkpoint
    }

    fn proposer_boost_root(&self) -> Hash256 {
        self.proposer_boost_root
    }

    fn set_finalized_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.finalized_checkpoint = checkpoint;
        if let Some(on_finalized) = &self.on_finalized {
            on_finalized(checkpoint);
        }
    }

    fn set_justified_checkpoint(&mut self, checkpoint: Checkpoint) -> Result<(), Error> {
        let balances = self
            .balances_cache
            .get(checkpoint.root, checkpoint.epoch)
            .ok_or(Error::MissingBalancesForJustifiedCheckpoint(checkpoint))?;

        self.justified_checkpoint = checkpoint;
        self.justified_balances = balances;

        if let Some(on_justified) = &self.on_justified {
            on_justified(checkpoint);
        }
        Ok(())
    }

    fn set_unrealized_justified_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.unrealized_justified_checkpoint = checkpoint;
    }

    fn set_unrealized_finalized_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.unrealized_finalized_checkpoint = checkpoint;
    }

    fn set_proposer_boost_root(&mut self, proposer_boost_root: Hash256) {
        self.proposer_boost_root = proposer_boost_root;
    }

    fn equivocating_indices(&self) -> &BTreeSet<u64> {
        &self.equivocating_indices
    }

    fn extend_equivocating_indices(&mut self, indices: impl IntoIterator<Item = u64>) {
        self.equivocating_indices.extend(indices);
    }
}

/// The SSZ snapshot of the store that is persisted alongside the proto array.
#[derive(Encode, Decode, Clone)]
pub struct PersistedForkChoiceStore {
    pub time: Slot,
    pub finalized_checkpoint: Checkpoint,
    pub justified_checkpoint: Checkpoint,
    pub justified_balances: Vec<u64>,
    pub unrealized_justified_checkpoint: Checkpoint,
    pub unrealized_finalized_checkpoint: Checkpoint,
    pub proposer_boost_root: Hash256,
    pub equivocating_indices: Vec<u64>,
}

impl<E: EthSpec> BeaconForkChoiceStore<E> {
    pub fn to_persisted(&self) -> PersistedForkChoiceStore {
        PersistedForkChoiceStore {
            time: self.time,
            finalized_checkpoint: self.finalized_checkpoint,
            justified_checkpoint: self.justified_checkpoint,
            justified_balances: self.justified_balances.effective_balances.clone(),
            unrealized_justified_checkpoint: self.unrealized_justified_checkpoint,
            unrealized_finalized_checkpoint: self.unrealized_finalized_checkpoint,
            proposer_boost_root: self.proposer_boost_root,
            equivocating_indices: self.equivocating_indices.iter().copied().collect(),
        }
    }

    pub fn from_persisted(persisted: PersistedForkChoiceStore) -> Result<Self, Error> {
        Ok(Self {
            time: persisted.time,
            finalized_checkpoint: persisted.finalized_checkpoint,
            justified_checkpoint: persisted.justified_checkpoint,
            justified_balances: JustifiedBalances::from_effective_balances(
                persisted.justified_balances,
            )?,
            unrealized_justified_checkpoint: persisted.unrealized_justified_checkpoint,
            unrealized_finalized_checkpoint: persisted.unrealized_finalized_checkpoint,
            proposer_boost_root: persisted.proposer_boost_root,
            equivocating_indices: persisted.equivocating_indices.into_iter().collect(),
            balances_cache: BalancesCache::default(),
            on_justified: None,
            on_finalized: None,
            _phantom: std::marker::PhantomData,
        })
    }
}
