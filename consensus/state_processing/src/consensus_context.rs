use crate::common::get_indexed_attestation;
use crate::per_block_processing::errors::{AttestationInvalid, BlockOperationError};
use std::collections::{hash_map::Entry, HashMap};
use tree_hash::TreeHash;
use types::{
    AttestationRef, BeaconState, BeaconStateError, ChainSpec, Epoch, EthSpec, Hash256,
    IndexedAttestation, SignedBeaconBlock, Slot,
};

/// Values computed during block processing that are expensive to recompute, memoized across the
/// verification stages of a single block.
#[derive(Debug, Clone)]
pub struct ConsensusContext<E: EthSpec> {
    /// Slot to act as an identifier/safeguard
    slot: Slot,
    /// Previous epoch of the `slot` precomputed for optimization purpose.
    previous_epoch: Option<Epoch>,
    /// Current epoch of the `slot` precomputed for optimization purpose.
    current_epoch: Option<Epoch>,
    /// Proposer index of the block at `slot`.
    proposer_index: Option<u64>,
    /// Block root of the block at `slot`.
    current_block_root: Option<Hash256>,
    /// Cache of indexed attestations constructed during block processing.
    indexed_attestations: HashMap<AttestationKey, IndexedAttestation<E>>,
}

/// Part of the attestation uniquely identifying its committee contents.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
struct AttestationKey {
    data_root: Hash256,
    committee_bits_root: Option<Hash256>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ContextError {
    BeaconState(BeaconStateError),
    SlotMismatch { slot: Slot, expected: Slot },
    EpochMismatch { epoch: Epoch, expected: Epoch },
}

impl From<BeaconStateError> for ContextError {
    fn from(e: BeaconStateError) -> Self {
        Self::BeaconState(e)
    }
}

impl<E: EthSpec> ConsensusContext<E> {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            previous_epoch: None,
            current_epoch: None,
            proposer_index: None,
            current_block_root: None,
            indexed_attestations: HashMap::new(),
        }
    }

    pub fn set_proposer_index(mut self, proposer_index: u64) -> Self {
        self.proposer_index = Some(proposer_index);
        self
    }

    /// Strict method for fetching the proposer index.
    ///
    /// Gets the proposer index for `self.slot` while ensuring that it matches `state.slot()`. This
    /// method should be used in block processing and almost everywhere the proposer index is
    /// required. If the slot check is too restrictive, see `get_proposer_index_from_epoch_state`.
    pub fn get_proposer_index(
        &mut self,
        state: &BeaconState<E>,
        spec: &ChainSpec,
    ) -> Result<u64, ContextError> {
        self.check_slot(state.slot())?;
        self.get_proposer_index_no_checks(state, spec)
    }

    fn get_proposer_index_no_checks(
        &mut self,
        state: &BeaconState<E>,
        spec: &ChainSpec,
    ) -> Result<u64, ContextError> {
        if let Some(proposer_index) = self.proposer_index {
            return Ok(proposer_index);
        }

        let proposer_index = state.get_beacon_proposer_index(self.slot, spec)? as u64;
        self.proposer_index = Some(proposer_index);
        Ok(proposer_index)
    }

    pub fn set_current_block_root(mut self, block_root: Hash256) -> Self {
        self.current_block_root = Some(block_root);
        self
    }

    pub fn get_current_block_root(
        &mut self,
        block: &SignedBeaconBlock<E>,
    ) -> Result<Hash256, ContextError> {
        self.check_slot(block.slot())?;

        if let Some(current_block_root) = self.current_block_root {
            return Ok(current_block_root);
        }

        let current_block_root = block.message().tree_hash_root();
        self.current_block_root = Some(current_block_root);
        Ok(current_block_root)
    }

    fn check_slot(&self, slot: Slot) -> Result<(), ContextError> {
        if slot == self.slot {
            Ok(())
        } else {
            Err(ContextError::SlotMismatch {
                slot,
                expected: self.slot,
            })
        }
    }

    /// Compute (or return from the cache) the indexed attestation for `attestation`.
    pub fn get_indexed_attestation<'a>(
        &'a mut self,
        state: &BeaconState<E>,
        attestation: AttestationRef<'_, E>,
    ) -> Result<&'a IndexedAttestation<E>, BlockOperationError<AttestationInvalid>> {
        let key = match attestation {
            AttestationRef::Base(att) => AttestationKey {
                data_root: att.data.tree_hash_root(),
                committee_bits_root: None,
            },
            AttestationRef::Electra(att) => AttestationKey {
                data_root: att.data.tree_hash_root(),
                committee_bits_root: Some(att.committee_bits.tree_hash_root()),
            },
        };

        match self.indexed_attestations.entry(key) {
            Entry::Occupied(occupied) => Ok(occupied.into_mut()),
            Entry::Vacant(vacant) => {
                let indexed = get_indexed_attestation(state, attestation)?;
                Ok(vacant.insert(indexed))
            }
        }
    }

    pub fn num_cached_indexed_attestations(&self) -> usize {
        self.indexed_attestations.len()
    }
}

impl<E: EthSpec> ConsensusContext<E> {
    pub fn previous_epoch(&mut self) -> Epoch {
        let slot = self.slot;
        *self
            .previous_epoch
            .get_or_insert_with(|| slot.epoch(E::slots_per_epoch()).saturating_sub(1u64))
    }

    pub fn current_epoch(&mut self) -> Epoch {
        let slot = self.slot;
        *self
            .current_epoch
            .get_or_insert_with(|| slot.epoch(E::slots_per_epoch()))
    }
}
