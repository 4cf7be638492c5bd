//! The unit that accumulates a block and its sidecar data as responses stream in, with
//! readiness predicates and a wake-up for waiters.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use types::{
    BlobSidecar, ColumnIndex, DataColumnSidecar, EthSpec, ForkName, Hash256, SignedBeaconBlock,
    Slot, Unsigned,
};

/// The kind of data a block at some fork requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataRequirement {
    /// Pre-deneb: the block alone suffices.
    PreData,
    /// Deneb/electra: one blob per commitment.
    Blobs { expected: usize },
    /// Fulu onwards: the sampled column subset.
    Columns { expected: Vec<ColumnIndex> },
}

impl DataRequirement {
    /// The requirement for a block at `fork_name` with `num_commitments`, sampling
    /// `sampling_columns` locally. Out-of-window blocks require nothing.
    pub fn new(
        fork_name: ForkName,
        num_commitments: usize,
        sampling_columns: &[ColumnIndex],
        da_out_of_range: bool,
    ) -> Self {
        if num_commitments == 0 || !fork_name.deneb_enabled() || da_out_of_range {
            DataRequirement::PreData
        } else if fork_name.fulu_enabled() {
            DataRequirement::Columns {
                expected: sampling_columns.to_vec(),
            }
        } else {
            DataRequirement::Blobs {
                expected: num_commitments,
            }
        }
    }
}

/// A block input progresses from "awaiting pieces" to "available"; waiters can block on the
/// transition via `wait_for_all_data`.
pub struct BlockInput<E: EthSpec> {
    slot: Slot,
    block_root: Hash256,
    block: Option<Arc<SignedBeaconBlock<E>>>,
    requirement: Option<DataRequirement>,
    blobs: BTreeMap<u64, Arc<BlobSidecar<E>>>,
    columns: BTreeMap<ColumnIndex, Arc<DataColumnSidecar<E>>>,
    /// Signalled `true` once `has_block_and_all_data` holds.
    complete_tx: watch::Sender<bool>,
    complete_rx: watch::Receiver<bool>,
}

impl<E: EthSpec> BlockInput<E> {
    pub fn new(slot: Slot, block_root: Hash256) -> Self {
        let (complete_tx, complete_rx) = watch::channel(false);
        Self {
            slot,
            block_root,
            block: None,
            requirement: None,
            blobs: BTreeMap::new(),
            columns: BTreeMap::new(),
            complete_tx,
            complete_rx,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn block_root(&self) -> Hash256 {
        self.block_root
    }

    pub fn block(&self) -> Option<&Arc<SignedBeaconBlock<E>>> {
        self.block.as_ref()
    }

    /// Register the block, fixing the data requirement from its commitment count.
    pub fn add_block(&mut self, block: Arc<SignedBeaconBlock<E>>, requirement: DataRequirement) {
        self.block = Some(block);
        self.requirement = Some(requirement);
        self.maybe_signal();
    }

    pub fn add_blob(&mut self, blob: Arc<BlobSidecar<E>>) {
        self.blobs.insert(blob.index, blob);
        self.maybe_signal();
    }

    pub fn add_column(&mut self, column: Arc<DataColumnSidecar<E>>) {
        self.columns.insert(column.index, column);
        self.maybe_signal();
    }

    pub fn has_block(&self) -> bool {
        self.block.is_some()
    }

    pub fn has_blob(&self, index: u64) -> bool {
        self.blobs.contains_key(&index)
    }

    pub fn has_column(&self, index: ColumnIndex) -> bool {
        self.columns.contains_key(&index)
    }

    /// Whether all required data (not necessarily the block) is held.
    ///
    /// Until the block arrives the requirement is unknown, so this is `false`: we cannot rule
    /// out that the block carries commitments.
    pub fn has_all_data(&self) -> bool {
        match &self.requirement {
            None => false,
            Some(DataRequirement::PreData) => true,
            Some(DataRequirement::Blobs { expected }) => self.blobs.len() >= *expected,
            Some(DataRequirement::Columns { expected }) => expected
                .iter()
                .all(|index| self.columns.contains_key(index)),
        }
    }

    pub fn has_block_and_all_data(&self) -> bool {
        self.has_block() && self.has_all_data()
    }

    /// The indices still missing, for shaping a follow-up request.
    pub fn missing_blob_indices(&self) -> Vec<u64> {
        match &self.requirement {
            Some(DataRequirement::Blobs { expected }) => (0..*expected as u64)
                .filter(|index| !self.blobs.contains_key(index))
                .collect(),
            _ => vec![],
        }
    }

    pub fn missing_column_indices(&self) -> Vec<ColumnIndex> {
        match &self.requirement {
            Some(DataRequirement::Columns { expected }) => expected
                .iter()
                .copied()
                .filter(|index| !self.columns.contains_key(index))
                .collect(),
            _ => vec![],
        }
    }

    pub fn blobs(&self) -> Vec<Arc<BlobSidecar<E>>> {
        self.blobs.values().cloned().collect()
    }

    pub fn columns(&self) -> Vec<Arc<DataColumnSidecar<E>>> {
        self.columns.values().cloned().collect()
    }

    /// A receiver that resolves `true` once the block and all its data are held. Await
    /// `changed()` on it (with a deadline and cancellation as the caller requires).
    pub fn wait_for_block_and_all_data(&self) -> watch::Receiver<bool> {
        self.complete_rx.clone()
    }

    fn maybe_signal(&mut self) {
        if self.has_block_and_all_data() {
            // Receivers observe the latest value; send only fails with no receivers, which is
            // not an error.
            let _ = self.complete_tx.send(true);
        }
    }

    /// The number of columns held, used by the reconstruction trigger.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// `true` once at least half the columns are held, enabling reconstruction instead of
    /// further requests.
    pub fn can_reconstruct_columns(&self) -> bool {
        self.columns.len() >= E::NumberOfColumns::to_usize() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{FixedBytesExtended, MainnetEthSpec};

    type E = MainnetEthSpec;

    #[test]
    fn pre_data_input_is_complete_with_block_alone() {
        let mut input = BlockInput::<E>::new(Slot::new(1), Hash256::zero());
        assert!(!input.has_all_data());

        let spec = types::ChainSpec::mainnet();
        let block = Arc::new(SignedBeaconBlock::from_block(
            types::BeaconBlock::empty(&spec),
            bls::SignatureBytes::empty(),
        ));
        input.add_block(block, DataRequirement::PreData);

        assert!(input.has_block_and_all_data());
        assert_eq!(*input.wait_for_block_and_all_data().borrow(), true);
    }

    #[test]
    fn blob_requirement_tracks_missing_indices() {
        let mut input = BlockInput::<E>::new(Slot::new(1), Hash256::zero());
        let spec = types::ChainSpec::mainnet();
        let block = Arc::new(SignedBeaconBlock::from_block(
            types::BeaconBlock::empty(&spec),
            bls::SignatureBytes::empty(),
        ));
        input.add_block(block, DataRequirement::Blobs { expected: 2 });

        assert!(!input.has_all_data());
        assert_eq!(input.missing_blob_indices(), vec![0, 1]);
    }
}
