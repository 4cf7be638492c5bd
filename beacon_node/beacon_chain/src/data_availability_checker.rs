//! Tracks the blocks whose sidecar data has not yet fully arrived, verifies sidecars against
//! their block, and resolves blocks to "available" once every required component is held.

use crate::kzg_utils::{
    self, reconstruct_data_columns, validate_blobs, verify_data_column_sidecar_kzg_proofs,
    KzgUtilsError,
};
use kzg::{Kzg, KzgProof};
use lru::LruCache;
use merkle_proof::verify_merkle_proof;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tree_hash::TreeHash;
use types::{
    BlobSidecar, BlobSidecarList, ChainSpec, ColumnIndex, DataColumnSidecar,
    DataColumnSidecarList, Epoch, EthSpec, ForkName, Hash256, SignedBeaconBlock, Slot, Unsigned,
};

/// The number of blocks whose pending components are retained.
pub const AVAILABILITY_CACHE_SIZE: usize = 64;

#[derive(Debug)]
pub enum AvailabilityCheckError {
    Kzg(KzgUtilsError),
    /// The sidecar's inclusion proof against the block body root failed.
    InvalidInclusionProof {
        block_root: Hash256,
        index: u64,
    },
    /// The sidecar does not belong to the block it was submitted for.
    SidecarBlockRootMismatch {
        expected: Hash256,
        found: Hash256,
    },
    /// The sidecar index exceeds the block's commitment count.
    InvalidSidecarIndex(u64),
    /// The block's commitments do not match the sidecars'.
    KzgCommitmentMismatch {
        index: u64,
    },
    /// A block was made available without passing the availability check.
    Internal(String),
}

impl From<KzgUtilsError> for AvailabilityCheckError {
    fn from(e: KzgUtilsError) -> Self {
        AvailabilityCheckError::Kzg(e)
    }
}

/// The data requirement applied to a block at import time.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockImportRequirement {
    /// The block predates sidecar data (or carries no commitments).
    None,
    /// All blob sidecars, one per commitment (deneb, electra).
    AllBlobs,
    /// At least the locally sampled column subset (fulu onwards).
    CustodyColumns(HashSet<ColumnIndex>),
}

/// A block for which every data requirement has been satisfied.
#[derive(Debug, Clone)]
pub struct AvailableBlock<E: EthSpec> {
    pub block_root: Hash256,
    pub block: Arc<SignedBeaconBlock<E>>,
    pub blobs: Option<BlobSidecarList<E>>,
    pub data_columns: Option<DataColumnSidecarList<E>>,
}

/// The outcome of offering a component to the checker.
#[derive(Debug)]
pub enum Availability<E: EthSpec> {
    /// The block and all its data are now held; it may proceed through import.
    Available(Box<AvailableBlock<E>>),
    /// More components are required.
    MissingComponents(Hash256),
}

/// Everything the checker has seen so far for one block root.
#[derive(Default)]
struct PendingComponents<E: EthSpec> {
    block: Option<Arc<SignedBeaconBlock<E>>>,
    /// Verified blob sidecars, sparse by index.
    verified_blobs: Vec<Option<Arc<BlobSidecar<E>>>>,
    /// Verified data columns, sparse by index.
    verified_data_columns: Vec<Option<Arc<DataColumnSidecar<E>>>>,
}

impl<E: EthSpec> PendingComponents<E> {
    fn has_block(&self) -> bool {
        self.block.is_some()
    }

    fn num_blobs(&self) -> usize {
        self.verified_blobs.iter().flatten().count()
    }

    fn num_columns(&self) -> usize {
        self.verified_data_columns.iter().flatten().count()
    }
}

pub struct DataAvailabilityChecker<E: EthSpec> {
    availability_cache: Mutex<LruCache<Hash256, PendingComponents<E>>>,
    kzg: Arc<Kzg>,
    /// The columns this node is responsible for sampling (fulu).
    sampling_columns: HashSet<ColumnIndex>,
    spec: Arc<ChainSpec>,
}

impl<E: EthSpec> DataAvailabilityChecker<E> {
    pub fn new(kzg: Arc<Kzg>, sampling_columns: HashSet<ColumnIndex>, spec: Arc<ChainSpec>) -> Self {
        Self {
            availability_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(AVAILABILITY_CACHE_SIZE).expect("cache size is non-zero"),
            )),
            kzg,
            sampling_columns,
            spec,
        }
    }

    /// The data requirement for a block, considering its fork, commitment count and the
    /// retention window.
    pub fn block_import_requirement(
        &self,
        block_epoch: Epoch,
        fork_name: ForkName,
        num_commitments: usize,
        current_epoch: Epoch,
    ) -> BlockImportRequirement {
        if num_commitments == 0 || !fork_name.deneb_enabled() {
            return BlockImportRequirement::None;
        }
        // Outside the retention window the data is no longer required.
        if self.spec.is_epoch_outside_da_window(block_epoch, current_epoch) {
            return BlockImportRequirement::None;
        }
        if fork_name.fulu_enabled() {
            BlockImportRequirement::CustodyColumns(self.sampling_columns.clone())
        } else {
            BlockImportRequirement::AllBlobs
        }
    }

    /// Verify a blob sidecar against its block header and KZG commitment, and store it.
    pub fn put_blob(
        &self,
        block_root: Hash256,
        blob: Arc<BlobSidecar<E>>,
        current_epoch: Epoch,
    ) -> Result<Availability<E>, AvailabilityCheckError> {
        self.verify_blob_sidecar(block_root, &blob)?;

        let mut cache = self.availability_cache.lock();
        let components = cache.get_or_insert_mut(block_root, PendingComponents::default);
        let index = blob.index as usize;
        if components.verified_blobs.len() <= index {
            components.verified_blobs.resize(index + 1, None);
        }
        components.verified_blobs[index] = Some(blob);

        self.check_availability(&mut cache, block_root, current_epoch)
    }

    /// Verify a data-column sidecar and store it, attempting reconstruction when at least half
    /// the columns for the block are held.
    pub fn put_data_column(
        &self,
        block_root: Hash256,
        column: Arc<DataColumnSidecar<E>>,
        current_epoch: Epoch,
    ) -> Result<Availability<E>, AvailabilityCheckError> {
        self.verify_data_column_sidecar(block_root, &column)?;

        let mut cache = self.availability_cache.lock();
        let components = cache.get_or_insert_mut(block_root, PendingComponents::default);
        let index = column.index as usize;
        if components.verified_data_columns.len() <= index {
            components.verified_data_columns.resize(index + 1, None);
        }
        components.verified_data_columns[index] = Some(column);

        // Attempt recovery once the 50% threshold is crossed and something is still missing.
        let number_of_columns = E::NumberOfColumns::to_usize();
        let held = components.num_columns();
        if held >= number_of_columns / 2 && held < number_of_columns {
            let partial: Vec<_> = components
                .verified_data_columns
                .iter()
                .flatten()
                .cloned()
                .collect();
            if let Ok(full) = reconstruct_data_columns(&self.kzg, &partial) {
                components.verified_data_columns = full.into_iter().map(Some).collect();
            }
        }

        self.check_availability(&mut cache, block_root, current_epoch)
    }

    /// Store the block itself, resolving availability if its data already arrived.
    pub fn put_block(
        &self,
        block_root: Hash256,
        block: Arc<SignedBeaconBlock<E>>,
        current_epoch: Epoch,
    ) -> Result<Availability<E>, AvailabilityCheckError> {
        let mut cache = self.availability_cache.lock();
        let components = cache.get_or_insert_mut(block_root, PendingComponents::default);
        components.block = Some(block);

        self.check_availability(&mut cache, block_root, current_epoch)
    }

    /// The indices of the blobs still missing for a block.
    pub fn missing_blob_indices(&self, block_root: &Hash256) -> Vec<u64> {
        let mut cache = self.availability_cache.lock();
        let Some(components) = cache.get_mut(block_root) else {
            return vec![];
        };
        let Some(block) = &components.block else {
            return vec![];
        };
        let num_expected = block.num_expected_blobs();
        (0..num_expected as u64)
            .filter(|index| {
                components
                    .verified_blobs
                    .get(*index as usize)
                    .map_or(true, Option::is_none)
            })
            .collect()
    }

    fn check_availability(
        &self,
        cache: &mut LruCache<Hash256, PendingComponents<E>>,
        block_root: Hash256,
        current_epoch: Epoch,
    ) -> Result<Availability<E>, AvailabilityCheckError> {
        let Some(components) = cache.get_mut(&block_root) else {
            return Ok(Availability::MissingComponents(block_root));
        };
        if !components.has_block() {
            return Ok(Availability::MissingComponents(block_root));
        }
        let block = components
            .block
            .clone()
            .ok_or_else(|| AvailabilityCheckError::Internal("block checked above".to_string()))?;

        let num_commitments = block.num_expected_blobs();
        let requirement = self.block_import_requirement(
            block.epoch(),
            block.fork_name_unchecked(),
            num_commitments,
            current_epoch,
        );

        let satisfied = match &requirement {
            BlockImportRequirement::None => true,
            BlockImportRequirement::AllBlobs => components.num_blobs() >= num_commitments,
            BlockImportRequirement::CustodyColumns(columns) => columns.iter().all(|index| {
                components
                    .verified_data_columns
                    .get(*index as usize)
                    .map_or(false, Option::is_some)
            }),
        };

        if !satisfied {
            return Ok(Availability::MissingComponents(block_root));
        }

        let blobs = matches!(requirement, BlockImportRequirement::AllBlobs).then(|| {
            components
                .verified_blobs
                .iter()
                .flatten()
                .cloned()
                .collect()
        });
        let data_columns = matches!(requirement, BlockImportRequirement::CustodyColumns(_))
            .then(|| {
                components
                    .verified_data_columns
                    .iter()
                    .flatten()
                    .cloned()
                    .collect()
            });

        cache.pop(&block_root);

        Ok(Availability::Available(Box::new(AvailableBlock {
            block_root,
            block,
            blobs,
            data_columns,
        })))
    }

    /// Consensus verification of a blob sidecar: header root, index bounds, inclusion proof
    /// into the body, and the KZG proof.
    fn verify_blob_sidecar(
        &self,
        block_root: Hash256,
        blob: &BlobSidecar<E>,
    ) -> Result<(), AvailabilityCheckError> {
        let sidecar_block_root = blob.block_root();
        if sidecar_block_root != block_root {
            return Err(AvailabilityCheckError::SidecarBlockRootMismatch {
                expected: block_root,
                found: sidecar_block_root,
            });
        }

        let depth = E::KzgCommitmentInclusionProofDepth::to_usize();
        let gindex = blob
            .kzg_commitment_generalized_index()
            .map_err(|_| AvailabilityCheckError::InvalidSidecarIndex(blob.index))?;
        let index_under_body = gindex as usize - (1 << depth);
        if !verify_merkle_proof(
            blob.kzg_commitment.tree_hash_root(),
            &blob.kzg_commitment_inclusion_proof,
            depth,
            index_under_body,
            blob.signed_block_header.message.body_root,
        ) {
            return Err(AvailabilityCheckError::InvalidInclusionProof {
                block_root,
                index: blob.index,
            });
        }

        validate_blobs::<E>(
            &self.kzg,
            &[blob.kzg_commitment],
            vec![&blob.blob],
            &[blob.kzg_proof],
        )?;

        Ok(())
    }

    /// Consensus verification of a data-column sidecar: header root, shared inclusion proof,
    /// and the batch of cell proofs.
    fn verify_data_column_sidecar(
        &self,
        block_root: Hash256,
        column: &Arc<DataColumnSidecar<E>>,
    ) -> Result<(), AvailabilityCheckError> {
        let sidecar_block_root = column.block_root();
        if sidecar_block_root != block_root {
            return Err(AvailabilityCheckError::SidecarBlockRootMismatch {
                expected: block_root,
                found: sidecar_block_root,
            });
        }
        if column.index >= E::NumberOfColumns::to_u64() {
            return Err(AvailabilityCheckError::InvalidSidecarIndex(column.index));
        }

        let depth = types::consts::deneb::KZG_COMMITMENTS_INCLUSION_PROOF_DEPTH;
        let index_under_body =
            types::consts::deneb::BLOB_KZG_COMMITMENTS_GINDEX as usize - (1 << depth);
        if !verify_merkle_proof(
            column.kzg_commitments.tree_hash_root(),
            &column.kzg_commitments_inclusion_proof,
            depth,
            index_under_body,
            column.signed_block_header.message.body_root,
        ) {
            return Err(AvailabilityCheckError::InvalidInclusionProof {
                block_root,
                index: column.index,
            });
        }

        verify_data_column_sidecar_kzg_proofs(&self.kzg, std::slice::from_ref(column))?;

        Ok(())
    }

    /// Build the blob sidecars for a locally produced block (deneb/electra bundles carry one
    /// proof per blob).
    pub fn compute_blob_sidecars(
        &self,
        block: &SignedBeaconBlock<E>,
        blobs: Vec<types::Blob<E>>,
        proofs: Vec<KzgProof>,
    ) -> Result<BlobSidecarList<E>, AvailabilityCheckError> {
        let proofs = types::KzgProofs::<E>::new(proofs)
            .map_err(|e| AvailabilityCheckError::Kzg(KzgUtilsError::SszTypes(e)))?;
        kzg_utils::build_blob_sidecars(block, blobs, proofs).map_err(Into::into)
    }

    /// Build the data-column sidecars for a locally produced block (fulu).
    pub fn compute_data_column_sidecars(
        &self,
        block: &SignedBeaconBlock<E>,
        blobs: &[types::Blob<E>],
    ) -> Result<DataColumnSidecarList<E>, AvailabilityCheckError> {
        let blob_refs: Vec<&types::Blob<E>> = blobs.iter().collect();
        kzg_utils::blobs_to_data_column_sidecars(&blob_refs, block, &self.kzg)
            .map_err(Into::into)
    }

    /// Reassemble blobs from held data columns, recovering missing columns if necessary.
    pub fn reconstruct_blobs(
        &self,
        data_columns: &[Arc<DataColumnSidecar<E>>],
    ) -> Result<Vec<types::Blob<E>>, AvailabilityCheckError> {
        kzg_utils::reconstruct_blobs(&self.kzg, data_columns).map_err(Into::into)
    }

    /// The slot below which data is no longer required to be available.
    pub fn data_availability_boundary(&self, current_epoch: Epoch) -> Slot {
        current_epoch
            .saturating_sub(self.spec.min_epochs_for_blob_sidecars_requests)
            .start_slot(E::slots_per_epoch())
    }
}
