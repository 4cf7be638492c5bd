//! KZG plumbing for the data-availability engine: building blob and data-column sidecars from
//! produced blocks, batch verification, and recovery of missing columns/blobs from any 50%+
//! column subset.

use crate::metrics;
use kzg::{
    CellIndex, CellRef, Error as KzgError, Kzg, KzgCommitment, KzgProof, BYTES_PER_CELL,
    CELLS_PER_EXT_BLOB,
};
use ssz_types::FixedVector;
use std::sync::Arc;
use types::{
    Blob, BlobSidecar, BlobSidecarList, DataColumn, DataColumnSidecar, DataColumnSidecarList,
    EthSpec, Hash256, KzgProofs, SignedBeaconBlock, SignedBeaconBlockHeader, Unsigned,
    VariableList,
};

#[derive(Debug)]
pub enum KzgUtilsError {
    Kzg(KzgError),
    BeaconState(types::BeaconStateError),
    SszTypes(ssz_types::Error),
    /// Fewer than half of the columns are held; recovery is impossible.
    InsufficientColumnsToReconstruct { have: usize, need: usize },
    /// The supplied sidecars do not all belong to the same block.
    MismatchedBlockRoot,
    MissingSidecar,
    InvalidBlobBytes,
    InvalidCellBytes,
}

impl From<KzgError> for KzgUtilsError {
    fn from(e: KzgError) -> Self {
        KzgUtilsError::Kzg(e)
    }
}

impl From<types::BeaconStateError> for KzgUtilsError {
    fn from(e: types::BeaconStateError) -> Self {
        KzgUtilsError::BeaconState(e)
    }
}

impl From<ssz_types::Error> for KzgUtilsError {
    fn from(e: ssz_types::Error) -> Self {
        KzgUtilsError::SszTypes(e)
    }
}

/// Converts a consensus blob (SSZ fixed vector) into the crypto library's blob type.
fn ssz_blob_to_crypto_blob<E: EthSpec>(blob: &Blob<E>) -> Result<kzg::Blob, KzgUtilsError> {
    kzg::Blob::from_bytes(blob.as_ref()).map_err(|_| KzgUtilsError::InvalidBlobBytes)
}

/// Validate a batch of `(blob, commitment, proof)` triplets (deneb/electra bundles: exactly one
/// proof per blob).
pub fn validate_blobs<E: EthSpec>(
    kzg: &Kzg,
    expected_kzg_commitments: &[KzgCommitment],
    blobs: Vec<&Blob<E>>,
    kzg_proofs: &[KzgProof],
) -> Result<(), KzgUtilsError> {
    let _timer = metrics::start_timer(&metrics::KZG_VERIFICATION_TIMES);

    let crypto_blobs = blobs
        .iter()
        .map(|blob| ssz_blob_to_crypto_blob::<E>(blob))
        .collect::<Result<Vec<_>, _>>()?;

    kzg.verify_blob_kzg_proof_batch(&crypto_blobs, expected_kzg_commitments, kzg_proofs)
        .map_err(Into::into)
}

/// Build the blob sidecars for a produced (or reconstructed) block, computing each sidecar's
/// commitment-specific inclusion proof into the block body.
pub fn build_blob_sidecars<E: EthSpec>(
    block: &SignedBeaconBlock<E>,
    blobs: Vec<Blob<E>>,
    proofs: KzgProofs<E>,
) -> Result<BlobSidecarList<E>, KzgUtilsError> {
    let signed_block_header = block.signed_block_header();
    let body = block.message().body();
    let commitments = body.blob_kzg_commitments()?;

    let mut sidecars = Vec::with_capacity(blobs.len());
    for (index, blob) in blobs.into_iter().enumerate() {
        let kzg_commitment = *commitments.get(index).ok_or(KzgUtilsError::MissingSidecar)?;
        let kzg_proof = *proofs.get(index).ok_or(KzgUtilsError::MissingSidecar)?;
        let kzg_commitment_inclusion_proof = body.kzg_commitment_merkle_proof(index)?;

        sidecars.push(Arc::new(BlobSidecar {
            index: index as u64,
            blob,
            kzg_commitment,
            kzg_proof,
            signed_block_header: signed_block_header.clone(),
            kzg_commitment_inclusion_proof,
        }));
    }

    Ok(sidecars)
}

/// Compute the data-column sidecars for a block from its blobs (fulu).
///
/// Each blob is extended into `CELLS_PER_EXT_BLOB` cells; cell `c` of every blob lands in
/// column `c`. Every column shares the same commitments, header and inclusion proof.
pub fn blobs_to_data_column_sidecars<E: EthSpec>(
    blobs: &[&Blob<E>],
    block: &SignedBeaconBlock<E>,
    kzg: &Kzg,
) -> Result<DataColumnSidecarList<E>, KzgUtilsError> {
    if blobs.is_empty() {
        return Ok(vec![]);
    }

    let kzg_commitments = block.message().body().blob_kzg_commitments()?.clone();
    let kzg_commitments_inclusion_proof =
        block.message().body().kzg_commitments_merkle_proof()?;
    let signed_block_header = block.signed_block_header();

    // One extended row of cells and proofs per blob.
    let mut rows = Vec::with_capacity(blobs.len());
    for blob in blobs {
        let crypto_blob = ssz_blob_to_crypto_blob::<E>(blob)?;
        rows.push(kzg.compute_cells_and_proofs(&crypto_blob)?);
    }

    build_data_column_sidecars::<E>(
        kzg_commitments,
        kzg_commitments_inclusion_proof,
        signed_block_header,
        rows,
    )
}

/// Transpose rows of `(cells, proofs)` (one per blob) into the per-column sidecar layout.
fn build_data_column_sidecars<E: EthSpec>(
    kzg_commitments: types::KzgCommitments<E>,
    kzg_commitments_inclusion_proof: FixedVector<
        Hash256,
        types::KzgCommitmentsInclusionProofDepth,
    >,
    signed_block_header: SignedBeaconBlockHeader,
    rows: Vec<kzg::CellsAndKzgProofs>,
) -> Result<DataColumnSidecarList<E>, KzgUtilsError> {
    let number_of_columns = E::NumberOfColumns::to_usize();
    let mut columns = vec![Vec::with_capacity(rows.len()); number_of_columns];
    let mut column_proofs = vec![Vec::with_capacity(rows.len()); number_of_columns];

    for (cells, proofs) in rows {
        for (column_index, cell) in cells.into_iter().enumerate() {
            let cell_bytes: Vec<u8> = cell.to_vec();
            let cell = types::Cell::<E>::new(cell_bytes)
                .map_err(|_| KzgUtilsError::InvalidCellBytes)?;
            columns
                .get_mut(column_index)
                .ok_or(KzgUtilsError::InvalidCellBytes)?
                .push(cell);
        }
        for (column_index, proof) in proofs.into_iter().enumerate() {
            column_proofs
                .get_mut(column_index)
                .ok_or(KzgUtilsError::InvalidCellBytes)?
                .push(proof);
        }
    }

    let sidecars = columns
        .into_iter()
        .zip(column_proofs)
        .enumerate()
        .map(|(index, (column, proofs))| {
            Arc::new(DataColumnSidecar {
                index: index as u64,
                column: DataColumn::<E>::new(column)?,
                kzg_commitments: kzg_commitments.clone(),
                kzg_proofs: VariableList::new(proofs)?,
                signed_block_header: signed_block_header.clone(),
                kzg_commitments_inclusion_proof: kzg_commitments_inclusion_proof.clone(),
            })
        })
        .collect::<Result<Vec<_>, ssz_types::Error>>()?;

    Ok(sidecars)
}

/// Reconstruct all data columns of a block from any subset holding at least half of them.
///
/// The recovered sidecars share `kzg_commitments`, `signed_block_header` and the inclusion
/// proof of an existing sidecar.
pub fn reconstruct_data_columns<E: EthSpec>(
    kzg: &Kzg,
    partial_columns: &[Arc<DataColumnSidecar<E>>],
) -> Result<DataColumnSidecarList<E>, KzgUtilsError> {
    let number_of_columns = E::NumberOfColumns::to_usize();
    let columns_needed = number_of_columns / 2;
    if partial_columns.len() < columns_needed {
        return Err(KzgUtilsError::InsufficientColumnsToReconstruct {
            have: partial_columns.len(),
            need: columns_needed,
        });
    }

    let first = partial_columns.first().ok_or(KzgUtilsError::MissingSidecar)?;
    let block_root = first.block_root();
    if partial_columns
        .iter()
        .any(|sidecar| sidecar.block_root() != block_root)
    {
        return Err(KzgUtilsError::MismatchedBlockRoot);
    }

    // Sort the column indices ascending, as the recovery function requires.
    let mut ordered: Vec<&Arc<DataColumnSidecar<E>>> = partial_columns.iter().collect();
    ordered.sort_by_key(|sidecar| sidecar.index);
    ordered.dedup_by_key(|sidecar| sidecar.index);

    let num_blobs = first.num_blobs();
    let cell_indices: Vec<CellIndex> = ordered.iter().map(|sidecar| sidecar.index).collect();

    // Recover row-by-row: one extended blob per commitment.
    let mut rows = Vec::with_capacity(num_blobs);
    for row in 0..num_blobs {
        let cells: Vec<CellRef<'_>> = ordered
            .iter()
            .map(|sidecar| {
                sidecar
                    .column
                    .get(row)
                    .map(|cell| cell.as_ref())
                    .and_then(|bytes: &[u8]| bytes.try_into().ok())
                    .ok_or(KzgUtilsError::MissingSidecar)
            })
            .collect::<Result<Vec<_>, _>>()?;

        rows.push(kzg.recover_cells_and_compute_kzg_proofs(&cell_indices, &cells)?);
    }

    metrics::inc_counter(&metrics::DATA_COLUMN_RECONSTRUCTIONS);

    build_data_column_sidecars::<E>(
        first.kzg_commitments.clone(),
        first.kzg_commitments_inclusion_proof.clone(),
        first.signed_block_header.clone(),
        rows,
    )
}

/// Reassemble the blobs of a block from at least half of its data columns.
///
/// The blob bytes are the concatenation of the systematic half of each extended row (the first
/// `NUMBER_OF_COLUMNS / 2` cells).
pub fn reconstruct_blobs<E: EthSpec>(
    kzg: &Kzg,
    data_columns: &[Arc<DataColumnSidecar<E>>],
) -> Result<Vec<Blob<E>>, KzgUtilsError> {
    let number_of_columns = E::NumberOfColumns::to_usize();
    let systematic_columns = number_of_columns / 2;

    // If any systematic column is missing, run full recovery first.
    let have_systematic = (0..systematic_columns as u64).all(|index| {
        data_columns.iter().any(|sidecar| sidecar.index == index)
    });
    let full_columns;
    let columns: &[Arc<DataColumnSidecar<E>>] = if have_systematic {
        data_columns
    } else {
        full_columns = reconstruct_data_columns(kzg, data_columns)?;
        &full_columns
    };

    let num_blobs = columns
        .first()
        .ok_or(KzgUtilsError::MissingSidecar)?
        .num_blobs();

    let mut blobs = Vec::with_capacity(num_blobs);
    for row in 0..num_blobs {
        let mut blob_bytes = Vec::with_capacity(systematic_columns * BYTES_PER_CELL);
        for column_index in 0..systematic_columns as u64 {
            let column = columns
                .iter()
                .find(|sidecar| sidecar.index == column_index)
                .ok_or(KzgUtilsError::MissingSidecar)?;
            let cell = column.column.get(row).ok_or(KzgUtilsError::MissingSidecar)?;
            blob_bytes.extend_from_slice(cell.as_ref());
        }

        blobs.push(Blob::<E>::new(blob_bytes).map_err(|_| KzgUtilsError::InvalidBlobBytes)?);
    }

    Ok(blobs)
}

/// Verify the cell proofs of a batch of data-column sidecars in one pairing check.
pub fn verify_data_column_sidecar_kzg_proofs<E: EthSpec>(
    kzg: &Kzg,
    data_columns: &[Arc<DataColumnSidecar<E>>],
) -> Result<(), KzgUtilsError> {
    let _timer = metrics::start_timer(&metrics::KZG_VERIFICATION_TIMES);

    let mut cells = Vec::new();
    let mut proofs = Vec::new();
    let mut cell_indices = Vec::new();
    let mut commitments = Vec::new();

    for sidecar in data_columns {
        for (row, cell) in sidecar.column.iter().enumerate() {
            let cell_ref: CellRef<'_> = cell
                .as_ref()
                .try_into()
                .map_err(|_| KzgUtilsError::InvalidCellBytes)?;
            cells.push(cell_ref);
            proofs.push(
                *sidecar
                    .kzg_proofs
                    .get(row)
                    .ok_or(KzgUtilsError::MissingSidecar)?,
            );
            cell_indices.push(sidecar.index);
            commitments.push(
                *sidecar
                    .kzg_commitments
                    .get(row)
                    .ok_or(KzgUtilsError::MissingSidecar)?,
            );
        }
    }

    kzg.verify_cell_proof_batch(&cells, &proofs, &cell_indices, &commitments)
        .map_err(Into::into)
}

/// The number of cell proofs a fulu blobs bundle must carry per blob.
pub fn expected_cell_proofs_per_blob() -> usize {
    CELLS_PER_EXT_BLOB
}

#[cfg(test)]
mod tests {
    use super::*;
    use bls::SignatureBytes;
    use kzg::{BYTES_PER_BLOB, BYTES_PER_FIELD_ELEMENT};
    use rand::seq::SliceRandom;
    use rand::Rng;
    use types::{BeaconBlock, ChainSpec, KzgCommitment, MainnetEthSpec};

    type E = MainnetEthSpec;

    fn random_blob<R: Rng>(rng: &mut R) -> Blob<E> {
        let mut bytes = vec![0u8; BYTES_PER_BLOB];
        for field_element in bytes.chunks_mut(BYTES_PER_FIELD_ELEMENT) {
            // Keep the most significant byte zero so each field element is canonical.
            rng.fill(&mut field_element[1..]);
        }
        Blob::<E>::new(bytes).unwrap()
    }

    /// A signed fulu block carrying commitments for the given blobs.
    fn block_with_commitments(
        kzg: &Kzg,
        blobs: &[Blob<E>],
        spec: &ChainSpec,
    ) -> SignedBeaconBlock<E> {
        let mut block = BeaconBlock::empty(spec);
        if let BeaconBlock::Fulu(ref mut inner) = block {
            for blob in blobs {
                let crypto_blob = ssz_blob_to_crypto_blob::<E>(blob).unwrap();
                let commitment: KzgCommitment = kzg.blob_to_kzg_commitment(&crypto_blob).unwrap();
                inner.body.blob_kzg_commitments.push(commitment).unwrap();
            }
        } else {
            panic!("expected a fulu block from the all-forks spec");
        }
        SignedBeaconBlock::from_block(block, SignatureBytes::empty())
    }

    fn generate_columns(num_blobs: usize) -> (Kzg, Vec<Blob<E>>, DataColumnSidecarList<E>) {
        let mut rng = rand::thread_rng();
        let kzg = Kzg::new_from_embedded_trusted_setup();
        let spec = ChainSpec::all_forks_at_genesis();

        let blobs: Vec<Blob<E>> = (0..num_blobs).map(|_| random_blob(&mut rng)).collect();
        let block = block_with_commitments(&kzg, &blobs, &spec);

        let blob_refs: Vec<&Blob<E>> = blobs.iter().collect();
        let columns = blobs_to_data_column_sidecars(&blob_refs, &block, &kzg).unwrap();
        assert_eq!(columns.len(), E::NumberOfColumns::to_usize());

        (kzg, blobs, columns)
    }

    #[test]
    fn blob_column_round_trip() {
        let (kzg, blobs, columns) = generate_columns(2);

        let recovered = reconstruct_blobs(&kzg, &columns).unwrap();
        assert_eq!(recovered, blobs);
    }

    #[test]
    fn reconstruction_from_random_half() {
        let (kzg, blobs, columns) = generate_columns(2);
        let mut rng = rand::thread_rng();

        let mut sampled = columns.clone();
        sampled.shuffle(&mut rng);
        sampled.truncate(E::NumberOfColumns::to_usize() / 2);

        let recovered = reconstruct_blobs(&kzg, &sampled).unwrap();
        assert_eq!(recovered, blobs);
    }

    #[test]
    fn reconstruction_below_threshold_fails() {
        let (kzg, _blobs, columns) = generate_columns(2);
        let mut rng = rand::thread_rng();

        let mut sampled = columns.clone();
        sampled.shuffle(&mut rng);
        sampled.truncate(54);

        // Drop the systematic prefix guarantee as well, to force actual recovery.
        assert!(matches!(
            reconstruct_data_columns(&kzg, &sampled),
            Err(KzgUtilsError::InsufficientColumnsToReconstruct { have: 54, need: 64 }),
        ));
    }

    #[test]
    fn recovered_columns_match_originals() {
        let (kzg, _blobs, columns) = generate_columns(1);

        // Keep the odd half only.
        let partial: Vec<_> = columns
            .iter()
            .filter(|sidecar| sidecar.index % 2 == 1)
            .cloned()
            .collect();

        let recovered = reconstruct_data_columns(&kzg, &partial).unwrap();
        assert_eq!(recovered.len(), columns.len());
        for (original, recovered) in columns.iter().zip(recovered.iter()) {
            assert_eq!(original.column, recovered.column);
            assert_eq!(original.kzg_commitments, recovered.kzg_commitments);
        }
    }

    #[test]
    fn column_proofs_verify() {
        let (kzg, _blobs, columns) = generate_columns(1);
        verify_data_column_sidecar_kzg_proofs(&kzg, &columns[..8]).unwrap();
    }

    #[test]
    fn blob_sidecar_inclusion_proofs_verify() {
        let mut rng = rand::thread_rng();
        let kzg = Kzg::new_from_embedded_trusted_setup();
        let spec = ChainSpec::all_forks_at_genesis();

        let blobs: Vec<Blob<E>> = (0..2).map(|_| random_blob(&mut rng)).collect();
        let block = block_with_commitments(&kzg, &blobs, &spec);

        let mut proofs = KzgProofs::<E>::empty();
        for blob in &blobs {
            let crypto_blob = ssz_blob_to_crypto_blob::<E>(blob).unwrap();
            let commitment = kzg.blob_to_kzg_commitment(&crypto_blob).unwrap();
            proofs
                .push(kzg.compute_blob_kzg_proof(&crypto_blob, commitment).unwrap())
                .unwrap();
        }

        let sidecars = build_blob_sidecars(&block, blobs, proofs).unwrap();
        assert_eq!(sidecars.len(), 2);

        use tree_hash::TreeHash;
        let body_root = block.message().body_root();
        for sidecar in &sidecars {
            let depth = sidecar.kzg_commitment_inclusion_proof.len();
            // The index below the body root is the generalized index with its depth bit
            // stripped.
            let index = sidecar.kzg_commitment_generalized_index().unwrap() as usize
                - (1 << depth);
            assert!(merkle_proof::verify_merkle_proof(
                sidecar.kzg_commitment.tree_hash_root(),
                &sidecar.kzg_commitment_inclusion_proof,
                depth,
                index,
                body_root,
            ));
        }
    }
}
