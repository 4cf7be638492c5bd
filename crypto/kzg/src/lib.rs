//! A wrapper over `c-kzg` (blob proofs) and `rust_eth_kzg` (cell proofs and recovery, for
//! PeerDAS) exposing the consensus-layer KZG operations against the embedded Ethereum
//! trusted setup.

mod kzg_commitment;
mod kzg_proof;

pub use kzg_commitment::{KzgCommitment, VERSIONED_HASH_VERSION_KZG};
pub use kzg_proof::KzgProof;

pub use c_kzg::{
    Blob, Bytes32, Bytes48, BYTES_PER_BLOB, BYTES_PER_COMMITMENT, BYTES_PER_FIELD_ELEMENT,
    BYTES_PER_PROOF, FIELD_ELEMENTS_PER_BLOB,
};
pub use rust_eth_kzg::{
    constants::{BYTES_PER_CELL, CELLS_PER_EXT_BLOB},
    Cell, CellIndex, CellRef,
};

pub type CellsAndKzgProofs = (Vec<Cell>, Vec<KzgProof>);

#[derive(Debug)]
pub enum Error {
    /// An error from the underlying `c-kzg` library.
    Kzg(c_kzg::Error),
    /// An error from the underlying `rust_eth_kzg` library.
    PeerDasKzg(String),
    /// A batch proof verification returned `false`.
    KzgVerificationFailed,
    /// The input had an inconsistent or unexpected length.
    InconsistentArrayLength(String),
}

impl From<c_kzg::Error> for Error {
    fn from(e: c_kzg::Error) -> Self {
        Error::Kzg(e)
    }
}

/// A wrapper over the KZG contexts for both the blob (EIP-4844) and the cell (EIP-7594)
/// operations.
///
/// Loaded once at startup and shared read-only thereafter.
pub struct Kzg {
    trusted_setup: &'static c_kzg::KzgSettings,
    context: rust_eth_kzg::DASContext,
}

impl Kzg {
    /// Instantiate against the Ethereum mainnet trusted setup embedded in the libraries.
    pub fn new_from_embedded_trusted_setup() -> Self {
        Self {
            trusted_setup: c_kzg::ethereum_kzg_settings(),
            context: rust_eth_kzg::DASContext::default(),
        }
    }

    fn context(&self) -> &rust_eth_kzg::DASContext {
        &self.context
    }

    /// Compute the kzg commitment for a given blob.
    pub fn blob_to_kzg_commitment(&self, blob: &Blob) -> Result<KzgCommitment, Error> {
        c_kzg::KzgCommitment::blob_to_kzg_commitment(blob, self.trusted_setup)
            .map(|commitment| KzgCommitment(commitment.to_bytes().into_inner()))
            .map_err(Into::into)
    }

    /// Compute the kzg proof for a given blob and its kzg commitment.
    pub fn compute_blob_kzg_proof(
        &self,
        blob: &Blob,
        kzg_commitment: KzgCommitment,
    ) -> Result<KzgProof, Error> {
        c_kzg::KzgProof::compute_blob_kzg_proof(
            blob,
            &Bytes48::from(<[u8; BYTES_PER_COMMITMENT]>::from(kzg_commitment)),
            self.trusted_setup,
        )
        .map(|proof| KzgProof(proof.to_bytes().into_inner()))
        .map_err(Into::into)
    }

    /// Verify a kzg proof for the given blob and commitment.
    pub fn verify_blob_kzg_proof(
        &self,
        blob: &Blob,
        kzg_commitment: KzgCommitment,
        kzg_proof: KzgProof,
    ) -> Result<(), Error> {
        if !c_kzg::KzgProof::verify_blob_kzg_proof(
            blob,
            &Bytes48::from(<[u8; BYTES_PER_COMMITMENT]>::from(kzg_commitment)),
            &Bytes48::from(<[u8; BYTES_PER_PROOF]>::from(kzg_proof)),
            self.trusted_setup,
        )? {
            Err(Error::KzgVerificationFailed)
        } else {
            Ok(())
        }
    }

    /// Verify a batch of blob-commitment-proof triplets in one pairing check.
    pub fn verify_blob_kzg_proof_batch(
        &self,
        blobs: &[Blob],
        kzg_commitments: &[KzgCommitment],
        kzg_proofs: &[KzgProof],
    ) -> Result<(), Error> {
        if blobs.len() != kzg_commitments.len() || blobs.len() != kzg_proofs.len() {
            return Err(Error::InconsistentArrayLength(format!(
                "{} blobs, {} commitments, {} proofs",
                blobs.len(),
                kzg_commitments.len(),
                kzg_proofs.len(),
            )));
        }

        let commitments_bytes = kzg_commitments
            .iter()
            .map(|comm| Bytes48::from(comm.0))
            .collect::<Vec<_>>();

        let proofs_bytes = kzg_proofs
            .iter()
            .map(|proof| Bytes48::from(proof.0))
            .collect::<Vec<_>>();

        if !c_kzg::KzgProof::verify_blob_kzg_proof_batch(
            blobs,
            &commitments_bytes,
            &proofs_bytes,
            self.trusted_setup,
        )? {
            Err(Error::KzgVerificationFailed)
        } else {
            Ok(())
        }
    }

    /// Compute the extended cells and their per-cell proofs for a blob (EIP-7594).
    pub fn compute_cells_and_proofs(&self, blob: &Blob) -> Result<CellsAndKzgProofs, Error> {
        let blob_bytes: &[u8; BYTES_PER_BLOB] = blob
            .as_ref()
            .try_into()
            .map_err(|_| Error::InconsistentArrayLength("blob has invalid length".to_string()))?;

        let (cells, proofs) = self
            .context()
            .compute_cells_and_kzg_proofs(blob_bytes)
            .map_err(|e| Error::PeerDasKzg(format!("{e:?}")))?;

        let proofs = proofs.iter().map(|proof| KzgProof(*proof)).collect();

        Ok((cells.to_vec(), proofs))
    }

    /// Recover all cells and proofs of an extended blob row from any subset of at least 50% of
    /// its cells.
    pub fn recover_cells_and_compute_kzg_proofs(
        &self,
        cell_ids: &[u64],
        cells: &[CellRef<'_>],
    ) -> Result<CellsAndKzgProofs, Error> {
        let (cells, proofs) = self
            .context()
            .recover_cells_and_kzg_proofs(cell_ids.to_vec(), cells.to_vec())
            .map_err(|e| Error::PeerDasKzg(format!("{e:?}")))?;

        let proofs = proofs.iter().map(|proof| KzgProof(*proof)).collect();

        Ok((cells.to_vec(), proofs))
    }

    /// Verify a batch of `(commitment, cell_index, cell, proof)` tuples.
    pub fn verify_cell_proof_batch(
        &self,
        cells: &[CellRef<'_>],
        kzg_proofs: &[KzgProof],
        cell_indices: &[CellIndex],
        kzg_commitments: &[KzgCommitment],
    ) -> Result<(), Error> {
        if cells.len() != kzg_proofs.len()
            || cells.len() != cell_indices.len()
            || cells.len() != kzg_commitments.len()
        {
            return Err(Error::InconsistentArrayLength(format!(
                "{} cells, {} proofs, {} indices, {} commitments",
                cells.len(),
                kzg_proofs.len(),
                cell_indices.len(),
                kzg_commitments.len(),
            )));
        }

        let commitments = kzg_commitments.iter().map(|c| c.0).collect::<Vec<_>>();
        let proofs = kzg_proofs.iter().map(|p| p.0).collect::<Vec<_>>();

        self.context()
            .verify_cell_kzg_proof_batch(
                commitments.iter().collect(),
                cell_indices.to_vec(),
                cells.to_vec(),
                proofs.iter().collect(),
            )
            .map_err(|e| Error::PeerDasKzg(format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_valid_blob<R: Rng>(rng: &mut R) -> Blob {
        let mut bytes = vec![0u8; BYTES_PER_BLOB];
        for field_element in bytes.chunks_mut(BYTES_PER_FIELD_ELEMENT) {
            // Leave the most significant byte zero so every field element is canonical.
            rng.fill(&mut field_element[1..]);
        }
        Blob::from_bytes(&bytes).expect("blob has the correct length")
    }

    #[test]
    fn blob_proof_round_trip() {
        let mut rng = rand::thread_rng();
        let kzg = Kzg::new_from_embedded_trusted_setup();

        let blob = random_valid_blob(&mut rng);
        let commitment = kzg.blob_to_kzg_commitment(&blob).unwrap();
        let proof = kzg.compute_blob_kzg_proof(&blob, commitment).unwrap();

        kzg.verify_blob_kzg_proof(&blob, commitment, proof).unwrap();
        kzg.verify_blob_kzg_proof_batch(&[blob], &[commitment], &[proof])
            .unwrap();
    }

    #[test]
    fn cell_recovery_from_half_the_cells() {
        let mut rng = rand::thread_rng();
        let kzg = Kzg::new_from_embedded_trusted_setup();

        let blob = random_valid_blob(&mut rng);
        let (cells, proofs) = kzg.compute_cells_and_proofs(&blob).unwrap();
        assert_eq!(cells.len(), CELLS_PER_EXT_BLOB);
        assert_eq!(proofs.len(), CELLS_PER_EXT_BLOB);

        // Keep only the odd-indexed half.
        let cell_ids: Vec<u64> = (0..CELLS_PER_EXT_BLOB as u64).filter(|i| i % 2 == 1).collect();
        let kept: Vec<CellRef> = cell_ids.iter().map(|i| &*cells[*i as usize]).collect();

        let (recovered, _) = kzg
            .recover_cells_and_compute_kzg_proofs(&cell_ids, &kept)
            .unwrap();
        assert_eq!(recovered.len(), CELLS_PER_EXT_BLOB);
        for (orig, rec) in cells.iter().zip(recovered.iter()) {
            assert_eq!(orig, rec);
        }
    }
}
