use crate::{
    EthSpec, FixedVector, Hash256, KzgCommitments, KzgProofs, SignedBeaconBlockHeader, Slot,
    VariableList,
};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::typenum::{Unsigned, U4};
use std::sync::Arc;
use tree_hash_derive::TreeHash;

/// Container of the data that identifies an individual data column.
#[derive(
    Serialize, Deserialize, Encode, Decode, TreeHash, Copy, Clone, Debug, PartialEq, Eq, Hash,
)]
pub struct DataColumnIdentifier {
    pub block_root: Hash256,
    pub index: ColumnIndex,
}

pub type ColumnIndex = u64;
/// One cell per blob committed to by the block, each `BYTES_PER_CELL` long.
pub type Cell<E> = FixedVector<u8, <E as EthSpec>::BytesPerCell>;
pub type DataColumn<E> = VariableList<Cell<E>, <E as EthSpec>::MaxBlobCommitmentsPerBlock>;

/// The depth of the merkle proof from the `blob_kzg_commitments` list to the body root: the
/// list sits at gindex 27 of the (padded, 16-leaf) block body.
pub type KzgCommitmentsInclusionProofDepth = U4;

/// A single column of the 2D-extended blob matrix for one block, with the proofs binding every
/// cell to its blob's commitment (PeerDAS / fulu).
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode, TreeHash, Derivative)]
#[serde(bound = "E: EthSpec")]
#[derivative(PartialEq, Eq, Hash(bound = "E: EthSpec"))]
pub struct DataColumnSidecar<E: EthSpec> {
    #[serde(with = "serde_utils::quoted_u64")]
    pub index: ColumnIndex,
    /// All of the cells of the extended blob matrix belonging to this column, one per blob.
    pub column: DataColumn<E>,
    /// The commitments to all blobs in the block, identical in every column of the block.
    pub kzg_commitments: KzgCommitments<E>,
    /// The proofs binding `column[i]` to `kzg_commitments[i]` at this column index.
    pub kzg_proofs: KzgProofs<E>,
    pub signed_block_header: SignedBeaconBlockHeader,
    /// A proof of the `blob_kzg_commitments` list against the block body root, shared by every
    /// column of the block.
    pub kzg_commitments_inclusion_proof: FixedVector<Hash256, KzgCommitmentsInclusionProofDepth>,
}

pub type DataColumnSidecarList<E> = Vec<Arc<DataColumnSidecar<E>>>;

impl<E: EthSpec> DataColumnSidecar<E> {
    pub fn id(&self) -> DataColumnIdentifier {
        DataColumnIdentifier {
            block_root: self.block_root(),
            index: self.index,
        }
    }

    pub fn slot(&self) -> Slot {
        self.signed_block_header.message.slot
    }

    pub fn epoch(&self) -> crate::Epoch {
        self.slot().epoch(E::slots_per_epoch())
    }

    pub fn block_root(&self) -> Hash256 {
        self.signed_block_header.message.canonical_root()
    }

    pub fn block_parent_root(&self) -> Hash256 {
        self.signed_block_header.message.parent_root
    }

    pub fn block_proposer_index(&self) -> u64 {
        self.signed_block_header.message.proposer_index
    }

    /// The number of blobs (rows) this column spans.
    pub fn num_blobs(&self) -> usize {
        self.column.len()
    }

    pub fn number_of_columns() -> usize {
        E::NumberOfColumns::to_usize()
    }
}
