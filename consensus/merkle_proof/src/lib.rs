use ethereum_hashing::{hash32_concat, ZERO_HASHES};
use fixed_bytes::{FixedBytesExtended, Hash256};
use safe_arith::ArithError;

const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, PartialEq, Clone)]
pub enum MerkleTreeError {
    // Trying to push in a leaf
    LeafReached,
    // No more space in the MerkleTree
    MerkleTreeFull,
    // MerkleTree is invalid
    Invalid,
    // Incorrect Depth provided
    DepthTooSmall,
    // Overflow occurred
    ArithError,
}

impl From<ArithError> for MerkleTreeError {
    fn from(_: ArithError) -> Self {
        MerkleTreeError::ArithError
    }
}

/// Right-sparse Merkle tree.
///
/// Efficiently represents a Merkle tree of fixed depth where only the first N
/// indices are populated by non-zero leaves (perfect for the deposit contract tree and for
/// generating inclusion proofs of block-body fields).
#[derive(Debug, PartialEq, Clone)]
pub enum MerkleTree {
    /// Finalized Node
    Leaf(Hash256),
    /// Internal node with hash, left subtree and right subtree.
    Node(Hash256, Box<Self>, Box<Self>),
    /// Zero subtree of a given depth.
    ///
    /// It represents a Merkle tree of 2^depth zero leaves.
    Zero(usize),
}

impl MerkleTree {
    /// Create a new Merkle tree from a list of leaves and a fixed depth.
    pub fn create(leaves: &[Hash256], depth: usize) -> Self {
        use MerkleTree::*;

        if leaves.is_empty() {
            return Zero(depth);
        }

        match depth {
            0 => {
                debug_assert_eq!(leaves.len(), 1);
                Leaf(leaves[0])
            }
            _ => {
                // Split leaves into left and right subtrees
                let subtree_capacity = 2usize.pow(depth as u32 - 1);
                let (left_leaves, right_leaves) = if leaves.len() <= subtree_capacity {
                    (leaves, &[] as &[Hash256])
                } else {
                    leaves.split_at(subtree_capacity)
                };

                let left_subtree = MerkleTree::create(left_leaves, depth - 1);
                let right_subtree = MerkleTree::create(right_leaves, depth - 1);
                let hash = Hash256::from_slice(&hash32_concat(
                    left_subtree.hash().as_slice(),
                    right_subtree.hash().as_slice(),
                ));

                Node(hash, Box::new(left_subtree), Box::new(right_subtree))
            }
        }
    }

    /// Retrieve the root hash of this Merkle tree.
    pub fn hash(&self) -> Hash256 {
        match *self {
            MerkleTree::Leaf(h) => h,
            MerkleTree::Node(h, _, _) => h,
            MerkleTree::Zero(depth) => zero_hash(depth),
        }
    }

    /// Get the left and right subtrees if they exist.
    pub fn left_and_right_branches(&self) -> Option<(&Self, &Self)> {
        match *self {
            MerkleTree::Leaf(_) | MerkleTree::Zero(0) => None,
            MerkleTree::Node(_, ref l, ref r) => Some((l, r)),
            MerkleTree::Zero(depth) => Some((&ZERO_NODES[depth - 1], &ZERO_NODES[depth - 1])),
        }
    }

    /// Is this Merkle tree a leaf? A zero subtree of depth 0 is a (zero) leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, MerkleTree::Leaf(_) | MerkleTree::Zero(0))
    }

    /// Return the leaf at `index` and a Merkle proof of its inclusion.
    ///
    /// The Merkle proof is in "bottom-up" order, starting with a leaf node
    /// and moving up the tree. Its length will be exactly equal to `depth`.
    pub fn generate_proof(
        &self,
        index: usize,
        depth: usize,
    ) -> Result<(Hash256, Vec<Hash256>), MerkleTreeError> {
        let mut proof = vec![];
        let mut current_node = self;
        let mut current_depth = depth;
        while current_depth > 0 {
            let ith_bit = (index >> (current_depth - 1)) & 0x01;
            // Note: unwrap is safe because leaves are only ever constructed at depth == 0.
            let (left, right) = current_node
                .left_and_right_branches()
                .ok_or(MerkleTreeError::Invalid)?;

            // Go right, include the left branch in the proof.
            if ith_bit == 1 {
                proof.push(left.hash());
                current_node = right;
            } else {
                proof.push(right.hash());
                current_node = left;
            }
            current_depth -= 1;
        }

        debug_assert_eq!(proof.len(), depth);
        debug_assert!(current_node.is_leaf());

        // Put proof in bottom-up order.
        proof.reverse();

        Ok((current_node.hash(), proof))
    }
}

/// Zero-subtrees of each depth, used to materialise the right-sparse regions lazily.
static ZERO_NODES: std::sync::LazyLock<Vec<MerkleTree>> =
    std::sync::LazyLock::new(|| (0..=MAX_TREE_DEPTH).map(MerkleTree::Zero).collect());

/// Verify a proof that `leaf` exists at `index` in a Merkle tree rooted at `root`.
///
/// The `branch` argument is the main component of the proof: it should be a list of internal
/// node hashes such that the root can be reconstructed (in bottom-up order).
pub fn verify_merkle_proof(
    leaf: Hash256,
    branch: &[Hash256],
    depth: usize,
    index: usize,
    root: Hash256,
) -> bool {
    if branch.len() == depth {
        merkle_root_from_branch(leaf, branch, depth, index) == root
    } else {
        false
    }
}

/// Compute a root hash from a leaf and a Merkle proof.
pub fn merkle_root_from_branch(
    leaf: Hash256,
    branch: &[Hash256],
    depth: usize,
    index: usize,
) -> Hash256 {
    assert_eq!(branch.len(), depth, "proof length should equal depth");

    let mut merkle_root = leaf.as_slice().to_vec();

    for (i, leaf) in branch.iter().enumerate().take(depth) {
        let ith_bit = (index >> i) & 0x01;
        if ith_bit == 1 {
            merkle_root = hash32_concat(leaf.as_slice(), &merkle_root)[..].to_vec();
        } else {
            let mut input = merkle_root;
            input.extend_from_slice(leaf.as_slice());
            merkle_root = ethereum_hashing::hash(&input);
        }
    }

    Hash256::from_slice(&merkle_root)
}

/// Zero-hash of the given tree depth, for padding incomplete trees.
pub fn zero_hash(depth: usize) -> Hash256 {
    if depth < MAX_TREE_DEPTH {
        Hash256::from_slice(&ZERO_HASHES[depth])
    } else {
        Hash256::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_concat(h1: Hash256, h2: Hash256) -> Hash256 {
        Hash256::from(hash32_concat(h1.as_slice(), h2.as_slice()))
    }

    #[test]
    fn generated_proofs_verify() {
        let leaves: Vec<Hash256> = (0..5).map(|i| Hash256::from([i as u8; 32])).collect();
        let depth = 3;
        let tree = MerkleTree::create(&leaves, depth);
        let root = tree.hash();

        for (index, leaf) in leaves.iter().enumerate() {
            let (proof_leaf, branch) = tree.generate_proof(index, depth).unwrap();
            assert_eq!(proof_leaf, *leaf);
            assert!(verify_merkle_proof(*leaf, &branch, depth, index, root));
        }

        // Proofs of the zero-padded region also verify.
        let (zero_leaf, branch) = tree.generate_proof(6, depth).unwrap();
        assert_eq!(zero_leaf, Hash256::zero());
        assert!(verify_merkle_proof(zero_leaf, &branch, depth, 6, root));
    }

    #[test]
    fn verify_small_example() {
        // Construct a small merkle tree manually and check that it's consistent with
        // the proof verification.
        let leaf_b00 = Hash256::from([0xAA; 32]);
        let leaf_b01 = Hash256::from([0xBB; 32]);
        let leaf_b10 = Hash256::from([0xCC; 32]);
        let leaf_b11 = Hash256::from([0xDD; 32]);

        let node_b0x = hash_concat(leaf_b00, leaf_b01);
        let node_b1x = hash_concat(leaf_b10, leaf_b11);

        let root = hash_concat(node_b0x, node_b1x);

        // Run some proofs
        assert!(verify_merkle_proof(
            leaf_b00,
            &[leaf_b01, node_b1x],
            2,
            0b00,
            root
        ));
        assert!(verify_merkle_proof(
            leaf_b01,
            &[leaf_b00, node_b1x],
            2,
            0b01,
            root
        ));
        assert!(verify_merkle_proof(
            leaf_b10,
            &[leaf_b11, node_b0x],
            2,
            0b10,
            root
        ));
        assert!(verify_merkle_proof(
            leaf_b11,
            &[leaf_b10, node_b0x],
            2,
            0b11,
            root
        ));

        // Ensure that incorrect proofs fail
        // Zero-length proof
        assert!(!verify_merkle_proof(leaf_b01, &[], 2, 0b01, root));
        // Proof in reverse order
        assert!(!verify_merkle_proof(
            leaf_b01,
            &[node_b1x, leaf_b00],
            2,
            0b01,
            root
        ));
        // Proof too short
        assert!(!verify_merkle_proof(leaf_b01, &[leaf_b00], 2, 0b01, root));
        // Wrong index
        assert!(!verify_merkle_proof(
            leaf_b01,
            &[leaf_b00, node_b1x],
            2,
            0b10,
            root
        ));
        // Wrong root
        assert!(!verify_merkle_proof(
            leaf_b01,
            &[leaf_b00, node_b1x],
            2,
            0b01,
            node_b1x
        ));
    }
}
