use tracing::debug;

use crate::error::{AirdropError, Result};
use crate::hash::{hash_pair, Hash};
use crate::leaf_encoder::Allocation;
use crate::verifier::verify_proof;

/// How leaves are arranged at the bottom level before the tree is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LeafOrder {
    /// Keep the input order.
    #[default]
    AsGiven,
    /// Sort leaves ascending by digest first.
    Sorted,
}

/// Inclusion proof for a single leaf.
///
/// `siblings` runs bottom-up. Levels where the path node was promoted without a
/// sibling contribute nothing, so the length is at most the tree depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf: Hash,
    pub siblings: Vec<Hash>,
    pub root: Hash,
}

/// Read access shared by every tree shape in this crate.
pub trait Tree {
    fn root(&self) -> &Hash;

    fn depth(&self) -> &usize;

    fn leaves(&self) -> &[Hash];

    fn nodes(&self) -> &[Vec<Hash>];

    fn generate_proof(&self, index: usize) -> Result<MerkleProof>;

    fn index_of(&self, leaf: &Hash) -> Option<usize> {
        self.leaves().iter().position(|candidate| candidate == leaf)
    }

    fn verify_proof(&self, proof: &MerkleProof) -> bool {
        proof.root == *self.root() && verify_proof(&proof.leaf, &proof.siblings, self.root())
    }
}

/// Binary Merkle tree over 32-byte leaves.
///
/// Adjacent nodes are paired left to right and combined with [`hash_pair`]. When a
/// level has an odd number of nodes the last one is promoted unchanged to the next
/// level. `nodes[0]` holds the leaves and the last level holds only the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    root: Hash,
    nodes: Vec<Vec<Hash>>,
    depth: usize,
}

impl Tree for MerkleTree {
    fn root(&self) -> &Hash {
        &self.root
    }

    fn depth(&self) -> &usize {
        &self.depth
    }

    fn leaves(&self) -> &[Hash] {
        &self.nodes[0]
    }

    fn nodes(&self) -> &[Vec<Hash>] {
        &self.nodes
    }

    fn generate_proof(&self, index: usize) -> Result<MerkleProof> {
        let leaves = self.leaves();
        if index >= leaves.len() {
            return Err(AirdropError::IndexOutOfRange {
                index,
                len: leaves.len(),
            });
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut current_index = index;
        for level in &self.nodes[..self.depth] {
            let sibling_index = current_index ^ 1;
            if sibling_index < level.len() {
                siblings.push(level[sibling_index]);
            }
            current_index /= 2;
        }

        Ok(MerkleProof {
            leaf: leaves[index],
            siblings,
            root: self.root,
        })
    }
}

impl MerkleTree {
    pub fn from_leaves(leaves: Vec<Hash>, order: LeafOrder) -> Result<Self> {
        if leaves.is_empty() {
            return Err(AirdropError::EmptyLeafSet);
        }

        let mut leaves = leaves;
        if order == LeafOrder::Sorted {
            leaves.sort_unstable();
        }
        let leaf_count = leaves.len();

        let mut nodes = vec![];
        let root = build_merkle_tree_from_leaves(leaves, &mut nodes);
        let depth = nodes.len() - 1;

        debug!(leaf_count, depth, "built merkle tree");

        Ok(MerkleTree { root, nodes, depth })
    }

    pub fn from_allocations(allocations: &[Allocation], order: LeafOrder) -> Result<Self> {
        let leaves = allocations
            .iter()
            .map(Allocation::leaf)
            .collect::<Result<Vec<Hash>>>()?;
        Self::from_leaves(leaves, order)
    }

    /// Rebuilds a tree from precomputed levels without rehashing.
    ///
    /// Only the shape is checked: every level must be half the size of the one
    /// below (rounded up) and the top level must be exactly `[root]`.
    pub fn from_params(root: Hash, nodes: Vec<Vec<Hash>>) -> Result<Self> {
        if nodes.is_empty() || nodes[0].is_empty() {
            return Err(AirdropError::EmptyLeafSet);
        }
        for (level, pair) in nodes.windows(2).enumerate() {
            let expected = pair[0].len().div_ceil(2);
            if pair[1].len() != expected {
                return Err(AirdropError::InconsistentMiniTrees(format!(
                    "level {} has {} nodes, expected {}",
                    level + 1,
                    pair[1].len(),
                    expected
                )));
            }
        }
        if nodes[nodes.len() - 1] != [root] {
            return Err(AirdropError::InconsistentMiniTrees(
                "top level does not match the root".to_string(),
            ));
        }

        let depth = nodes.len() - 1;
        Ok(MerkleTree { root, nodes, depth })
    }

    pub fn len(&self) -> usize {
        self.nodes[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].is_empty()
    }
}

/// Builds every level above `leaves` into `nodes` and returns the root.
///
/// `leaves` must not be empty.
pub(crate) fn build_merkle_tree_from_leaves(leaves: Vec<Hash>, nodes: &mut Vec<Vec<Hash>>) -> Hash {
    let mut level = leaves;
    while level.len() > 1 {
        let next_level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right),
                // odd tail: promoted as is
                _ => pair[0],
            })
            .collect::<Vec<Hash>>();
        nodes.push(level);
        level = next_level;
    }
    let root = level[0];
    nodes.push(level);
    root
}

#[cfg(test)]
mod test {
    use num_bigint::BigUint;

    use super::*;
    use crate::hash::keccak256;
    use crate::leaf_encoder::{leaf, Address};

    fn leaves(count: usize) -> Vec<Hash> {
        (0..count)
            .map(|i| keccak256(&(i as u64).to_be_bytes()))
            .collect()
    }

    #[test]
    fn test_empty_leaf_set() {
        assert_eq!(
            MerkleTree::from_leaves(vec![], LeafOrder::AsGiven).unwrap_err(),
            AirdropError::EmptyLeafSet
        );
    }

    #[test]
    fn test_single_leaf_tree() {
        let leaves = leaves(1);
        let tree = MerkleTree::from_leaves(leaves.clone(), LeafOrder::AsGiven).unwrap();

        assert_eq!(*tree.root(), leaves[0]);
        assert_eq!(*tree.depth(), 0);

        let proof = tree.generate_proof(0).unwrap();
        assert!(proof.siblings.is_empty());
        assert!(tree.verify_proof(&proof));
    }

    #[test]
    fn test_two_leaf_root() {
        let leaves = leaves(2);
        let tree = MerkleTree::from_leaves(leaves.clone(), LeafOrder::AsGiven).unwrap();
        assert_eq!(*tree.root(), hash_pair(&leaves[0], &leaves[1]));

        let proof = tree.generate_proof(1).unwrap();
        assert_eq!(proof.siblings, vec![leaves[0]]);
    }

    #[test]
    fn test_three_leaves_promote_last() {
        let leaves = leaves(3);
        let tree = MerkleTree::from_leaves(leaves.clone(), LeafOrder::AsGiven).unwrap();

        let left = hash_pair(&leaves[0], &leaves[1]);
        assert_eq!(tree.nodes()[1], vec![left, leaves[2]]);
        assert_eq!(*tree.root(), hash_pair(&left, &leaves[2]));
        assert_eq!(*tree.depth(), 2);

        // The promoted leaf has no sibling on the bottom level
        let proof = tree.generate_proof(2).unwrap();
        assert_eq!(proof.siblings, vec![left]);

        for index in 0..3 {
            let proof = tree.generate_proof(index).unwrap();
            assert!(tree.verify_proof(&proof), "leaf {} failed", index);
        }
    }

    #[test]
    fn test_every_proof_verifies_across_sizes() {
        for count in 1..=33 {
            let tree = MerkleTree::from_leaves(leaves(count), LeafOrder::AsGiven).unwrap();
            let max_len = (count as f64).log2().ceil() as usize;
            assert_eq!(*tree.depth(), max_len);

            for index in 0..count {
                let proof = tree.generate_proof(index).unwrap();
                assert!(proof.siblings.len() <= max_len);
                if count.is_power_of_two() {
                    assert_eq!(proof.siblings.len(), max_len);
                }
                assert!(tree.verify_proof(&proof), "size {} leaf {}", count, index);
            }
        }
    }

    #[test]
    fn test_index_out_of_range() {
        let tree = MerkleTree::from_leaves(leaves(4), LeafOrder::AsGiven).unwrap();
        assert_eq!(
            tree.generate_proof(4).unwrap_err(),
            AirdropError::IndexOutOfRange { index: 4, len: 4 }
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let tree_1 = MerkleTree::from_leaves(leaves(11), LeafOrder::AsGiven).unwrap();
        let tree_2 = MerkleTree::from_leaves(leaves(11), LeafOrder::AsGiven).unwrap();
        assert_eq!(tree_1, tree_2);
        for index in 0..11 {
            assert_eq!(
                tree_1.generate_proof(index).unwrap(),
                tree_2.generate_proof(index).unwrap()
            );
        }
    }

    #[test]
    fn test_sorted_order_is_input_independent() {
        let mut reversed = leaves(9);
        reversed.reverse();
        let sorted_1 = MerkleTree::from_leaves(leaves(9), LeafOrder::Sorted).unwrap();
        let sorted_2 = MerkleTree::from_leaves(reversed.clone(), LeafOrder::Sorted).unwrap();
        let as_given = MerkleTree::from_leaves(reversed, LeafOrder::AsGiven).unwrap();

        assert_eq!(sorted_1.root(), sorted_2.root());
        assert!(sorted_1.leaves().windows(2).all(|w| w[0] <= w[1]));
        assert_ne!(sorted_1.root(), as_given.root());
    }

    #[test]
    fn test_from_allocations_matches_leaf_encoder() {
        let allocations = (1..=5u8)
            .map(|i| Allocation::new(Address::new([i; 20]), BigUint::from(i as u32 * 100)))
            .collect::<Vec<_>>();
        let tree = MerkleTree::from_allocations(&allocations, LeafOrder::AsGiven).unwrap();

        for (i, allocation) in allocations.iter().enumerate() {
            assert_eq!(
                tree.leaves()[i],
                leaf(&allocation.recipient, &allocation.amount).unwrap()
            );
            assert_eq!(tree.index_of(&tree.leaves()[i]), Some(i));
        }
    }

    #[test]
    fn test_from_params() {
        let tree = MerkleTree::from_leaves(leaves(6), LeafOrder::AsGiven).unwrap();
        let rebuilt = MerkleTree::from_params(*tree.root(), tree.nodes().to_vec()).unwrap();
        assert_eq!(tree, rebuilt);

        let mut broken = tree.nodes().to_vec();
        broken[1].pop();
        assert!(MerkleTree::from_params(*tree.root(), broken).is_err());
        assert!(MerkleTree::from_params([0u8; 32], tree.nodes().to_vec()).is_err());
        assert!(MerkleTree::from_params(*tree.root(), vec![]).is_err());
    }
}
