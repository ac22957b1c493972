use tracing::debug;

use crate::error::{AirdropError, Result};
use crate::hash::Hash;
use crate::merkle_tree::{build_merkle_tree_from_leaves, MerkleProof, MerkleTree, Tree};

/// Aggregation Merkle Tree Data Structure.
///
/// Starting from a set of "mini" Merkle trees built independently (usually by remote workers),
/// the Aggregation Merkle Tree stacks a top tree over their roots:
/// * Each leaf of the top tree is the root of a mini tree.
/// * Every mini tree except the last holds the same power-of-two number of leaves; the last may hold fewer.
///
/// Under those conditions the root and every proof are bit-identical to a single [`MerkleTree`]
/// built over the concatenated leaves, because the pairing of every level below the mini roots
/// never crosses a chunk boundary and an odd tail is promoted the same way in both shapes.
#[derive(Debug, Clone)]
pub struct AggregationMerkleTree {
    root: Hash,
    nodes: Vec<Vec<Hash>>,
    depth: usize,
    leaves: Vec<Hash>,
    chunk_size: usize,
    mini_trees: Vec<MerkleTree>,
}

impl Tree for AggregationMerkleTree {
    fn root(&self) -> &Hash {
        &self.root
    }

    fn depth(&self) -> &usize {
        &self.depth
    }

    fn leaves(&self) -> &[Hash] {
        &self.leaves
    }

    /// Levels of the top tree only; `nodes()[0]` holds the mini tree roots.
    fn nodes(&self) -> &[Vec<Hash>] {
        &self.nodes
    }

    fn generate_proof(&self, index: usize) -> Result<MerkleProof> {
        if index >= self.leaves.len() {
            return Err(AirdropError::IndexOutOfRange {
                index,
                len: self.leaves.len(),
            });
        }
        let (mini_tree_index, entry_index) = self.get_entry_location(index);

        // Build the partial proof, namely from the leaf to the root of the mini tree
        let mut proof = self.mini_trees[mini_tree_index].generate_proof(entry_index)?;

        // Build the rest of the proof, from the root of the mini tree to the root of the aggregation tree
        let mut current_index = mini_tree_index;
        for level in &self.nodes[..self.nodes.len() - 1] {
            let sibling_index = current_index ^ 1;
            if sibling_index < level.len() {
                proof.siblings.push(level[sibling_index]);
            }
            current_index /= 2;
        }

        // replace the root of the partial proof with the root of the aggregation tree
        proof.root = self.root;

        Ok(proof)
    }
}

impl AggregationMerkleTree {
    /// Builds an AggregationMerkleTree from a set of mini MerkleTrees.
    /// The leaves of the top tree are the roots of the mini MerkleTrees.
    pub fn new(mini_trees: Vec<MerkleTree>) -> Result<AggregationMerkleTree> {
        if mini_trees.is_empty() {
            return Err(AirdropError::EmptyLeafSet);
        }

        let chunk_size = mini_trees[0].len();
        if mini_trees.len() > 1 {
            if !chunk_size.is_power_of_two() {
                return Err(AirdropError::InconsistentMiniTrees(format!(
                    "mini tree size {} is not a power of two",
                    chunk_size
                )));
            }
            let (last, full) = mini_trees.split_last().ok_or(AirdropError::EmptyLeafSet)?;
            if let Some(position) = full.iter().position(|tree| tree.len() != chunk_size) {
                return Err(AirdropError::InconsistentMiniTrees(format!(
                    "mini tree {} holds {} leaves, expected {}",
                    position,
                    full[position].len(),
                    chunk_size
                )));
            }
            if last.len() > chunk_size {
                return Err(AirdropError::InconsistentMiniTrees(format!(
                    "last mini tree holds {} leaves, more than {}",
                    last.len(),
                    chunk_size
                )));
            }
        }

        // extract all the roots of the mini trees
        let roots = mini_trees
            .iter()
            .map(|tree| *tree.root())
            .collect::<Vec<Hash>>();

        let mut nodes = vec![];
        let root = build_merkle_tree_from_leaves(roots, &mut nodes);
        let depth = *mini_trees[0].depth() + nodes.len() - 1;

        let leaves = mini_trees
            .iter()
            .flat_map(|tree| tree.leaves().iter().copied())
            .collect::<Vec<Hash>>();

        debug!(
            mini_trees = mini_trees.len(),
            leaf_count = leaves.len(),
            depth,
            "built aggregation merkle tree"
        );

        Ok(AggregationMerkleTree {
            root,
            nodes,
            depth,
            leaves,
            chunk_size,
            mini_trees,
        })
    }

    pub fn mini_tree(&self, tree_index: usize) -> &MerkleTree {
        &self.mini_trees[tree_index]
    }

    pub fn mini_tree_count(&self) -> usize {
        self.mini_trees.len()
    }

    /// starting from a leaf index, returns the index of the mini tree in which the leaf is located and the index of the leaf within the mini tree
    fn get_entry_location(&self, index: usize) -> (usize, usize) {
        (index / self.chunk_size, index % self.chunk_size)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::keccak256;
    use crate::merkle_tree::LeafOrder;

    fn leaves(range: std::ops::Range<u64>) -> Vec<Hash> {
        range.map(|i| keccak256(&i.to_be_bytes())).collect()
    }

    fn mini_trees(total: u64, chunk: u64) -> Vec<MerkleTree> {
        (0..total)
            .step_by(chunk as usize)
            .map(|start| {
                MerkleTree::from_leaves(leaves(start..(start + chunk).min(total)), LeafOrder::AsGiven)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_aggregation_tree_compare_single_tree_result() {
        for (total, chunk) in [(32, 16), (37, 16), (17, 16), (5, 2), (9, 4), (3, 1), (12, 8)] {
            let aggregation_tree = AggregationMerkleTree::new(mini_trees(total, chunk)).unwrap();
            let single_tree = MerkleTree::from_leaves(leaves(0..total), LeafOrder::AsGiven).unwrap();

            assert_eq!(aggregation_tree.root(), single_tree.root(), "{}/{}", total, chunk);
            assert_eq!(aggregation_tree.depth(), single_tree.depth());
            assert_eq!(aggregation_tree.leaves(), single_tree.leaves());

            for index in 0..total as usize {
                let proof = aggregation_tree.generate_proof(index).unwrap();
                assert_eq!(proof, single_tree.generate_proof(index).unwrap());
                assert!(aggregation_tree.verify_proof(&proof));
            }
        }
    }

    #[test]
    fn test_aggregation_tree_random_entry() {
        let aggregation_tree = AggregationMerkleTree::new(mini_trees(32, 16)).unwrap();
        assert_eq!(aggregation_tree.mini_tree_count(), 2);

        let index = rand::random::<usize>() % 32;
        let proof = aggregation_tree.generate_proof(index).unwrap();

        // the leaf fetched from the aggregation tree should be the same as the one in the corresponding mini tree
        let mini_tree = aggregation_tree.mini_tree(index / 16);
        assert_eq!(proof.leaf, mini_tree.leaves()[index % 16]);
        assert_eq!(proof.siblings.len(), 5);
        assert!(aggregation_tree.verify_proof(&proof));
    }

    #[test]
    fn test_single_mini_tree() {
        let aggregation_tree = AggregationMerkleTree::new(mini_trees(5, 8)).unwrap();
        let single_tree = MerkleTree::from_leaves(leaves(0..5), LeafOrder::AsGiven).unwrap();
        assert_eq!(aggregation_tree.root(), single_tree.root());
        assert_eq!(*aggregation_tree.depth(), 3);
    }

    #[test]
    fn test_inconsistent_mini_trees() {
        assert_eq!(
            AggregationMerkleTree::new(vec![]).unwrap_err(),
            AirdropError::EmptyLeafSet
        );

        // first chunk is not a power of two
        let trees = vec![
            MerkleTree::from_leaves(leaves(0..3), LeafOrder::AsGiven).unwrap(),
            MerkleTree::from_leaves(leaves(3..6), LeafOrder::AsGiven).unwrap(),
        ];
        assert!(matches!(
            AggregationMerkleTree::new(trees),
            Err(AirdropError::InconsistentMiniTrees(_))
        ));

        // a short chunk that is not the last
        let trees = vec![
            MerkleTree::from_leaves(leaves(0..4), LeafOrder::AsGiven).unwrap(),
            MerkleTree::from_leaves(leaves(4..6), LeafOrder::AsGiven).unwrap(),
            MerkleTree::from_leaves(leaves(6..10), LeafOrder::AsGiven).unwrap(),
        ];
        assert!(AggregationMerkleTree::new(trees).is_err());

        // last chunk larger than the others
        let trees = vec![
            MerkleTree::from_leaves(leaves(0..2), LeafOrder::AsGiven).unwrap(),
            MerkleTree::from_leaves(leaves(2..6), LeafOrder::AsGiven).unwrap(),
        ];
        assert!(AggregationMerkleTree::new(trees).is_err());
    }

    #[test]
    fn test_aggregation_index_out_of_range() {
        let aggregation_tree = AggregationMerkleTree::new(mini_trees(20, 8)).unwrap();
        assert_eq!(
            aggregation_tree.generate_proof(20).unwrap_err(),
            AirdropError::IndexOutOfRange { index: 20, len: 20 }
        );
    }
}
