//! Stateless proof verification.
//!
//! Nothing here touches a built tree: the root is always recomputed from the leaf
//! and the sibling path.

use num_bigint::BigUint;

use crate::error::{AirdropError, Result};
use crate::hash::{hash_pair, Hash};
use crate::leaf_encoder::{leaf, Address};

/// Folds `proof` over `leaf` bottom-up and returns the resulting root.
pub fn compute_root(leaf: &Hash, proof: &[Hash]) -> Hash {
    proof
        .iter()
        .fold(*leaf, |current, sibling| hash_pair(&current, sibling))
}

pub fn verify_proof(leaf: &Hash, proof: &[Hash], root: &Hash) -> bool {
    compute_root(leaf, proof) == *root
}

/// Recomputes the leaf for `(recipient, amount)` and checks it against `root`.
pub fn verify_allocation(
    recipient: &Address,
    amount: &BigUint,
    proof: &[Hash],
    root: &Hash,
) -> Result<Hash> {
    let leaf = leaf(recipient, amount)?;
    if verify_proof(&leaf, proof, root) {
        Ok(leaf)
    } else {
        Err(AirdropError::InvalidProof)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::leaf_encoder::Allocation;
    use crate::merkle_tree::{LeafOrder, MerkleTree, Tree};

    fn allocations(count: u8) -> Vec<Allocation> {
        (1..=count)
            .map(|i| Allocation::new(Address::new([i; 20]), BigUint::from(i as u64 * 1_000)))
            .collect()
    }

    #[test]
    fn test_round_trip_every_allocation() {
        let allocations = allocations(7);
        let tree = MerkleTree::from_allocations(&allocations, LeafOrder::AsGiven).unwrap();

        for (index, allocation) in allocations.iter().enumerate() {
            let proof = tree.generate_proof(index).unwrap();
            let leaf = verify_allocation(
                &allocation.recipient,
                &allocation.amount,
                &proof.siblings,
                tree.root(),
            )
            .unwrap();
            // generation side and verification side agree on the leaf bytes
            assert_eq!(leaf, tree.leaves()[index]);
        }
    }

    #[test]
    fn test_wrong_amount_fails() {
        let allocations = allocations(4);
        let tree = MerkleTree::from_allocations(&allocations, LeafOrder::AsGiven).unwrap();
        let proof = tree.generate_proof(2).unwrap();

        let amount = &allocations[2].amount + BigUint::from(1u8);
        let leaf = leaf(&allocations[2].recipient, &amount).unwrap();
        assert!(!verify_proof(&leaf, &proof.siblings, tree.root()));
        assert_eq!(
            verify_allocation(&allocations[2].recipient, &amount, &proof.siblings, tree.root()),
            Err(AirdropError::InvalidProof)
        );
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let allocations = allocations(4);
        let tree = MerkleTree::from_allocations(&allocations, LeafOrder::AsGiven).unwrap();
        let proof_of_first = tree.generate_proof(0).unwrap();

        let other_leaf = allocations[3].leaf().unwrap();
        assert!(!verify_proof(&other_leaf, &proof_of_first.siblings, tree.root()));
    }

    #[test]
    fn test_truncated_and_tampered_proofs_fail() {
        let allocations = allocations(5);
        let tree = MerkleTree::from_allocations(&allocations, LeafOrder::AsGiven).unwrap();
        let proof = tree.generate_proof(1).unwrap();

        assert!(!verify_proof(&proof.leaf, &[], tree.root()));
        assert!(!verify_proof(
            &proof.leaf,
            &proof.siblings[..proof.siblings.len() - 1],
            tree.root()
        ));

        let mut tampered = proof.siblings.clone();
        tampered[0][31] ^= 1;
        assert!(!verify_proof(&proof.leaf, &tampered, tree.root()));

        let mut wrong_root = *tree.root();
        wrong_root[0] ^= 0x80;
        assert!(!verify_proof(&proof.leaf, &proof.siblings, &wrong_root));
    }

    #[test]
    fn test_single_leaf_empty_proof_is_valid() {
        let allocations = allocations(1);
        let tree = MerkleTree::from_allocations(&allocations, LeafOrder::AsGiven).unwrap();
        assert_eq!(tree.root(), &allocations[0].leaf().unwrap());
        assert!(verify_proof(&allocations[0].leaf().unwrap(), &[], tree.root()));
    }

    #[test]
    fn test_reordered_sibling_sequence_fails() {
        let allocations = allocations(4);
        let tree = MerkleTree::from_allocations(&allocations, LeafOrder::AsGiven).unwrap();
        let proof = tree.generate_proof(0).unwrap();

        let mut reversed = proof.siblings.clone();
        reversed.reverse();
        assert!(!verify_proof(&proof.leaf, &reversed, tree.root()));
    }
}
