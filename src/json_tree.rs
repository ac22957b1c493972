use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::{AirdropError, Result};
use crate::hash::{from_hex, to_hex, Hash};
use crate::leaf_encoder::{Address, Allocation};
use crate::merkle_tree::{MerkleTree, Tree};

/// JsonAllocation
/// Represents an allocation in JSON format.
/// The amount is carried in base units as a decimal string, so it survives JSON number limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonAllocation {
    pub address: String,
    pub amount: String,
}

/// JsonMerkleTree
/// Represents an entire Merkle tree in JSON format, digests as `0x` hex strings.
/// It is used for transmitting tree data between the executor and mini-tree-server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonMerkleTree {
    pub root: String,
    pub nodes: Vec<Vec<String>>,
    pub depth: usize,
}

impl JsonAllocation {
    pub fn new(address: String, amount: String) -> Self {
        JsonAllocation { address, amount }
    }

    /// Converts an `Allocation` to a `JsonAllocation`.
    ///
    /// It is used by the Executor to send allocations to the mini-tree-server.
    pub fn from_allocation(allocation: &Allocation) -> Self {
        JsonAllocation::new(
            allocation.recipient.to_string(),
            allocation.amount.to_string(),
        )
    }

    /// Converts a `JsonAllocation` back to an `Allocation`, validating both fields.
    pub fn to_allocation(&self) -> Result<Allocation> {
        let recipient = self.address.parse::<Address>()?;
        let amount = self
            .amount
            .trim()
            .parse::<BigUint>()
            .map_err(|e| AirdropError::InvalidAmount(format!("'{}': {}", self.amount, e)))?;
        Ok(Allocation::new(recipient, amount))
    }
}

impl JsonMerkleTree {
    /// Converts a MerkleTree to its JSON representation.
    ///
    /// This is what the mini-tree-server sends back to the executor.
    pub fn from_tree(tree: &MerkleTree) -> Self {
        JsonMerkleTree {
            root: to_hex(tree.root()),
            nodes: tree
                .nodes()
                .iter()
                .map(|level| level.iter().map(to_hex).collect())
                .collect(),
            depth: *tree.depth(),
        }
    }

    /// Converts a JsonMerkleTree back to a MerkleTree.
    ///
    /// The nodes are taken as computed by the mini-tree-server, so the tree is not rehashed;
    /// `MerkleTree::from_params` only checks its shape.
    pub fn to_tree(&self) -> Result<MerkleTree> {
        let root = from_hex(&self.root)?;
        let nodes = self
            .nodes
            .iter()
            .map(|level| level.iter().map(|node| from_hex(node)).collect())
            .collect::<Result<Vec<Vec<Hash>>>>()?;

        let tree = MerkleTree::from_params(root, nodes)?;
        if *tree.depth() != self.depth {
            return Err(AirdropError::InconsistentMiniTrees(format!(
                "declared depth {} but the nodes span {}",
                self.depth,
                tree.depth()
            )));
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::merkle_tree::LeafOrder;

    #[test]
    fn test_json_allocation_conversion() {
        let allocation = Allocation::new(Address::new([0x11; 20]), BigUint::from(10u32).pow(20));
        let json_allocation = JsonAllocation::from_allocation(&allocation);
        assert_eq!(json_allocation.amount, "100000000000000000000");
        assert_eq!(json_allocation.to_allocation().unwrap(), allocation);

        let bad_amount = JsonAllocation::new(allocation.recipient.to_string(), "-5".to_string());
        assert!(matches!(
            bad_amount.to_allocation(),
            Err(AirdropError::InvalidAmount(_))
        ));
        let bad_address = JsonAllocation::new("0x12".to_string(), "5".to_string());
        assert!(matches!(
            bad_address.to_allocation(),
            Err(AirdropError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn test_json_tree_conversion() {
        let allocations = (1..=6u8)
            .map(|i| Allocation::new(Address::new([i; 20]), BigUint::from(i)))
            .collect::<Vec<_>>();
        let tree = MerkleTree::from_allocations(&allocations, LeafOrder::AsGiven).unwrap();

        let json_tree = JsonMerkleTree::from_tree(&tree);
        assert_eq!(json_tree.depth, 3);
        assert_eq!(json_tree.root.len(), 66);

        let wire = serde_json::to_string(&json_tree).unwrap();
        let parsed: JsonMerkleTree = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed.to_tree().unwrap(), tree);

        let mut wrong_depth = json_tree.clone();
        wrong_depth.depth = 2;
        assert!(wrong_depth.to_tree().is_err());

        let mut bad_hex = json_tree;
        bad_hex.nodes[0][0] = "0xnothex".to_string();
        assert!(matches!(bad_hex.to_tree(), Err(AirdropError::InvalidDigest(_))));
    }
}
