//! Merkle airdrop: commit a list of `(recipient, amount)` allocations to a single
//! Keccak-256 Merkle root, hand out inclusion proofs, and redeem them exactly once
//! against a funded account.
//!
//! Large allocation lists can be split into CSV chunks and built by remote
//! mini-tree workers; the [`orchestrator::Orchestrator`] stitches the results into an
//! [`AggregationMerkleTree`] whose root matches a locally built [`MerkleTree`].
pub mod aggregation_merkle_tree;
pub mod campaign;
pub mod custody;
pub mod distribution;
pub mod error;
pub mod executor;
pub mod hash;
pub mod json_tree;
pub mod leaf_encoder;
pub mod ledger;
pub mod merkle_tree;
pub mod mini_tree_generator;
pub mod orchestrator;
pub mod reserve;
pub mod verifier;

pub use aggregation_merkle_tree::AggregationMerkleTree;
pub use campaign::{Campaign, CampaignConfig};
pub use custody::{Custody, InMemoryCustody};
pub use distribution::{Distribution, MerkleOutput, ProofSet};
pub use error::{AirdropError, Result};
pub use hash::Hash;
pub use json_tree::{JsonAllocation, JsonMerkleTree};
pub use leaf_encoder::{Address, Allocation};
pub use ledger::{ClaimLedger, ClaimReceipt, ClaimRecord, EligibilityGate, HolderGate};
pub use merkle_tree::{LeafOrder, MerkleProof, MerkleTree, Tree};
pub use orchestrator::{allocation_parser, parse_units, Orchestrator};
pub use reserve::ReserveController;
pub use verifier::{verify_allocation, verify_proof};
