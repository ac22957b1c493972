use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::{error::Error, fs, path::Path};
use tracing::info;

use crate::error::{AirdropError, Result};
use crate::hash::{from_hex, to_hex, Hash};
use crate::leaf_encoder::{Address, Allocation};
use crate::merkle_tree::{LeafOrder, MerkleProof, MerkleTree, Tree};
use crate::verifier::verify_proof;

/// A committed allocation set: the tree plus each recipient's leaf position.
///
/// Construction generates and self-checks the proof of every recipient, so a
/// `Distribution` only exists if every allocation verifies against its root.
#[derive(Debug, Clone)]
pub struct Distribution<T: Tree = MerkleTree> {
    tree: T,
    allocations: Vec<Allocation>,
    positions: HashMap<Address, usize>,
}

impl Distribution<MerkleTree> {
    pub fn new(allocations: Vec<Allocation>, order: LeafOrder) -> Result<Self> {
        check_unique_recipients(&allocations)?;
        let tree = MerkleTree::from_allocations(&allocations, order)?;
        Self::from_tree(tree, allocations)
    }
}

impl<T: Tree> Distribution<T> {
    /// Wraps a tree built elsewhere, e.g. by remote workers.
    ///
    /// Each allocation's leaf is recomputed locally and must be present in the tree.
    pub fn from_tree(tree: T, allocations: Vec<Allocation>) -> Result<Self> {
        if allocations.is_empty() {
            return Err(AirdropError::EmptyLeafSet);
        }
        check_unique_recipients(&allocations)?;
        if tree.leaves().len() != allocations.len() {
            return Err(AirdropError::InconsistentMiniTrees(format!(
                "tree holds {} leaves for {} allocations",
                tree.leaves().len(),
                allocations.len()
            )));
        }

        let leaf_positions = tree
            .leaves()
            .iter()
            .enumerate()
            .map(|(index, leaf)| (*leaf, index))
            .collect::<HashMap<Hash, usize>>();

        let mut positions = HashMap::with_capacity(allocations.len());
        for allocation in &allocations {
            let leaf = allocation.leaf()?;
            let index = *leaf_positions
                .get(&leaf)
                .ok_or(AirdropError::InvalidProof)?;

            let proof = tree.generate_proof(index)?;
            if proof.leaf != leaf || !verify_proof(&leaf, &proof.siblings, tree.root()) {
                return Err(AirdropError::InvalidProof);
            }
            positions.insert(allocation.recipient, index);
        }

        info!(
            recipients = allocations.len(),
            root = %to_hex(tree.root()),
            "distribution committed"
        );

        Ok(Distribution {
            tree,
            allocations,
            positions,
        })
    }

    pub fn root(&self) -> &Hash {
        self.tree.root()
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn proof_for(&self, recipient: &Address) -> Option<MerkleProof> {
        let index = *self.positions.get(recipient)?;
        self.tree.generate_proof(index).ok()
    }

    pub fn merkle_output(&self) -> MerkleOutput {
        MerkleOutput {
            root: to_hex(self.root()),
        }
    }

    pub fn proof_set(&self) -> ProofSet {
        ProofSet(
            self.allocations
                .iter()
                .filter_map(|allocation| {
                    let proof = self.proof_for(&allocation.recipient)?;
                    Some((
                        allocation.recipient.to_string(),
                        proof.siblings.iter().map(to_hex).collect(),
                    ))
                })
                .collect(),
        )
    }
}

fn check_unique_recipients(allocations: &[Allocation]) -> Result<()> {
    let mut seen = HashSet::with_capacity(allocations.len());
    for allocation in allocations {
        if !seen.insert(allocation.recipient) {
            return Err(AirdropError::DuplicateRecipient(allocation.recipient));
        }
    }
    Ok(())
}

/// The published commitment, persisted as `{ "root": "0x..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleOutput {
    pub root: String,
}

impl MerkleOutput {
    pub fn root(&self) -> Result<Hash> {
        from_hex(&self.root)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), Box<dyn Error>> {
        write_json(path, self)
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> std::result::Result<Self, Box<dyn Error>> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

/// Per-recipient proofs keyed by address, persisted as `{ "0x...": ["0x...", ...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofSet(pub BTreeMap<String, Vec<String>>);

impl ProofSet {
    /// Decoded proof of `recipient`, `None` if the recipient is not in the set.
    pub fn proof_for(&self, recipient: &Address) -> Result<Option<Vec<Hash>>> {
        match self.0.get(&recipient.to_string()) {
            Some(proof) => Ok(Some(
                proof
                    .iter()
                    .map(|sibling| from_hex(sibling))
                    .collect::<Result<Vec<Hash>>>()?,
            )),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), Box<dyn Error>> {
        write_json(path, self)
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> std::result::Result<Self, Box<dyn Error>> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

fn write_json<P: AsRef<Path>, S: Serialize>(
    path: P,
    value: &S,
) -> std::result::Result<(), Box<dyn Error>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    // write then rename, so readers never see a partial file
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, serde_json::to_string_pretty(value)?)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
