use reqwest::Client;
use std::error::Error;

use crate::hash::Hash;
use crate::json_tree::{JsonAllocation, JsonMerkleTree};
use crate::merkle_tree::{LeafOrder, MerkleTree, Tree};

#[derive(Clone)]
pub struct Executor {
    client: Client,
    url: String,
    id: Option<String>,
}

impl Executor {
    pub fn new(url: String, id: Option<String>) -> Self {
        Executor {
            client: Client::new(),
            url,
            id,
        }
    }

    pub fn get_url(&self) -> String {
        self.url.clone()
    }

    pub fn get_name(&self) -> Option<String> {
        self.id.clone()
    }

    /// Sends one chunk of allocations to the worker and returns the mini tree it built.
    ///
    /// The leaves are recomputed locally and must match the worker's bottom level byte for byte.
    /// The tree is then rebuilt from those leaves, and every level and the root the worker sent
    /// must be identical, so a worker with a diverging encoding or combine rule is caught here
    /// instead of at claim time.
    pub async fn generate_tree(
        &self,
        json_allocations: Vec<JsonAllocation>,
    ) -> Result<MerkleTree, Box<dyn Error>> {
        let json_tree = self
            .client
            .post(&self.url)
            .json(&json_allocations)
            .send()
            .await?
            .error_for_status()?
            .json::<JsonMerkleTree>()
            .await?;

        let tree = json_tree.to_tree()?;

        let expected_leaves = json_allocations
            .iter()
            .map(|json_allocation| json_allocation.to_allocation()?.leaf())
            .collect::<Result<Vec<Hash>, _>>()?;

        if tree.leaves() != expected_leaves.as_slice() {
            return Err(format!(
                "Worker {} returned leaves that differ from the locally encoded allocations",
                self.url
            )
            .into());
        }

        let rebuilt = MerkleTree::from_leaves(expected_leaves, LeafOrder::AsGiven)?;
        if rebuilt != tree {
            return Err(format!(
                "Worker {} returned internal nodes that differ from the rebuilt tree",
                self.url
            )
            .into());
        }

        Ok(rebuilt)
    }
}
