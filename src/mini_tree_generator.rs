use axum::{extract::Json, http::StatusCode, response::IntoResponse};
use tracing::{debug, warn};

use crate::json_tree::{JsonAllocation, JsonMerkleTree};
use crate::leaf_encoder::Allocation;
use crate::merkle_tree::{LeafOrder, MerkleTree};

/// Mini Tree Generator builds a Merkle tree for one chunk of allocations over HTTP, using the Axum web framework.
///
/// `create_mini_tree` converts the posted `JsonAllocation`s into `Allocation`s, hashes them into leaves
/// in the order received and answers with the whole tree as `JsonMerkleTree`.
/// Malformed allocations or an empty chunk are answered with `400 Bad Request` and the error message.
pub async fn create_mini_tree(
    Json(json_allocations): Json<Vec<JsonAllocation>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let allocations = json_allocations
        .iter()
        .map(JsonAllocation::to_allocation)
        .collect::<Result<Vec<Allocation>, _>>()
        .map_err(bad_request)?;

    let starting_time = std::time::Instant::now();

    let tree =
        MerkleTree::from_allocations(&allocations, LeafOrder::AsGiven).map_err(bad_request)?;

    debug!(
        allocations = allocations.len(),
        elapsed_ms = starting_time.elapsed().as_millis() as u64,
        "created mini tree"
    );

    Ok((StatusCode::OK, Json(JsonMerkleTree::from_tree(&tree))))
}

fn bad_request(error: impl std::fmt::Display) -> (StatusCode, String) {
    warn!(%error, "rejected mini tree request");
    (StatusCode::BAD_REQUEST, error.to_string())
}
