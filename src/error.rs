use thiserror::Error;

use crate::leaf_encoder::Address;

/// Every failure the airdrop core can report.
///
/// Encoding and construction errors (`InvalidRecipient`, `InvalidAmount`, `EmptyLeafSet`,
/// `IndexOutOfRange`) mean the input data is wrong and the operation was aborted.
/// Claim-time errors (`InvalidProof`, `AlreadyClaimed`, `Unauthorized`, `TransferFailed`,
/// `NotEligible`) are expected outcomes that callers are meant to tell apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AirdropError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot build a merkle tree from an empty leaf set")]
    EmptyLeafSet,

    #[error("Leaf index {index} is out of range for a tree with {len} leaves")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Address or amount are invalid for claim")]
    InvalidProof,

    #[error("{0} has already claimed")]
    AlreadyClaimed(Address),

    #[error("{0} is not authorized to withdraw the reserve")]
    Unauthorized(Address),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("{0} appears more than once in the allocation list")]
    DuplicateRecipient(Address),

    #[error("{0} does not pass the eligibility gate")]
    NotEligible(Address),

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Inconsistent mini trees: {0}")]
    InconsistentMiniTrees(String),

    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),
}

pub type Result<T> = std::result::Result<T, AirdropError>;
