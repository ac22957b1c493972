use num_bigint::BigUint;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::custody::Custody;
use crate::error::{AirdropError, Result};
use crate::hash::{to_hex, Hash};
use crate::leaf_encoder::Address;
use crate::verifier::verify_allocation;

/// Redemption state of one recipient. `Redeemed` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClaimRecord {
    #[default]
    Unclaimed,
    Redeemed,
}

/// Extra admission check run before a claim is verified, e.g. "holds an NFT of collection X".
pub trait EligibilityGate: Send + Sync {
    fn is_eligible(&self, recipient: &Address) -> bool;
}

/// Admits only the holders in a fixed set.
#[derive(Debug, Clone, Default)]
pub struct HolderGate {
    holders: HashSet<Address>,
}

impl HolderGate {
    pub fn new(holders: impl IntoIterator<Item = Address>) -> Self {
        HolderGate {
            holders: holders.into_iter().collect(),
        }
    }
}

impl EligibilityGate for HolderGate {
    fn is_eligible(&self, recipient: &Address) -> bool {
        self.holders.contains(recipient)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub recipient: Address,
    pub amount: BigUint,
    pub leaf: Hash,
}

/// Tracks which recipients have redeemed their allocation under one published root.
///
/// Each recipient gets its own lock. A claim holds that lock from the redemption check
/// until the transfer has settled, so two claims for the same recipient cannot both pass,
/// while claims for different recipients run independently.
pub struct ClaimLedger {
    merkle_root: Hash,
    account: Address,
    custody: Arc<dyn Custody>,
    gate: Option<Arc<dyn EligibilityGate>>,
    records: Mutex<HashMap<Address, Arc<Mutex<ClaimRecord>>>>,
}

impl ClaimLedger {
    /// `account` is the custody account the campaign reserve is held in.
    pub fn new(merkle_root: Hash, account: Address, custody: Arc<dyn Custody>) -> Self {
        ClaimLedger {
            merkle_root,
            account,
            custody,
            gate: None,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn EligibilityGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn merkle_root(&self) -> &Hash {
        &self.merkle_root
    }

    /// Redeems `amount` for `recipient` if `proof` places the pair under the root.
    ///
    /// Fails with `InvalidProof` before looking at the redemption state, then with
    /// `AlreadyClaimed`. A failed transfer leaves the recipient unclaimed.
    pub fn claim(
        &self,
        recipient: &Address,
        amount: &BigUint,
        proof: &[Hash],
    ) -> Result<ClaimReceipt> {
        if let Some(gate) = &self.gate {
            if !gate.is_eligible(recipient) {
                warn!(%recipient, "claim rejected by eligibility gate");
                return Err(AirdropError::NotEligible(*recipient));
            }
        }

        let leaf = verify_allocation(recipient, amount, proof, &self.merkle_root).map_err(|e| {
            warn!(%recipient, %amount, error = %e, "claim rejected");
            e
        })?;

        let record = self.record(recipient);
        let mut record = record.lock();
        if *record == ClaimRecord::Redeemed {
            warn!(%recipient, "claim rejected: already claimed");
            return Err(AirdropError::AlreadyClaimed(*recipient));
        }

        self.custody.transfer(&self.account, recipient, amount)?;
        *record = ClaimRecord::Redeemed;

        info!(%recipient, %amount, leaf = %to_hex(&leaf), "claimed");

        Ok(ClaimReceipt {
            recipient: *recipient,
            amount: amount.clone(),
            leaf,
        })
    }

    pub fn is_claimed(&self, recipient: &Address) -> bool {
        let record = self.records.lock().get(recipient).cloned();
        record.map_or(false, |record| *record.lock() == ClaimRecord::Redeemed)
    }

    pub fn claimed_count(&self) -> usize {
        let records = self
            .records
            .lock()
            .values()
            .cloned()
            .collect::<Vec<Arc<Mutex<ClaimRecord>>>>();
        records
            .iter()
            .filter(|record| *record.lock() == ClaimRecord::Redeemed)
            .count()
    }

    fn record(&self, recipient: &Address) -> Arc<Mutex<ClaimRecord>> {
        self.records
            .lock()
            .entry(*recipient)
            .or_default()
            .clone()
    }
}
