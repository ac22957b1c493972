use num_bigint::BigUint;
use std::sync::Arc;

use crate::custody::Custody;
use crate::error::Result;
use crate::hash::Hash;
use crate::leaf_encoder::Address;
use crate::ledger::{ClaimLedger, ClaimReceipt, EligibilityGate};
use crate::reserve::ReserveController;

/// Parameters fixed when a campaign is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignConfig {
    pub merkle_root: Hash,
    /// Custody account holding the reserve.
    pub account: Address,
    pub admin: Address,
}

/// One airdrop: the claim ledger and the reserve controller over a shared custody account.
pub struct Campaign {
    ledger: ClaimLedger,
    reserve: ReserveController,
}

impl Campaign {
    pub fn new(config: CampaignConfig, custody: Arc<dyn Custody>) -> Self {
        Campaign {
            ledger: ClaimLedger::new(config.merkle_root, config.account, custody.clone()),
            reserve: ReserveController::new(config.admin, config.account, custody),
        }
    }

    pub fn with_gate(self, gate: Arc<dyn EligibilityGate>) -> Self {
        Campaign {
            ledger: self.ledger.with_gate(gate),
            reserve: self.reserve,
        }
    }

    /// `caller` is the authenticated identity of the claimant; tokens go to it.
    pub fn claim(&self, caller: &Address, amount: &BigUint, proof: &[Hash]) -> Result<ClaimReceipt> {
        self.ledger.claim(caller, amount, proof)
    }

    pub fn withdraw(&self, caller: &Address) -> Result<BigUint> {
        self.reserve.withdraw(caller)
    }

    pub fn balance(&self) -> BigUint {
        self.reserve.balance()
    }

    pub fn merkle_root(&self) -> &Hash {
        self.ledger.merkle_root()
    }

    pub fn ledger(&self) -> &ClaimLedger {
        &self.ledger
    }

    pub fn reserve(&self) -> &ReserveController {
        &self.reserve
    }
}
