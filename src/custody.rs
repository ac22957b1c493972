use num_bigint::BigUint;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{AirdropError, Result};
use crate::leaf_encoder::Address;

/// Token custody capability held by the claim ledger and the reserve controller.
///
/// Implementations must apply each movement atomically: either the full amount moves
/// or the call fails with `TransferFailed` and no balance changes.
pub trait Custody: Send + Sync {
    fn balance_of(&self, account: &Address) -> BigUint;

    fn transfer(&self, from: &Address, to: &Address, amount: &BigUint) -> Result<()>;

    /// Moves the whole balance of `from` to `to` and returns the amount moved.
    fn transfer_all(&self, from: &Address, to: &Address) -> Result<BigUint>;
}

/// Thread-safe in-process token ledger.
#[derive(Debug, Default)]
pub struct InMemoryCustody {
    balances: Mutex<HashMap<Address, BigUint>>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to `account` out of thin air. Used to fund a campaign.
    pub fn mint(&self, account: &Address, amount: &BigUint) {
        let mut balances = self.balances.lock();
        *balances.entry(*account).or_default() += amount;
    }
}

impl Custody for InMemoryCustody {
    fn balance_of(&self, account: &Address) -> BigUint {
        self.balances
            .lock()
            .get(account)
            .cloned()
            .unwrap_or_default()
    }

    fn transfer(&self, from: &Address, to: &Address, amount: &BigUint) -> Result<()> {
        let mut balances = self.balances.lock();
        let available = balances.get(from).cloned().unwrap_or_default();
        if available < *amount {
            return Err(AirdropError::TransferFailed(format!(
                "{} holds {}, cannot send {}",
                from, available, amount
            )));
        }
        balances.insert(*from, available - amount);
        *balances.entry(*to).or_default() += amount;
        Ok(())
    }

    fn transfer_all(&self, from: &Address, to: &Address) -> Result<BigUint> {
        let mut balances = self.balances.lock();
        let amount = balances.insert(*from, BigUint::default()).unwrap_or_default();
        *balances.entry(*to).or_default() += &amount;
        Ok(amount)
    }
}
