use num_bigint::BigUint;
use std::sync::Arc;
use tracing::{info, warn};

use crate::custody::Custody;
use crate::error::{AirdropError, Result};
use crate::leaf_encoder::Address;

/// Admin-only access to the unclaimed reserve.
pub struct ReserveController {
    admin: Address,
    account: Address,
    custody: Arc<dyn Custody>,
}

impl ReserveController {
    pub fn new(admin: Address, account: Address, custody: Arc<dyn Custody>) -> Self {
        ReserveController {
            admin,
            account,
            custody,
        }
    }

    pub fn admin(&self) -> &Address {
        &self.admin
    }

    /// Sends the entire remaining reserve to the administrator and returns the amount.
    pub fn withdraw(&self, requester: &Address) -> Result<BigUint> {
        if *requester != self.admin {
            warn!(%requester, "withdraw rejected: not the administrator");
            return Err(AirdropError::Unauthorized(*requester));
        }

        let amount = self.custody.transfer_all(&self.account, &self.admin)?;
        info!(admin = %self.admin, %amount, "reserve withdrawn");
        Ok(amount)
    }

    pub fn balance(&self) -> BigUint {
        self.custody.balance_of(&self.account)
    }
}
