use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{AirdropError, Result};
use crate::hash::{keccak256, Hash};

pub const ADDRESS_BYTES: usize = 20;
pub const AMOUNT_BYTES: usize = 32;
pub const ENCODED_BYTES: usize = ADDRESS_BYTES + AMOUNT_BYTES;

/// A 20-byte recipient identifier.
///
/// Parsed from 40 hex characters with an optional `0x` prefix and always displayed
/// as `0x`-prefixed lowercase hex, which is also its serde representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Address(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; ADDRESS_BYTES] = bytes.try_into().map_err(|_| {
            AirdropError::InvalidRecipient(format!(
                "expected {} bytes, got {}",
                ADDRESS_BYTES,
                bytes.len()
            ))
        })?;
        Ok(Address(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AirdropError;

    fn from_str(addr_str: &str) -> Result<Self> {
        let trimmed = addr_str.trim();
        let cleaned = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if cleaned.len() != ADDRESS_BYTES * 2 {
            return Err(AirdropError::InvalidRecipient(format!(
                "expected {} hex chars, got {} in '{}'",
                ADDRESS_BYTES * 2,
                cleaned.len(),
                addr_str
            )));
        }
        let mut address = [0u8; ADDRESS_BYTES];
        hex::decode_to_slice(cleaned, &mut address).map_err(|e| {
            AirdropError::InvalidRecipient(format!("invalid hex in '{}': {}", addr_str, e))
        })?;
        Ok(Address(address))
    }
}

impl TryFrom<String> for Address {
    type Error = AirdropError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// One entry of the airdrop: `amount` base units owed to `recipient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub recipient: Address,
    pub amount: BigUint,
}

impl Allocation {
    pub fn new(recipient: Address, amount: BigUint) -> Self {
        Allocation { recipient, amount }
    }

    pub fn leaf(&self) -> Result<Hash> {
        leaf(&self.recipient, &self.amount)
    }
}

/// Encodes `amount` as a 32-byte big-endian word.
pub fn encode_amount(amount: &BigUint) -> Result<[u8; AMOUNT_BYTES]> {
    let bytes = amount.to_bytes_be();
    if bytes.len() > AMOUNT_BYTES {
        return Err(AirdropError::InvalidAmount(format!(
            "{} does not fit in {} bits",
            amount,
            AMOUNT_BYTES * 8
        )));
    }
    let mut word = [0u8; AMOUNT_BYTES];
    word[AMOUNT_BYTES - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

/// Packs `recipient || amount` into 52 bytes.
///
/// Both fields are fixed width, so no two distinct pairs share an encoding.
pub fn encode(recipient: &Address, amount: &BigUint) -> Result<[u8; ENCODED_BYTES]> {
    let mut encoded = [0u8; ENCODED_BYTES];
    encoded[..ADDRESS_BYTES].copy_from_slice(recipient.as_bytes());
    encoded[ADDRESS_BYTES..].copy_from_slice(&encode_amount(amount)?);
    Ok(encoded)
}

/// The leaf digest for one allocation: `keccak256(recipient || amount)`.
///
/// Tree construction, proof generation and claim verification all derive leaves
/// through this function.
pub fn leaf(recipient: &Address, amount: &BigUint) -> Result<Hash> {
    Ok(keccak256(&encode(recipient, amount)?))
}
