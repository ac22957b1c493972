//! Keccak-256 primitives shared by tree construction and proof verification.

use sha3::{Digest, Keccak256};

use crate::error::{AirdropError, Result};

/// A 32-byte Keccak-256 digest. Leaves, internal nodes and roots all use this width.
pub type Hash = [u8; 32];

pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

/// Combines two sibling digests into their parent.
///
/// The pair is ordered ascending by byte value before hashing, so
/// `hash_pair(a, b) == hash_pair(b, a)` and proofs carry no left/right flags.
pub fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    Keccak256::new()
        .chain_update(low)
        .chain_update(high)
        .finalize()
        .into()
}

/// Formats a digest as a `0x`-prefixed, 64-character lowercase hex string.
pub fn to_hex(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Parses a digest from hex, with or without the `0x` prefix.
pub fn from_hex(hex_str: &str) -> Result<Hash> {
    let trimmed = hex_str.trim();
    let cleaned = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let mut hash = [0u8; 32];
    hex::decode_to_slice(cleaned, &mut hash)
        .map_err(|e| AirdropError::InvalidDigest(format!("'{}': {}", hex_str, e)))?;
    Ok(hash)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keccak256_empty_input() {
        assert_eq!(
            to_hex(&keccak256(&[])),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        // Keccak padding, not SHA3-256 (which gives 0x3a985da7...)
        assert_eq!(
            to_hex(&keccak256(b"abc")),
            "0x4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        );
    }

    #[test]
    fn test_hash_pair_is_order_independent() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_eq!(hash_pair(&a, &b), hash_pair(&b, &a));
        assert_ne!(hash_pair(&a, &b), hash_pair(&a, &a));
    }

    #[test]
    fn test_hash_pair_hashes_low_then_high() {
        let low = [0x01u8; 32];
        let high = [0xffu8; 32];
        let mut concatenated = [0u8; 64];
        concatenated[..32].copy_from_slice(&low);
        concatenated[32..].copy_from_slice(&high);
        assert_eq!(hash_pair(&high, &low), keccak256(&concatenated));
    }

    #[test]
    fn test_hex_round_trip_and_errors() {
        let hash = keccak256(b"airdrop");
        assert_eq!(from_hex(&to_hex(&hash)).unwrap(), hash);
        assert_eq!(from_hex(&hex::encode(hash)).unwrap(), hash);
        assert!(from_hex("0x1234").is_err());
        assert!(matches!(
            from_hex(&format!("0x{}", "zz".repeat(32))),
            Err(AirdropError::InvalidDigest(_))
        ));
    }
}
