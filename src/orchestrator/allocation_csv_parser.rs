use num_bigint::BigUint;
use serde::Deserialize;
use std::{error::Error, fs::File, path::Path};

use crate::error::{AirdropError, Result};
use crate::leaf_encoder::{Address, Allocation};

/// Decimals used for token amounts unless told otherwise.
pub const DEFAULT_DECIMALS: u32 = 18;

#[derive(Debug, Deserialize)]
struct CsvAllocation {
    address: String,
    amount: String,
}

/// Converts a human decimal amount such as `"250.5"` into base units: `value * 10^decimals`.
pub fn parse_units(value: &str, decimals: u32) -> Result<BigUint> {
    let trimmed = value.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));

    let is_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(AirdropError::InvalidAmount(format!(
            "'{}' is not a decimal number",
            value
        )));
    }
    if fraction.len() > decimals as usize {
        return Err(AirdropError::InvalidAmount(format!(
            "'{}' has more than {} decimals",
            value, decimals
        )));
    }

    let padding = "0".repeat(decimals as usize - fraction.len());
    let digits = format!("{}{}{}", whole, fraction, padding);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(BigUint::default());
    }
    BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| AirdropError::InvalidAmount(format!("'{}' could not be parsed", value)))
}

/// Parses a CSV file with an `address,amount` header into allocations.
///
/// Amounts are human decimal strings scaled by `10^decimals`.
pub fn allocation_parser<P: AsRef<Path>>(
    path: P,
    decimals: u32,
) -> std::result::Result<Vec<Allocation>, Box<dyn Error>> {
    let mut allocations = Vec::<Allocation>::new();
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    for result in rdr.deserialize() {
        let record: CsvAllocation = result?;

        let allocation = Allocation::new(
            record.address.parse::<Address>()?,
            parse_units(&record.amount, decimals)?,
        );

        allocations.push(allocation);
    }

    Ok(allocations)
}
