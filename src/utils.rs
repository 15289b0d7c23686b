// Utility modules

use ethers::types::U256;

use crate::error::{AppError, Result};

/// Checks that `address` is a 0x-prefixed 20-byte hex string.
pub fn is_evm_address(address: &str) -> bool {
    let Some(digits) = address.trim().strip_prefix("0x") else {
        return false;
    };
    digits.len() == 40 && hex::decode(digits).is_ok()
}

/// Validates and lowercases an EVM address.
pub fn normalize_evm_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    if !is_evm_address(trimmed) {
        return Err(AppError::BadRequest(format!(
            "Invalid EVM address: {}",
            trimmed
        )));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Parses a JSON-RPC hex quantity. `0x` alone is read as zero.
pub fn parse_hex_quantity(value: &str) -> Result<U256> {
    let digits = value.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| AppError::ExternalAPI(format!("Invalid hex quantity {}: {}", value, e)))
}

pub fn parse_hex_u64(value: &str) -> Result<u64> {
    let digits = value.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| AppError::ExternalAPI(format!("Invalid hex number {}: {}", value, e)))
}

pub fn to_hex_quantity(value: u64) -> String {
    format!("{value:#x}")
}

// Internal helper that checks conditions for boolean env flags.
pub fn is_flag_value_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
