//! Hex-big-int parsing for JSON-RPC responses (spec §6, §9: "numbers that
//! exceed 53-bit precision ... use a platform big-integer type").

use crate::error::RpcError;
use alloy_primitives::U256;
use bigdecimal::BigDecimal;
use std::str::FromStr;

pub fn parse_hex_u64(value: &str) -> Result<u64, RpcError> {
    let trimmed = value.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(trimmed, 16)
        .map_err(|e| RpcError::PermanentData(format!("invalid hex u64 {value:?}: {e}")))
}

pub fn parse_hex_u256(value: &str) -> Result<U256, RpcError> {
    let trimmed = value.trim_start_matches("0x").trim_start_matches("0X");
    U256::from_str_radix(trimmed, 16)
        .map_err(|e| RpcError::PermanentData(format!("invalid hex u256 {value:?}: {e}")))
}

/// Converts a wei amount to gwei with full decimal precision
/// (`wei / 1_000_000_000`).
pub fn wei_to_gwei(wei: U256) -> BigDecimal {
    let digits = wei.to_string();
    let value = BigDecimal::from_str(&digits).expect("U256 decimal string is always valid");
    value / BigDecimal::from(1_000_000_000u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_u64() {
        assert_eq!(parse_hex_u64("0x64").unwrap(), 100);
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(parse_hex_u64("not-hex").is_err());
    }

    #[test]
    fn wei_to_gwei_scales_by_a_billion() {
        let one_gwei = U256::from(1_000_000_000u64);
        assert_eq!(wei_to_gwei(one_gwei), BigDecimal::from(1));

        let half_gwei = U256::from(500_000_000u64);
        assert_eq!(half_gwei.to_string(), "500000000");
        assert_eq!(wei_to_gwei(half_gwei), BigDecimal::from_str("0.5").unwrap());
    }
}
