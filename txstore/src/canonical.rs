//! Parsing of externally supplied keys.
//!
//! Hex input is accepted in any letter case. Once parsed, addresses and hashes are
//! fixed-size values, so every comparison inside the store is case-insensitive and
//! every persisted key is lowercase.

use std::str::FromStr;

use alloy::primitives::{Address, B256};

use crate::error::TxStoreError;

pub fn parse_address(input: &str) -> Result<Address, TxStoreError> {
    Address::from_str(input.trim())
        .map_err(|e| TxStoreError::validation(format!("invalid address {input:?}: {e}")))
}

pub fn parse_tx_id(input: &str) -> Result<B256, TxStoreError> {
    B256::from_str(input.trim())
        .map_err(|e| TxStoreError::validation(format!("invalid txId {input:?}: {e}")))
}

/// Accepts a decimal nonce or a `0x`-prefixed hex quantity.
pub fn parse_nonce(input: &str) -> Result<u64, TxStoreError> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => input.parse::<u64>(),
    };
    parsed.map_err(|e| TxStoreError::validation(format!("invalid nonce {input:?}: {e}")))
}

/// Lowercase `0x` rendering used for document fields and log output
pub fn address_hex(address: &Address) -> String {
    format!("{address:#x}")
}

pub fn tx_id_hex(tx_id: &B256) -> String {
    format!("{tx_id:#x}")
}
