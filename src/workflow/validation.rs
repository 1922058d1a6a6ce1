use rust_decimal::Decimal;

use super::models::Chain;
use crate::error::WorkflowError;

/// Smallest representable unit is 1e-8.
pub const MAX_AMOUNT_SCALE: u32 = 8;

/// Integer digits that fit the NUMERIC(28, 8) amount column.
pub const MAX_AMOUNT_INTEGER_DIGITS: u32 = 20;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

pub fn validate_amount(amount: Decimal) -> Result<(), WorkflowError> {
    if amount <= Decimal::ZERO {
        return Err(WorkflowError::validation("amount must be positive"));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(WorkflowError::validation(format!(
            "amount supports at most {MAX_AMOUNT_SCALE} decimal places"
        )));
    }
    if amount >= Decimal::from_i128_with_scale(10_i128.pow(MAX_AMOUNT_INTEGER_DIGITS), 0) {
        return Err(WorkflowError::validation(format!(
            "amount supports at most {MAX_AMOUNT_INTEGER_DIGITS} integer digits"
        )));
    }
    Ok(())
}

pub fn validate_address(chain: Chain, address: &str) -> Result<(), WorkflowError> {
    let valid = match chain {
        Chain::Eth | Chain::Bsc | Chain::Polygon => is_evm_address(address),
        Chain::Sol => is_base58(address) && (32..=44).contains(&address.len()),
        Chain::Btc => is_btc_address(address),
    };

    if valid {
        Ok(())
    } else {
        Err(WorkflowError::validation(format!(
            "invalid {chain} wallet address: {address}"
        )))
    }
}

pub fn validate_reason(reason: &str) -> Result<(), WorkflowError> {
    if reason.trim().is_empty() {
        return Err(WorkflowError::validation("rejection reason is required"));
    }
    Ok(())
}

pub fn validate_tx_hash(tx_hash: &str) -> Result<(), WorkflowError> {
    if tx_hash.trim().is_empty() {
        return Err(WorkflowError::validation("settlement tx hash is required"));
    }
    Ok(())
}

fn is_evm_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(body) => body.len() == 40 && hex::decode(body).is_ok(),
        None => false,
    }
}

fn is_base58(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| BASE58_ALPHABET.contains(c))
}

fn is_btc_address(address: &str) -> bool {
    let lower = address.to_ascii_lowercase();
    if lower.starts_with("bc1") {
        // bech32 forbids mixed case
        let uniform = address == lower || address == address.to_ascii_uppercase();
        let data = &lower[3..];
        return uniform
            && (14..=74).contains(&address.len())
            && data.chars().all(|c| BECH32_CHARSET.contains(c));
    }

    (address.starts_with('1') || address.starts_with('3'))
        && (26..=35).contains(&address.len())
        && is_base58(address)
}
