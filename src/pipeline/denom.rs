//! `<amount><denom>` token string parsing
//!
//! Swap events carry amounts as a single string such as `1234uosmo` or
//! `500ibc/27394FB0...`. Denoms are recognised by fixed width, not tokenized:
//! - contains `ibc`  -> last 68 chars (`ibc/` + 64 hex hash)
//! - contains `uion` -> last 4 chars
//! - otherwise       -> last 5 chars (`uosmo`, `uatom`, ...)
//!
//! A numeric prefix that itself contains `ibc`/`uion` would misclassify.

const IBC_DENOM_WIDTH: usize = 68;
const UION_DENOM_WIDTH: usize = 4;
const NATIVE_DENOM_WIDTH: usize = 5;

/// Extract the denom suffix from a `<amount><denom>` string
pub fn extract_denom(token: &str) -> String {
    let width = if token.contains("ibc") {
        IBC_DENOM_WIDTH
    } else if token.contains("uion") {
        UION_DENOM_WIDTH
    } else {
        NATIVE_DENOM_WIDTH
    };

    let skip = token.chars().count().saturating_sub(width);
    token.chars().skip(skip).collect()
}

/// Extract the leading raw amount as a digit string
///
/// Non-digits before the first digit are skipped; scanning stops at the first
/// non-digit after that. Returns `"0"` when no digits are found or the value
/// does not fit a `u128`.
pub fn extract_amount(token: &str) -> String {
    let mut digits = String::new();
    for c in token.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !digits.is_empty() {
            break;
        }
    }

    match digits.parse::<u128>() {
        Ok(_) => digits,
        Err(_) => "0".to_string(),
    }
}

/// Raw smallest-unit amount as an integer
pub fn parse_amount(token: &str) -> u128 {
    extract_amount(token).parse().unwrap_or(0)
}
