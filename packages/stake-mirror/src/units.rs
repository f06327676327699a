//! Conversions between raw token amounts and what a person reads or
//! types, plus the small formatting helpers the dashboard displays.

use std::str::FromStr;

use cosmwasm_std::{Decimal256, Uint128, Uint256};

use crate::error::StakeError;

/// cw20 tokens may not have more decimals than this.
pub const MAX_DECIMALS: u8 = 18;

/// Formats RAW smallest-unit tokens as a decimal string with DECIMALS
/// fractional digits, trailing zeros removed.
pub fn format_units(raw: Uint128, decimals: u8) -> Result<String, StakeError> {
    if decimals > MAX_DECIMALS {
        return Err(StakeError::decode(format!(
            "token reports {decimals} decimals, at most {MAX_DECIMALS} are supported"
        )));
    }
    Decimal256::from_atomics(Uint256::from(raw), decimals.into())
        .map(|display| display.to_string())
        .map_err(StakeError::decode)
}

/// Parses an amount typed by a person into smallest-unit tokens. Inputs
/// with more fractional digits than the token supports are rejected
/// rather than rounded.
pub fn parse_units(input: &str, decimals: u8) -> Result<Uint128, StakeError> {
    let invalid = |reason: &str| StakeError::InvalidAmount {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    if decimals > MAX_DECIMALS {
        return Err(invalid("token decimals are out of range"));
    }
    let display = Decimal256::from_str(input.trim()).map_err(|err| StakeError::InvalidAmount {
        input: input.to_string(),
        reason: err.to_string(),
    })?;
    // Decimal256 always carries 18 fractional digits.
    let scale = Uint256::from(10u8).pow(u32::from(MAX_DECIMALS - decimals));
    let atomics = display.atomics();
    if !(atomics % scale).is_zero() {
        return Err(invalid("too many decimal places"));
    }
    Uint128::try_from(atomics / scale).map_err(|_| invalid("amount is too large"))
}

/// Renders basis points as a percentage with two decimals, `1234` as
/// `"12.34"`.
pub fn format_bps(bps: u64) -> String {
    format!("{}.{:02}", bps / 100, bps % 100)
}

/// Renders a countdown as `"1d 2h 3m 4s"`, skipping zero components.
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "0 seconds".to_string();
    }
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3_600;
    let minutes = seconds % 3_600 / 60;
    let seconds = seconds % 60;

    [(days, "d"), (hours, "h"), (minutes, "m"), (seconds, "s")]
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shortens an address to its first six and last four characters.
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
