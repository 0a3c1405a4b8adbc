//! Fixed-point unit conversion for the wagering token and native currency.
//!
//! The wagering token carries 6 fractional digits; displayed amounts are the
//! raw integer divided by 10^6. Native balances carry 18.

use crate::error::ClientError;
use alloy::primitives::U256;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const TOKEN_DECIMALS: u32 = 6;
pub const NATIVE_DECIMALS: u32 = 18;

/// Convert a raw on-chain integer into a decimal with `decimals` places.
///
/// Values too large for `Decimal` saturate at `Decimal::MAX`; nothing a
/// 6-decimal stablecoin market holds gets near that.
pub fn to_decimal(raw: U256, decimals: u32) -> Decimal {
    let Ok(raw) = i128::try_from(raw) else {
        return Decimal::MAX;
    };
    match Decimal::try_from_i128_with_scale(raw, decimals) {
        Ok(d) => d,
        // Too many significant digits for the scale: drop precision first.
        Err(_) => {
            let shift = decimals.min(12);
            let truncated = raw / 10i128.pow(shift);
            Decimal::try_from_i128_with_scale(truncated, decimals - shift)
                .unwrap_or(Decimal::MAX)
        }
    }
}

/// Token amount as shown in market rows: two decimal places, e.g. `0.50`.
pub fn format_token(raw: U256) -> String {
    format!("{:.2}", to_decimal(raw, TOKEN_DECIMALS).round_dp(2))
}

/// Native balance as shown in the wallet header: four decimal places.
pub fn format_native(raw: U256) -> String {
    format!("{:.4}", to_decimal(raw, NATIVE_DECIMALS).round_dp(4))
}

/// Parse a user-entered token amount (`"1.5"`) into raw units (`1_500_000`).
pub fn parse_token(input: &str) -> Result<U256, ClientError> {
    let trimmed = input.trim();
    let value = Decimal::from_str(trimmed)
        .map_err(|_| ClientError::InvalidAmount(trimmed.to_string()))?;
    if value.is_sign_negative() {
        return Err(ClientError::InvalidAmount(trimmed.to_string()));
    }
    let value = value.normalize();
    if value.scale() > TOKEN_DECIMALS {
        return Err(ClientError::InvalidAmount(format!(
            "{trimmed} has more than {TOKEN_DECIMALS} decimal places"
        )));
    }
    let raw = value
        .checked_mul(Decimal::from(10u64.pow(TOKEN_DECIMALS)))
        .ok_or_else(|| ClientError::InvalidAmount(trimmed.to_string()))?;
    let raw = u128::try_from(raw.trunc())
        .map_err(|_| ClientError::InvalidAmount(trimmed.to_string()))?;
    Ok(U256::from(raw))
}
