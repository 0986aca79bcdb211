//! Raw/formatted amount conversion.
//!
//! Raw amounts are integers in the token's smallest unit, carried as
//! decimal strings so the same code serves 18-decimal EVM tokens, SPL
//! mints, and Cosmos denoms. Scaling is done by digit manipulation, not
//! floats, so `parse_raw(format_raw(a, d), d) == a` holds for any width.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{GatewayError, Result};

/// Scale a raw integer amount down by `decimals`, returning a
/// human-readable decimal string with trailing zeros trimmed.
pub fn format_raw(raw: &str, decimals: u8) -> Result<String> {
    let digits = normalize_digits(raw)?;
    let decimals = decimals as usize;
    if decimals == 0 {
        return Ok(digits);
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let split = padded.len() - decimals;
    let (whole, frac) = padded.split_at(split);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        Ok(whole.to_string())
    } else {
        Ok(format!("{whole}.{frac}"))
    }
}

/// Scale a human-readable decimal amount up by `decimals`, returning the
/// raw integer string. Fractional digits beyond `decimals` are rejected
/// rather than silently truncated.
pub fn parse_raw(formatted: &str, decimals: u8) -> Result<String> {
    let trimmed = formatted.trim();
    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(GatewayError::invalid_input("empty amount"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GatewayError::invalid_input(format!(
            "invalid decimal amount: {formatted}"
        )));
    }
    let decimals = decimals as usize;
    if frac.len() > decimals {
        let (kept, excess) = frac.split_at(decimals);
        if excess.bytes().any(|b| b != b'0') {
            return Err(GatewayError::invalid_input(format!(
                "amount {formatted} has more than {decimals} decimal places"
            )));
        }
        return assemble_raw(whole, kept);
    }
    let padded = format!("{}{}", frac, "0".repeat(decimals - frac.len()));
    assemble_raw(whole, &padded)
}

fn assemble_raw(whole: &str, frac: &str) -> Result<String> {
    let joined = format!("{whole}{frac}");
    let stripped = joined.trim_start_matches('0');
    if stripped.is_empty() {
        Ok("0".to_string())
    } else {
        Ok(stripped.to_string())
    }
}

fn normalize_digits(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GatewayError::invalid_input(format!(
            "invalid raw amount: {raw}"
        )));
    }
    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() {
        Ok("0".to_string())
    } else {
        Ok(stripped.to_string())
    }
}

/// Minimum acceptable output after applying a slippage tolerance in basis
/// points: `floor(amount_out * (10_000 - bps) / 10_000)`.
pub fn min_out_raw(amount_out: &str, slippage_bps: u32) -> Result<String> {
    if slippage_bps > 10_000 {
        return Err(GatewayError::invalid_input(format!(
            "slippage must be between 0 and 10000 bps, got {slippage_bps}"
        )));
    }
    let out = U256::from_str(amount_out.trim())
        .map_err(|_| GatewayError::invalid_input(format!("invalid raw amount: {amount_out}")))?;
    let kept = out * U256::from(10_000 - slippage_bps) / U256::from(10_000);
    Ok(kept.to_string())
}

/// `10^exp` as a `Decimal`, for price arithmetic.
pub fn pow10_decimal(exp: i32) -> Result<Decimal> {
    if exp == 0 {
        return Ok(Decimal::ONE);
    }
    if exp < 0 {
        let positive = pow10_decimal(-exp)?;
        return Ok(Decimal::ONE / positive);
    }
    let exp_usize = usize::try_from(exp).unwrap_or(0);
    let s = format!("1{}", "0".repeat(exp_usize));
    Decimal::from_str(&s)
        .map_err(|e| GatewayError::invalid_input(format!("scale overflow 10^{exp}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_one_sol() {
        assert_eq!(format_raw("1500000000", 9).unwrap(), "1.5");
        assert_eq!(format_raw("1000000000000000000", 18).unwrap(), "1");
    }

    #[test]
    fn format_sub_unit() {
        assert_eq!(format_raw("1", 6).unwrap(), "0.000001");
        assert_eq!(format_raw("0", 18).unwrap(), "0");
    }

    #[test]
    fn parse_pads_fraction() {
        assert_eq!(parse_raw("1.5", 9).unwrap(), "1500000000");
        assert_eq!(parse_raw("0.000001", 6).unwrap(), "1");
        assert_eq!(parse_raw("12", 0).unwrap(), "12");
    }

    #[test]
    fn parse_rejects_excess_precision() {
        assert!(parse_raw("1.1234567", 6).is_err());
        // Trailing zeros past the scale are not precision loss.
        assert_eq!(parse_raw("1.1234500", 6).unwrap(), "1123450");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_raw("abc", 6).is_err());
        assert!(parse_raw("", 6).is_err());
        assert!(format_raw("-5", 6).is_err());
    }

    #[test]
    fn round_trips_without_loss() {
        for (raw, decimals) in [
            ("1", 18u8),
            ("123456789", 9),
            ("1000000000000000000000000", 18),
            ("999999", 6),
        ] {
            let formatted = format_raw(raw, decimals).unwrap();
            assert_eq!(parse_raw(&formatted, decimals).unwrap(), raw);
        }
    }

    #[test]
    fn min_out_applies_bps() {
        // 0.5% of 1000000 is 5000.
        assert_eq!(min_out_raw("1000000", 50).unwrap(), "995000");
        assert_eq!(min_out_raw("1000000", 0).unwrap(), "1000000");
        assert!(min_out_raw("1000000", 10_001).is_err());
    }

    #[test]
    fn min_out_never_exceeds_out() {
        for bps in [1u32, 50, 300, 9999] {
            let min = min_out_raw("987654321", bps).unwrap();
            assert!(min.parse::<u128>().unwrap() <= 987654321);
        }
    }

    #[test]
    fn pow10_matches_decimal() {
        assert_eq!(pow10_decimal(6).unwrap(), dec!(1000000));
        assert_eq!(pow10_decimal(-2).unwrap(), dec!(0.01));
    }
}
