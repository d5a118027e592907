use alloy::primitives::U256;

use crate::error::{LootboxError, Result};

/// Decimals assumed for native currency and for tokens without metadata.
pub const NATIVE_DECIMALS: u8 = 18;

/// Convert a human-readable decimal string to integer base units.
///
/// `"1.5"` with 6 decimals is `1_500_000`. Digits past `decimals` are rounded
/// half-up, so the result is `round(value * 10^decimals)`.
///
/// # Errors
///
/// Returns `LootboxError::InvalidAmount` for empty input, signs, exponents,
/// stray characters, or a value that does not fit in a `U256`.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256> {
    let s = value.trim();
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(LootboxError::InvalidAmount(format!(
            "{value:?} is not a number"
        )));
    }
    let is_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(int_part) || !is_digits(frac_part) {
        return Err(LootboxError::InvalidAmount(format!(
            "{value:?} is not a plain decimal number"
        )));
    }

    let scale = decimals as usize;
    let (kept, dropped) = frac_part.split_at(frac_part.len().min(scale));
    let round_up = dropped.bytes().next().is_some_and(|b| b >= b'5');

    let mut digits = String::with_capacity(int_part.len() + scale);
    digits.push_str(int_part);
    digits.push_str(kept);
    digits.extend(std::iter::repeat('0').take(scale - kept.len()));

    let trimmed = digits.trim_start_matches('0');
    let base = if trimmed.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(trimmed, 10).map_err(|e| {
            LootboxError::InvalidAmount(format!("{value:?} * 10^{decimals} overflows: {e}"))
        })?
    };

    if round_up {
        base.checked_add(U256::from(1u8)).ok_or_else(|| {
            LootboxError::InvalidAmount(format!("{value:?} * 10^{decimals} overflows"))
        })
    } else {
        Ok(base)
    }
}

/// Convert integer base units back to a decimal string.
///
/// Inverse of [`parse_units`]: trailing fractional zeros are dropped, so
/// `1_500_000` with 6 decimals formats as `"1.5"`.
pub fn format_units(value: U256, decimals: u8) -> String {
    let raw = value.to_string();
    let scale = decimals as usize;
    if scale == 0 {
        return raw;
    }

    let padded = if raw.len() <= scale {
        format!("{}{raw}", "0".repeat(scale + 1 - raw.len()))
    } else {
        raw
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u128) -> U256 {
        U256::from(v)
    }

    // ---- parse_units ----

    #[test]
    fn test_parse_units_zero_decimals() {
        assert_eq!(parse_units("100", 0).unwrap(), u(100));
        assert_eq!(parse_units("0", 0).unwrap(), u(0));
        // 1.5 rounds half-up to 2 when there is no fractional precision.
        assert_eq!(parse_units("1.5", 0).unwrap(), u(2));
        assert_eq!(parse_units("1.49", 0).unwrap(), u(1));
    }

    #[test]
    fn test_parse_units_six_decimals() {
        assert_eq!(parse_units("1.5", 6).unwrap(), u(1_500_000));
        assert_eq!(parse_units("0.000001", 6).unwrap(), u(1));
        assert_eq!(parse_units("42", 6).unwrap(), u(42_000_000));
        assert_eq!(parse_units("1.2345674", 6).unwrap(), u(1_234_567));
        assert_eq!(parse_units("1.2345675", 6).unwrap(), u(1_234_568));
        assert_eq!(parse_units("0.0000004", 6).unwrap(), u(0));
    }

    #[test]
    fn test_parse_units_eighteen_decimals() {
        assert_eq!(parse_units("1", 18).unwrap(), u(1_000_000_000_000_000_000));
        assert_eq!(parse_units("1.5", 18).unwrap(), u(1_500_000_000_000_000_000));
        assert_eq!(parse_units("0.000000000000000001", 18).unwrap(), u(1));
        // Well beyond what a 96-bit decimal mantissa holds.
        let big = parse_units("123456789012345678901234.5", 18).unwrap();
        assert_eq!(
            big.to_string(),
            "123456789012345678901234500000000000000000"
        );
    }

    #[test]
    fn test_parse_units_loose_forms() {
        assert_eq!(parse_units(".5", 1).unwrap(), u(5));
        assert_eq!(parse_units("5.", 1).unwrap(), u(50));
        assert_eq!(parse_units("  2.25 ", 2).unwrap(), u(225));
        assert_eq!(parse_units("007", 0).unwrap(), u(7));
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        for bad in ["", ".", "abc", "-1", "+1", "1e18", "1.2.3", "1,5", " "] {
            assert!(
                matches!(parse_units(bad, 18), Err(LootboxError::InvalidAmount(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_units_overflow() {
        let huge = "9".repeat(80);
        assert!(parse_units(&huge, 0).is_err());
        let max = U256::MAX.to_string();
        assert_eq!(parse_units(&max, 0).unwrap(), U256::MAX);
        assert!(parse_units(&format!("{max}.9"), 0).is_err());
    }

    // ---- format_units ----

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(u(1_500_000), 6), "1.5");
        assert_eq!(format_units(u(1), 6), "0.000001");
        assert_eq!(format_units(u(0), 6), "0");
        assert_eq!(format_units(u(42), 0), "42");
        assert_eq!(format_units(u(1_000_000_000_000_000_000), 18), "1");
    }

    #[test]
    fn test_format_then_parse_is_identity() {
        for decimals in [0u8, 6, 18] {
            for raw in [0u128, 1, 9, 10, 999_999, 1_000_001, 123_456_789_012_345_678_901] {
                let value = u(raw);
                let text = format_units(value, decimals);
                assert_eq!(
                    parse_units(&text, decimals).unwrap(),
                    value,
                    "{raw} at {decimals} decimals via {text:?}"
                );
            }
        }
    }
}
