//! Conversions between human decimal amounts ("1", "0.05") and integer
//! amounts in a currency's smallest unit.

use alloy_primitives::U256;

use crate::error::{Error, Result};

fn invalid(amount: &str, reason: &str) -> Error {
    Error::InvalidAmount(format!("{amount:?}: {reason}"))
}

/// `10^decimals` as a 256-bit integer.
pub fn pow10(decimals: u8) -> U256 {
    U256::from(10u8).pow(U256::from(decimals))
}

/// Parse a non-negative decimal string into smallest units.
///
/// A missing whole part (`".5"`) or fractional part (`"1."`) counts as zero.
/// More fractional digits than `decimals` is an error rather than a silent
/// truncation.
pub fn from_decimals(amount: &str, decimals: u8) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Err(invalid(amount, "empty value"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid(amount, "negative value"));
    }

    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if fraction.contains('.') {
        return Err(invalid(amount, "too many decimal points"));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(invalid(amount, "not a decimal number"));
    }
    if fraction.len() > decimals as usize {
        return Err(invalid(amount, "too many decimal places"));
    }

    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|e| invalid(amount, &e.to_string()))?
    };
    let padded = format!("{fraction:0<width$}", width = decimals as usize);
    let fraction = if padded.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&padded, 10).map_err(|e| invalid(amount, &e.to_string()))?
    };

    whole
        .checked_mul(pow10(decimals))
        .and_then(|v| v.checked_add(fraction))
        .ok_or_else(|| invalid(amount, "value overflows 256 bits"))
}

/// Render smallest units as a decimal string, trimmed of trailing zeros and
/// cut to at most `fixed` characters (0 disables the cut).
pub fn to_decimals(value: &U256, decimals: u8, fixed: usize) -> String {
    let base = pow10(decimals);
    let whole = *value / base;
    let fraction = *value % base;

    let mut rendered = whole.to_string();
    if decimals > 0 && !fraction.is_zero() {
        let digits = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
        rendered.push('.');
        rendered.push_str(digits.trim_end_matches('0'));
    }
    if fixed > 0 && rendered.len() > fixed {
        rendered.truncate(fixed);
        while rendered.ends_with('.') {
            rendered.pop();
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(s: &str) -> U256 {
        U256::from_str_radix(s, 10).unwrap()
    }

    #[test]
    fn test_from_decimals_whole_and_fraction() {
        assert_eq!(from_decimals("1", 18).unwrap(), wei("1000000000000000000"));
        assert_eq!(from_decimals("0.5", 18).unwrap(), wei("500000000000000000"));
        assert_eq!(from_decimals(".5", 18).unwrap(), wei("500000000000000000"));
        assert_eq!(from_decimals("2.", 6).unwrap(), wei("2000000"));
        assert_eq!(from_decimals("20", 9).unwrap(), wei("20000000000"));
        assert_eq!(from_decimals("7", 0).unwrap(), U256::from(7u8));
    }

    #[test]
    fn test_from_decimals_rejects_garbage() {
        for bad in ["", ".", "-1", "1.2.3", "abc", "1e18", "0x10"] {
            assert!(
                matches!(from_decimals(bad, 18), Err(Error::InvalidAmount(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(from_decimals("0.1234567", 6).is_err());
        assert!(from_decimals("1.5", 0).is_err());
    }

    #[test]
    fn test_to_decimals() {
        assert_eq!(to_decimals(&wei("1500000000000000000"), 18, 7), "1.5");
        assert_eq!(to_decimals(&wei("1000000000000000000"), 18, 7), "1");
        assert_eq!(to_decimals(&wei("1234567890000000000"), 18, 7), "1.23456");
        assert_eq!(to_decimals(&U256::ZERO, 18, 7), "0");
        assert_eq!(to_decimals(&U256::from(42u8), 0, 0), "42");
    }

    #[test]
    fn test_to_decimals_never_ends_with_point() {
        assert_eq!(
            to_decimals(&wei("1234567500000000000000000"), 18, 7),
            "1234567"
        );
    }
}
