//! Token amounts in base units, plus human unit scaling.

use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Largest `decimals` value whose scale factor (`10^decimals`) fits in `u128`.
pub const MAX_DECIMALS: u8 = 38;

/// Non-negative token quantity in base units.
///
/// Serialized as a decimal string: supplies such as `1000 * 10^18` do not fit
/// in a JSON number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const MAX: Amount = Amount(u128::MAX);

    pub const fn new(base_units: u128) -> Self {
        Self(base_units)
    }

    pub const fn get(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn saturating_add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// Scale a human-entered amount (`"12"`, `"0.25"`) by `10^decimals`.
    ///
    /// Rejects signs, empty input, more fractional digits than `decimals`,
    /// and results that overflow `u128`.
    pub fn parse_units(text: &str, decimals: u8) -> DomainResult<Amount> {
        let scale = scale_factor(decimals)?;
        let text = text.trim();

        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, f),
            None => (text, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(DomainError::validation(format!("invalid amount '{text}'")));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(DomainError::validation(format!("invalid amount '{text}'")));
        }
        if frac_part.len() > usize::from(decimals) {
            return Err(DomainError::validation(format!(
                "amount '{text}' has more than {decimals} decimal places"
            )));
        }

        let overflow = || DomainError::validation(format!("amount '{text}' is too large"));

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };

        let fraction: u128 = if frac_part.is_empty() {
            0
        } else {
            // frac_part.len() <= decimals <= MAX_DECIMALS, so both fit.
            let digits: u128 = frac_part.parse().map_err(|_| overflow())?;
            let pad = scale_factor(decimals - frac_part.len() as u8)?;
            digits.checked_mul(pad).ok_or_else(overflow)?
        };

        whole
            .checked_mul(scale)
            .and_then(|w| w.checked_add(fraction))
            .map(Amount)
            .ok_or_else(overflow)
    }

    /// Render base units as a human amount (inverse of [`Amount::parse_units`]).
    ///
    /// Trailing fractional zeros are trimmed; whole numbers have no point.
    pub fn format_units(self, decimals: u8) -> DomainResult<String> {
        let scale = scale_factor(decimals)?;
        let whole = self.0 / scale;
        let fraction = self.0 % scale;
        if fraction == 0 {
            return Ok(whole.to_string());
        }

        let width = usize::from(decimals);
        let padded = format!("{fraction:0width$}");
        Ok(format!("{whole}.{}", padded.trim_end_matches('0')))
    }
}

fn scale_factor(decimals: u8) -> DomainResult<u128> {
    if decimals > MAX_DECIMALS {
        return Err(DomainError::validation(format!(
            "decimals must be at most {MAX_DECIMALS}, got {decimals}"
        )));
    }
    Ok(10u128.pow(u32::from(decimals)))
}

impl ValueObject for Amount {}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Parses a raw base-unit integer (no scaling).
impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|e| DomainError::validation(format!("invalid base-unit amount '{s}': {e}")))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<Amount> for u128 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn whole_units_scale_by_decimals() {
        let amount = Amount::parse_units("1000", 18).unwrap();
        assert_eq!(amount.get(), 1_000 * 10u128.pow(18));
    }

    #[test]
    fn fractional_units_are_padded() {
        assert_eq!(Amount::parse_units("0.5", 18).unwrap().get(), 5 * 10u128.pow(17));
        assert_eq!(Amount::parse_units(".25", 2).unwrap().get(), 25);
        assert_eq!(Amount::parse_units("3.", 2).unwrap().get(), 300);
    }

    #[test]
    fn zero_decimals_rejects_fraction() {
        assert_eq!(Amount::parse_units("42", 0).unwrap().get(), 42);
        assert!(Amount::parse_units("4.2", 0).is_err());
    }

    #[test]
    fn malformed_input_is_rejected() {
        for bad in ["", ".", "-1", "+1", "1,5", "1.2.3", "abc", "1e18"] {
            assert!(
                matches!(Amount::parse_units(bad, 18), Err(DomainError::Validation(_))),
                "expected rejection of {bad:?}"
            );
        }
    }

    #[test]
    fn too_many_decimal_places_is_rejected() {
        let err = Amount::parse_units("0.123", 2).unwrap_err();
        assert!(err.to_string().contains("decimal places"));
    }

    #[test]
    fn overflow_is_rejected() {
        assert!(Amount::parse_units("340282366920938463463374607431768211456", 0).is_err());
        assert!(Amount::parse_units("1000000000000000000000", 18).is_err());
        assert!(Amount::parse_units("1", 39).is_err());
    }

    #[test]
    fn format_trims_trailing_zeros() {
        assert_eq!(Amount::new(15 * 10u128.pow(17)).format_units(18).unwrap(), "1.5");
        assert_eq!(Amount::new(10_000).format_units(0).unwrap(), "10000");
        assert_eq!(Amount::new(7).format_units(3).unwrap(), "0.007");
        assert_eq!(Amount::ZERO.format_units(18).unwrap(), "0");
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let big = Amount::new(1_000 * 10u128.pow(18));
        let json = serde_json::to_string(&big).unwrap();
        assert_eq!(json, "\"1000000000000000000000\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, big);
    }

    #[test]
    fn checked_arithmetic_refuses_to_wrap() {
        assert_eq!(Amount::ZERO.checked_sub(Amount::new(1)), None);
        assert_eq!(Amount::MAX.checked_add(Amount::new(1)), None);
        assert_eq!(Amount::new(2).checked_add(Amount::new(3)), Some(Amount::new(5)));
    }

    proptest! {
        /// Formatting then parsing recovers the base-unit value.
        #[test]
        fn format_then_parse_is_identity(raw in any::<u64>(), decimals in 0u8..=18) {
            let amount = Amount::new(u128::from(raw));
            let text = amount.format_units(decimals).unwrap();
            prop_assert_eq!(Amount::parse_units(&text, decimals).unwrap(), amount);
        }
    }
}
