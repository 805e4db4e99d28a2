//! Threshold and increase amounts

use super::quantity::parse_quantity;
use super::PolicyError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Usage share that triggers growth when no threshold is annotated
pub const DEFAULT_THRESHOLD_PERCENT: u8 = 80;

/// Growth step applied when no increase is annotated
pub const DEFAULT_INCREASE_PERCENT: u8 = 20;

/// An amount relative to a reference capacity, or an absolute byte count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Amount {
    /// Whole percentage in 1..=100
    Percent(u8),
    /// Absolute byte count, never zero
    Bytes(u64),
}

impl Amount {
    /// Parse `"<int>%"` or an absolute quantity string
    pub fn parse(key: &'static str, raw: &str) -> Result<Self, PolicyError> {
        let value = raw.trim();

        if let Some(percent) = value.strip_suffix('%') {
            let percent: u32 =
                percent
                    .trim()
                    .parse()
                    .map_err(|_| PolicyError::PercentNotNumeric {
                        key,
                        value: raw.to_string(),
                    })?;
            if !(1..=100).contains(&percent) {
                return Err(PolicyError::PercentOutOfRange {
                    key,
                    value: raw.to_string(),
                });
            }
            return Ok(Amount::Percent(percent as u8));
        }

        let bytes = parse_quantity(value).map_err(|source| PolicyError::Quantity {
            key,
            value: raw.to_string(),
            source,
        })?;
        if bytes == 0 {
            return Err(PolicyError::Zero {
                key,
                value: raw.to_string(),
            });
        }

        Ok(Amount::Bytes(bytes))
    }

    /// Convert to bytes: `percentage * reference / 100`, or the absolute value
    pub fn resolve(&self, reference_bytes: u64) -> u64 {
        match *self {
            Amount::Percent(percent) => {
                (u128::from(reference_bytes) * u128::from(percent) / 100) as u64
            }
            Amount::Bytes(bytes) => bytes,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Percent(percent) => write!(f, "{}%", percent),
            Amount::Bytes(bytes) => write!(f, "{}", super::quantity::format_quantity(*bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::quantity::GIB;

    #[test]
    fn test_parse_percentages() {
        assert_eq!(Amount::parse("threshold", "80%").unwrap(), Amount::Percent(80));
        assert_eq!(Amount::parse("threshold", " 1 % ").unwrap(), Amount::Percent(1));
        assert_eq!(Amount::parse("increase", "100%").unwrap(), Amount::Percent(100));
    }

    #[test]
    fn test_parse_rejects_bad_percentages() {
        assert!(matches!(
            Amount::parse("threshold", "0%"),
            Err(PolicyError::PercentOutOfRange { .. })
        ));
        assert!(matches!(
            Amount::parse("increase", "101%"),
            Err(PolicyError::PercentOutOfRange { .. })
        ));
        assert!(matches!(
            Amount::parse("threshold", "80.5%"),
            Err(PolicyError::PercentNotNumeric { .. })
        ));
        assert!(matches!(
            Amount::parse("threshold", "abc%"),
            Err(PolicyError::PercentNotNumeric { .. })
        ));
    }

    #[test]
    fn test_parse_absolute_quantities() {
        assert_eq!(Amount::parse("increase", "5Gi").unwrap(), Amount::Bytes(5 * GIB));
        assert!(matches!(
            Amount::parse("increase", "0Gi"),
            Err(PolicyError::Zero { .. })
        ));
        assert!(matches!(
            Amount::parse("increase", "lots"),
            Err(PolicyError::Quantity { key: "increase", .. })
        ));
    }

    #[test]
    fn test_resolve() {
        assert_eq!(Amount::Percent(80).resolve(10 * GIB), 8 * GIB);
        assert_eq!(Amount::Percent(20).resolve(10 * GIB), 2 * GIB);
        assert_eq!(Amount::Percent(33).resolve(100), 33);
        assert_eq!(Amount::Percent(50).resolve(3), 1);
        assert_eq!(Amount::Percent(100).resolve(u64::MAX), u64::MAX);
        assert_eq!(Amount::Bytes(GIB).resolve(10 * GIB), GIB);
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::Percent(80).to_string(), "80%");
        assert_eq!(Amount::Bytes(2 * GIB).to_string(), "2Gi");
    }
}
