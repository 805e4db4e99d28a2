//! Kubernetes resource quantities expressed as byte counts
//!
//! Supports the subset of the quantity grammar that makes sense for storage:
//! non-negative decimal numbers followed by a binary (`Ki`..`Ei`), decimal
//! (`k`..`E`), milli (`m`) or exponent (`e3`) suffix. Fractional byte counts
//! round up, the same way `Quantity.Value()` does.

use thiserror::Error;

pub const KIB: u64 = 1 << 10;
pub const MIB: u64 = 1 << 20;
pub const GIB: u64 = 1 << 30;
pub const TIB: u64 = 1 << 40;
pub const PIB: u64 = 1 << 50;
pub const EIB: u64 = 1 << 60;

/// Maximum number of fractional digits accepted in a quantity
const MAX_FRACTION_DIGITS: usize = 18;

/// Errors produced while parsing a quantity string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,

    #[error("invalid number in quantity {0:?}")]
    InvalidNumber(String),

    #[error("unknown suffix {suffix:?} in quantity {quantity:?}")]
    UnknownSuffix { quantity: String, suffix: String },

    #[error("quantity {0:?} does not fit in 64 bits")]
    Overflow(String),
}

/// Parse a quantity string such as `10Gi`, `1.5Ti` or `500M` into bytes
pub fn parse_quantity(raw: &str) -> Result<u64, QuantityError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }
    let s = s.strip_prefix('+').unwrap_or(s);

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);

    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if (int_part.is_empty() && frac_part.is_empty())
        || frac_part.contains('.')
        || frac_part.len() > MAX_FRACTION_DIGITS
    {
        return Err(QuantityError::InvalidNumber(raw.to_string()));
    }

    let (num, den) = suffix_multiplier(suffix).ok_or_else(|| QuantityError::UnknownSuffix {
        quantity: raw.to_string(),
        suffix: suffix.to_string(),
    })?;

    let overflow = || QuantityError::Overflow(raw.to_string());

    let mut mantissa: u128 = 0;
    for digit in int_part.bytes().chain(frac_part.bytes()) {
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(u128::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }

    let scale = 10u128.pow(frac_part.len() as u32);
    let numerator = mantissa.checked_mul(num).ok_or_else(overflow)?;
    let denominator = scale * den;

    u64::try_from(numerator.div_ceil(denominator)).map_err(|_| overflow())
}

/// Multiplier for a suffix as a (numerator, denominator) pair
fn suffix_multiplier(suffix: &str) -> Option<(u128, u128)> {
    let multiplier = match suffix {
        "" => (1, 1),
        "Ki" => (u128::from(KIB), 1),
        "Mi" => (u128::from(MIB), 1),
        "Gi" => (u128::from(GIB), 1),
        "Ti" => (u128::from(TIB), 1),
        "Pi" => (u128::from(PIB), 1),
        "Ei" => (u128::from(EIB), 1),
        "m" => (1, 1_000),
        "k" => (10u128.pow(3), 1),
        "M" => (10u128.pow(6), 1),
        "G" => (10u128.pow(9), 1),
        "T" => (10u128.pow(12), 1),
        "P" => (10u128.pow(15), 1),
        "E" => (10u128.pow(18), 1),
        _ => return exponent_multiplier(suffix),
    };
    Some(multiplier)
}

/// Decimal exponent suffix (`e3`, `E-2`)
fn exponent_multiplier(suffix: &str) -> Option<(u128, u128)> {
    let digits = suffix
        .strip_prefix('e')
        .or_else(|| suffix.strip_prefix('E'))?;
    let exp: i32 = digits.parse().ok()?;
    if exp.unsigned_abs() > 18 {
        return None;
    }

    let power = 10u128.pow(exp.unsigned_abs());
    if exp >= 0 {
        Some((power, 1))
    } else {
        Some((1, power))
    }
}

/// Render a byte count using the largest exact binary suffix
pub fn format_quantity(bytes: u64) -> String {
    const UNITS: [(u64, &str); 6] = [
        (EIB, "Ei"),
        (PIB, "Pi"),
        (TIB, "Ti"),
        (GIB, "Gi"),
        (MIB, "Mi"),
        (KIB, "Ki"),
    ];

    if bytes == 0 {
        return "0".to_string();
    }

    for (unit, suffix) in UNITS {
        if bytes % unit == 0 {
            return format!("{}{}", bytes / unit, suffix);
        }
    }

    bytes.to_string()
}

/// Round a byte count up to the next whole gibibyte. Near `u64::MAX` this
/// falls back to the largest representable gibibyte multiple.
pub fn round_up_to_gib(bytes: u64) -> u64 {
    bytes
        .div_ceil(GIB)
        .checked_mul(GIB)
        .unwrap_or(u64::MAX / GIB * GIB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binary_suffixes() {
        assert_eq!(parse_quantity("10Gi").unwrap(), 10 * GIB);
        assert_eq!(parse_quantity("512Mi").unwrap(), 512 * MIB);
        assert_eq!(parse_quantity("1Ti").unwrap(), TIB);
        assert_eq!(parse_quantity("4Ki").unwrap(), 4096);
    }

    #[test]
    fn test_parse_decimal_suffixes() {
        assert_eq!(parse_quantity("1k").unwrap(), 1_000);
        assert_eq!(parse_quantity("100M").unwrap(), 100_000_000);
        assert_eq!(parse_quantity("5G").unwrap(), 5_000_000_000);
        assert_eq!(parse_quantity("1E").unwrap(), 1_000_000_000_000_000_000);
    }

    #[test]
    fn test_parse_plain_bytes_and_whitespace() {
        assert_eq!(parse_quantity("1073741824").unwrap(), GIB);
        assert_eq!(parse_quantity("  42 ").unwrap(), 42);
        assert_eq!(parse_quantity("+7").unwrap(), 7);
    }

    #[test]
    fn test_parse_fractions_round_up() {
        assert_eq!(parse_quantity("1.5Gi").unwrap(), GIB + GIB / 2);
        assert_eq!(parse_quantity("0.5").unwrap(), 1);
        assert_eq!(parse_quantity("500m").unwrap(), 1);
        assert_eq!(parse_quantity("1500m").unwrap(), 2);
        assert_eq!(parse_quantity(".5Ki").unwrap(), 512);
    }

    #[test]
    fn test_parse_exponent() {
        assert_eq!(parse_quantity("1e3").unwrap(), 1_000);
        assert_eq!(parse_quantity("2E6").unwrap(), 2_000_000);
        assert_eq!(parse_quantity("25e-1").unwrap(), 3);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_quantity(""), Err(QuantityError::Empty));
        assert_eq!(parse_quantity("   "), Err(QuantityError::Empty));
        assert!(matches!(
            parse_quantity("abc"),
            Err(QuantityError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_quantity("-1Gi"),
            Err(QuantityError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_quantity("1.2.3Gi"),
            Err(QuantityError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_quantity("10Xi"),
            Err(QuantityError::UnknownSuffix { .. })
        ));
        assert!(matches!(
            parse_quantity("10e"),
            Err(QuantityError::UnknownSuffix { .. })
        ));
        assert!(matches!(
            parse_quantity("100Ei"),
            Err(QuantityError::Overflow(_))
        ));
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(0), "0");
        assert_eq!(format_quantity(12 * GIB), "12Gi");
        assert_eq!(format_quantity(1536 * MIB), "1536Mi");
        assert_eq!(format_quantity(2 * TIB), "2Ti");
        assert_eq!(format_quantity(1000), "1000");
    }

    #[test]
    fn test_round_up_to_gib() {
        assert_eq!(round_up_to_gib(0), 0);
        assert_eq!(round_up_to_gib(1), GIB);
        assert_eq!(round_up_to_gib(GIB), GIB);
        assert_eq!(round_up_to_gib(GIB + 1), 2 * GIB);
        assert_eq!(round_up_to_gib(u64::MAX), u64::MAX / GIB * GIB);
        assert_eq!(round_up_to_gib(u64::MAX - GIB) % GIB, 0);
    }
}
