//! # Fixed-Point Decimals
//!
//! Monetary values and quantities travel as integers with an implied number
//! of fractional digits. [`Fixed`] keeps them that way on the host side so
//! repeated totalization never accumulates binary floating-point drift.
//!
//! ```
//! use bematech::protocol::fixed::Fixed;
//!
//! let price: Fixed = "12.995".parse()?;
//! assert_eq!(price.units(), 12995);
//! assert_eq!(price.scale(), 3);
//! assert_eq!(price.rescale(2), Some(1299)); // truncates toward zero
//! assert_eq!(price.to_string(), "12.995");
//! # Ok::<(), bematech::FiscalError>(())
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::FiscalError;

/// Largest scale we accept; 10^18 still fits in an `i64`.
pub const MAX_SCALE: u32 = 18;

/// A signed decimal stored as `units / 10^scale`.
#[derive(Debug, Clone, Copy)]
pub struct Fixed {
    units: i64,
    scale: u32,
}

impl Fixed {
    pub const ZERO: Self = Self { units: 0, scale: 0 };

    /// Build from raw units and scale. `Fixed::new(1299, 2)` is `12.99`.
    ///
    /// Scales above [`MAX_SCALE`] are clamped.
    pub const fn new(units: i64, scale: u32) -> Self {
        let scale = if scale > MAX_SCALE { MAX_SCALE } else { scale };
        Self { units, scale }
    }

    /// Like [`Fixed::new`], but a scale above [`MAX_SCALE`] is an error.
    pub fn try_new(units: i64, scale: u32) -> Result<Self, FiscalError> {
        check_scale(scale)?;
        Ok(Self { units, scale })
    }

    /// A whole number.
    pub const fn from_int(value: i64) -> Self {
        Self::new(value, 0)
    }

    pub const fn units(&self) -> i64 {
        self.units
    }

    pub const fn scale(&self) -> u32 {
        self.scale
    }

    pub const fn is_zero(&self) -> bool {
        self.units == 0
    }

    pub const fn is_negative(&self) -> bool {
        self.units < 0
    }

    /// Units expressed at `scale` fractional digits, truncating toward zero.
    ///
    /// Returns `None` when the result does not fit in an `i64`.
    pub fn rescale(&self, scale: u32) -> Option<i64> {
        let units = i128::from(self.units);
        let scaled = match scale.cmp(&self.scale) {
            Ordering::Equal => units,
            Ordering::Greater => units.checked_mul(10i128.checked_pow(scale - self.scale)?)?,
            Ordering::Less => units / 10i128.checked_pow(self.scale - scale)?,
        };
        i64::try_from(scaled).ok()
    }

    /// Exact sum, carried at the larger of the two scales.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        let scale = self.scale.max(other.scale);
        let units = self.rescale(scale)?.checked_add(other.rescale(scale)?)?;
        Some(Self::new(units, scale))
    }

    /// Exact difference, carried at the larger of the two scales.
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        let scale = self.scale.max(other.scale);
        let units = self.rescale(scale)?.checked_sub(other.rescale(scale)?)?;
        Some(Self::new(units, scale))
    }

    fn widened(&self, scale: u32) -> i128 {
        i128::from(self.units) * 10i128.pow(scale - self.scale)
    }
}

/// Reject scales whose power of ten does not fit in an `i64`.
pub fn check_scale(scale: u32) -> Result<(), FiscalError> {
    if scale > MAX_SCALE {
        return Err(FiscalError::InvalidEncoding(format!(
            "scale {scale} exceeds {MAX_SCALE} fractional digits"
        )));
    }
    Ok(())
}

impl Default for Fixed {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for Fixed {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Fixed {}

impl PartialOrd for Fixed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fixed {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.widened(scale).cmp(&other.widened(scale))
    }
}

impl From<i64> for Fixed {
    fn from(value: i64) -> Self {
        Self::from_int(value)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.units);
        }
        let sign = if self.units < 0 { "-" } else { "" };
        let magnitude = self.units.unsigned_abs();
        let divisor = 10u64.pow(self.scale);
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            magnitude / divisor,
            magnitude % divisor,
            width = self.scale as usize
        )
    }
}

impl FromStr for Fixed {
    type Err = FiscalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FiscalError::InvalidEncoding(format!("not a decimal number: {s:?}"));

        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        // Both separators show up in device text reports
        let (int_part, frac_part) = match body.split_once(['.', ',']) {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let scale = frac_part.len() as u32;
        if scale > MAX_SCALE {
            return Err(invalid());
        }

        let digits = format!("{int_part}{frac_part}");
        let units: i64 = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| invalid())?
        };
        Ok(Self::new(if negative { -units } else { units }, scale))
    }
}

impl Serialize for Fixed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let value: Fixed = "12.995".parse().unwrap();
        assert_eq!(value.units(), 12995);
        assert_eq!(value.scale(), 3);
        assert_eq!(value.to_string(), "12.995");

        assert_eq!("0.05".parse::<Fixed>().unwrap().to_string(), "0.05");
        assert_eq!("-3,50".parse::<Fixed>().unwrap().to_string(), "-3.50");
        assert_eq!("42".parse::<Fixed>().unwrap().to_string(), "42");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Fixed>().is_err());
        assert!("1.2.3".parse::<Fixed>().is_err());
        assert!("12a".parse::<Fixed>().is_err());
        assert!(".".parse::<Fixed>().is_err());
    }

    #[test]
    fn test_numeric_equality_ignores_scale() {
        assert_eq!(Fixed::new(150, 2), Fixed::new(15, 1));
        assert_eq!(Fixed::new(0, 3), Fixed::ZERO);
        assert!(Fixed::new(1299, 2) < Fixed::new(13, 0));
    }

    #[test]
    fn test_rescale_truncates() {
        let value = Fixed::new(12345, 4); // 1.2345
        assert_eq!(value.rescale(2), Some(123));
        assert_eq!(value.rescale(4), Some(12345));
        assert_eq!(value.rescale(6), Some(1_234_500));
        assert_eq!(Fixed::new(-199, 2).rescale(0), Some(-1));
    }

    #[test]
    fn test_rescale_overflow() {
        assert_eq!(Fixed::new(i64::MAX, 0).rescale(1), None);
        assert_eq!(Fixed::new(1, 0).rescale(40), None);
        assert_eq!(Fixed::new(1, 0).rescale(u32::MAX), None);
    }

    #[test]
    fn test_try_new_rejects_large_scale() {
        assert_eq!(Fixed::try_new(1, MAX_SCALE).unwrap().scale(), MAX_SCALE);
        assert!(matches!(
            Fixed::try_new(1, MAX_SCALE + 1),
            Err(FiscalError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_add_and_sub() {
        let a = Fixed::new(1050, 2);
        let b = Fixed::new(25, 1);
        assert_eq!(a.checked_add(b), Some(Fixed::new(1300, 2)));
        assert_eq!(a.checked_sub(b), Some(Fixed::new(800, 2)));
        assert!(b.checked_sub(a).unwrap().is_negative());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Fixed::new(4831, 2)).unwrap();
        assert_eq!(json, "\"48.31\"");
    }
}
