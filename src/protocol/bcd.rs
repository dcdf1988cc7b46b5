//! # Packed Decimal (BCD)
//!
//! Counters, totals and dates come back from the printer as packed decimal:
//! every byte carries two decimal digits, tens in the high nibble and units in
//! the low nibble, most significant byte first.
//!
//! ```text
//! 0x12 0x99 0x50  ->  "129950"
//! ```
//!
//! Nibbles 10-15 are not decimal digits. Decoding them is an error rather
//! than a silent guess; the one place that needs the raw nibbles (the date
//! registers, checked for "all zero") uses [`to_hex_digits`].

use crate::error::{FiscalError, Result};
use crate::protocol::fixed::Fixed;

/// Decode packed decimal bytes into a digit string, two digits per byte.
///
/// The output always has `2 * bytes.len()` characters; leading zeros are
/// kept so the byte width survives a round trip through [`encode_digits`].
pub fn decode_digits(bytes: &[u8]) -> Result<String> {
    let mut digits = String::with_capacity(bytes.len() * 2);
    for (offset, &byte) in bytes.iter().enumerate() {
        let hi = byte >> 4;
        let lo = byte & 0x0F;
        if hi > 9 || lo > 9 {
            return Err(FiscalError::InvalidEncoding(format!(
                "invalid BCD digit at byte {offset}: 0x{byte:02X}"
            )));
        }
        digits.push(char::from(b'0' + hi));
        digits.push(char::from(b'0' + lo));
    }
    Ok(digits)
}

/// Encode a digit string as packed decimal.
///
/// An odd number of digits is padded with a leading zero.
pub fn encode_digits(digits: &str) -> Result<Vec<u8>> {
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_digit()) {
        return Err(FiscalError::InvalidEncoding(format!(
            "non-digit {bad:?} in BCD input"
        )));
    }
    let mut nibbles: Vec<u8> = digits.bytes().map(|b| b - b'0').collect();
    if nibbles.len() % 2 == 1 {
        nibbles.insert(0, 0);
    }
    Ok(nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect())
}

/// Decode packed decimal bytes as an unsigned integer.
pub fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let digits = decode_digits(bytes)?;
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    significant
        .parse()
        .map_err(|_| FiscalError::InvalidEncoding(format!("BCD value {significant} exceeds u64")))
}

/// Encode an unsigned integer into exactly `width` packed decimal bytes.
pub fn encode_u64(value: u64, width: usize) -> Result<Vec<u8>> {
    let digits = format!("{value:0>w$}", w = width * 2);
    if digits.len() > width * 2 {
        return Err(FiscalError::FieldOverflow {
            value: value.to_string(),
            width: width * 2,
        });
    }
    encode_digits(&digits)
}

/// Decode packed decimal bytes as a fixed-point value with `scale`
/// implied fractional digits.
pub fn decode_fixed(bytes: &[u8], scale: u32) -> Result<Fixed> {
    let units = decode_u64(bytes)?;
    let units = i64::try_from(units)
        .map_err(|_| FiscalError::InvalidEncoding(format!("BCD value {units} exceeds i64")))?;
    Fixed::try_new(units, scale)
}

/// Render every nibble as a hex digit, never failing.
///
/// Used for date registers, where an all-zero block means "never happened".
pub fn to_hex_digits(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_digits() {
        assert_eq!(decode_digits(&[0x12, 0x99, 0x50]).unwrap(), "129950");
        assert_eq!(decode_digits(&[0x00, 0x07]).unwrap(), "0007");
        assert_eq!(decode_digits(&[]).unwrap(), "");
    }

    #[test]
    fn test_decode_rejects_hex_nibbles() {
        let err = decode_digits(&[0x12, 0x3A]).unwrap_err();
        assert!(matches!(err, FiscalError::InvalidEncoding(_)));
        assert!(err.to_string().contains("byte 1"));

        assert!(decode_digits(&[0xF0]).is_err());
    }

    #[test]
    fn test_encode_digits() {
        assert_eq!(encode_digits("129950").unwrap(), vec![0x12, 0x99, 0x50]);
        assert_eq!(encode_digits("123").unwrap(), vec![0x01, 0x23]);
        assert!(encode_digits("12a4").is_err());
    }

    #[test]
    fn test_valid_bytes_round_trip() {
        // Every valid packed byte, in one buffer
        let bytes: Vec<u8> = (0..=9u8)
            .flat_map(|hi| (0..=9u8).map(move |lo| (hi << 4) | lo))
            .collect();
        let digits = decode_digits(&bytes).unwrap();
        assert_eq!(encode_digits(&digits).unwrap(), bytes);
    }

    #[test]
    fn test_u64_conversions() {
        assert_eq!(decode_u64(&[0x00, 0x01, 0x23]).unwrap(), 123);
        assert_eq!(decode_u64(&[0x00, 0x00]).unwrap(), 0);
        assert_eq!(encode_u64(123, 3).unwrap(), vec![0x00, 0x01, 0x23]);
        assert!(matches!(
            encode_u64(12345, 2),
            Err(FiscalError::FieldOverflow { .. })
        ));
    }

    #[test]
    fn test_decode_u64_full_width_total() {
        // Grand total register: 9 bytes, 18 digits
        let bytes = [0x99; 9];
        assert_eq!(decode_u64(&bytes).unwrap(), 999_999_999_999_999_999);
    }

    #[test]
    fn test_decode_fixed() {
        let value = decode_fixed(&[0x00, 0x00, 0x48, 0x31], 2).unwrap();
        assert_eq!(value, Fixed::new(4831, 2));
        assert_eq!(value.to_string(), "48.31");
    }

    #[test]
    fn test_fixed_rejects_large_scale() {
        assert!(matches!(
            decode_fixed(&[0x00, 0x01], 19),
            Err(FiscalError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_hex_digits_never_fail() {
        assert_eq!(to_hex_digits(&[0x31, 0x12, 0x25]), "311225");
        assert_eq!(to_hex_digits(&[0xAB]), "ab");
        assert_eq!(to_hex_digits(&[0, 0, 0]), "000000");
    }
}
