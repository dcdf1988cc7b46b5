//! # Field Codec
//!
//! Every command argument and most reply fields are fixed-width. A
//! [`FieldSpec`] declares the width, padding side, encoding and (for numbers)
//! the implied decimal scale; [`encode`] always produces exactly `width`
//! bytes or fails before anything is sent.
//!
//! ## Policies
//!
//! | Encoding | Padding | Too long |
//! |----------|---------|----------|
//! | `Text` | spaces, per `align` | truncated (lossy) |
//! | `AsciiDecimal` | zeros on the left | `FieldOverflow` |
//! | `PackedDecimal` | zero nibbles on the left | `FieldOverflow` |
//! | `Binary` | NUL bytes on the right | truncated (lossy) |
//!
//! ## Example
//!
//! ```
//! use bematech::protocol::field::{self, FieldSpec, FieldValue};
//! use bematech::protocol::fixed::Fixed;
//!
//! // Item price: 8 integer + 3 fractional digits
//! let spec = FieldSpec::decimal(11, 3);
//! let price: Fixed = "12.995".parse()?;
//! let bytes = field::encode(&FieldValue::Number(price), &spec)?;
//! assert_eq!(bytes, b"00000012995");
//! assert_eq!(field::decode(&bytes, &spec)?, FieldValue::Number(price));
//! # Ok::<(), bematech::FiscalError>(())
//! ```

use crate::error::{FiscalError, Result};
use crate::protocol::bcd;
use crate::protocol::codepage;
use crate::protocol::fixed::{self, Fixed};

/// Which side keeps the content; the other side gets the padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// On-wire representation of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Zero-padded ASCII digits with an implied decimal point
    AsciiDecimal,
    /// Space-padded text in the printer code page
    Text,
    /// Two digits per byte
    PackedDecimal,
    /// Opaque bytes
    Binary,
}

/// Layout of one fixed-width field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Width in bytes on the wire
    pub width: usize,
    pub align: Align,
    pub encoding: Encoding,
    /// Implied fractional digits (numeric encodings only)
    pub scale: u32,
}

impl FieldSpec {
    /// Left-aligned, space-padded text (`%-Ns`).
    pub const fn text(width: usize) -> Self {
        Self {
            width,
            align: Align::Left,
            encoding: Encoding::Text,
            scale: 0,
        }
    }

    /// Right-aligned, space-padded text (`%Ns`).
    pub const fn text_right(width: usize) -> Self {
        Self {
            width,
            align: Align::Right,
            encoding: Encoding::Text,
            scale: 0,
        }
    }

    /// Zero-padded integer digits (`%0Nd`).
    pub const fn integer(width: usize) -> Self {
        Self::decimal(width, 0)
    }

    /// Zero-padded digits with `scale` implied fractional digits.
    pub const fn decimal(width: usize, scale: u32) -> Self {
        Self {
            width,
            align: Align::Right,
            encoding: Encoding::AsciiDecimal,
            scale,
        }
    }

    /// Packed decimal with `scale` implied fractional digits.
    pub const fn packed(width: usize, scale: u32) -> Self {
        Self {
            width,
            align: Align::Right,
            encoding: Encoding::PackedDecimal,
            scale,
        }
    }

    pub const fn binary(width: usize) -> Self {
        Self {
            width,
            align: Align::Left,
            encoding: Encoding::Binary,
            scale: 0,
        }
    }

    /// Number of decimal digits this field can hold.
    pub const fn digits(&self) -> usize {
        match self.encoding {
            Encoding::PackedDecimal => self.width * 2,
            _ => self.width,
        }
    }
}

/// A typed value travelling through a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(Fixed),
    Bytes(Vec<u8>),
}

/// Encode `value` into exactly `spec.width` bytes.
pub fn encode(value: &FieldValue, spec: &FieldSpec) -> Result<Vec<u8>> {
    match (spec.encoding, value) {
        (Encoding::Text, FieldValue::Text(text)) => encode_text(text, spec),
        (Encoding::AsciiDecimal, FieldValue::Number(number)) => {
            let digits = scaled_digits(number, spec)?;
            Ok(digits.into_bytes())
        }
        (Encoding::PackedDecimal, FieldValue::Number(number)) => {
            let digits = scaled_digits(number, spec)?;
            bcd::encode_digits(&digits)
        }
        (Encoding::Binary, FieldValue::Bytes(bytes)) => {
            let mut out = bytes.clone();
            out.resize(spec.width, 0);
            Ok(out)
        }
        (encoding, value) => Err(FiscalError::InvalidEncoding(format!(
            "{value:?} cannot be encoded as {encoding:?}"
        ))),
    }
}

/// Decode exactly `spec.width` bytes according to `spec`.
pub fn decode(bytes: &[u8], spec: &FieldSpec) -> Result<FieldValue> {
    if bytes.len() != spec.width {
        return Err(FiscalError::ProtocolViolation(format!(
            "field is {} bytes, expected {}",
            bytes.len(),
            spec.width
        )));
    }
    match spec.encoding {
        Encoding::Text => {
            let text = codepage::decode(bytes);
            let text = match spec.align {
                Align::Left => text.trim_end_matches(' '),
                Align::Right => text.trim_start_matches(' '),
            };
            Ok(FieldValue::Text(text.to_string()))
        }
        Encoding::AsciiDecimal => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| FiscalError::InvalidEncoding(format!("field digits: {e}")))?;
            let digits = text.trim_start_matches(' ');
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(FiscalError::InvalidEncoding(format!(
                    "not a decimal field: {text:?}"
                )));
            }
            let units: i64 = digits.parse().map_err(|_| {
                FiscalError::InvalidEncoding(format!("decimal field {digits} exceeds i64"))
            })?;
            Ok(FieldValue::Number(Fixed::try_new(units, spec.scale)?))
        }
        Encoding::PackedDecimal => Ok(FieldValue::Number(bcd::decode_fixed(bytes, spec.scale)?)),
        Encoding::Binary => Ok(FieldValue::Bytes(bytes.to_vec())),
    }
}

fn encode_text(text: &str, spec: &FieldSpec) -> Result<Vec<u8>> {
    let mut content = codepage::encode(text);
    content.truncate(spec.width);
    let padding = spec.width - content.len();
    let mut out = Vec::with_capacity(spec.width);
    match spec.align {
        Align::Left => {
            out.extend_from_slice(&content);
            out.resize(spec.width, b' ');
        }
        Align::Right => {
            out.resize(padding, b' ');
            out.extend_from_slice(&content);
        }
    }
    Ok(out)
}

/// Zero-padded digits of `number * 10^scale`, exactly `spec.digits()` long.
fn scaled_digits(number: &Fixed, spec: &FieldSpec) -> Result<String> {
    let overflow = || FiscalError::FieldOverflow {
        value: number.to_string(),
        width: spec.digits(),
    };
    if number.is_negative() {
        return Err(FiscalError::InvalidEncoding(format!(
            "negative value {number} in unsigned field"
        )));
    }
    fixed::check_scale(spec.scale)?;
    let units = number.rescale(spec.scale).ok_or_else(overflow)?;
    let digits = format!("{units:0>w$}", w = spec.digits());
    if digits.len() > spec.digits() {
        return Err(overflow());
    }
    Ok(digits)
}

// ============================================================================
// TESTS
// ============================================================================
