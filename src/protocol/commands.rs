//! # MP-4000 Command Identifiers and Builder
//!
//! A command is an identifier followed by already-encoded argument bytes.
//! The identifier is written big-endian using as few bytes as its magnitude
//! needs, so the protocol's one-, two- and three-byte command families share
//! one builder:
//!
//! | Id | Bytes |
//! |----|-------|
//! | `0x23` | `23` |
//! | `0x3E47` | `3E 47` |
//! | `0x3E4737` | `3E 47 37` |
//!
//! Arguments are typed at the call site with [`Arg`]; each one carries the
//! field layout it is rendered with, so there is no runtime guessing about
//! whether `5` means "the byte 0x05" or "the text `5`".
//!
//! ## Example
//!
//! ```
//! use bematech::protocol::commands::{self, Arg, Command};
//!
//! let cmd = Command::new(commands::SET_TILL_STORE)
//!     .arg(Arg::integer(3, 4))
//!     .arg(Arg::integer(12, 4));
//! assert_eq!(cmd.encode()?, b"\x1100030012");
//! # Ok::<(), bematech::FiscalError>(())
//! ```

use crate::error::{FiscalError, Result};
use crate::protocol::codepage;
use crate::protocol::field::{self, FieldSpec, FieldValue};
use crate::protocol::fixed::Fixed;

// ============================================================================
// COMMAND IDENTIFIERS
// ============================================================================

/// Open a fiscal coupon (sale)
pub const COUPON_OPEN: u32 = 0x00;
/// Program a tax rate
pub const ADD_TAX: u32 = 0x07;
/// Cancel the open coupon or the last one
pub const COUPON_CANCEL: u32 = 0x0E;
/// Program till and store numbers
pub const SET_TILL_STORE: u32 = 0x11;
/// Read ST1/ST2
pub const STATUS: u32 = 0x13;
/// Read the 16 programmed tax rates
pub const READ_TAXCODES: u32 = 0x1A;
/// Read the partial totalizers block
pub const READ_TOTALIZERS: u32 = 0x1B;
pub const GET_COUPON_SUBTOTAL: u32 = 0x1D;
pub const GET_COUPON_NUMBER: u32 = 0x1E;
pub const CANCEL_ITEM: u32 = 0x1F;
pub const COUPON_TOTALIZE: u32 = 0x20;
pub const COUPON_CLOSE: u32 = 0x22;
/// Generic register indirection; see [`crate::protocol::registers`]
pub const READ_REGISTER: u32 = 0x23;
pub const PROGRAM_PAYMENT_METHOD: u32 = 0x47;
pub const ADD_PAYMENT: u32 = 0x48;
/// Program all payment method names at once
pub const PROGRAM_MULTI_PAYMENT_METHOD: u32 = 0x49;
pub const CREDIT_NOTE_OPEN: u32 = 0x59;
/// Maximum minutes the day may stay open before a reduction is forced
pub const SET_Z_TIME_LIMIT: u32 = 0x5A;
/// Enable or disable the "almost out of paper" sensor
pub const SET_PAPER_SENSOR: u32 = 0x3E3D;
/// Read the last closing (reduction Z) summary
pub const LAST_CLOSING: u32 = 0x3E37;
/// Set the application name printed at the foot of each coupon
pub const SET_FISCAL_APP: u32 = 0x3E40;
pub const ADD_ITEM: u32 = 0x3E47;
/// Article return
pub const ADD_REFUND: u32 = 0x3E4733;
/// Dump the transactions of a period as text
pub const READ_TRANSACTIONS: u32 = 0x3E4737;

/// Terminator of the text reports
pub const ETX: u8 = 0x03;

// ============================================================================
// ARGUMENTS
// ============================================================================

/// One typed command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Fixed-width text, padded or truncated per `spec`
    Text { value: String, spec: FieldSpec },
    /// Fixed-width number with implied decimals
    Number { value: Fixed, spec: FieldSpec },
    /// Fixed-width unsigned integer
    Unsigned { value: u64, spec: FieldSpec },
    /// Variable-length text followed by a NUL byte, truncated to `max_len`
    Terminated { value: String, max_len: usize },
    /// Minimal big-endian binary integer (same rule as the identifier)
    Int(u32),
    /// Bytes passed through unchanged
    Raw(Vec<u8>),
}

impl Arg {
    /// `%-Ns`
    pub fn text(value: impl Into<String>, width: usize) -> Self {
        Self::Text {
            value: value.into(),
            spec: FieldSpec::text(width),
        }
    }

    /// `%Ns`
    pub fn text_right(value: impl Into<String>, width: usize) -> Self {
        Self::Text {
            value: value.into(),
            spec: FieldSpec::text_right(width),
        }
    }

    /// `%0Nd`
    pub fn integer(value: u64, width: usize) -> Self {
        Self::Unsigned {
            value,
            spec: FieldSpec::integer(width),
        }
    }

    /// `value * 10^scale` as `%0Nd`
    pub fn decimal(value: Fixed, width: usize, scale: u32) -> Self {
        Self::Number {
            value,
            spec: FieldSpec::decimal(width, scale),
        }
    }

    pub fn terminated(value: impl Into<String>, max_len: usize) -> Self {
        Self::Terminated {
            value: value.into(),
            max_len,
        }
    }

    /// Append the encoded bytes to `out`.
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Text { value, spec } => {
                out.extend(field::encode(&FieldValue::Text(value.clone()), spec)?);
            }
            Self::Number { value, spec } => {
                out.extend(field::encode(&FieldValue::Number(*value), spec)?);
            }
            Self::Unsigned { value, spec } => {
                let units = i64::try_from(*value).map_err(|_| FiscalError::FieldOverflow {
                    value: value.to_string(),
                    width: spec.digits(),
                })?;
                out.extend(field::encode(&FieldValue::Number(Fixed::from_int(units)), spec)?);
            }
            Self::Terminated { value, max_len } => {
                if value.contains('\0') {
                    return Err(FiscalError::InvalidEncoding(format!(
                        "terminated text contains NUL: {value:?}"
                    )));
                }
                let mut bytes = codepage::encode(value);
                bytes.truncate(*max_len);
                out.extend(bytes);
                out.push(0);
            }
            Self::Int(value) => out.extend(id_bytes(*value)),
            Self::Raw(bytes) => out.extend_from_slice(bytes),
        }
        Ok(())
    }
}

// ============================================================================
// COMMAND
// ============================================================================

/// An identifier plus its arguments, built fresh for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    id: u32,
    args: Vec<Arg>,
}

impl Command {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Identifier bytes followed by every encoded argument.
    ///
    /// This is where caller mistakes (overflowing numbers, bad text) surface,
    /// before a single byte reaches the transport.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = id_bytes(self.id);
        for arg in &self.args {
            arg.encode_into(&mut out)?;
        }
        Ok(out)
    }
}

/// Big-endian bytes of `value` using 1, 2 or 3 bytes depending on magnitude.
///
/// ```
/// use bematech::protocol::commands::id_bytes;
///
/// assert_eq!(id_bytes(0x00), vec![0x00]);
/// assert_eq!(id_bytes(0x3E47), vec![0x3E, 0x47]);
/// assert_eq!(id_bytes(0x3E4737), vec![0x3E, 0x47, 0x37]);
/// ```
pub fn id_bytes(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let len = match value {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    };
    bytes[4 - len..].to_vec()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_bytes_widths() {
        assert_eq!(id_bytes(0), vec![0x00]);
        assert_eq!(id_bytes(0xFF), vec![0xFF]);
        assert_eq!(id_bytes(0x100), vec![0x01, 0x00]);
        assert_eq!(id_bytes(0xFFFF), vec![0xFF, 0xFF]);
        assert_eq!(id_bytes(0x1_0000), vec![0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_command_without_args() {
        assert_eq!(Command::new(STATUS).encode().unwrap(), vec![0x13]);
    }

    #[test]
    fn test_register_read_encodes_id_as_byte() {
        let cmd = Command::new(READ_REGISTER).arg(Arg::Int(40));
        assert_eq!(cmd.encode().unwrap(), vec![0x23, 40]);
    }

    #[test]
    fn test_mixed_arguments() {
        let cmd = Command::new(COUPON_TOTALIZE)
            .arg(Arg::text("d", 1))
            .arg(Arg::decimal(Fixed::new(150, 2), 4, 2));
        assert_eq!(cmd.encode().unwrap(), b"\x20d0150");
    }

    #[test]
    fn test_terminated_text() {
        let cmd = Command::new(ADD_ITEM)
            .arg(Arg::terminated("ABC", 49))
            .arg(Arg::terminated("LONG DESCRIPTION", 4));
        assert_eq!(cmd.encode().unwrap(), b"\x3e\x47ABC\0LONG\0");
    }

    #[test]
    fn test_terminated_accented_text() {
        let cmd = Command::new(ADD_ITEM)
            .arg(Arg::terminated("Café", 49))
            .arg(Arg::terminated("Piña colada", 4));
        assert_eq!(cmd.encode().unwrap(), b"\x3e\x47Caf\x82\0Pi\xa4a\0");
    }

    #[test]
    fn test_integer_beyond_i64_overflows() {
        let cmd = Command::new(SET_TILL_STORE).arg(Arg::integer(u64::MAX, 4));
        match cmd.encode() {
            Err(FiscalError::FieldOverflow { value, width }) => {
                assert_eq!(value, u64::MAX.to_string());
                assert_eq!(width, 4);
            }
            other => panic!("expected FieldOverflow, got {other:?}"),
        }
        let cmd = Command::new(SET_TILL_STORE).arg(Arg::integer(i64::MAX as u64 + 1, 20));
        assert!(matches!(cmd.encode(), Err(FiscalError::FieldOverflow { .. })));
    }

    #[test]
    fn test_terminated_rejects_embedded_nul() {
        let cmd = Command::new(ADD_ITEM).arg(Arg::terminated("A\0B", 49));
        assert!(matches!(
            cmd.encode(),
            Err(FiscalError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_overflow_surfaces_at_encode() {
        let cmd = Command::new(COUPON_TOTALIZE)
            .arg(Arg::text("d", 1))
            .arg(Arg::decimal(Fixed::new(10000, 2), 4, 2));
        assert!(matches!(
            cmd.encode(),
            Err(FiscalError::FieldOverflow { .. })
        ));
    }

    #[test]
    fn test_raw_passthrough() {
        let cmd = Command::new(READ_TRANSACTIONS).arg(Arg::Raw(b"R".to_vec()));
        assert_eq!(cmd.encode().unwrap(), b"\x3e\x47\x37R");
    }
}
