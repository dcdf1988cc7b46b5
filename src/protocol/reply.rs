//! # Reply Frames
//!
//! A standard reply is `[ack][payload][st1][st2]`. The payload layout is
//! declared per command as a [`ResponseShape`]: an ordered list of slots,
//! each a single byte or a fixed-size byte block. The shape alone determines
//! how many bytes the transport loop waits for.
//!
//! Standard replies never carry the ST3 descriptor block, so a [`Reply`]
//! always has an empty [`Status::descriptor`] and device faults are
//! classified from ST1 and ST2 alone. The ST3 table only applies to a
//! long-format status buffer passed to [`Status::from_reply`] directly.
//!
//! ```
//! use bematech::protocol::reply::{ResponseShape, Slot};
//!
//! // Tax table reply: one signed byte then 32 bytes of rates
//! let shape = ResponseShape::new(vec![Slot::SignedByte, Slot::Bytes(32)]);
//! assert_eq!(shape.len(), 33);
//! assert_eq!(shape.reply_len(2), 36);
//! ```

use crate::error::{FiscalError, Result};
use crate::protocol::status::Status;

/// One unpacked element of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Unsigned byte
    Byte,
    /// Signed byte
    SignedByte,
    /// Fixed-size block
    Bytes(usize),
}

impl Slot {
    pub const fn len(&self) -> usize {
        match self {
            Self::Byte | Self::SignedByte => 1,
            Self::Bytes(n) => *n,
        }
    }
}

/// Payload layout of a command's reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseShape {
    slots: Vec<Slot>,
}

impl ResponseShape {
    pub fn new(slots: Vec<Slot>) -> Self {
        Self { slots }
    }

    /// No payload: the reply is just ack + status.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single block of `n` bytes.
    pub fn bytes(n: usize) -> Self {
        Self::new(vec![Slot::Bytes(n)])
    }

    /// A single unsigned byte.
    pub fn byte() -> Self {
        Self::new(vec![Slot::Byte])
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.slots.iter().map(Slot::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full reply length: ack byte, payload, status trailer.
    pub fn reply_len(&self, status_size: usize) -> usize {
        1 + self.len() + status_size
    }
}

/// One decoded reply element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Byte(u8),
    SignedByte(i8),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_byte(&self) -> Option<u8> {
        match self {
            Self::Byte(b) => Some(*b),
            Self::SignedByte(b) => Some(*b as u8),
            Self::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Payload of a standard reply.
///
/// A payload of exactly one element is unwrapped to `Single`, so commands
/// with one reply field read naturally at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Single(Value),
    Many(Vec<Value>),
}

impl Payload {
    fn from_values(mut values: Vec<Value>) -> Self {
        match values.len() {
            0 => Self::Empty,
            1 => Self::Single(values.remove(0)),
            _ => Self::Many(values),
        }
    }

    /// The block of a single-block payload.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Single(Value::Bytes(bytes)) => Ok(bytes),
            other => Err(FiscalError::ProtocolViolation(format!(
                "expected a byte block payload, got {other:?}"
            ))),
        }
    }

    /// The byte of a single-byte payload.
    pub fn into_byte(self) -> Result<u8> {
        match &self {
            Self::Single(value) => value.as_byte(),
            _ => None,
        }
        .ok_or_else(|| {
            FiscalError::ProtocolViolation(format!("expected a single byte payload, got {self:?}"))
        })
    }

    /// All elements, whatever the arity.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// A fully unpacked reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Every element in wire order: ack, payload slots, status bytes
    pub values: Vec<Value>,
    pub status: Status,
    status_size: usize,
}

impl Reply {
    /// Unpack `raw` against `shape`; the length must match exactly.
    pub fn unpack(raw: &[u8], shape: &ResponseShape, status_size: usize) -> Result<Self> {
        let expected = shape.reply_len(status_size);
        if raw.len() != expected {
            return Err(FiscalError::ProtocolViolation(format!(
                "reply is {} bytes, expected {}",
                raw.len(),
                expected
            )));
        }

        let mut values = Vec::with_capacity(shape.slots().len() + 1 + status_size);
        values.push(Value::Byte(raw[0]));
        let mut offset = 1;
        for slot in shape.slots() {
            let chunk = &raw[offset..offset + slot.len()];
            values.push(match slot {
                Slot::Byte => Value::Byte(chunk[0]),
                Slot::SignedByte => Value::SignedByte(chunk[0] as i8),
                Slot::Bytes(_) => Value::Bytes(chunk.to_vec()),
            });
            offset += slot.len();
        }
        values.extend(raw[offset..].iter().map(|&b| Value::Byte(b)));

        // Only ack and trailer: payload bytes are never read as a descriptor
        let status = Status::from_reply(&[&raw[..1], &raw[offset..]].concat())?;

        Ok(Self {
            values,
            status,
            status_size,
        })
    }

    /// Elements between the ack byte and the status trailer.
    pub fn payload(&self) -> Payload {
        let end = self.values.len() - self.status_size;
        Payload::from_values(self.values[1..end].to_vec())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

// ============================================================================
// TESTS
// ============================================================================
