//! # Error Types
//!
//! This module defines the error taxonomy used throughout the driver.
//!
//! ## Layers
//!
//! | Layer | Variants | When |
//! |-------|----------|------|
//! | Encoding | `FieldOverflow`, `InvalidEncoding`, `UnsupportedRegister` | before any I/O |
//! | Communication | `CommunicationTimeout`, `ProtocolViolation`, `Transport`, `Io` | while talking to the device |
//! | Device | `Device` | a status byte reported a fault |
//!
//! Device faults are never retried by the driver. Retry is reserved for
//! incomplete reads at the transport level.

use std::fmt;

use thiserror::Error;

/// Main error type for driver operations
#[derive(Debug, Error)]
pub enum FiscalError {
    /// The retry budget ran out before a complete reply arrived
    #[error("Timeout communicating with fiscal printer ({received} of {expected} bytes received)")]
    CommunicationTimeout { expected: usize, received: usize },

    /// A numeric value needs more digits than its field provides
    #[error("Value {value} does not fit in a {width} digit field")]
    FieldOverflow { value: String, width: usize },

    /// A value cannot be represented in the requested encoding
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// The register id is not part of the register table
    #[error("Unsupported register: {0}")]
    UnsupportedRegister(u8),

    /// The printer reported a fault in its status bytes
    #[error(transparent)]
    Device(#[from] DeviceFault),

    /// The reply does not match what the protocol allows
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Transport-level errors (open, configure, write)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FiscalError {
    /// The fault class, if this error was reported by the device.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::Device(fault) => Some(fault.kind),
            _ => None,
        }
    }

    /// True for the "coupon already open" class.
    ///
    /// Workflow code may treat this one as idempotent when reopening a sale.
    pub fn is_coupon_already_open(&self) -> bool {
        self.fault_kind() == Some(FaultKind::CouponOpen)
    }
}

/// Shorthand used by every fallible function in the crate.
pub type Result<T> = std::result::Result<T, FiscalError>;

// ============================================================================
// DEVICE FAULTS
// ============================================================================

/// Business meaning of a device-reported fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    OutOfPaper,
    AlmostOutOfPaper,
    /// Generic printer state problem (clock, error state, unprogrammed data)
    Printer,
    /// The command itself was malformed or unknown
    Command,
    CouponOpen,
    CouponNotOpen,
    CouponTotalize,
    CancelItem,
    ItemAddition,
    PaymentAddition,
    /// Fiscal or CMOS memory failure
    HardwareFailure,
    PrinterOffline,
    /// Everything the device refuses for business reasons not covered above
    Driver,
}

impl FaultKind {
    /// Faults caused by issuing a command in the wrong sale state.
    pub fn is_sequencing(self) -> bool {
        matches!(
            self,
            Self::CouponOpen | Self::CouponNotOpen | Self::CouponTotalize
        )
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OutOfPaper => "out of paper",
            Self::AlmostOutOfPaper => "almost out of paper",
            Self::Printer => "printer error",
            Self::Command => "command error",
            Self::CouponOpen => "coupon open",
            Self::CouponNotOpen => "coupon not open",
            Self::CouponTotalize => "coupon totalize error",
            Self::CancelItem => "cancel item error",
            Self::ItemAddition => "item addition error",
            Self::PaymentAddition => "payment addition error",
            Self::HardwareFailure => "hardware failure",
            Self::PrinterOffline => "printer offline",
            Self::Driver => "driver error",
        };
        f.write_str(name)
    }
}

/// Which part of the status reply raised the fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusByte {
    St1,
    St2,
    St3,
}

/// A structured fault decoded from the status bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct DeviceFault {
    pub kind: FaultKind,
    pub origin: StatusByte,
    /// Mask (st1/st2) or code (st3) that matched
    pub code: u8,
    pub detail: &'static str,
}

// ============================================================================
// TESTS
// ============================================================================
