//! # Status Decoder
//!
//! Every standard reply ends with two status bytes. Each bit flags one
//! condition; the tables below map masks to faults and are evaluated in
//! declared order (highest mask first). The first mask set in the byte wins,
//! so a byte with several bits set surfaces exactly one fault.
//!
//! ## ST1
//!
//! | Mask | Meaning |
//! |------|---------|
//! | 128 | out of paper |
//! | 64 | almost out of paper |
//! | 32 | clock error |
//! | 16 | printer in error state |
//! | 8 | first byte of command is not ESC |
//! | 4 | nonexistent command |
//! | 2 | coupon open (informative, never a fault) |
//! | 1 | invalid parameter count |
//!
//! ## ST2
//!
//! | Mask | Meaning |
//! |------|---------|
//! | 128 | invalid parameter |
//! | 64 | fiscal memory full |
//! | 32 | CMOS memory error |
//! | 16 | tax not programmed |
//! | 8 | no tax slot available |
//! | 4 | item cannot be cancelled |
//! | 2 | owner data not programmed |
//! | 1 | command not executed |
//!
//! Long-format replies carry an extra descriptor block (ST3) between the ack
//! byte and ST1/ST2. Its first byte is an exact error code with a finer
//! meaning than "command not executed", so it is checked before ST2. The
//! driver reads standard replies only; the descriptor is present just when a
//! caller hands a long-format buffer to [`Status::from_reply`].

use crate::error::{DeviceFault, FaultKind, FiscalError, Result, StatusByte};

/// First byte of a successful reply
pub const ACK: u8 = 0x06;
/// Device rejected the packet (checksum, framing)
pub const NAK: u8 = 0x15;

/// ST1 bit telling that a coupon is open.
pub const ST1_COUPON_OPEN: u8 = 0x02;
/// ST2 bit for an invalid parameter; on a register read it means "no such register".
pub const ST2_INVALID_PARAMETER: u8 = 0x80;

/// `(mask, kind, message)` evaluated in order.
pub type MaskTable = [(u8, FaultKind, &'static str)];

pub const ST1_FAULTS: &MaskTable = &[
    (128, FaultKind::OutOfPaper, "Printer is out of paper"),
    (64, FaultKind::AlmostOutOfPaper, "Printer almost out of paper"),
    (32, FaultKind::Printer, "Printer clock error"),
    (16, FaultKind::Printer, "Printer in error state"),
    (8, FaultKind::Command, "First data value in CMD is not ESC (1BH)"),
    (4, FaultKind::Command, "Nonexistent command"),
    (1, FaultKind::Command, "Invalid CMD parameter number"),
];

pub const ST2_FAULTS: &MaskTable = &[
    (128, FaultKind::Command, "Invalid CMD parameter"),
    (64, FaultKind::HardwareFailure, "Fiscal memory is full"),
    (32, FaultKind::HardwareFailure, "Error in CMOS memory"),
    (16, FaultKind::Printer, "Given tax is not programmed on the printer"),
    (8, FaultKind::Driver, "No available tax slot"),
    (4, FaultKind::CancelItem, "The item wasn't added in the coupon or can't be cancelled"),
    (2, FaultKind::Printer, "Owner data (CGC/IE) not programmed on the printer"),
    (1, FaultKind::Command, "Command not executed"),
];

/// `(code, kind, message)`, matched by equality.
pub const ST3_FAULTS: &MaskTable = &[
    (7, FaultKind::CouponOpen, "Coupon already open"),
    (8, FaultKind::CouponNotOpen, "Coupon is closed"),
    (13, FaultKind::PrinterOffline, "Printer is offline"),
    (16, FaultKind::Driver, "Surcharge or discount greater than coupon total value"),
    (17, FaultKind::Driver, "Coupon with no items"),
    (20, FaultKind::PaymentAddition, "Payment method not recognized"),
    (22, FaultKind::PaymentAddition, "Coupon total value already reached, no more payments accepted"),
    (23, FaultKind::Driver, "Coupon isn't totalized yet"),
    (43, FaultKind::CouponNotOpen, "Printer not initialized"),
    (45, FaultKind::Printer, "Printer without serial number"),
    (52, FaultKind::Driver, "Invalid start date"),
    (53, FaultKind::Driver, "Invalid final date"),
    (85, FaultKind::Driver, "Sale with null value"),
    (91, FaultKind::ItemAddition, "Surcharge or discount greater than item value"),
    (100, FaultKind::Driver, "Invalid date"),
    (115, FaultKind::CancelItem, "Item doesn't exist or was already cancelled"),
    (118, FaultKind::Driver, "Surcharge greater than item value"),
    (119, FaultKind::Driver, "Discount greater than item value"),
    (129, FaultKind::CouponOpen, "Invalid month"),
    (169, FaultKind::CouponTotalize, "Coupon already totalized"),
    (170, FaultKind::PaymentAddition, "Coupon not totalized yet"),
    (171, FaultKind::Driver, "Surcharge on subtotal already effected"),
    (172, FaultKind::Driver, "Discount on subtotal already effected"),
    (176, FaultKind::Driver, "Invalid date"),
];

/// Status of one reply. Decoded fresh every time, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub ack: u8,
    /// ST3 block, empty on standard replies
    pub descriptor: Vec<u8>,
    pub st1: u8,
    pub st2: u8,
}

impl Status {
    pub fn new(st1: u8, st2: u8) -> Self {
        Self {
            ack: ACK,
            descriptor: Vec::new(),
            st1,
            st2,
        }
    }

    /// Parse a raw status reply: `[ack][descriptor...][st1][st2]`.
    pub fn from_reply(reply: &[u8]) -> Result<Self> {
        if reply.len() < 3 {
            return Err(FiscalError::ProtocolViolation(format!(
                "status reply is {} bytes, need at least 3",
                reply.len()
            )));
        }
        let n = reply.len();
        Ok(Self {
            ack: reply[0],
            descriptor: reply[1..n - 2].to_vec(),
            st1: reply[n - 2],
            st2: reply[n - 1],
        })
    }

    /// True while a sale is in progress. Never raises.
    pub fn is_coupon_open(&self) -> bool {
        self.st1 & ST1_COUPON_OPEN != 0
    }

    /// ST3 code, when the descriptor block is present.
    pub fn st3(&self) -> Option<u8> {
        self.descriptor.first().copied()
    }

    /// The first fault reported by this status, if any.
    ///
    /// Order: ST1 table, then ST3 (only with a descriptor), then ST2 table.
    pub fn fault(&self) -> Option<DeviceFault> {
        first_mask_match(ST1_FAULTS, self.st1, StatusByte::St1)
            .or_else(|| self.st3().and_then(st3_match))
            .or_else(|| first_mask_match(ST2_FAULTS, self.st2, StatusByte::St2))
    }

    /// Raise the first fault, if any.
    pub fn check(&self) -> Result<()> {
        log::debug!(
            "status: st={} st1={} st2={} descriptor={:02X?}",
            self.ack,
            self.st1,
            self.st2,
            self.descriptor
        );
        match self.fault() {
            Some(fault) => Err(fault.into()),
            None => Ok(()),
        }
    }
}

fn first_mask_match(table: &MaskTable, value: u8, origin: StatusByte) -> Option<DeviceFault> {
    if value == 0 {
        return None;
    }
    table
        .iter()
        .find(|(mask, _, _)| value & mask == *mask)
        .map(|&(code, kind, detail)| DeviceFault {
            kind,
            origin,
            code,
            detail,
        })
}

fn st3_match(code: u8) -> Option<DeviceFault> {
    ST3_FAULTS
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|&(code, kind, detail)| DeviceFault {
            kind,
            origin: StatusByte::St3,
            code,
            detail,
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(status: &Status) -> Option<FaultKind> {
        status.check().err().and_then(|e| e.fault_kind())
    }

    #[test]
    fn test_clean_status() {
        let status = Status::new(0, 0);
        assert!(status.check().is_ok());
        assert!(!status.is_coupon_open());
    }

    #[test]
    fn test_coupon_open_bit_is_not_a_fault() {
        let status = Status::new(2, 0);
        assert!(status.check().is_ok());
        assert!(status.is_coupon_open());
    }

    #[test]
    fn test_out_of_paper_wins() {
        // Out of paper plus almost out of paper plus clock error
        let status = Status::new(128 | 64 | 32, 0);
        let err = status.check().unwrap_err();
        let FiscalError::Device(fault) = err else {
            panic!("expected device fault, got {err:?}");
        };
        assert_eq!(fault.kind, FaultKind::OutOfPaper);
        assert_eq!(fault.origin, StatusByte::St1);
        assert_eq!(fault.code, 128);
    }

    #[test]
    fn test_almost_out_of_paper() {
        assert_eq!(
            kind_of(&Status::new(64 | 2, 0)),
            Some(FaultKind::AlmostOutOfPaper)
        );
    }

    #[test]
    fn test_st1_checked_before_st2() {
        assert_eq!(
            kind_of(&Status::new(4, 64)),
            Some(FaultKind::Command)
        );
    }

    #[test]
    fn test_st2_faults() {
        assert_eq!(
            kind_of(&Status::new(0, 64)),
            Some(FaultKind::HardwareFailure)
        );
        assert_eq!(kind_of(&Status::new(0, 4)), Some(FaultKind::CancelItem));
        assert_eq!(kind_of(&Status::new(0, 1)), Some(FaultKind::Command));
    }

    #[test]
    fn test_every_single_bit_maps_to_its_row() {
        for &(mask, kind, _) in ST2_FAULTS {
            assert_eq!(kind_of(&Status::new(0, mask)), Some(kind));
        }
        for &(mask, kind, _) in ST1_FAULTS {
            assert_eq!(kind_of(&Status::new(mask, 0)), Some(kind));
        }
    }

    #[test]
    fn test_from_short_reply() {
        let status = Status::from_reply(&[ACK, 2, 0]).unwrap();
        assert_eq!(status.st1, 2);
        assert_eq!(status.st2, 0);
        assert!(status.descriptor.is_empty());
        assert_eq!(status.st3(), None);
    }

    #[test]
    fn test_from_reply_too_short() {
        assert!(matches!(
            Status::from_reply(&[ACK, 0]),
            Err(FiscalError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_st3_descriptor_beats_generic_st2() {
        let status = Status::from_reply(&[ACK, 7, 0, 1]).unwrap();
        assert_eq!(status.st3(), Some(7));
        let err = status.check().unwrap_err();
        assert!(err.is_coupon_already_open());
    }

    #[test]
    fn test_unknown_st3_falls_back_to_st2() {
        let status = Status::from_reply(&[ACK, 250, 0, 1]).unwrap();
        let FiscalError::Device(fault) = status.check().unwrap_err() else {
            panic!("expected device fault");
        };
        assert_eq!(fault.origin, StatusByte::St2);
        assert_eq!(fault.detail, "Command not executed");
    }

    #[test]
    fn test_st3_ignored_without_descriptor() {
        // Same st2 but standard 3-byte reply: generic fault
        let status = Status::from_reply(&[ACK, 0, 1]).unwrap();
        let FiscalError::Device(fault) = status.check().unwrap_err() else {
            panic!("expected device fault");
        };
        assert_eq!(fault.origin, StatusByte::St2);
    }
}
