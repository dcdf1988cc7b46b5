//! # Register Table
//!
//! The printer exposes dozens of counters, totals and identification strings
//! through one command, `READ_REGISTER <id>`. Each register has its own reply
//! width and encoding, recorded here. The table is append-only: adding a
//! register means adding a row, never changing an existing one.
//!
//! Reading an id that is not in the table fails with
//! [`FiscalError::UnsupportedRegister`](crate::FiscalError::UnsupportedRegister)
//! before anything is written to the device.

use serde::Serialize;

use crate::error::{FiscalError, Result};
use crate::protocol::codepage;

pub const TOTAL: u8 = 3;
pub const TOTAL_CANCELATIONS: u8 = 4;
pub const TOTAL_DISCOUNT: u8 = 5;
/// Operation counter
pub const COO: u8 = 6;
/// General non-fiscal operation counter
pub const GNF: u8 = 7;
pub const NUMBER_REDUCTIONS_Z: u8 = 9;
/// Restart counter
pub const CRO: u8 = 10;
pub const LAST_ITEM_ID: u8 = 12;
pub const NUMBER_TILL: u8 = 14;
pub const NUMBER_STORE: u8 = 15;
pub const CURRENCY: u8 = 16;
pub const FISCAL_FLAGS: u8 = 17;
pub const EMISSION_DATE: u8 = 23;
pub const LAST_Z_DATE: u8 = 26;
pub const TRUNC_FLAG: u8 = 28;
pub const SERIAL: u8 = 40;
pub const FIRMWARE: u8 = 41;
/// Taxpayer id of the owner
pub const RIF: u8 = 42;
pub const NIT: u8 = 44;
/// Hours the printer has been powered
pub const OPERATION_TIME: u8 = 45;
pub const PAYMENT_METHODS: u8 = 49;
/// Fiscal coupon counter
pub const CCF: u8 = 55;
pub const PRINTER_INFO: u8 = 60;
/// Seconds left before a management report must be closed
pub const GERENCIAL_TIME: u8 = 71;
/// Gross sales of the day
pub const DAY_TOTAL: u8 = 77;
pub const PRINTER_SENSORS: u8 = 254;
/// Credit note counter
pub const CNC: u8 = 255;

/// Wire format of one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterDescriptor {
    pub id: u8,
    pub name: &'static str,
    /// Reply payload width in bytes
    pub width: usize,
    /// Packed decimal (decoded to a number) or raw bytes
    pub packed: bool,
}

const fn reg(id: u8, name: &'static str, width: usize, packed: bool) -> RegisterDescriptor {
    RegisterDescriptor {
        id,
        name,
        width,
        packed,
    }
}

/// Every register the driver knows how to read.
pub const REGISTERS: &[RegisterDescriptor] = &[
    reg(TOTAL, "total", 9, true),
    reg(TOTAL_CANCELATIONS, "total_cancelations", 7, true),
    reg(TOTAL_DISCOUNT, "total_discount", 7, true),
    reg(COO, "coo", 3, true),
    reg(GNF, "gnf", 3, true),
    reg(NUMBER_REDUCTIONS_Z, "number_reductions_z", 2, true),
    reg(CRO, "cro", 2, true),
    reg(LAST_ITEM_ID, "last_item_id", 2, true),
    reg(NUMBER_TILL, "number_till", 2, true),
    reg(NUMBER_STORE, "number_store", 2, true),
    reg(CURRENCY, "currency", 2, false),
    reg(FISCAL_FLAGS, "fiscal_flags", 1, false),
    reg(EMISSION_DATE, "emission_date", 6, false),
    reg(LAST_Z_DATE, "last_z_date", 6, false),
    reg(TRUNC_FLAG, "trunc_flag", 1, false),
    reg(SERIAL, "serial", 20, false),
    reg(FIRMWARE, "firmware", 3, true),
    reg(RIF, "rif", 20, false),
    reg(NIT, "nit", 20, false),
    reg(OPERATION_TIME, "operation_time", 2, true),
    reg(PAYMENT_METHODS, "payment_methods", 620, false),
    reg(CCF, "ccf", 3, true),
    reg(PRINTER_INFO, "printer_info", 42, false),
    reg(GERENCIAL_TIME, "gerencial_time", 4, true),
    reg(DAY_TOTAL, "day_total", 7, true),
    reg(PRINTER_SENSORS, "printer_sensors", 1, false),
    reg(CNC, "cnc", 3, true),
];

/// Find the descriptor for `id`.
pub fn lookup(id: u8) -> Result<&'static RegisterDescriptor> {
    REGISTERS
        .iter()
        .find(|r| r.id == id)
        .ok_or(FiscalError::UnsupportedRegister(id))
}

/// Find a register by its table name (CLI convenience).
pub fn by_name(name: &str) -> Option<&'static RegisterDescriptor> {
    REGISTERS.iter().find(|r| r.name.eq_ignore_ascii_case(name))
}

/// A decoded register value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RegisterValue {
    Number(u64),
    Bytes(Vec<u8>),
}

impl RegisterValue {
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Number(_) => None,
        }
    }

    /// Text content with trailing NUL and space padding removed.
    pub fn as_trimmed_text(&self) -> Option<String> {
        let bytes = self.as_bytes()?;
        let text = codepage::decode(bytes);
        Some(
            text.trim_end_matches(['\0', ' '])
                .trim_start()
                .to_string(),
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
