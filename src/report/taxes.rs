//! # Tax Table
//!
//! `READ_TAXCODES` answers with one signed byte (the number of programmed
//! slots) and 32 bytes holding 16 rates as 2-byte BCD percentages with two
//! implied decimals. Unused slots read as zero and are skipped.
//!
//! Three codes exist on every printer and carry no rate:
//! `FF` (tax substitution), `II` (exempt) and `NN` (not taxed).

use serde::Serialize;

use crate::error::{FiscalError, Result};
use crate::protocol::bcd;
use crate::protocol::fixed::Fixed;

pub const RATE_SLOTS: usize = 16;
pub const TABLE_LEN: usize = RATE_SLOTS * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxKind {
    /// A programmed percentage
    Custom,
    Substitution,
    Exemption,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxConstant {
    pub kind: TaxKind,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Fixed>,
}

impl TaxConstant {
    fn fixed_code(kind: TaxKind, code: &str) -> Self {
        Self {
            kind,
            code: code.to_string(),
            rate: None,
        }
    }
}

/// Decode the 32-byte rate table into the printer's tax codes.
pub fn decode_tax_constants(data: &[u8]) -> Result<Vec<TaxConstant>> {
    if data.len() != TABLE_LEN {
        return Err(FiscalError::ProtocolViolation(format!(
            "tax table is {} bytes, expected {}",
            data.len(),
            TABLE_LEN
        )));
    }

    let mut constants = Vec::with_capacity(RATE_SLOTS + 3);
    for (slot, pair) in data.chunks(2).enumerate() {
        let rate = bcd::decode_fixed(pair, 2)?;
        if rate.is_zero() {
            continue;
        }
        constants.push(TaxConstant {
            kind: TaxKind::Custom,
            code: format!("{:02}", slot + 1),
            rate: Some(rate),
        });
    }

    constants.push(TaxConstant::fixed_code(TaxKind::Substitution, "FF"));
    constants.push(TaxConstant::fixed_code(TaxKind::Exemption, "II"));
    constants.push(TaxConstant::fixed_code(TaxKind::None, "NN"));
    Ok(constants)
}

// ============================================================================
// TESTS
// ============================================================================
