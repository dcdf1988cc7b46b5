//! # Payment Method Table
//!
//! Register `PAYMENT_METHODS` returns 620 bytes describing up to 20 payment
//! methods:
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0 | 20 × 16 | names, NUL-filled when unused |
//! | 320 | 20 × 7 | BCD accumulated totals |
//! | 460 | 20 × 7 | BCD last amounts |
//! | 600 | 20 × 1 | TEF (electronic transfer) flag |

use serde::Serialize;

use crate::error::{FiscalError, Result};
use crate::protocol::bcd;
use crate::protocol::codepage;
use crate::protocol::fixed::Fixed;

pub const TABLE_LEN: usize = 620;
pub const METHOD_SLOTS: usize = 20;
pub const NAME_LEN: usize = 16;

const TOTALS_OFFSET: usize = 320;
const LAST_OFFSET: usize = 460;
const TEF_OFFSET: usize = 600;
const AMOUNT_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentMethod {
    /// `01`..`20`
    pub code: String,
    pub name: String,
    pub total: Fixed,
    pub last: Fixed,
    pub tef: bool,
}

impl PaymentMethod {
    /// Decode every programmed slot of the table.
    pub fn decode_table(data: &[u8]) -> Result<Vec<Self>> {
        if data.len() != TABLE_LEN {
            return Err(FiscalError::ProtocolViolation(format!(
                "payment table is {} bytes, expected {}",
                data.len(),
                TABLE_LEN
            )));
        }

        let amount = |base: usize, slot: usize| {
            let start = base + slot * AMOUNT_LEN;
            bcd::decode_fixed(&data[start..start + AMOUNT_LEN], 2)
        };

        let mut methods = Vec::new();
        for slot in 0..METHOD_SLOTS {
            let name = &data[slot * NAME_LEN..(slot + 1) * NAME_LEN];
            if name.iter().all(|&b| b == 0) {
                continue;
            }
            methods.push(Self {
                code: format!("{:02}", slot + 1),
                name: codepage::decode(name)
                    .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                    .to_string(),
                total: amount(TOTALS_OFFSET, slot)?,
                last: amount(LAST_OFFSET, slot)?,
                tef: data[TEF_OFFSET + slot] != 0,
            });
        }
        Ok(methods)
    }
}

// ============================================================================
// TESTS
// ============================================================================
