//! # Last Closing (Reduction Z) Report
//!
//! The printer answers the last-closing command with a 324-byte block of
//! fixed-offset fields. Monetary totals are packed decimal with two implied
//! decimals, counters are packed integers, flags are raw bytes.
//!
//! ```text
//! off  len  kind  field
//!   0    1  BIN   00 if the reduction was commanded, otherwise automatic
//!   1    9  BCD   grand total
//!  10    7  BCD   cancellations
//!  17    7  BCD   discounts
//!  24   32  BCD   16 tax rates, XX,XX%
//!  56  112  BCD   16 partial totalizers
//! 168    7  ---   reserved
//! 175    7  BCD   exempt
//! 182    7  ---   reserved
//! 189    7  BCD   withdrawals
//! 196    7  BCD   cash supply
//! 203   63  BCD   9 non-fiscal totalizers
//! 266   18  BCD   9 non-fiscal counters
//! 284    3  BCD   COO
//! 287    3  BCD   general non-fiscal counter
//! 290    1  BIN   programmed taxes
//! 291    3  BCD   movement date DDMMYY (00/00/00 when there is none)
//! 294    7  BCD   markups
//! 301    7  ---   reserved
//! 308    9  BCD   VAT total
//! 317    7  BCD   VAT returned
//! ```

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{FiscalError, Result};
use crate::protocol::bcd;
use crate::protocol::fixed::Fixed;

/// Size of the report block.
pub const REPORT_LEN: usize = 324;

const TAX_SLOTS: usize = 16;
const NON_FISCAL_SLOTS: usize = 9;
const MONEY_SCALE: u32 = 2;

/// Decoded last-closing report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosingReport {
    /// The reduction was commanded rather than triggered automatically
    pub commanded: bool,
    pub grand_total: Fixed,
    pub cancellations: Fixed,
    pub discounts: Fixed,
    /// Percent, one per tax slot
    pub tax_rates: Vec<Fixed>,
    pub totalizers: Vec<Fixed>,
    pub exempt: Fixed,
    pub withdrawals: Fixed,
    pub cash_supply: Fixed,
    pub non_fiscal_totalizers: Vec<Fixed>,
    pub non_fiscal_counters: Vec<u64>,
    pub coo: u64,
    pub gnf: u64,
    pub programmed_taxes: u8,
    pub movement_date: Option<NaiveDate>,
    pub markups: Fixed,
    pub vat_total: Fixed,
    pub vat_returned: Fixed,
}

/// One value of [`ClosingReport::entries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReportValue {
    Flag(bool),
    Amount(Fixed),
    Amounts(Vec<Fixed>),
    Count(u64),
    Counts(Vec<u64>),
    Date(Option<NaiveDate>),
}

/// Cursor over the report block.
struct Fields<'a> {
    data: &'a [u8],
}

impl Fields<'_> {
    fn money(&self, offset: usize, len: usize) -> Result<Fixed> {
        bcd::decode_fixed(&self.data[offset..offset + len], MONEY_SCALE)
    }

    fn count(&self, offset: usize, len: usize) -> Result<u64> {
        bcd::decode_u64(&self.data[offset..offset + len])
    }

    fn money_slots(&self, offset: usize, stride: usize, count: usize) -> Result<Vec<Fixed>> {
        (0..count)
            .map(|i| self.money(offset + i * stride, stride))
            .collect()
    }

    fn count_slots(&self, offset: usize, stride: usize, count: usize) -> Result<Vec<u64>> {
        (0..count)
            .map(|i| self.count(offset + i * stride, stride))
            .collect()
    }

    fn date(&self, offset: usize) -> Result<Option<NaiveDate>> {
        let digits = bcd::decode_digits(&self.data[offset..offset + 3])?;
        parse_ddmmyy(&digits)
    }
}

/// Parse `DDMMYY`; all zeros means "no date".
pub(crate) fn parse_ddmmyy(digits: &str) -> Result<Option<NaiveDate>> {
    if digits.bytes().all(|b| b == b'0') {
        return Ok(None);
    }
    NaiveDate::parse_from_str(digits, "%d%m%y")
        .map(Some)
        .map_err(|e| FiscalError::InvalidEncoding(format!("invalid date {digits:?}: {e}")))
}

impl ClosingReport {
    /// Decode a report block; `data` must be exactly [`REPORT_LEN`] bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != REPORT_LEN {
            return Err(FiscalError::ProtocolViolation(format!(
                "closing report is {} bytes, expected {}",
                data.len(),
                REPORT_LEN
            )));
        }
        let f = Fields { data };

        Ok(Self {
            commanded: data[0] == 0,
            grand_total: f.money(1, 9)?,
            cancellations: f.money(10, 7)?,
            discounts: f.money(17, 7)?,
            tax_rates: f.money_slots(24, 2, TAX_SLOTS)?,
            totalizers: f.money_slots(56, 7, TAX_SLOTS)?,
            exempt: f.money(175, 7)?,
            withdrawals: f.money(189, 7)?,
            cash_supply: f.money(196, 7)?,
            non_fiscal_totalizers: f.money_slots(203, 7, NON_FISCAL_SLOTS)?,
            non_fiscal_counters: f.count_slots(266, 2, NON_FISCAL_SLOTS)?,
            coo: f.count(284, 3)?,
            gnf: f.count(287, 3)?,
            programmed_taxes: data[290],
            movement_date: f.date(291)?,
            markups: f.money(294, 7)?,
            vat_total: f.money(308, 9)?,
            vat_returned: f.money(317, 7)?,
        })
    }

    /// The report as labelled values, in block order.
    pub fn entries(&self) -> Vec<(&'static str, ReportValue)> {
        use ReportValue::*;

        vec![
            ("Z was commanded", Flag(self.commanded)),
            ("Grand total", Amount(self.grand_total)),
            ("Cancellations", Amount(self.cancellations)),
            ("Discounts", Amount(self.discounts)),
            ("Registered taxes", Amounts(self.tax_rates.clone())),
            ("Totalizers", Amounts(self.totalizers.clone())),
            ("Exempt amount", Amount(self.exempt)),
            ("Withdrawals", Amount(self.withdrawals)),
            ("Cash supply", Amount(self.cash_supply)),
            ("Non-fiscal totalizers", Amounts(self.non_fiscal_totalizers.clone())),
            ("Non-fiscal counters", Counts(self.non_fiscal_counters.clone())),
            ("Operation counter (COO)", Count(self.coo)),
            ("General non-fiscal counter", Count(self.gnf)),
            ("Programmed taxes", Count(u64::from(self.programmed_taxes))),
            ("Movement date", Date(self.movement_date)),
            ("Markups", Amount(self.markups)),
            ("VAT total", Amount(self.vat_total)),
            ("VAT returned", Amount(self.vat_returned)),
        ]
    }
}

// ============================================================================
// TESTS
// ============================================================================
