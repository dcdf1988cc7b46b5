//! # Transaction Log
//!
//! The read-transactions command makes the printer stream the electronic
//! journal of a period as plain text, terminated by ETX. This module turns
//! that text into a [`TransactionLog`].
//!
//! After an 11-line header, the lines of interest look like:
//!
//! ```text
//! COO:000123 CCF:000045 15/06/2024 10:22:01      invoice header
//! Dinheiro = 25,00                               payment of the invoice above
//! ANULACION COO:000124 15/06/2024 10:30:00       cancellation of the invoice above
//! Factura Inicial 000045
//! Factura Final 000051
//! Numero de Facturas 7
//! Numero de Facturas Anuladas 1
//! VERSION CAJA:0001 TIENDA:0002
//! ```
//!
//! Every other line is ignored.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{FiscalError, Result};
use crate::protocol::fixed::Fixed;

/// Lines of report header before the journal starts.
pub const HEADER_LINES: usize = 11;

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// A cancelled invoice reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cancellation {
    pub coo: String,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    /// Operation counter
    pub coo: String,
    /// Fiscal coupon counter
    pub ccf: String,
    pub issued: NaiveDateTime,
    /// `(payment method, amount)` in journal order
    pub payments: Vec<(String, Fixed)>,
    pub cancellation: Option<Cancellation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionLog {
    pub invoices: Vec<Invoice>,
    pub first_invoice: Option<u64>,
    pub last_invoice: Option<u64>,
    pub invoice_count: Option<u64>,
    pub cancelled_count: Option<u64>,
    pub till: Option<u32>,
    pub store: Option<u32>,
}

impl TransactionLog {
    pub fn parse(text: &str) -> Result<Self> {
        let mut log = Self::default();
        let mut current: Option<Invoice> = None;

        for line in text.lines().skip(HEADER_LINES) {
            let words: Vec<&str> = line.split_whitespace().collect();
            let Some(&first) = words.first() else {
                continue;
            };

            if first.contains("COO:") {
                if let Some(done) = current.take() {
                    log.invoices.push(done);
                }
                current = Some(parse_invoice_header(&words)?);
            } else if let Some((method, amount)) = parse_payment(&words) {
                if let Some(invoice) = current.as_mut() {
                    invoice.payments.push((method, amount));
                }
            } else if first.contains("ANULACI") && words.len() >= 4 {
                let cancellation = Cancellation {
                    coo: value_of(words[1]).to_string(),
                    at: parse_timestamp(words[2], words[3])?,
                };
                if let Some(invoice) = current.as_mut() {
                    invoice.cancellation = Some(cancellation);
                }
            } else if first.contains("Factura") && words.len() >= 3 {
                if words[1].contains("Inicial") {
                    log.first_invoice = Some(parse_number(words[2])?);
                } else if words[1].contains("Final") {
                    log.last_invoice = Some(parse_number(words[2])?);
                }
            } else if first.contains("mero") && words.len() > 3 && words[2].contains("Facturas") {
                if words[3].contains("Anuladas") {
                    if let Some(count) = words.get(4) {
                        log.cancelled_count = Some(parse_number(count)?);
                    }
                } else {
                    log.invoice_count = Some(parse_number(words[3])?);
                }
            } else if first.contains("VERSI")
                && words.len() >= 3
                && words[1].contains("CAJA")
                && words[2].contains("TIENDA")
            {
                log.till = Some(parse_u32(value_of(words[1]))?);
                log.store = Some(parse_u32(value_of(words[2]))?);
            }
        }

        if let Some(done) = current {
            log.invoices.push(done);
        }
        Ok(log)
    }
}

fn parse_invoice_header(words: &[&str]) -> Result<Invoice> {
    if words.len() < 4 {
        return Err(FiscalError::InvalidEncoding(format!(
            "truncated invoice header: {}",
            words.join(" ")
        )));
    }
    Ok(Invoice {
        coo: value_of(words[0]).to_string(),
        ccf: value_of(words[1]).to_string(),
        issued: parse_timestamp(words[2], words[3])?,
        payments: Vec::new(),
        cancellation: None,
    })
}

/// `<label words> = <amount>` where the amount uses a decimal comma.
fn parse_payment(words: &[&str]) -> Option<(String, Fixed)> {
    let [label @ .., eq, amount] = words else {
        return None;
    };
    if *eq != "=" || !amount.contains(',') {
        return None;
    }
    let value = amount.parse().ok()?;
    Some((label.join(" "), value))
}

/// The part after the colon of `KEY:value`.
fn value_of(word: &str) -> &str {
    word.split_once(':').map_or(word, |(_, v)| v)
}

fn parse_timestamp(date: &str, time: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), TIMESTAMP_FORMAT).map_err(|e| {
        FiscalError::InvalidEncoding(format!("invalid timestamp {date} {time}: {e}"))
    })
}

fn parse_number(word: &str) -> Result<u64> {
    word.trim_end_matches(':')
        .parse()
        .map_err(|_| FiscalError::InvalidEncoding(format!("not a number: {word:?}")))
}

fn parse_u32(word: &str) -> Result<u32> {
    u32::try_from(parse_number(word)?)
        .map_err(|_| FiscalError::InvalidEncoding(format!("number out of range: {word:?}")))
}

// ============================================================================
// TESTS
// ============================================================================
