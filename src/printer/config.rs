//! # Printer Configuration
//!
//! This module defines the model constants of supported fiscal printers and
//! the connection settings used to reach them.
//!
//! ## Supported Printers
//!
//! | Model | Protocol byte | Status bytes | Default retries |
//! |-------|---------------|--------------|-----------------|
//! | MP-4000 TH FI | `0x1B` | 2 | 5 |
//!
//! ## Usage
//!
//! ```
//! use bematech::printer::PrinterConfig;
//!
//! let config = PrinterConfig::MP4000;
//! println!("{}: status trailer of {} bytes", config.name, config.status_size);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FiscalError, Result};
use crate::protocol::packet::PROTO_ESC;
use crate::transport::link::{DEFAULT_RETRIES, RetryPolicy};
use crate::transport::serial::{DEFAULT_BAUD_RATE, DEFAULT_DEVICE};

/// # Printer Configuration
///
/// Wire-level characteristics of a fiscal printer model.
///
/// - **proto**: byte written after the length field of every packet
/// - **status_size**: number of status bytes trailing each standard reply
/// - **retries**: consecutive empty polls tolerated while reading a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterConfig {
    /// Printer model name
    pub name: &'static str,

    /// Protocol byte following the length field
    pub proto: u8,

    /// Status bytes at the end of each reply (ST1, ST2)
    pub status_size: usize,

    /// Default empty-poll budget
    pub retries: u32,
}

impl PrinterConfig {
    /// # Bematech MP-4000 TH FI
    ///
    /// Thermal fiscal printer used in Latin American retail.
    ///
    /// ## Packet
    ///
    /// ```text
    /// ┌─────┬────────┬─────┬─────────────┬──────────┐
    /// │ STX │ len LE │ ESC │ command ... │ csum LE  │
    /// └─────┴────────┴─────┴─────────────┴──────────┘
    /// ```
    pub const MP4000: Self = Self {
        name: "Bematech MP4000 TH FI",
        proto: PROTO_ESC,
        status_size: 2,
        retries: DEFAULT_RETRIES,
    };

    /// Retry policy built from the model default.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_empty_polls: self.retries,
        }
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self::MP4000
    }
}

// ============================================================================
// CONNECTION
// ============================================================================

/// Where and how to open the printer.
///
/// Loaded from JSON; every field is optional:
///
/// ```json
/// { "device": "/dev/ttyS0", "baud_rate": 9600, "read_timeout_ms": 500, "retries": 10 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub device: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Overrides [`PrinterConfig::retries`]
    pub retries: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 300,
            retries: DEFAULT_RETRIES,
        }
    }
}

impl ConnectionConfig {
    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| FiscalError::Config(format!("Invalid connection config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FiscalError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.retries == 0 {
            return Err(FiscalError::Config("retries must be at least 1".into()));
        }
        if self.device.is_empty() {
            return Err(FiscalError::Config("device must not be empty".into()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_empty_polls: self.retries,
        }
    }
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Limits of one caller-supplied field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
    /// Smallest accepted value, in hundredths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_cents: Option<u32>,
}

impl Capability {
    const fn text(max_len: usize) -> Self {
        Self {
            max_len: Some(max_len),
            digits: None,
            decimals: None,
            min_cents: None,
        }
    }

    const fn number(digits: u32, decimals: u32) -> Self {
        Self {
            max_len: None,
            digits: Some(digits),
            decimals: Some(decimals),
            min_cents: None,
        }
    }

    const fn min_cents(mut self, cents: u32) -> Self {
        self.min_cents = Some(cents);
        self
    }
}

/// Field sizes accepted by the MP-4000.
pub const CAPABILITIES: &[(&str, Capability)] = &[
    ("item_code", Capability::text(49)),
    ("item_id", Capability::number(4, 0)),
    ("items_quantity", Capability::number(4, 2).min_cents(100)),
    ("item_price", Capability::number(8, 3)),
    ("item_description", Capability::text(201)),
    ("payment_value", Capability::number(12, 2)),
    ("promotional_message", Capability::text(320)),
    ("payment_description", Capability::text(80)),
    ("customer_name", Capability::text(41)),
    ("customer_id", Capability::text(18)),
    ("customer_address", Capability::text(133)),
    ("add_cash_value", Capability::number(12, 2).min_cents(10)),
    ("remove_cash_value", Capability::number(12, 2).min_cents(10)),
];

/// Look up one capability by field name.
pub fn capability(name: &str) -> Option<Capability> {
    CAPABILITIES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| *c)
}

// ============================================================================
// TESTS
// ============================================================================
