//! # Printer Module
//!
//! The MP-4000 driver and its configuration.
//!
//! ## Modules
//!
//! - [`config`]: model constants, connection settings, field capabilities
//! - [`driver`]: [`FiscalPrinter`], the command dispatcher and register reader
//! - [`coupon`]: sale lifecycle operations
//! - [`admin`]: status, programming, closing report and journal operations
//!
//! ## Example
//!
//! ```no_run
//! use bematech::printer::{Customer, FiscalPrinter, Item};
//! use bematech::printer::config::ConnectionConfig;
//!
//! let mut printer = FiscalPrinter::open(&ConnectionConfig::default())?;
//! printer.coupon_open(&Customer::default())?;
//! printer.add_item(&Item::new("789", "COFFEE", "2.50".parse()?, "01"))?;
//! # Ok::<(), bematech::FiscalError>(())
//! ```

pub mod admin;
pub mod config;
pub mod coupon;
pub mod driver;

pub use admin::{PrinterSensors, ReportDestination, TransactionRange};
pub use config::{ConnectionConfig, PrinterConfig};
pub use coupon::{Adjustment, Customer, Item, UnitType};
pub use driver::FiscalPrinter;
