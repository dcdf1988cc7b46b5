//! # Bematech - Fiscal Printer Driver
//!
//! Bematech is a Rust library for driving Bematech MP-4000 TH FI fiscal
//! printers over a serial line. It provides:
//!
//! - **Protocol implementation**: field codecs, command builder, packet
//!   envelope, reply unpacking and status decoding
//! - **Transport**: TTY serial link with a bounded read-with-retry loop
//! - **Driver**: sale lifecycle, register reads and programming commands
//! - **Reports**: decoders for the closing report, payment and tax tables,
//!   and the transaction journal
//!
//! ## Quick Start
//!
//! ```no_run
//! use bematech::{FiscalPrinter, SerialTransport};
//! use bematech::protocol::registers;
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0", 115_200)?;
//! let mut printer = FiscalPrinter::new(transport);
//!
//! println!("Serial: {}", printer.serial_number()?);
//! println!("COO: {:?}", printer.read_register(registers::COO)?);
//!
//! if let Some(report) = printer.last_closing()? {
//!     println!("Grand total: {}", report.grand_total);
//! }
//! # Ok::<(), bematech::FiscalError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | Wire-level codecs, no I/O |
//! | [`transport`] | Byte links and the retry loop |
//! | [`printer`] | The driver and its configuration |
//! | [`report`] | Decoders for large replies |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Currently tested with:
//! - Bematech MP-4000 TH FI (serial, 115200 baud)

pub mod error;
pub mod printer;
pub mod protocol;
pub mod report;
pub mod transport;

// Re-exports for convenience
pub use error::{FiscalError, Result};
pub use printer::{FiscalPrinter, PrinterConfig};
pub use transport::MockTransport;
#[cfg(unix)]
pub use transport::SerialTransport;
