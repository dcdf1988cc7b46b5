//! # Report Decoders
//!
//! Structured decoders for the large replies of the printer. Each decoder
//! works on bytes already read by the driver and performs no I/O.
//!
//! | Module | Source | Output |
//! |--------|--------|--------|
//! | [`closing`] | last-closing command, 324 bytes | [`ClosingReport`] |
//! | [`payments`] | payment methods register, 620 bytes | [`PaymentMethod`] list |
//! | [`taxes`] | tax codes command, 32 bytes | [`TaxConstant`] list |
//! | [`transactions`] | read-transactions text | [`TransactionLog`] |

pub mod closing;
pub mod payments;
pub mod taxes;
pub mod transactions;

pub use closing::{ClosingReport, ReportValue};
pub use payments::PaymentMethod;
pub use taxes::{TaxConstant, TaxKind};
pub use transactions::{Invoice, TransactionLog};
