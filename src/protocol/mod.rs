//! # MP-4000 Protocol Implementation
//!
//! Wire-level building blocks of the Bematech fiscal protocol. Nothing in
//! here performs I/O; the dispatcher in [`crate::printer`] ties these pieces
//! to a transport.
//!
//! ## Module Structure
//!
//! - [`fixed`]: fixed-point decimals for money and quantities
//! - [`bcd`]: packed-decimal encode/decode
//! - [`codepage`]: printer character set (CP437)
//! - [`field`]: fixed-width argument and reply fields
//! - [`commands`]: command identifiers and the typed command builder
//! - [`packet`]: the STX/length/checksum envelope
//! - [`reply`]: response shapes and reply unpacking
//! - [`status`]: status byte decoding into faults
//! - [`registers`]: the register indirection table
//!
//! ## Command Cycle
//!
//! ```text
//! Command ──encode──► bytes ──packet──► STX len ESC bytes csum ──► device
//!                                                                  │
//! Payload ◄──trim── Reply ◄──unpack── [ack][payload][st1][st2] ◄──┘
//!                     │
//!                     └── Status::check (first fault wins)
//! ```

pub mod bcd;
pub mod codepage;
pub mod commands;
pub mod field;
pub mod fixed;
pub mod packet;
pub mod registers;
pub mod reply;
pub mod status;
