//! # Printer Transport Layer
//!
//! This module provides the byte links between the driver and a printer.
//!
//! ## Available Transports
//!
//! - [`serial`]: TTY serial/USB-serial devices (Unix)
//! - [`mock`]: scripted in-memory transport for tests
//!
//! ## Contract
//!
//! A [`Transport`] only moves bytes. `read` must return promptly: `None`
//! means "nothing yet, ask again" and never "stream ended". The retry
//! discipline lives in [`link::Link`], not in the transport.

pub mod link;
pub mod mock;
#[cfg(unix)]
pub mod serial;

pub use link::{Link, LogObserver, Observer, RetryPolicy};
pub use mock::MockTransport;
#[cfg(unix)]
pub use serial::SerialTransport;

use crate::error::Result;

/// A byte-oriented link to the printer.
pub trait Transport {
    /// Write every byte of `data`.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to `max` bytes. `Ok(None)` means the device has nothing yet.
    fn read(&mut self, max: usize) -> Result<Option<Vec<u8>>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, max: usize) -> Result<Option<Vec<u8>>> {
        (**self).read(max)
    }
}
