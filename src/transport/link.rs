//! # Read-With-Retry Link
//!
//! Turns an unreliable byte stream into complete replies. [`Link::read_exact`]
//! keeps polling the transport until the requested number of bytes has
//! arrived, or until the transport has come back empty too many times in a
//! row.
//!
//! The budget counts empty polls, not wall-clock time: a device trickling
//! one byte per poll never times out, a silent one times out after
//! [`RetryPolicy::max_empty_polls`] polls.

use crate::error::{FiscalError, Result};
use crate::transport::Transport;

/// Default empty-poll budget.
pub const DEFAULT_RETRIES: u32 = 5;

/// How long to keep polling a quiet device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive empty reads tolerated before `CommunicationTimeout`
    pub max_empty_polls: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_empty_polls: DEFAULT_RETRIES,
        }
    }
}

/// Observability hooks for traffic on a link.
pub trait Observer: Send {
    fn command_sent(&self, _command: &[u8]) {}
    fn reply_received(&self, _reply: &[u8]) {}
    fn poll_retry(&self, _empty_polls: u32, _received: usize, _expected: usize) {}
}

/// Observer writing to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn command_sent(&self, command: &[u8]) {
        log::debug!(
            "Command string: {}",
            command
                .iter()
                .map(|b| format!("0x{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        );
    }

    fn reply_received(&self, reply: &[u8]) {
        log::debug!("<<< {:02X?} ({} bytes)", reply, reply.len());
    }

    fn poll_retry(&self, empty_polls: u32, received: usize, expected: usize) {
        log::trace!("empty poll #{empty_polls} ({received}/{expected} bytes)");
    }
}

/// A transport plus its retry policy and observer.
///
/// Owns the transport exclusively: replies are matched to requests by
/// position only, so one link carries one command at a time.
pub struct Link<T: Transport> {
    transport: T,
    policy: RetryPolicy,
    observer: Box<dyn Observer>,
}

impl<T: Transport> Link<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            observer: Box::new(LogObserver),
        }
    }

    /// Replace the default [`LogObserver`].
    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send a complete frame. `command` is the unframed command, for the observer.
    pub fn send(&mut self, command: &[u8], frame: &[u8]) -> Result<()> {
        self.observer.command_sent(command);
        self.transport.write(frame)
    }

    /// Collect exactly `n` bytes.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(n);
        let mut empty_polls = 0;

        while data.len() < n {
            let wanted = n - data.len();
            match self.transport.read(wanted)? {
                Some(chunk) if !chunk.is_empty() => {
                    if chunk.len() > wanted {
                        return Err(FiscalError::ProtocolViolation(format!(
                            "transport returned {} bytes, {} requested",
                            chunk.len(),
                            wanted
                        )));
                    }
                    data.extend_from_slice(&chunk);
                    empty_polls = 0;
                }
                _ => {
                    empty_polls += 1;
                    self.observer.poll_retry(empty_polls, data.len(), n);
                    if empty_polls >= self.policy.max_empty_polls {
                        return Err(FiscalError::CommunicationTimeout {
                            expected: n,
                            received: data.len(),
                        });
                    }
                }
            }
        }

        self.observer.reply_received(&data);
        Ok(data)
    }

    /// Collect bytes up to and excluding `terminator`.
    pub fn read_until(&mut self, terminator: u8) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut empty_polls = 0;

        loop {
            match self.transport.read(1)? {
                Some(chunk) if !chunk.is_empty() => {
                    empty_polls = 0;
                    if chunk[0] == terminator {
                        break;
                    }
                    data.push(chunk[0]);
                }
                _ => {
                    empty_polls += 1;
                    self.observer.poll_retry(empty_polls, data.len(), 0);
                    if empty_polls >= self.policy.max_empty_polls {
                        return Err(FiscalError::CommunicationTimeout {
                            expected: data.len() + 1,
                            received: data.len(),
                        });
                    }
                }
            }
        }

        self.observer.reply_received(&data);
        Ok(data)
    }
}

// ============================================================================
// TESTS
// ============================================================================
