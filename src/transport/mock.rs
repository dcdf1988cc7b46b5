//! # Mock Transport
//!
//! A scripted, in-memory [`Transport`] for tests. Replies and stalls are
//! queued in order; every write is recorded so tests can assert what was (or
//! was not) sent.
//!
//! ```
//! use bematech::transport::{MockTransport, Transport};
//!
//! let mut mock = MockTransport::new().stall(1).reply(&[0x06, 0x00, 0x00]);
//! assert_eq!(mock.read(3)?, None);
//! assert_eq!(mock.read(3)?, Some(vec![0x06, 0x00, 0x00]));
//! # Ok::<(), bematech::FiscalError>(())
//! ```

use std::collections::VecDeque;

use crate::error::Result;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Bytes(Vec<u8>),
    Stall,
}

/// Scripted transport double.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: VecDeque<Event>,
    writes: Vec<Vec<u8>>,
    chunk_size: Option<usize>,
    reads: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes the device will send.
    #[must_use]
    pub fn reply(mut self, bytes: &[u8]) -> Self {
        self.push_reply(bytes);
        self
    }

    /// Queue `n` empty polls.
    #[must_use]
    pub fn stall(mut self, n: usize) -> Self {
        self.push_stall(n);
        self
    }

    /// Cap every read at `n` bytes, to simulate a slow line.
    #[must_use]
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n.max(1));
        self
    }

    pub fn push_reply(&mut self, bytes: &[u8]) {
        self.script.push_back(Event::Bytes(bytes.to_vec()));
    }

    pub fn push_stall(&mut self, n: usize) {
        self.script.extend(std::iter::repeat_n(Event::Stall, n));
    }

    /// Every frame written so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.clone()
    }

    /// Number of `read` calls, empty or not.
    pub fn read_calls(&self) -> usize {
        self.reads
    }

    /// Bytes still queued and never read.
    pub fn pending(&self) -> usize {
        self.script
            .iter()
            .map(|e| match e {
                Event::Bytes(b) => b.len(),
                Event::Stall => 0,
            })
            .sum()
    }
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writes.push(data.to_vec());
        Ok(())
    }

    fn read(&mut self, max: usize) -> Result<Option<Vec<u8>>> {
        self.reads += 1;
        let limit = self.chunk_size.map_or(max, |c| c.min(max));
        match self.script.pop_front() {
            None | Some(Event::Stall) => Ok(None),
            Some(Event::Bytes(mut bytes)) => {
                if bytes.len() > limit {
                    let rest = bytes.split_off(limit);
                    self.script.push_front(Event::Bytes(rest));
                }
                Ok(Some(bytes))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_honour_max() {
        let mut mock = MockTransport::new().reply(&[1, 2, 3, 4]);
        assert_eq!(mock.read(3).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(mock.read(3).unwrap(), Some(vec![4]));
        assert_eq!(mock.read(3).unwrap(), None);
        assert_eq!(mock.read_calls(), 3);
    }

    #[test]
    fn test_chunk_size_caps_reads() {
        let mut mock = MockTransport::new().chunk_size(2).reply(&[1, 2, 3]);
        assert_eq!(mock.read(10).unwrap(), Some(vec![1, 2]));
        assert_eq!(mock.pending(), 1);
    }

    #[test]
    fn test_records_writes() {
        let mut mock = MockTransport::new();
        mock.write(&[1]).unwrap();
        mock.write(&[2, 3]).unwrap();
        assert_eq!(mock.writes(), vec![vec![1], vec![2, 3]]);
    }
}
