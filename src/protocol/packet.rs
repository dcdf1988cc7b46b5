//! # Packet Envelope
//!
//! The printer only accepts commands wrapped in its envelope:
//!
//! ```text
//! STX | len (u16 LE) | ESC | command bytes... | checksum (u16 LE)
//! ```
//!
//! `len` counts the protocol byte, the command bytes and the two checksum
//! bytes. The checksum is the wrapping 16-bit sum of the protocol byte and
//! the command bytes.
//!
//! The dispatcher only depends on the [`Packetizer`] trait, so other
//! envelope variants can be plugged in without touching it.

/// Start of every packet
pub const STX: u8 = 0x02;

/// Protocol byte of the MP-4000 command set
pub const PROTO_ESC: u8 = 0x1B;

/// Wraps a command into the physical framing the device expects.
///
/// Must be total: every byte sequence yields a packet.
pub trait Packetizer {
    fn create_packet(&self, command: &[u8]) -> Vec<u8>;
}

/// The Bematech envelope described in the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BematechPacketizer {
    pub proto: u8,
}

impl Default for BematechPacketizer {
    fn default() -> Self {
        Self { proto: PROTO_ESC }
    }
}

impl Packetizer for BematechPacketizer {
    fn create_packet(&self, command: &[u8]) -> Vec<u8> {
        let body_len = 1 + command.len();
        let len = (body_len + 2) as u16;
        let checksum = command
            .iter()
            .fold(u16::from(self.proto), |acc, &b| acc.wrapping_add(u16::from(b)));

        let mut packet = Vec::with_capacity(3 + body_len + 2);
        packet.push(STX);
        packet.extend_from_slice(&len.to_le_bytes());
        packet.push(self.proto);
        packet.extend_from_slice(command);
        packet.extend_from_slice(&checksum.to_le_bytes());
        packet
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_packet() {
        let packet = BematechPacketizer::default().create_packet(&[0x13]);
        // len = ESC + 0x13 + 2 checksum bytes = 4
        // checksum = 0x1B + 0x13 = 0x2E
        assert_eq!(packet, vec![STX, 0x04, 0x00, 0x1B, 0x13, 0x2E, 0x00]);
    }

    #[test]
    fn test_checksum_wraps() {
        let command = vec![0xFF; 300];
        let packet = BematechPacketizer::default().create_packet(&command);
        let expected = (0x1Bu32 + 0xFF * 300) as u16;
        let tail = &packet[packet.len() - 2..];
        assert_eq!(u16::from_le_bytes([tail[0], tail[1]]), expected);
        assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), 303);
    }

    #[test]
    fn test_empty_command_is_still_a_packet() {
        let packet = BematechPacketizer::default().create_packet(&[]);
        assert_eq!(packet, vec![STX, 0x03, 0x00, 0x1B, 0x1B, 0x00]);
    }
}
