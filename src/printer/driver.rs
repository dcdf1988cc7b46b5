//! # Command Dispatcher
//!
//! [`FiscalPrinter`] owns one link to one device and runs every command
//! through the same cycle:
//!
//! ```text
//! encode ─► packetize ─► write ─► read ack ─► read rest ─► unpack ─► check status
//! ```
//!
//! Encoding happens first, so a value that does not fit its field fails
//! before a single byte is written. The expected reply length comes from the
//! command's [`ResponseShape`]; the device never tells us how long its answer
//! is.
//!
//! Every method takes `&mut self`: replies are correlated with requests by
//! position only, so one printer handle carries one command at a time.

#[cfg(unix)]
use std::time::Duration;

use crate::error::{FiscalError, Result};
#[cfg(unix)]
use crate::printer::config::ConnectionConfig;
use crate::printer::config::PrinterConfig;
use crate::protocol::bcd;
use crate::protocol::commands::{self, Arg, Command};
use crate::protocol::fixed::Fixed;
use crate::protocol::packet::{BematechPacketizer, Packetizer};
use crate::protocol::registers::{self, RegisterValue};
use crate::protocol::reply::{Payload, Reply, ResponseShape, Value};
use crate::protocol::status::{NAK, ST2_INVALID_PARAMETER};
use crate::transport::{Link, Observer, RetryPolicy, Transport};
#[cfg(unix)]
use crate::transport::SerialTransport;

/// A fiscal printer reached through transport `T`.
pub struct FiscalPrinter<T: Transport> {
    link: Link<T>,
    packetizer: Box<dyn Packetizer + Send>,
    config: PrinterConfig,
    /// Amount still to be paid on the current sale
    pub(crate) remainder: Option<Fixed>,
}

impl<T: Transport> FiscalPrinter<T> {
    /// Driver with the MP-4000 defaults.
    pub fn new(transport: T) -> Self {
        let config = PrinterConfig::MP4000;
        Self::with_config(transport, config, config.retry_policy())
    }

    pub fn with_config(transport: T, config: PrinterConfig, policy: RetryPolicy) -> Self {
        Self {
            link: Link::new(transport, policy),
            packetizer: Box::new(BematechPacketizer { proto: config.proto }),
            config,
            remainder: None,
        }
    }

    /// Replace the packet envelope.
    #[must_use]
    pub fn with_packetizer(mut self, packetizer: Box<dyn Packetizer + Send>) -> Self {
        self.packetizer = packetizer;
        self
    }

    /// Replace the traffic observer (defaults to the `log` facade).
    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn Observer>) -> Self {
        self.link = self.link.with_observer(observer);
        self
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        self.link.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.link.transport_mut()
    }

    pub fn into_transport(self) -> T {
        self.link.into_inner()
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    /// Send `command` and return the reply payload.
    ///
    /// The status bytes are checked for every command except register reads,
    /// whose status is interpreted by [`Self::read_register`].
    pub fn send_command(&mut self, command: &Command, shape: ResponseShape) -> Result<Payload> {
        let reply = self.exchange(command, &shape)?;
        if command.id() != commands::READ_REGISTER {
            reply.status.check()?;
        }
        Ok(reply.payload())
    }

    /// Send `command` and return every reply element unchecked: ack,
    /// payload slots, then the status bytes.
    pub fn send_raw(&mut self, command: &Command, shape: ResponseShape) -> Result<Vec<Value>> {
        Ok(self.exchange(command, &shape)?.into_values())
    }

    /// Write `command` without waiting for a standard reply.
    pub(crate) fn write_command(&mut self, command: &Command) -> Result<()> {
        let bytes = command.encode()?;
        let frame = self.packetizer.create_packet(&bytes);
        self.link.send(&bytes, &frame)
    }

    /// Read free text up to `terminator`, for the report commands that
    /// answer with a document instead of a fixed reply.
    pub(crate) fn read_text_until(&mut self, terminator: u8) -> Result<Vec<u8>> {
        self.link.read_until(terminator)
    }

    fn exchange(&mut self, command: &Command, shape: &ResponseShape) -> Result<Reply> {
        self.write_command(command)?;

        let ack = self.link.read_exact(1)?;
        if ack[0] == NAK {
            return Err(FiscalError::ProtocolViolation(format!(
                "device rejected command 0x{:02X} (NAK)",
                command.id()
            )));
        }

        let rest = self.link.read_exact(shape.reply_len(self.config.status_size) - 1)?;
        let raw = [ack, rest].concat();
        Reply::unpack(&raw, shape, self.config.status_size)
    }

    // ========================================================================
    // REGISTERS
    // ========================================================================

    /// Read one register and decode it per the register table.
    ///
    /// Unknown ids fail before anything is written. A device answering
    /// "invalid parameter" also yields [`FiscalError::UnsupportedRegister`].
    pub fn read_register(&mut self, id: u8) -> Result<RegisterValue> {
        let descriptor = registers::lookup(id)?;
        let command = Command::new(commands::READ_REGISTER).arg(Arg::Int(u32::from(id)));
        let reply = self.exchange(&command, &ResponseShape::bytes(descriptor.width))?;

        if reply.status.st2 & ST2_INVALID_PARAMETER != 0 {
            return Err(FiscalError::UnsupportedRegister(id));
        }
        reply.status.check()?;

        let bytes = reply.payload().into_bytes()?;
        if descriptor.packed {
            Ok(RegisterValue::Number(bcd::decode_u64(&bytes)?))
        } else {
            Ok(RegisterValue::Bytes(bytes))
        }
    }

    /// Read a packed register as a number.
    pub(crate) fn read_number(&mut self, id: u8) -> Result<u64> {
        self.read_register(id)?.as_number().ok_or_else(|| {
            FiscalError::ProtocolViolation(format!("register {id} is not numeric"))
        })
    }

    /// Read a text register with its padding trimmed.
    pub(crate) fn read_text(&mut self, id: u8) -> Result<String> {
        self.read_register(id)?.as_trimmed_text().ok_or_else(|| {
            FiscalError::ProtocolViolation(format!("register {id} is not text"))
        })
    }

    /// Read a raw register.
    pub(crate) fn read_bytes(&mut self, id: u8) -> Result<Vec<u8>> {
        match self.read_register(id)? {
            RegisterValue::Bytes(bytes) => Ok(bytes),
            RegisterValue::Number(_) => Err(FiscalError::ProtocolViolation(format!(
                "register {id} is not raw"
            ))),
        }
    }
}

#[cfg(unix)]
impl FiscalPrinter<SerialTransport> {
    /// Open the serial device described by `connection`.
    pub fn open(connection: &ConnectionConfig) -> Result<Self> {
        let transport = SerialTransport::open_with_timeout(
            &connection.device,
            connection.baud_rate,
            Duration::from_millis(connection.read_timeout_ms),
        )?;
        log::info!("connected to {} on {}", PrinterConfig::MP4000.name, connection.device);
        Ok(Self::with_config(
            transport,
            PrinterConfig::MP4000,
            connection.retry_policy(),
        ))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;
    use crate::protocol::status::ACK;
    use crate::transport::MockTransport;

    fn printer(mock: MockTransport) -> FiscalPrinter<MockTransport> {
        FiscalPrinter::new(mock)
    }

    #[test]
    fn test_status_command_frame() {
        let mut p = printer(MockTransport::new().reply(&[ACK, 0, 0]));
        let payload = p
            .send_command(&Command::new(commands::STATUS), ResponseShape::empty())
            .unwrap();
        assert_eq!(payload, Payload::Empty);
        assert_eq!(
            p.transport().writes(),
            vec![vec![0x02, 0x04, 0x00, 0x1B, 0x13, 0x2E, 0x00]]
        );
    }

    #[test]
    fn test_send_command_checks_status() {
        let mut p = printer(MockTransport::new().reply(&[ACK, 0x80, 0]));
        let err = p
            .send_command(&Command::new(commands::COUPON_CANCEL), ResponseShape::empty())
            .unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::OutOfPaper));
    }

    #[test]
    fn test_send_raw_skips_status() {
        let mut p = printer(MockTransport::new().reply(&[ACK, 0x80, 0x01]));
        let values = p
            .send_raw(&Command::new(commands::STATUS), ResponseShape::empty())
            .unwrap();
        assert_eq!(
            values,
            vec![Value::Byte(ACK), Value::Byte(0x80), Value::Byte(0x01)]
        );
    }

    #[test]
    fn test_nak_stops_reading() {
        let mut p = printer(MockTransport::new().reply(&[NAK]).reply(&[0, 0]));
        let err = p
            .send_command(&Command::new(commands::STATUS), ResponseShape::empty())
            .unwrap_err();
        assert!(matches!(err, FiscalError::ProtocolViolation(_)));
        assert_eq!(p.transport().pending(), 2);
    }

    #[test]
    fn test_encode_failure_writes_nothing() {
        let mut p = printer(MockTransport::new());
        let command = Command::new(commands::CANCEL_ITEM).arg(Arg::integer(12345, 4));
        let err = p.send_command(&command, ResponseShape::empty()).unwrap_err();
        assert!(matches!(err, FiscalError::FieldOverflow { .. }));
        assert!(p.transport().writes().is_empty());
    }

    #[test]
    fn test_read_packed_register() {
        let mut p = printer(MockTransport::new().reply(&[ACK, 0x00, 0x12, 0x34, 0, 0]));
        let value = p.read_register(registers::COO).unwrap();
        assert_eq!(value, RegisterValue::Number(1234));
        // 0x23 then the register id as one byte
        assert_eq!(p.transport().writes()[0][3..5], [0x1B, 0x23][..]);
        assert_eq!(p.transport().writes()[0][5], registers::COO);
    }

    #[test]
    fn test_read_unknown_register_writes_nothing() {
        let mut p = printer(MockTransport::new());
        let err = p.read_register(1).unwrap_err();
        assert!(matches!(err, FiscalError::UnsupportedRegister(1)));
        assert!(p.transport().writes().is_empty());
    }

    #[test]
    fn test_register_refused_by_device() {
        let mut reply = vec![ACK];
        reply.extend([0u8; 3]);
        reply.extend([0, ST2_INVALID_PARAMETER]);
        let mut p = printer(MockTransport::new().reply(&reply));
        let err = p.read_register(registers::CNC).unwrap_err();
        assert!(matches!(err, FiscalError::UnsupportedRegister(255)));
    }

    #[test]
    fn test_register_other_fault_surfaces() {
        let mut p = printer(MockTransport::new().reply(&[ACK, 0x01, 0x00, 0x80, 0]));
        let err = p.read_register(registers::CRO).unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::OutOfPaper));
    }

    #[test]
    fn test_timeout_after_retry_budget() {
        let mock = MockTransport::new().reply(&[ACK]).stall(5);
        let mut p = printer(mock);
        let err = p
            .send_command(&Command::new(commands::STATUS), ResponseShape::empty())
            .unwrap_err();
        assert!(matches!(
            err,
            FiscalError::CommunicationTimeout {
                expected: 2,
                received: 0
            }
        ));
    }
}
