//! # Administration and Information
//!
//! Everything outside the sale lifecycle: status, identification registers,
//! tax and payment programming, the last closing report and the transaction
//! journal.
//!
//! Programming commands go through [`FiscalPrinter::send_raw`] and hand the
//! decoded [`Status`] back to the caller instead of raising, so a batch of
//! settings can be applied and inspected in one pass.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{FiscalError, Result};
use crate::printer::FiscalPrinter;
use crate::printer::config::{CAPABILITIES, Capability};
use crate::protocol::bcd;
use crate::protocol::codepage;
use crate::protocol::commands::{self, Arg, Command};
use crate::protocol::fixed::Fixed;
use crate::protocol::registers;
use crate::protocol::reply::{ResponseShape, Slot, Value};
use crate::protocol::status::Status;
use crate::report::{ClosingReport, PaymentMethod, ReportValue, TaxConstant, TransactionLog};
use crate::report::{closing, taxes};
use crate::transport::Transport;

/// Size of the partial totalizers block.
pub const TOTALIZERS_LEN: usize = 219;

/// Period selector of the transaction journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionRange {
    /// Inclusive calendar dates
    Dates(NaiveDate, NaiveDate),
    /// Inclusive coupon numbers
    Coupons(u32, u32),
}

/// Where the journal goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportDestination {
    /// Sent back over the serial line
    #[default]
    Serial,
    /// Printed on paper, nothing comes back
    Printer,
}

impl ReportDestination {
    fn code(self) -> u8 {
        match self {
            Self::Serial => b'R',
            Self::Printer => b'I',
        }
    }
}

/// Hardware sensor flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PrinterSensors {
    pub head_raised: bool,
    pub cover_open: bool,
    pub out_of_paper: bool,
    pub low_paper: bool,
    pub drawer: bool,
    pub paper_key_pressed: bool,
    pub maintenance_jumper: bool,
}

impl PrinterSensors {
    pub fn from_byte(bits: u8) -> Self {
        let set = |mask: u8| bits & mask != 0;
        Self {
            head_raised: set(0x01),
            cover_open: set(0x02),
            out_of_paper: set(0x04),
            low_paper: set(0x08),
            drawer: set(0x10),
            // 0x20 is not wired
            paper_key_pressed: set(0x40),
            maintenance_jumper: set(0x80),
        }
    }
}

/// Collect the byte elements of a raw reply into a status.
fn status_of(values: &[Value]) -> Result<Status> {
    let bytes: Vec<u8> = values.iter().filter_map(Value::as_byte).collect();
    Status::from_reply(&bytes)
}

/// `DDMMYYhhmmss` from the date registers; all zeros means "never".
pub(crate) fn parse_register_timestamp(digits: &str) -> Result<Option<NaiveDateTime>> {
    if digits.bytes().all(|b| b == b'0') {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(digits, "%d%m%y%H%M%S")
        .map(Some)
        .map_err(|e| FiscalError::InvalidEncoding(format!("invalid timestamp {digits:?}: {e}")))
}

impl<T: Transport> FiscalPrinter<T> {
    // ========================================================================
    // STATUS
    // ========================================================================

    /// Query ST1/ST2 without raising on faults.
    pub fn status(&mut self) -> Result<Status> {
        let values = self.send_raw(&Command::new(commands::STATUS), ResponseShape::empty())?;
        status_of(&values)
    }

    pub fn is_coupon_open(&mut self) -> Result<bool> {
        Ok(self.status()?.is_coupon_open())
    }

    // ========================================================================
    // IDENTIFICATION AND COUNTERS
    // ========================================================================

    pub fn serial_number(&mut self) -> Result<String> {
        self.read_text(registers::SERIAL)
    }

    /// Taxpayer id of the user.
    pub fn nit(&mut self) -> Result<String> {
        self.read_text(registers::NIT)
    }

    pub fn credit_note_counter(&mut self) -> Result<u64> {
        self.read_number(registers::CNC)
    }

    /// Hours the printer has been powered.
    pub fn uptime(&mut self) -> Result<u64> {
        self.read_number(registers::OPERATION_TIME)
    }

    pub fn printer_sensors(&mut self) -> Result<PrinterSensors> {
        let bytes = self.read_bytes(registers::PRINTER_SENSORS)?;
        Ok(PrinterSensors::from_byte(bytes.first().copied().unwrap_or(0)))
    }

    /// Raw partial totalizers block.
    pub fn totalizers(&mut self) -> Result<Vec<u8>> {
        self.send_command(
            &Command::new(commands::READ_TOTALIZERS),
            ResponseShape::bytes(TOTALIZERS_LEN),
        )?
        .into_bytes()
    }

    // ========================================================================
    // CLOSING
    // ========================================================================

    /// When the last reduction Z was issued, `None` if there never was one.
    pub fn last_closing_date(&mut self) -> Result<Option<NaiveDateTime>> {
        let raw = self.read_bytes(registers::LAST_Z_DATE)?;
        parse_register_timestamp(&bcd::to_hex_digits(&raw))
    }

    /// True when more than a day has passed since the last reduction.
    ///
    /// `printer_now` is the printer clock; the host clock may disagree.
    pub fn has_pending_reduce(&mut self, printer_now: NaiveDateTime) -> Result<bool> {
        Ok(match self.last_closing_date()? {
            Some(last) => printer_now > last + Duration::days(1),
            None => false,
        })
    }

    /// The last closing report, `None` without ever sending the report
    /// command when no closing exists.
    pub fn last_closing(&mut self) -> Result<Option<ClosingReport>> {
        if self.last_closing_date()?.is_none() {
            log::debug!("no previous closing, skipping report");
            return Ok(None);
        }
        let bytes = self
            .send_command(
                &Command::new(commands::LAST_CLOSING),
                ResponseShape::bytes(closing::REPORT_LEN),
            )?
            .into_bytes()?;
        ClosingReport::decode(&bytes).map(Some)
    }

    /// The last closing report as labelled values, empty when there is none.
    pub fn last_closing_entries(&mut self) -> Result<Vec<(&'static str, ReportValue)>> {
        Ok(self
            .last_closing()?
            .map(|report| report.entries())
            .unwrap_or_default())
    }

    // ========================================================================
    // TAXES
    // ========================================================================

    pub fn tax_constants(&mut self) -> Result<Vec<TaxConstant>> {
        let shape = ResponseShape::new(vec![Slot::SignedByte, Slot::Bytes(taxes::TABLE_LEN)]);
        let values = self
            .send_command(&Command::new(commands::READ_TAXCODES), shape)?
            .into_values();
        let table = values
            .iter()
            .find_map(Value::as_bytes)
            .ok_or_else(|| FiscalError::ProtocolViolation("tax reply without rate table".into()))?;
        taxes::decode_tax_constants(table)
    }

    /// Rate of tax `code`, `None` for the fixed codes or an unknown one.
    pub fn tax_value(&mut self, code: &str) -> Result<Option<Fixed>> {
        Ok(self
            .tax_constants()?
            .into_iter()
            .find(|c| c.code == code)
            .and_then(|c| c.rate))
    }

    /// Program a new tax rate (percent, two decimals).
    pub fn set_tax_value(&mut self, rate: Fixed, vat_included: bool) -> Result<Status> {
        let command = Command::new(commands::ADD_TAX)
            .arg(Arg::decimal(rate, 4, 2))
            .arg(Arg::Raw(vec![if vat_included { b'1' } else { b'0' }]));
        let values = self.send_raw(&command, ResponseShape::empty())?;
        status_of(&values)
    }

    // ========================================================================
    // PAYMENT METHODS
    // ========================================================================

    pub fn payment_methods(&mut self) -> Result<Vec<PaymentMethod>> {
        let table = self.read_bytes(registers::PAYMENT_METHODS)?;
        PaymentMethod::decode_table(&table)
    }

    /// `(code, name)` of every programmed payment method.
    pub fn payment_constants(&mut self) -> Result<Vec<(String, String)>> {
        Ok(self
            .payment_methods()?
            .into_iter()
            .map(|m| (m.code, m.name))
            .collect())
    }

    pub fn set_payment_description(&mut self, name: &str) -> Result<Status> {
        let command = Command::new(commands::PROGRAM_PAYMENT_METHOD)
            .arg(Arg::text(name, 16))
            .arg(Arg::Raw(b"1".to_vec()));
        let values = self.send_raw(&command, ResponseShape::empty())?;
        status_of(&values)
    }

    /// Program every payment method name at once.
    pub fn set_payment_constants(&mut self, names: &[&str]) -> Result<Status> {
        let command = names.iter().fold(
            Command::new(commands::PROGRAM_MULTI_PAYMENT_METHOD),
            |command, name| command.arg(Arg::text(*name, 16)),
        );
        let values = self.send_raw(&command, ResponseShape::empty())?;
        status_of(&values)
    }

    // ========================================================================
    // SETTINGS
    // ========================================================================

    /// Application name printed at the foot of each coupon.
    pub fn set_fiscal_app(&mut self, name: &str) -> Result<()> {
        let command = Command::new(commands::SET_FISCAL_APP).arg(Arg::text(name, 84));
        self.send_command(&command, ResponseShape::empty())?;
        Ok(())
    }

    /// Enable or disable the "almost out of paper" sensor.
    pub fn set_paper_sensor(&mut self, enabled: bool) -> Result<Status> {
        let flag = if enabled { b'0' } else { b'1' };
        let command = Command::new(commands::SET_PAPER_SENSOR).arg(Arg::Raw(vec![flag]));
        let values = self.send_raw(&command, ResponseShape::empty())?;
        status_of(&values)
    }

    pub fn set_z_time_limit(&mut self, minutes: u32) -> Result<Status> {
        let command =
            Command::new(commands::SET_Z_TIME_LIMIT).arg(Arg::integer(u64::from(minutes), 2));
        let values = self.send_raw(&command, ResponseShape::empty())?;
        status_of(&values)
    }

    pub fn set_till_store(&mut self, till: u32, store: u32) -> Result<Status> {
        let command = Command::new(commands::SET_TILL_STORE)
            .arg(Arg::integer(u64::from(till), 4))
            .arg(Arg::integer(u64::from(store), 4));
        let values = self.send_raw(&command, ResponseShape::empty())?;
        status_of(&values)
    }

    // ========================================================================
    // JOURNAL
    // ========================================================================

    /// Dump the journal of `range`.
    ///
    /// With [`ReportDestination::Printer`] the journal is printed and `None`
    /// is returned; otherwise the text is read back until ETX.
    pub fn read_transactions(
        &mut self,
        range: TransactionRange,
        destination: ReportDestination,
    ) -> Result<Option<String>> {
        let command = Command::new(commands::READ_TRANSACTIONS);
        let command = match range {
            TransactionRange::Dates(start, end) => command
                .arg(Arg::text(start.format("%d%m%y").to_string(), 6))
                .arg(Arg::text(end.format("%d%m%y").to_string(), 6)),
            TransactionRange::Coupons(start, end) => command
                .arg(Arg::Raw(b"00".to_vec()))
                .arg(Arg::integer(u64::from(start), 4))
                .arg(Arg::Raw(b"00".to_vec()))
                .arg(Arg::integer(u64::from(end), 4)),
        }
        .arg(Arg::Raw(vec![destination.code()]));

        self.write_command(&command)?;
        if destination == ReportDestination::Printer {
            return Ok(None);
        }

        let bytes = self.read_text_until(commands::ETX)?;
        // Skip the ack and status bytes preceding the text
        let text = bytes.get(3..).unwrap_or_default();
        Ok(Some(codepage::decode(text)))
    }

    /// Read and parse the journal of `range`.
    pub fn transactions(&mut self, range: TransactionRange) -> Result<TransactionLog> {
        let text = self
            .read_transactions(range, ReportDestination::Serial)?
            .unwrap_or_default();
        TransactionLog::parse(&text)
    }

    /// Field limits of this model.
    pub fn capabilities(&self) -> &'static [(&'static str, Capability)] {
        CAPABILITIES
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::status::ACK;
    use crate::transport::MockTransport;

    fn body(frame: &[u8]) -> &[u8] {
        &frame[4..frame.len() - 2]
    }

    fn date_reply(bcd: [u8; 6]) -> Vec<u8> {
        let mut reply = vec![ACK];
        reply.extend(bcd);
        reply.extend([0, 0]);
        reply
    }

    #[test]
    fn test_status_does_not_raise() {
        let mut printer = FiscalPrinter::new(MockTransport::new().reply(&[ACK, 0x82, 0x01]));
        let status = printer.status().unwrap();
        assert!(status.is_coupon_open());
        assert_eq!(status.st2, 0x01);
        assert!(status.check().is_err());
    }

    #[test]
    fn test_register_timestamp() {
        assert_eq!(parse_register_timestamp("000000000000").unwrap(), None);
        let at = parse_register_timestamp("150624213000").unwrap().unwrap();
        assert_eq!(at.to_string(), "2024-06-15 21:30:00");
        assert!(parse_register_timestamp("1506aa213000").is_err());
    }

    #[test]
    fn test_pending_reduce() {
        let reply = date_reply([0x15, 0x06, 0x24, 0x21, 0x30, 0x00]);
        let mock = MockTransport::new().reply(&reply).reply(&reply);
        let mut printer = FiscalPrinter::new(mock);

        let same_day = NaiveDate::from_ymd_opt(2024, 6, 16)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert!(!printer.has_pending_reduce(same_day).unwrap());

        let two_days = NaiveDate::from_ymd_opt(2024, 6, 17)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert!(printer.has_pending_reduce(two_days).unwrap());
    }

    #[test]
    fn test_no_pending_reduce_without_closing() {
        let mock = MockTransport::new().reply(&date_reply([0; 6]));
        let mut printer = FiscalPrinter::new(mock);
        let now = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(!printer.has_pending_reduce(now).unwrap());
    }

    #[test]
    fn test_sensors() {
        let sensors = PrinterSensors::from_byte(0b1000_0110);
        assert!(sensors.cover_open);
        assert!(sensors.out_of_paper);
        assert!(sensors.maintenance_jumper);
        assert!(!sensors.head_raised);
        assert!(!sensors.low_paper);
    }

    #[test]
    fn test_programming_frames() {
        let mock = MockTransport::new()
            .reply(&[ACK, 0, 0])
            .reply(&[ACK, 0, 0])
            .reply(&[ACK, 0, 0])
            .reply(&[ACK, 0, 0])
            .reply(&[ACK, 0, 0]);
        let mut printer = FiscalPrinter::new(mock);

        printer.set_tax_value("16".parse().unwrap(), true).unwrap();
        printer.set_payment_description("Cheque").unwrap();
        printer.set_paper_sensor(false).unwrap();
        printer.set_z_time_limit(5).unwrap();
        printer.set_till_store(1, 22).unwrap();

        let writes = printer.transport().writes();
        assert_eq!(body(&writes[0]), b"\x0716001");
        assert_eq!(body(&writes[1]), b"\x47Cheque          1");
        assert_eq!(body(&writes[2]), b"\x3e\x3d1");
        assert_eq!(body(&writes[3]), b"\x5a05");
        assert_eq!(body(&writes[4]), b"\x1100010022");
    }

    #[test]
    fn test_programming_returns_fault_status() {
        let mut printer = FiscalPrinter::new(MockTransport::new().reply(&[ACK, 0, 0x08]));
        let status = printer.set_tax_value("12".parse().unwrap(), false).unwrap();
        assert_eq!(status.st2, 0x08);
    }

    #[test]
    fn test_multi_payment_names() {
        let mut printer = FiscalPrinter::new(MockTransport::new().reply(&[ACK, 0, 0]));
        printer.set_payment_constants(&["A", "B"]).unwrap();
        let writes = printer.transport().writes();
        let command = body(&writes[0]);
        assert_eq!(command.len(), 1 + 32);
        assert_eq!(&command[1..3], b"A ");
        assert_eq!(&command[17..19], b"B ");
    }

    #[test]
    fn test_tax_constants() {
        let mut reply = vec![ACK, 0x02];
        let mut table = [0u8; 32];
        table[0..2].copy_from_slice(&[0x16, 0x00]);
        reply.extend(table);
        reply.extend([0, 0]);
        let mut printer = FiscalPrinter::new(MockTransport::new().reply(&reply).reply(&reply));

        let constants = printer.tax_constants().unwrap();
        assert_eq!(constants.len(), 4);
        assert_eq!(
            printer.tax_value("01").unwrap(),
            Some("16".parse::<Fixed>().unwrap())
        );
    }

    #[test]
    fn test_read_transactions_by_coupon() {
        let mut stream = vec![ACK, 0, 0];
        stream.extend_from_slice(b"JOURNAL");
        stream.push(commands::ETX);
        let mut printer = FiscalPrinter::new(MockTransport::new().reply(&stream));

        let text = printer
            .read_transactions(TransactionRange::Coupons(5, 12), ReportDestination::Serial)
            .unwrap();
        assert_eq!(text.as_deref(), Some("JOURNAL"));

        let writes = printer.transport().writes();
        assert_eq!(body(&writes[0]), b"\x3e\x47\x37000005000012R");
    }

    #[test]
    fn test_read_transactions_decodes_code_page() {
        let mut stream = vec![ACK, 0, 0];
        stream.extend_from_slice(b"ANULACI\xa2N Caf\x82");
        stream.push(commands::ETX);
        let mut printer = FiscalPrinter::new(MockTransport::new().reply(&stream));

        let text = printer
            .read_transactions(TransactionRange::Coupons(1, 2), ReportDestination::Serial)
            .unwrap();
        assert_eq!(text.as_deref(), Some("ANULACIóN Café"));
    }

    #[test]
    fn test_read_transactions_to_paper() {
        let mut printer = FiscalPrinter::new(MockTransport::new());
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let text = printer
            .read_transactions(TransactionRange::Dates(start, end), ReportDestination::Printer)
            .unwrap();
        assert_eq!(text, None);
        let writes = printer.transport().writes();
        assert_eq!(body(&writes[0]), b"\x3e\x47\x37020124310124I");
        assert_eq!(printer.transport().read_calls(), 0);
    }
}
