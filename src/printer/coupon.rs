//! # Sale Lifecycle
//!
//! A fiscal coupon goes through a fixed sequence; the device rejects
//! commands issued out of order with a sequencing fault
//! ([`FaultKind::is_sequencing`](crate::error::FaultKind::is_sequencing)).
//!
//! ```text
//! coupon_open ─► add_item* ─► totalize ─► add_payment+ ─► coupon_close
//!      │             │
//!      └─────────────┴──► cancel_item / coupon_cancel
//! ```
//!
//! The driver keeps one piece of state across calls: the amount still due
//! after [`FiscalPrinter::totalize`], decreased by each payment and cleared
//! when the coupon is closed or cancelled.

use chrono::NaiveDateTime;

use crate::error::{FiscalError, Result};
use crate::printer::FiscalPrinter;
use crate::protocol::bcd;
use crate::protocol::commands::{self, Arg, Command};
use crate::protocol::fixed::Fixed;
use crate::protocol::registers;
use crate::protocol::reply::ResponseShape;
use crate::transport::Transport;

/// Customer printed on the coupon header. Every field may be blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    /// Tax document (RIF/CI/CPF)
    pub document: String,
    pub address: String,
}

/// Measurement unit of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UnitType {
    #[default]
    Empty,
    Weight,
    Meters,
    Liters,
    /// Free two-character unit
    Custom(String),
}

impl UnitType {
    /// Two-character code printed next to the quantity.
    pub fn code(&self) -> &str {
        match self {
            Self::Empty => "  ",
            Self::Weight => "Kg",
            Self::Meters => "m ",
            Self::Liters => "Lt",
            Self::Custom(code) => code,
        }
    }
}

/// One line of a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub code: String,
    pub description: String,
    pub price: Fixed,
    /// Tax slot: `01`..`16`, or `FF`, `II`, `NN`
    pub taxcode: String,
    pub quantity: Fixed,
    pub unit: UnitType,
    pub discount: Fixed,
    pub markup: Fixed,
    /// Article return instead of a sale
    pub refund: bool,
}

impl Item {
    /// One unit of `code` at `price`, no discount.
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        price: Fixed,
        taxcode: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            price,
            taxcode: taxcode.into(),
            quantity: Fixed::from_int(1),
            unit: UnitType::Empty,
            discount: Fixed::ZERO,
            markup: Fixed::ZERO,
            refund: false,
        }
    }

    #[must_use]
    pub fn quantity(mut self, quantity: Fixed) -> Self {
        self.quantity = quantity;
        self
    }

    #[must_use]
    pub fn unit(mut self, unit: UnitType) -> Self {
        self.unit = unit;
        self
    }

    #[must_use]
    pub fn discount(mut self, discount: Fixed) -> Self {
        self.discount = discount;
        self
    }

    #[must_use]
    pub fn markup(mut self, markup: Fixed) -> Self {
        self.markup = markup;
        self
    }

    #[must_use]
    pub fn refund(mut self) -> Self {
        self.refund = true;
        self
    }

    /// The add-item command for this line.
    ///
    /// ```text
    /// taxcode(2) price(11) qty(7) discount(10) markup(10) 01 0*20 unit(2) code\0 description\0
    /// ```
    pub fn command(&self) -> Command {
        let id = if self.refund {
            commands::ADD_REFUND
        } else {
            commands::ADD_ITEM
        };
        Command::new(id)
            .arg(Arg::text_right(self.taxcode.clone(), 2))
            .arg(Arg::decimal(self.price, 11, 3))
            .arg(Arg::decimal(self.quantity, 7, 3))
            .arg(Arg::decimal(self.discount, 10, 2))
            .arg(Arg::decimal(self.markup, 10, 2))
            .arg(Arg::integer(1, 2))
            .arg(Arg::integer(0, 20))
            .arg(Arg::text_right(self.unit.code(), 2))
            .arg(Arg::terminated(self.code.clone(), 49))
            .arg(Arg::terminated(self.description.clone(), 201))
    }
}

/// Adjustment applied to the whole coupon at totalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adjustment {
    #[default]
    None,
    Discount(Fixed),
    Markup(Fixed),
}

impl Adjustment {
    fn tag_and_value(self) -> (&'static str, Fixed) {
        match self {
            Self::Discount(value) => ("d", value),
            Self::Markup(value) => ("a", value),
            Self::None => ("D", Fixed::ZERO),
        }
    }
}

impl<T: Transport> FiscalPrinter<T> {
    /// Open a sale for `customer`.
    pub fn coupon_open(&mut self, customer: &Customer) -> Result<()> {
        let command = Command::new(commands::COUPON_OPEN)
            .arg(Arg::text(customer.name.clone(), 41))
            .arg(Arg::text(customer.document.clone(), 18))
            .arg(Arg::text(customer.address.clone(), 133));
        self.send_command(&command, ResponseShape::empty())?;
        self.remainder = None;
        Ok(())
    }

    /// Open a credit note referencing the sale with operation counter `coo`.
    pub fn credit_note_open(
        &mut self,
        customer: &Customer,
        coo: u32,
        at: NaiveDateTime,
    ) -> Result<()> {
        let serial = self.serial_number()?;
        let command = Command::new(commands::CREDIT_NOTE_OPEN)
            .arg(Arg::text(customer.name.clone(), 41))
            .arg(Arg::text(serial, 15))
            .arg(Arg::text(customer.document.clone(), 18))
            .arg(Arg::text(at.format("%d%m%y%H%M%S").to_string(), 12))
            .arg(Arg::integer(u64::from(coo), 6));
        self.send_command(&command, ResponseShape::empty())?;
        self.remainder = None;
        Ok(())
    }

    /// Add a line and return the id the device gave it.
    pub fn add_item(&mut self, item: &Item) -> Result<u32> {
        self.send_command(&item.command(), ResponseShape::empty())?;
        let id = self.read_number(registers::LAST_ITEM_ID)?;
        log::debug!("added item {} as #{}", item.code, id);
        u32::try_from(id)
            .map_err(|_| FiscalError::ProtocolViolation(format!("item id {id} out of range")))
    }

    pub fn cancel_item(&mut self, item_id: u32) -> Result<()> {
        let command = Command::new(commands::CANCEL_ITEM).arg(Arg::integer(u64::from(item_id), 4));
        self.send_command(&command, ResponseShape::empty())?;
        Ok(())
    }

    /// Close the item phase, applying `adjustment`, and return the subtotal.
    pub fn totalize(&mut self, adjustment: Adjustment) -> Result<Fixed> {
        let (tag, value) = adjustment.tag_and_value();
        let command = Command::new(commands::COUPON_TOTALIZE)
            .arg(Arg::text(tag, 1))
            .arg(Arg::decimal(value, 4, 2));
        self.send_command(&command, ResponseShape::empty())?;

        let subtotal = self.coupon_subtotal()?;
        self.remainder = Some(subtotal);
        Ok(subtotal)
    }

    /// Register a payment and return what is still due.
    ///
    /// The payment is on paper once the device accepts it. If the cached
    /// remainder cannot absorb it, the cache is dropped and the error is a
    /// [`FiscalError::ProtocolViolation`]; [`Self::coupon_subtotal`] gives
    /// the device's own figure.
    pub fn add_payment(&mut self, code: &str, value: Fixed, description: &str) -> Result<Fixed> {
        let command = Command::new(commands::ADD_PAYMENT)
            .arg(Arg::text(code, 2))
            .arg(Arg::decimal(value, 14, 2))
            .arg(Arg::text(description, 80));
        self.send_command(&command, ResponseShape::empty())?;

        let due = match self.remainder {
            Some(due) => due,
            None => self.coupon_subtotal()?,
        };
        self.remainder = due.checked_sub(value);
        self.remainder.ok_or_else(|| {
            FiscalError::ProtocolViolation(format!(
                "payment {value} accepted but remainder {due} cannot absorb it"
            ))
        })
    }

    /// Print `message` at the foot and close the coupon.
    pub fn coupon_close(&mut self, message: &str) -> Result<()> {
        let command = Command::new(commands::COUPON_CLOSE).arg(Arg::terminated(message, 320));
        self.send_command(&command, ResponseShape::empty())?;
        self.remainder = None;
        Ok(())
    }

    /// Cancel the open coupon, or the last one if none is open.
    pub fn coupon_cancel(&mut self) -> Result<()> {
        self.send_command(&Command::new(commands::COUPON_CANCEL), ResponseShape::empty())?;
        self.remainder = None;
        Ok(())
    }

    pub fn coupon_subtotal(&mut self) -> Result<Fixed> {
        let bytes = self
            .send_command(&Command::new(commands::GET_COUPON_SUBTOTAL), ResponseShape::bytes(7))?
            .into_bytes()?;
        bcd::decode_fixed(&bytes, 2)
    }

    /// Number of the current (or last) coupon.
    pub fn coupon_number(&mut self) -> Result<u64> {
        let bytes = self
            .send_command(&Command::new(commands::GET_COUPON_NUMBER), ResponseShape::bytes(3))?
            .into_bytes()?;
        bcd::decode_u64(&bytes)
    }

    /// Amount still due on the current sale, if it has been totalized.
    pub fn remainder(&self) -> Option<Fixed> {
        self.remainder
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::{BematechPacketizer, Packetizer};
    use crate::protocol::status::ACK;
    use crate::transport::MockTransport;
    use pretty_assertions::assert_eq;

    fn fixed(text: &str) -> Fixed {
        text.parse().unwrap()
    }

    /// Command bytes of a frame written by the driver.
    fn body(frame: &[u8]) -> &[u8] {
        &frame[4..frame.len() - 2]
    }

    #[test]
    fn test_item_encoding() {
        let item = Item::new("789", "COFFEE", fixed("12.995"), "01")
            .quantity(fixed("2"))
            .unit(UnitType::Weight)
            .discount(fixed("0.5"));
        let bytes = item.command().encode().unwrap();

        let mut expected = vec![0x3E, 0x47];
        expected.extend_from_slice(b"01");
        expected.extend_from_slice(b"00000012995");
        expected.extend_from_slice(b"0002000");
        expected.extend_from_slice(b"0000000050");
        expected.extend_from_slice(b"0000000000");
        expected.extend_from_slice(b"01");
        expected.extend_from_slice(&[b'0'; 20]);
        expected.extend_from_slice(b"Kg");
        expected.extend_from_slice(b"789\0COFFEE\0");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_refund_uses_return_command() {
        let item = Item::new("1", "X", fixed("1"), "FF").refund();
        let bytes = item.command().encode().unwrap();
        assert_eq!(&bytes[..3], &[0x3E, 0x47, 0x33]);
    }

    #[test]
    fn test_short_taxcode_is_right_aligned() {
        let item = Item::new("1", "X", fixed("1"), "F");
        let bytes = item.command().encode().unwrap();
        assert_eq!(&bytes[2..4], b" F");
    }

    #[test]
    fn test_price_overflow_writes_nothing() {
        let mut printer = FiscalPrinter::new(MockTransport::new());
        let item = Item::new("1", "X", fixed("123456789"), "01");
        assert!(matches!(
            printer.add_item(&item),
            Err(FiscalError::FieldOverflow { .. })
        ));
        assert!(printer.transport().writes().is_empty());
    }

    #[test]
    fn test_add_item_returns_last_id() {
        let mock = MockTransport::new()
            .reply(&[ACK, 0, 0])
            .reply(&[ACK, 0x00, 0x07, 0, 0]);
        let mut printer = FiscalPrinter::new(mock);
        let id = printer
            .add_item(&Item::new("1", "X", fixed("1"), "01"))
            .unwrap();
        assert_eq!(id, 7);
        assert_eq!(printer.transport().writes().len(), 2);
    }

    #[test]
    fn test_coupon_open_fields() {
        let mut printer = FiscalPrinter::new(MockTransport::new().reply(&[ACK, 0, 0]));
        let customer = Customer {
            name: "ANA".into(),
            document: "V123".into(),
            address: "".into(),
        };
        printer.coupon_open(&customer).unwrap();
        let frame = &printer.transport().writes()[0];
        let command = body(frame);
        assert_eq!(command.len(), 1 + 41 + 18 + 133);
        assert_eq!(command[0], 0x00);
        assert_eq!(&command[1..5], b"ANA ");
        assert_eq!(&command[42..47], b"V123 ");
    }

    #[test]
    fn test_totalize_and_pay() {
        let mock = MockTransport::new()
            .reply(&[ACK, 0, 0])
            .reply(&[ACK, 0, 0, 0, 0, 0, 0x25, 0x00, 0, 0])
            .reply(&[ACK, 0, 0])
            .reply(&[ACK, 0, 0]);
        let mut printer = FiscalPrinter::new(mock);

        let subtotal = printer.totalize(Adjustment::Discount(fixed("1.50"))).unwrap();
        assert_eq!(subtotal, fixed("25.00"));
        assert_eq!(printer.remainder(), Some(fixed("25")));

        let writes = printer.transport().writes();
        assert_eq!(body(&writes[0]), b"\x20d0150");

        let due = printer.add_payment("01", fixed("10"), "CASH").unwrap();
        assert_eq!(due, fixed("15"));

        printer.coupon_close("THANKS").unwrap();
        assert_eq!(printer.remainder(), None);

        let writes = printer.transport().writes();
        assert_eq!(body(&writes[3]), b"\x22THANKS\0");
    }

    #[test]
    fn test_totalize_without_adjustment() {
        let command = Command::new(commands::COUPON_TOTALIZE);
        let (tag, value) = Adjustment::None.tag_and_value();
        let bytes = command
            .arg(Arg::text(tag, 1))
            .arg(Arg::decimal(value, 4, 2))
            .encode()
            .unwrap();
        assert_eq!(bytes, b"\x20D0000");
    }

    #[test]
    fn test_payment_overflowing_remainder_after_write() {
        let mut printer = FiscalPrinter::new(MockTransport::new().reply(&[ACK, 0, 0]));
        printer.remainder = Some(Fixed::new(i64::MIN, 2));

        let err = printer.add_payment("01", fixed("1"), "").unwrap_err();
        assert!(matches!(err, FiscalError::ProtocolViolation(_)));
        assert_eq!(printer.transport().writes().len(), 1);
        assert_eq!(printer.remainder(), None);
    }

    #[test]
    fn test_accented_customer_and_item() {
        let mock = MockTransport::new()
            .reply(&[ACK, 0, 0])
            .reply(&[ACK, 0, 0])
            .reply(&[ACK, 0x00, 0x01, 0, 0]);
        let mut printer = FiscalPrinter::new(mock);
        let customer = Customer {
            name: "José Peña".into(),
            document: "V123".into(),
            address: "Calle Ñ".into(),
        };
        printer.coupon_open(&customer).unwrap();
        let item = Item::new("1", "Café", fixed("2.50"), "01");
        assert_eq!(printer.add_item(&item).unwrap(), 1);

        let writes = printer.transport().writes();
        let open = body(&writes[0]);
        assert_eq!(open.len(), 1 + 41 + 18 + 133);
        assert_eq!(&open[1..11], b"Jos\x82 Pe\xa4a ");
        assert_eq!(&open[60..68], b"Calle \xa5 ");
        assert!(body(&writes[1]).ends_with(b"1\0Caf\x82\0"));
    }

    #[test]
    fn test_cancel_clears_remainder() {
        let mut printer = FiscalPrinter::new(MockTransport::new().reply(&[ACK, 0, 0]));
        printer.remainder = Some(fixed("3"));
        printer.coupon_cancel().unwrap();
        assert_eq!(printer.remainder(), None);
    }

    #[test]
    fn test_coupon_number() {
        let mock = MockTransport::new().reply(&[ACK, 0x00, 0x01, 0x23, 0, 0]);
        let mut printer = FiscalPrinter::new(mock);
        assert_eq!(printer.coupon_number().unwrap(), 123);
        let expected = BematechPacketizer::default().create_packet(&[0x1E]);
        assert_eq!(printer.transport().writes(), vec![expected]);
    }

    #[test]
    fn test_credit_note_reads_serial_first() {
        let mut serial = vec![ACK];
        serial.extend_from_slice(b"BE0912345678        ");
        serial.extend([0, 0]);
        let mock = MockTransport::new().reply(&serial).reply(&[ACK, 0, 0]);
        let mut printer = FiscalPrinter::new(mock);
        let at = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 30)
            .unwrap();
        printer
            .credit_note_open(&Customer::default(), 768, at)
            .unwrap();

        let writes = printer.transport().writes();
        let command = body(&writes[1]);
        assert_eq!(command[0], 0x59);
        assert_eq!(&command[42..57], b"BE0912345678   ");
        assert_eq!(&command[75..87], b"090324140530");
        assert_eq!(&command[87..93], b"000768");
    }
}
