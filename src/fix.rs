//! Fixed-tag wire codec for order entry.
//!
//! Messages are `tag=value` pairs separated by SOH (0x01), with a
//! `8=FIX.4.2` header, a body-length field (tag 9), and a trailing modulo-256
//! checksum (tag 10) computed over every byte of the message up to and
//! including the SOH that precedes the checksum field. Only the order-entry
//! subset is implemented: new order ('D'), cancel ('F'), modify ('G'), and
//! execution reports ('8').

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::command::Command;
use crate::events::OrderUpdate;
use crate::order::Order;
use crate::types::{OrderId, OrderStatus, Price, Quantity, Side};

/// SOH field delimiter.
pub const SOH: char = '\x01';

/// Protocol version carried in tag 8.
pub const BEGIN_STRING: &str = "FIX.4.2";

/// Tag numbers used by the order-entry subset.
pub mod tags {
    pub const BEGIN_STRING: u32 = 8;
    pub const BODY_LENGTH: u32 = 9;
    pub const CHECKSUM: u32 = 10;
    pub const CL_ORD_ID: u32 = 11;
    pub const CUM_QTY: u32 = 14;
    pub const LAST_PX: u32 = 31;
    pub const LAST_QTY: u32 = 32;
    pub const MSG_SEQ_NUM: u32 = 34;
    pub const MSG_TYPE: u32 = 35;
    pub const ORDER_QTY: u32 = 38;
    pub const ORD_TYPE: u32 = 40;
    pub const PRICE: u32 = 44;
    pub const SENDER_COMP_ID: u32 = 49;
    pub const SENDING_TIME: u32 = 52;
    pub const SIDE: u32 = 54;
    pub const SYMBOL: u32 = 55;
    pub const TARGET_COMP_ID: u32 = 56;
    pub const TEXT: u32 = 58;
    pub const EXEC_TYPE: u32 = 150;
    pub const LEAVES_QTY: u32 = 151;
}

/// Message types (tag 35).
pub mod msg_type {
    pub const NEW_ORDER: char = 'D';
    pub const CANCEL: char = 'F';
    pub const MODIFY: char = 'G';
    pub const EXEC_REPORT: char = '8';
    pub const REJECT: char = '3';
    pub const HEARTBEAT: char = '0';
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FixError {
    #[error("missing tag {0}")]
    MissingTag(u32),
    #[error("invalid value for tag {tag}: {value:?}")]
    InvalidValue { tag: u32, value: String },
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("checksum mismatch: message says {stated}, computed {computed}")]
    ChecksumMismatch { stated: u8, computed: u8 },
    #[error("unsupported message type {0:?}")]
    UnsupportedMessageType(char),
}

/// A parsed or under-construction message. Field order is preserved for
/// serialization; lookups scan, which is fine at these field counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FixMessage {
    fields: Vec<(u32, String)>,
}

impl FixMessage {
    pub fn new(message_type: char) -> Self {
        let mut message = Self::default();
        message.set(tags::MSG_TYPE, message_type.to_string());
        message
    }

    /// Parse a SOH-framed message. When a checksum field is present it is
    /// verified against the preceding bytes.
    pub fn parse(raw: &str) -> Result<Self, FixError> {
        let mut message = Self::default();

        for token in raw.split(SOH) {
            if token.is_empty() {
                continue;
            }
            let (tag, value) = token
                .split_once('=')
                .ok_or_else(|| FixError::Malformed(format!("field without '=': {token:?}")))?;
            let tag: u32 = tag
                .parse()
                .map_err(|_| FixError::Malformed(format!("non-numeric tag: {tag:?}")))?;
            message.fields.push((tag, value.to_string()));
        }

        if let Some(stated) = message.get(tags::CHECKSUM) {
            let stated: u8 = stated
                .parse()
                .map_err(|_| FixError::InvalidValue {
                    tag: tags::CHECKSUM,
                    value: stated.to_string(),
                })?;
            let marker = format!("{SOH}10=");
            let soh_at = raw
                .rfind(&marker)
                .ok_or_else(|| FixError::Malformed("checksum field not framed".to_string()))?;
            let computed = checksum(raw[..=soh_at].as_bytes());
            if stated != computed {
                return Err(FixError::ChecksumMismatch { stated, computed });
            }
        }

        Ok(message)
    }

    /// Serialize with header, body length, and trailing checksum.
    pub fn serialize(&self) -> String {
        let mut body = String::new();
        for (tag, value) in &self.fields {
            if matches!(*tag, tags::BEGIN_STRING | tags::BODY_LENGTH | tags::CHECKSUM) {
                continue;
            }
            body.push_str(&format!("{tag}={value}{SOH}"));
        }

        let mut message = format!(
            "{}={}{SOH}{}={}{SOH}{body}",
            tags::BEGIN_STRING,
            BEGIN_STRING,
            tags::BODY_LENGTH,
            body.len()
        );
        let sum = checksum(message.as_bytes());
        message.push_str(&format!("{}={sum:03}{SOH}", tags::CHECKSUM));
        message
    }

    /// Set a field, replacing an existing value for the tag.
    pub fn set(&mut self, tag: u32, value: impl Into<String>) {
        let value = value.into();
        if let Some(field) = self.fields.iter_mut().find(|(existing, _)| *existing == tag) {
            field.1 = value;
        } else {
            self.fields.push((tag, value));
        }
    }

    pub fn get(&self, tag: u32) -> Option<&str> {
        self.fields
            .iter()
            .find(|(existing, _)| *existing == tag)
            .map(|(_, value)| value.as_str())
    }

    fn require(&self, tag: u32) -> Result<&str, FixError> {
        self.get(tag).ok_or(FixError::MissingTag(tag))
    }

    pub fn get_u64(&self, tag: u32) -> Result<u64, FixError> {
        let value = self.require(tag)?;
        value.parse().map_err(|_| FixError::InvalidValue {
            tag,
            value: value.to_string(),
        })
    }

    pub fn get_char(&self, tag: u32) -> Result<char, FixError> {
        let value = self.require(tag)?;
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(FixError::InvalidValue {
                tag,
                value: value.to_string(),
            }),
        }
    }

    /// Parse a decimal price field into fixed-point hundredths.
    pub fn get_price(&self, tag: u32) -> Result<Price, FixError> {
        let value = self.require(tag)?;
        let invalid = || FixError::InvalidValue {
            tag,
            value: value.to_string(),
        };
        let decimal: Decimal = value.parse().map_err(|_| invalid())?;
        (decimal * Decimal::from(100)).to_i64().ok_or_else(invalid)
    }

    /// Write a fixed-point price as a two-decimal display string.
    pub fn set_price(&mut self, tag: u32, price: Price) {
        let decimal = Decimal::new(price, 2);
        self.set(tag, format!("{decimal:.2}"));
    }

    pub fn message_type(&self) -> Result<char, FixError> {
        self.get_char(tags::MSG_TYPE)
    }
}

/// Modulo-256 checksum of a message prefix.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

fn side_to_wire(side: Side) -> char {
    match side {
        Side::Buy => '1',
        Side::Sell => '2',
    }
}

fn side_from_wire(value: char) -> Result<Side, FixError> {
    match value {
        '1' => Ok(Side::Buy),
        '2' => Ok(Side::Sell),
        other => Err(FixError::InvalidValue {
            tag: tags::SIDE,
            value: other.to_string(),
        }),
    }
}

fn exec_type(status: OrderStatus) -> char {
    match status {
        OrderStatus::New => '0',
        OrderStatus::PartiallyFilled => '1',
        OrderStatus::Filled => '2',
        OrderStatus::Cancelled => '4',
        OrderStatus::Rejected => '8',
    }
}

/// Build a new-order message from an order.
pub fn new_order_message(order: &Order) -> FixMessage {
    let mut message = FixMessage::new(msg_type::NEW_ORDER);
    message.set(tags::CL_ORD_ID, order.id.to_string());
    message.set(tags::SYMBOL, order.symbol.clone());
    message.set(tags::SIDE, side_to_wire(order.side).to_string());
    match order.limit_price() {
        Some(price) => {
            message.set(tags::ORD_TYPE, "2");
            message.set_price(tags::PRICE, price);
        }
        None => {
            message.set(tags::ORD_TYPE, "1");
        }
    }
    message.set(tags::ORDER_QTY, order.quantity.to_string());
    message
}

/// Build a cancel message.
pub fn cancel_message(order_id: OrderId, symbol: &str) -> FixMessage {
    let mut message = FixMessage::new(msg_type::CANCEL);
    message.set(tags::CL_ORD_ID, order_id.to_string());
    message.set(tags::SYMBOL, symbol.to_string());
    message
}

/// Build a modify (cancel-and-replace) message.
pub fn modify_message(order_id: OrderId, symbol: &str, new_price: Price, new_quantity: Quantity) -> FixMessage {
    let mut message = FixMessage::new(msg_type::MODIFY);
    message.set(tags::CL_ORD_ID, order_id.to_string());
    message.set(tags::SYMBOL, symbol.to_string());
    message.set_price(tags::PRICE, new_price);
    message.set(tags::ORDER_QTY, new_quantity.to_string());
    message
}

/// Build an execution report from an order-update snapshot.
pub fn exec_report(symbol: &str, update: &OrderUpdate, last: Option<(Price, Quantity)>) -> FixMessage {
    let mut message = FixMessage::new(msg_type::EXEC_REPORT);
    message.set(tags::CL_ORD_ID, update.order_id.to_string());
    message.set(tags::SYMBOL, symbol.to_string());
    message.set(tags::EXEC_TYPE, exec_type(update.status).to_string());
    message.set(tags::LEAVES_QTY, update.remaining.to_string());
    message.set(tags::CUM_QTY, update.filled.to_string());
    if let Some((price, qty)) = last {
        message.set_price(tags::LAST_PX, price);
        message.set(tags::LAST_QTY, qty.to_string());
    }
    message
}

/// Decode an inbound message into an engine instruction.
pub fn command_from_message(message: &FixMessage) -> Result<Command, FixError> {
    match message.message_type()? {
        msg_type::NEW_ORDER => Ok(Command::Place(order_from_message(message)?)),
        msg_type::CANCEL => Ok(Command::Cancel {
            order_id: message.get_u64(tags::CL_ORD_ID)?,
        }),
        msg_type::MODIFY => Ok(Command::Modify {
            order_id: message.get_u64(tags::CL_ORD_ID)?,
            new_price: message.get_price(tags::PRICE)?,
            new_quantity: message.get_u64(tags::ORDER_QTY)?,
        }),
        other => Err(FixError::UnsupportedMessageType(other)),
    }
}

/// Decode a new-order message.
pub fn order_from_message(message: &FixMessage) -> Result<Order, FixError> {
    let id = message.get_u64(tags::CL_ORD_ID)?;
    let symbol = message.require(tags::SYMBOL)?.to_string();
    let side = side_from_wire(message.get_char(tags::SIDE)?)?;
    let quantity = message.get_u64(tags::ORDER_QTY)?;

    match message.get_char(tags::ORD_TYPE)? {
        '1' => Ok(Order::market(id, symbol, side, quantity)),
        '2' => Ok(Order::limit(id, symbol, side, message.get_price(tags::PRICE)?, quantity)),
        other => Err(FixError::InvalidValue {
            tag: tags::ORD_TYPE,
            value: other.to_string(),
        }),
    }
}
