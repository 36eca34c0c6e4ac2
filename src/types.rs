//! Primitive semantic types shared by the book, engine, and risk modules.
//!
//! Prices are signed 64-bit fixed-point integers counting hundredths of the
//! display currency unit: $150.25 is stored as `15025`. No floating-point
//! price is ever compared for equality; `f64` appears only at the display
//! and PnL-accounting boundaries.

use serde::{Deserialize, Serialize};

/// Client-assigned unique order identifier.
pub type OrderId = u64;

/// Fixed-point price: display price × 100.
pub type Price = i64;

/// Whole-unit order quantity.
pub type Quantity = u64;

/// Nanoseconds since the Unix epoch.
pub type Timestamp = u64;

/// Ticker symbol. Single-symbol scope; kept as a string for the wire layer.
pub type Symbol = String;

/// Fixed-point scale factor between internal and display prices.
pub const PRICE_SCALE: i64 = 100;

/// Convert a fixed-point price to display units.
#[inline]
pub fn price_to_display(price: Price) -> f64 {
    price as f64 / PRICE_SCALE as f64
}

/// Convert a display price to fixed-point, rounding to the nearest tick.
#[inline]
pub fn display_to_price(value: f64) -> Price {
    (value * PRICE_SCALE as f64).round() as Price
}

/// Current wall-clock time in nanoseconds since the epoch.
#[inline]
pub fn now_ns() -> Timestamp {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or(0)
        .max(0) as Timestamp
}

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// Returns the opposite side.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Order pricing behavior.
///
/// Market orders carry no price of their own; limit orders carry their limit.
/// A market order never rests on the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit(Price),
}

impl OrderKind {
    /// The limit price, if any.
    #[inline]
    pub const fn limit_price(self) -> Option<Price> {
        match self {
            OrderKind::Market => None,
            OrderKind::Limit(price) => Some(price),
        }
    }

    #[inline]
    pub const fn is_market(self) -> bool {
        matches!(self, OrderKind::Market)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            OrderKind::Market => "MARKET",
            OrderKind::Limit(_) => "LIMIT",
        }
    }
}

/// Lifecycle state of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum OrderStatus {
    New = 0,
    PartiallyFilled = 1,
    Filled = 2,
    Cancelled = 3,
    Rejected = 4,
}

impl OrderStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_price_conversion_round_trip() {
        assert_eq!(price_to_display(15025), 150.25);
        assert_eq!(display_to_price(150.25), 15025);
        assert_eq!(display_to_price(price_to_display(-9999)), -9999);
    }

    #[test]
    fn test_order_kind_limit_price() {
        assert_eq!(OrderKind::Market.limit_price(), None);
        assert_eq!(OrderKind::Limit(15000).limit_price(), Some(15000));
        assert!(OrderKind::Market.is_market());
        assert!(!OrderKind::Limit(1).is_market());
    }
}
