//! Executions and the synchronous event sink.
//!
//! Trades and order updates are pushed to subscriber callbacks from inside
//! the matching path, in emission order, before `submit_order` returns.
//! Callbacks must not re-enter the engine or mutate the book; they exist so
//! publishers can observe executions without a secondary queue.

use serde::Serialize;

use crate::types::{price_to_display, OrderId, OrderStatus, Price, Quantity, Symbol, Timestamp};

/// An executed trade between two orders. Immutable once emitted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trade {
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub symbol: Symbol,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: Timestamp,
}

impl Trade {
    /// Notional value in display units.
    #[inline]
    pub fn value(&self) -> f64 {
        price_to_display(self.price) * self.quantity as f64
    }

    pub fn involves(&self, order_id: OrderId) -> bool {
        self.buy_order_id == order_id || self.sell_order_id == order_id
    }
}

/// Snapshot of an order's state at a notification point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub remaining: Quantity,
    pub filled: Quantity,
}

pub type TradeCallback = Box<dyn FnMut(&Trade) + Send>;
pub type OrderUpdateCallback = Box<dyn FnMut(&OrderUpdate) + Send>;

/// The two callback slots consumed by external publishers.
#[derive(Default)]
pub struct EventSink {
    on_trade: Option<TradeCallback>,
    on_order_update: Option<OrderUpdateCallback>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the trade callback, replacing any previous one.
    pub fn set_on_trade(&mut self, callback: impl FnMut(&Trade) + Send + 'static) {
        self.on_trade = Some(Box::new(callback));
    }

    /// Install the order-update callback, replacing any previous one.
    pub fn set_on_order_update(&mut self, callback: impl FnMut(&OrderUpdate) + Send + 'static) {
        self.on_order_update = Some(Box::new(callback));
    }

    #[inline]
    pub(crate) fn trade(&mut self, trade: &Trade) {
        if let Some(callback) = &mut self.on_trade {
            callback(trade);
        }
    }

    #[inline]
    pub(crate) fn order_update(&mut self, update: &OrderUpdate) {
        if let Some(callback) = &mut self.on_order_update {
            callback(update);
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("on_trade", &self.on_trade.is_some())
            .field("on_order_update", &self.on_order_update.is_some())
            .finish()
    }
}
