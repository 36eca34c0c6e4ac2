//! Order lifecycle.
//!
//! An order is created by the caller with status `New` and is mutated only
//! by the matching engine (fills) or by cancellation. `remaining <= quantity`
//! always holds; `Filled` is equivalent to `remaining == 0` without a cancel.

use crate::types::{now_ns, OrderId, OrderKind, OrderStatus, Price, Quantity, Side, Symbol, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub kind: OrderKind,
    /// Original quantity at submission.
    pub quantity: Quantity,
    /// Quantity still open.
    pub remaining: Quantity,
    pub status: OrderStatus,
    pub created_at: Timestamp,
}

impl Order {
    /// Create a limit order.
    pub fn limit(id: OrderId, symbol: impl Into<Symbol>, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            side,
            kind: OrderKind::Limit(price),
            quantity,
            remaining: quantity,
            status: OrderStatus::New,
            created_at: now_ns(),
        }
    }

    /// Create a market order.
    pub fn market(id: OrderId, symbol: impl Into<Symbol>, side: Side, quantity: Quantity) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            side,
            kind: OrderKind::Market,
            quantity,
            remaining: quantity,
            status: OrderStatus::New,
            created_at: now_ns(),
        }
    }

    /// The limit price, if this is a limit order.
    #[inline]
    pub fn limit_price(&self) -> Option<Price> {
        self.kind.limit_price()
    }

    /// Quantity executed so far.
    #[inline]
    pub fn filled(&self) -> Quantity {
        self.quantity - self.remaining
    }

    /// Apply a fill. Clamped to the open quantity; updates status.
    pub fn fill(&mut self, qty: Quantity) {
        let qty = qty.min(self.remaining);
        self.remaining -= qty;
        self.status = if self.remaining == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    /// Cancel the open quantity.
    pub fn cancel(&mut self) {
        self.status = OrderStatus::Cancelled;
        self.remaining = 0;
    }

    /// An order is active while it is `New` or `PartiallyFilled`.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.status, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}
