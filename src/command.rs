//! Instruction and output-event vocabulary.
//!
//! `Command` is the new/cancel/modify stream handed to the engine by the
//! boundary layer (socket server, ring buffer, replay). `OutputEvent` is
//! what the engine hands back for publishing: trades, acceptance of resting
//! orders, cancels, and rejects.

use crate::events::{OrderUpdate, Trade};
use crate::order::Order;
use crate::risk::Validation;
use crate::types::{OrderId, Price, Quantity, Side};

/// An instruction for the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Submit a new order.
    Place(Order),
    /// Cancel a resting order by id.
    Cancel { order_id: OrderId },
    /// Cancel-and-replace at a new price and quantity (same id; loses time
    /// priority).
    Modify {
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
    },
}

/// An order is resting on the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderAccepted {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    /// Open quantity now resting.
    pub resting: Quantity,
    /// Quantity executed before the residual rested.
    pub filled: Quantity,
}

/// An order's open quantity was cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderCanceled {
    pub order_id: OrderId,
    pub canceled_qty: Quantity,
    /// Quantity executed before the cancel.
    pub filled: Quantity,
}

/// An instruction was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderRejected {
    pub order_id: OrderId,
    pub reason: RejectReason,
}

/// Why an instruction was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Pre-trade risk verdict.
    Risk(Validation),
    DuplicateOrderId,
    UnknownOrder,
    InvalidQuantity,
    SymbolMismatch,
    /// The resting-order pool is exhausted.
    PoolExhausted,
}

/// Engine output, in emission order.
#[derive(Clone, Debug)]
pub enum OutputEvent {
    Trade(Trade),
    Accepted(OrderAccepted),
    Canceled(OrderCanceled),
    Rejected(OrderRejected),
    /// Final state of a submitted order that did not rest (filled, or a
    /// market order's discarded residual).
    Update(OrderUpdate),
}

impl Command {
    /// The order id this instruction refers to.
    pub fn order_id(&self) -> OrderId {
        match self {
            Command::Place(order) => order.id,
            Command::Cancel { order_id } => *order_id,
            Command::Modify { order_id, .. } => *order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    #[test]
    fn test_command_order_id() {
        let place = Command::Place(Order::limit(7, "ACME", Side::Buy, 15000, 10));
        assert_eq!(place.order_id(), 7);

        let cancel = Command::Cancel { order_id: 9 };
        assert_eq!(cancel.order_id(), 9);

        let modify = Command::Modify {
            order_id: 11,
            new_price: 15100,
            new_quantity: 20,
        };
        assert_eq!(modify.order_id(), 11);
    }
}
