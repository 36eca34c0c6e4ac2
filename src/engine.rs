//! Engine facade: risk gate, matcher, and ledger wired per the system's
//! control flow.
//!
//! An instruction is validated against the risk limits (when installed),
//! matched against the book, and every resulting execution updates the
//! position ledger with the submitted order's side as the aggressor side.
//! The whole facade is a single-writer domain: concurrent submitters hand
//! off through an external queue (see [`Engine::run`]) or serialize at the
//! boundary.

use tracing::warn;

use crate::command::{Command, OrderAccepted, OrderCanceled, OrderRejected, OutputEvent, RejectReason};
use crate::events::{OrderUpdate, Trade};
use crate::matching::{MatchingEngine, MatchingStats};
use crate::order::Order;
use crate::order_book::OrderBook;
use crate::risk::{RiskLimits, RiskManager, Validation};
use crate::types::{OrderId, Price, Quantity};

pub struct Engine {
    matcher: MatchingEngine,
    risk: Option<RiskManager>,
    last_trade_price: Option<Price>,
}

impl Engine {
    /// Engine without pre-trade risk checks.
    pub fn new(symbol: impl Into<String>, capacity: u32) -> Self {
        Self {
            matcher: MatchingEngine::new(symbol, capacity),
            risk: None,
            last_trade_price: None,
        }
    }

    /// Engine with a pre-trade risk gate.
    pub fn with_risk(symbol: impl Into<String>, capacity: u32, limits: RiskLimits) -> Self {
        Self {
            matcher: MatchingEngine::new(symbol, capacity),
            risk: Some(RiskManager::new(limits)),
            last_trade_price: None,
        }
    }

    /// Submit an order: validate, match, and settle into the ledger.
    ///
    /// `Err` carries a risk rejection; the order was not submitted to the
    /// book. Programming errors (symbol mismatch, duplicate id) yield
    /// `Ok(vec![])` and are logged, per the book's own failure semantics.
    pub fn submit_order(&mut self, order: &mut Order) -> Result<Vec<Trade>, Validation> {
        let reference = self.reference_price();

        if let Some(risk) = self.risk.as_mut() {
            let verdict = risk.validate(order, reference);
            if !verdict.is_accepted() {
                warn!(order_id = order.id, %verdict, "order rejected pre-trade");
                order.status = crate::types::OrderStatus::Rejected;
                return Err(verdict);
            }
        }

        let trades = self.matcher.submit_order(order);

        if let Some(last) = trades.last() {
            self.last_trade_price = Some(last.price);
        }
        if let Some(risk) = self.risk.as_mut() {
            for trade in &trades {
                risk.update_position(trade, order.side);
            }
            if let Some(last) = trades.last() {
                risk.update_unrealized_pnl(&order.symbol, last.price);
            }
        }

        Ok(trades)
    }

    /// Cancel a resting order.
    pub fn cancel_order(&mut self, order_id: OrderId) -> bool {
        self.matcher.cancel_order(order_id)
    }

    /// Cancel-and-replace (same id, loses time priority).
    pub fn modify_order(&mut self, order_id: OrderId, new_price: Price, new_quantity: Quantity) -> bool {
        self.matcher.modify_order(order_id, new_price, new_quantity)
    }

    /// Re-mark positions at a caller-supplied price.
    pub fn update_mark_price(&mut self, mark_price: Price) {
        let symbol = self.matcher.symbol().to_string();
        if let Some(risk) = self.risk.as_mut() {
            risk.update_unrealized_pnl(&symbol, mark_price);
        }
    }

    /// Process one instruction and collect the output events.
    ///
    /// This is the entry point for the ring-buffer loop and the boundary
    /// server; interactive callers can use [`Engine::submit_order`]
    /// directly.
    pub fn process_command(&mut self, command: Command) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        match command {
            Command::Place(mut order) => {
                if order.quantity == 0 {
                    events.push(reject(order.id, RejectReason::InvalidQuantity));
                    return events;
                }
                if order.symbol != self.matcher.symbol() {
                    events.push(reject(order.id, RejectReason::SymbolMismatch));
                    return events;
                }
                if self.matcher.book().contains(order.id) {
                    events.push(reject(order.id, RejectReason::DuplicateOrderId));
                    return events;
                }

                match self.submit_order(&mut order) {
                    Err(verdict) => {
                        events.push(reject(order.id, RejectReason::Risk(verdict)));
                    }
                    Ok(trades) => {
                        events.extend(trades.into_iter().map(OutputEvent::Trade));
                        if self.matcher.book().contains(order.id) {
                            events.push(OutputEvent::Accepted(OrderAccepted {
                                order_id: order.id,
                                side: order.side,
                                // A resting order always has a limit price.
                                price: order.limit_price().unwrap_or_default(),
                                resting: order.remaining,
                                filled: order.filled(),
                            }));
                        } else {
                            events.push(OutputEvent::Update(OrderUpdate {
                                order_id: order.id,
                                status: order.status,
                                remaining: order.remaining,
                                filled: order.filled(),
                            }));
                        }
                    }
                }
            }
            Command::Cancel { order_id } => {
                let resting = self.matcher.book().get(order_id);
                if self.matcher.cancel_order(order_id) {
                    let resting = resting.expect("cancelled order was resting");
                    events.push(OutputEvent::Canceled(OrderCanceled {
                        order_id,
                        canceled_qty: resting.remaining,
                        filled: resting.quantity - resting.remaining,
                    }));
                } else {
                    events.push(reject(order_id, RejectReason::UnknownOrder));
                }
            }
            Command::Modify {
                order_id,
                new_price,
                new_quantity,
            } => {
                if new_quantity == 0 {
                    events.push(reject(order_id, RejectReason::InvalidQuantity));
                } else if self.matcher.modify_order(order_id, new_price, new_quantity) {
                    let side = self
                        .matcher
                        .book()
                        .get(order_id)
                        .map(|order| order.side)
                        .expect("modified order rests");
                    events.push(OutputEvent::Accepted(OrderAccepted {
                        order_id,
                        side,
                        price: new_price,
                        resting: new_quantity,
                        filled: 0,
                    }));
                } else {
                    events.push(reject(order_id, RejectReason::UnknownOrder));
                }
            }
        }
        events
    }

    /// Reference price for valuing market orders: the last trade, else the
    /// book midpoint, else the populated side's best, else zero.
    pub fn reference_price(&self) -> Price {
        if let Some(price) = self.last_trade_price {
            return price;
        }
        let book = self.matcher.book();
        match (book.best_bid(), book.best_ask()) {
            (Some(bid), Some(ask)) => (bid + ask) / 2,
            (Some(bid), None) => bid,
            (None, Some(ask)) => ask,
            (None, None) => 0,
        }
    }

    /// Run the single-writer event loop: pop commands from the ring, match,
    /// and push output events best-effort (dropped when the consumer lags).
    ///
    /// Never returns; the engine thread owns all book state for the process
    /// lifetime. `pin_to_core` pins to the last CPU, which deployments keep
    /// clear of OS interrupts.
    #[cfg(feature = "runtime")]
    pub fn run(
        &mut self,
        input: &mut rtrb::Consumer<Command>,
        output: &mut rtrb::Producer<OutputEvent>,
        pin_to_core: bool,
    ) -> ! {
        if pin_to_core {
            if let Some(core_ids) = core_affinity::get_core_ids() {
                if let Some(last) = core_ids.last() {
                    core_affinity::set_for_current(*last);
                }
            }
        }
        self.warm_up();

        loop {
            while let Ok(command) = input.pop() {
                for event in self.process_command(command) {
                    let _ = output.push(event);
                }
            }
            std::hint::spin_loop();
        }
    }

    #[inline]
    pub fn book(&self) -> &OrderBook {
        self.matcher.book()
    }

    #[inline]
    pub fn stats(&self) -> MatchingStats {
        self.matcher.stats()
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        self.matcher.symbol()
    }

    #[inline]
    pub fn risk(&self) -> Option<&RiskManager> {
        self.risk.as_ref()
    }

    #[inline]
    pub fn risk_mut(&mut self) -> Option<&mut RiskManager> {
        self.risk.as_mut()
    }

    pub fn set_on_trade(&mut self, callback: impl FnMut(&Trade) + Send + 'static) {
        self.matcher.set_on_trade(callback);
    }

    pub fn set_on_order_update(&mut self, callback: impl FnMut(&OrderUpdate) + Send + 'static) {
        self.matcher.set_on_order_update(callback);
    }

    pub fn warm_up(&mut self) {
        self.matcher.warm_up();
    }

    /// Remove every resting order (benchmark support).
    pub fn clear_book(&mut self) {
        self.matcher.clear_book();
    }

    /// Hash of the observable book state, for determinism checks.
    pub fn state_hash(&self) -> u64 {
        self.matcher.state_hash()
    }
}

fn reject(order_id: OrderId, reason: RejectReason) -> OutputEvent {
    OutputEvent::Rejected(OrderRejected { order_id, reason })
}
