//! Order matching.
//!
//! Incoming orders cross against the opposite side of the book under strict
//! price-time priority: better prices first, FIFO within a level. Every
//! trade executes at the resting order's price, so price improvement always
//! accrues to the aggressor. Market orders never rest; a limit order's
//! residual joins the tail of its price level.

use tracing::{error, warn};

use crate::events::{EventSink, OrderUpdate, Trade};
use crate::order::Order;
use crate::order_book::OrderBook;
use crate::types::{now_ns, OrderId, OrderKind, Price, Quantity, Side};

/// Monotonically non-decreasing counters over the engine's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MatchingStats {
    pub total_trades: u64,
    pub total_volume: u64,
    /// Notional traded, in display units.
    pub total_value: f64,
    pub market_orders_matched: u64,
    pub limit_orders_matched: u64,
}

/// The matching engine: owns the book and drives incoming orders against it.
///
/// All mutation happens on the caller's thread; callers serialize
/// `submit_order` / `cancel_order` / `modify_order` against each other.
pub struct MatchingEngine {
    book: OrderBook,
    sink: EventSink,
    stats: MatchingStats,
}

impl MatchingEngine {
    /// Create an engine for `symbol` with a pool of `capacity` resting
    /// orders.
    pub fn new(symbol: impl Into<String>, capacity: u32) -> Self {
        Self {
            book: OrderBook::new(symbol, capacity),
            sink: EventSink::new(),
            stats: MatchingStats::default(),
        }
    }

    /// Submit an order, returning the trades it produced in emission order.
    ///
    /// Side effects, in order per match: the book is mutated, the trade
    /// callback fires, the resting order's update callback fires. The
    /// aggressor's own update callback fires once after matching completes.
    /// An order whose symbol does not match the engine's produces no trades
    /// and no mutation.
    pub fn submit_order(&mut self, order: &mut Order) -> Vec<Trade> {
        if order.symbol != self.book.symbol() {
            error!(
                order_id = order.id,
                symbol = %order.symbol,
                engine = %self.book.symbol(),
                "order symbol mismatch"
            );
            return Vec::new();
        }
        if order.remaining == 0 {
            warn!(order_id = order.id, "zero-quantity order ignored");
            return Vec::new();
        }
        if self.book.contains(order.id) {
            warn!(order_id = order.id, "duplicate order id");
            return Vec::new();
        }

        match order.kind {
            OrderKind::Market => {
                self.stats.market_orders_matched += 1;
                self.match_market(order)
            }
            OrderKind::Limit(limit) => {
                self.stats.limit_orders_matched += 1;
                self.match_limit(order, limit)
            }
        }
    }

    /// Market path: walk the opposite side from the best price outward until
    /// filled or liquidity runs out. Any residual is discarded.
    fn match_market(&mut self, order: &mut Order) -> Vec<Trade> {
        let trades = self.cross(order, None);
        if order.remaining > 0 {
            warn!(
                order_id = order.id,
                remaining = order.remaining,
                "market order exhausted available liquidity"
            );
        }
        self.notify_order(order);
        trades
    }

    /// Limit path: match while the opposite top of book satisfies the limit,
    /// then rest the residual at the limit price.
    fn match_limit(&mut self, order: &mut Order, limit: Price) -> Vec<Trade> {
        let trades = self.cross(order, Some(limit));
        if order.remaining > 0 && !self.book.add_order(order) {
            warn!(order_id = order.id, "residual could not rest");
        }
        self.notify_order(order);
        trades
    }

    /// Consume opposite-side liquidity while it is marketable for the
    /// aggressor. `limit = None` takes any price (market order).
    fn cross(&mut self, order: &mut Order, limit: Option<Price>) -> Vec<Trade> {
        let mut trades = Vec::new();
        let resting_side = order.side.opposite();

        while order.remaining > 0 {
            let best = match order.side {
                Side::Buy => self.book.best_ask(),
                Side::Sell => self.book.best_bid(),
            };
            let best = match best {
                Some(price) => price,
                None => break,
            };
            if let Some(limit) = limit {
                let marketable = match order.side {
                    Side::Buy => best <= limit,
                    Side::Sell => best >= limit,
                };
                if !marketable {
                    break;
                }
            }

            let fill = match self.book.fill_best_front(resting_side, order.remaining) {
                Some(fill) => fill,
                None => break,
            };
            order.fill(fill.filled);

            let (buy_order_id, sell_order_id) = match order.side {
                Side::Buy => (order.id, fill.order_id),
                Side::Sell => (fill.order_id, order.id),
            };
            let trade = Trade {
                buy_order_id,
                sell_order_id,
                symbol: order.symbol.clone(),
                price: fill.price,
                quantity: fill.filled,
                timestamp: now_ns(),
            };

            self.stats.total_trades += 1;
            self.stats.total_volume += fill.filled;
            self.stats.total_value += trade.value();

            self.sink.trade(&trade);
            self.sink.order_update(&OrderUpdate {
                order_id: fill.order_id,
                status: fill.status,
                remaining: fill.remaining,
                filled: fill.total_filled,
            });
            trades.push(trade);
        }
        trades
    }

    fn notify_order(&mut self, order: &Order) {
        self.sink.order_update(&OrderUpdate {
            order_id: order.id,
            status: order.status,
            remaining: order.remaining,
            filled: order.filled(),
        });
    }

    /// Cancel a resting order. Fires the order-update callback on success.
    pub fn cancel_order(&mut self, id: OrderId) -> bool {
        let filled = match self.book.get(id) {
            Some(resting) => resting.quantity - resting.remaining,
            None => return false,
        };
        if !self.book.cancel_order(id) {
            return false;
        }
        self.sink.order_update(&OrderUpdate {
            order_id: id,
            status: crate::types::OrderStatus::Cancelled,
            remaining: 0,
            filled,
        });
        true
    }

    /// Cancel-and-replace at a new price and quantity under the same id.
    /// Time priority is lost.
    pub fn modify_order(&mut self, id: OrderId, new_price: Price, new_quantity: Quantity) -> bool {
        self.book.modify_order(id, new_price, new_quantity)
    }

    #[inline]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    #[inline]
    pub fn stats(&self) -> MatchingStats {
        self.stats
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        self.book.symbol()
    }

    /// Install the trade callback.
    pub fn set_on_trade(&mut self, callback: impl FnMut(&Trade) + Send + 'static) {
        self.sink.set_on_trade(callback);
    }

    /// Install the order-update callback.
    pub fn set_on_order_update(&mut self, callback: impl FnMut(&OrderUpdate) + Send + 'static) {
        self.sink.set_on_order_update(callback);
    }

    /// Pre-fault the order pool.
    pub fn warm_up(&mut self) {
        self.book.warm_up();
    }

    /// Remove every resting order (benchmark support).
    pub fn clear_book(&mut self) {
        self.book.clear();
    }

    /// Hash of the observable book state, for determinism checks.
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.book.best_bid().hash(&mut hasher);
        self.book.best_ask().hash(&mut hasher);
        self.book.order_count().hash(&mut hasher);
        self.book.total_bid_quantity().hash(&mut hasher);
        self.book.total_ask_quantity().hash(&mut hasher);
        hasher.finish()
    }
}
