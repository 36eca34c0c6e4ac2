//! The central limit order book.
//!
//! Both sides are hash maps keyed by fixed-point price with the best price
//! cached, so best-bid/best-ask reads are O(1) and a rescan only happens
//! when the best level empties. A separate id-index maps order ids to slab
//! handles for O(1) cancel lookup. Removing an order always releases the
//! level linkage, the id-index entry, and the slab slot in the same
//! operation, so no stale reference can survive a fill or cancel.

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::warn;

use crate::order::Order;
use crate::price_level::PriceLevel;
use crate::slab::{Handle, Slab};
use crate::types::{
    now_ns, price_to_display, OrderId, OrderStatus, Price, Quantity, Side, Symbol, Timestamp,
};

/// Id-index entry: where an order rests and on which side.
#[derive(Clone, Copy, Debug)]
struct OrderRef {
    handle: Handle,
    side: Side,
    price: Price,
}

/// Aggregated view of one price level, for depth snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DepthLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub orders: u32,
}

/// Book-wide counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BookStats {
    pub total_orders: usize,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub total_bid_quantity: Quantity,
    pub total_ask_quantity: Quantity,
}

/// Read-only snapshot of a resting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestingOrder {
    pub id: OrderId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub remaining: Quantity,
    pub status: OrderStatus,
    pub created_at: Timestamp,
}

/// Outcome of filling the front order at the best level.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FrontFill {
    pub order_id: OrderId,
    pub price: Price,
    /// Quantity executed by this fill.
    pub filled: Quantity,
    /// Open quantity after the fill.
    pub remaining: Quantity,
    /// Cumulative executed quantity for the order.
    pub total_filled: Quantity,
    pub status: OrderStatus,
}

pub struct OrderBook {
    symbol: Symbol,
    slab: Slab,
    bids: FxHashMap<Price, PriceLevel>,
    asks: FxHashMap<Price, PriceLevel>,
    best_bid: Option<Price>,
    best_ask: Option<Price>,
    ids: FxHashMap<OrderId, OrderRef>,
}

impl OrderBook {
    /// Create an empty book for `symbol` holding at most `capacity` resting
    /// orders.
    pub fn new(symbol: impl Into<Symbol>, capacity: u32) -> Self {
        Self {
            symbol: symbol.into(),
            slab: Slab::new(capacity),
            bids: FxHashMap::with_capacity_and_hasher(1024, Default::default()),
            asks: FxHashMap::with_capacity_and_hasher(1024, Default::default()),
            best_bid: None,
            best_ask: None,
            ids: FxHashMap::with_capacity_and_hasher(capacity as usize, Default::default()),
        }
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    // ========================================================================
    // Best price access
    // ========================================================================

    /// Highest resting buy price.
    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.best_bid
    }

    /// Lowest resting sell price.
    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.best_ask
    }

    /// `best_ask - best_bid` when both sides are populated.
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Midpoint of the top of book, in display units.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(price_to_display(bid + ask) / 2.0),
            _ => None,
        }
    }

    // ========================================================================
    // Order management
    // ========================================================================

    /// Insert a resting limit order.
    ///
    /// Fails (returns `false`, logs, leaves the book untouched) on symbol
    /// mismatch, market orders, zero open quantity, duplicate id, or pool
    /// exhaustion.
    pub fn add_order(&mut self, order: &Order) -> bool {
        if order.symbol != self.symbol {
            warn!(order_id = order.id, symbol = %order.symbol, book = %self.symbol, "symbol mismatch");
            return false;
        }
        let price = match order.limit_price() {
            Some(price) => price,
            None => {
                warn!(order_id = order.id, "market orders do not rest on the book");
                return false;
            }
        };
        if order.remaining == 0 {
            return false;
        }
        if self.ids.contains_key(&order.id) {
            warn!(order_id = order.id, "duplicate order id");
            return false;
        }
        self.insert(
            order.id,
            order.side,
            price,
            order.quantity,
            order.remaining,
            order.status,
            order.created_at,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn insert(
        &mut self,
        id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
        remaining: Quantity,
        status: OrderStatus,
        created_at: Timestamp,
    ) -> bool {
        let handle = match self.slab.alloc() {
            Some(handle) => handle,
            None => {
                warn!(order_id = id, "order pool exhausted");
                return false;
            }
        };

        let node = self.slab.get_mut(handle.slot);
        node.order_id = id;
        node.side = side;
        node.price = price;
        node.quantity = quantity;
        node.remaining = remaining;
        node.status = status;
        node.created_at = created_at;

        let level = match side {
            Side::Buy => self.bids.entry(price).or_default(),
            Side::Sell => self.asks.entry(price).or_default(),
        };
        level.add(&mut self.slab, handle.slot);

        self.ids.insert(id, OrderRef { handle, side, price });

        match side {
            Side::Buy => {
                if self.best_bid.map_or(true, |best| price > best) {
                    self.best_bid = Some(price);
                }
            }
            Side::Sell => {
                if self.best_ask.map_or(true, |best| price < best) {
                    self.best_ask = Some(price);
                }
            }
        }
        true
    }

    /// Cancel a resting order by id.
    ///
    /// The order's status becomes `Cancelled` and its open quantity zero
    /// before the slot is released. Returns `false` for unknown ids without
    /// touching the book.
    pub fn cancel_order(&mut self, id: OrderId) -> bool {
        let entry = match self.ids.remove(&id) {
            Some(entry) => entry,
            None => return false,
        };
        let slot = match self.slab.resolve(entry.handle) {
            Some(slot) => slot,
            None => return false,
        };

        let level_empty = match entry.side {
            Side::Buy => self.bids.get_mut(&entry.price),
            Side::Sell => self.asks.get_mut(&entry.price),
        }
        .map(|level| level.remove(&mut self.slab, slot))
        .unwrap_or(false);

        if level_empty {
            self.erase_level(entry.side, entry.price);
        }

        let node = self.slab.get_mut(slot);
        node.status = OrderStatus::Cancelled;
        node.remaining = 0;
        self.slab.release(slot);
        true
    }

    /// Cancel-and-replace: re-insert the order under the same id at a new
    /// price and quantity. The replacement joins the tail of its level, so
    /// time priority is lost by design.
    pub fn modify_order(&mut self, id: OrderId, new_price: Price, new_quantity: Quantity) -> bool {
        if new_quantity == 0 {
            return false;
        }
        let entry = match self.ids.get(&id) {
            Some(entry) => *entry,
            None => return false,
        };

        if !self.cancel_order(id) {
            return false;
        }
        self.insert(
            id,
            entry.side,
            new_price,
            new_quantity,
            new_quantity,
            OrderStatus::New,
            now_ns(),
        )
    }

    /// Snapshot a resting order.
    pub fn get(&self, id: OrderId) -> Option<RestingOrder> {
        let entry = self.ids.get(&id)?;
        let slot = self.slab.resolve(entry.handle)?;
        let node = self.slab.get(slot);
        Some(RestingOrder {
            id: node.order_id,
            side: node.side,
            price: node.price,
            quantity: node.quantity,
            remaining: node.remaining,
            status: node.status,
            created_at: node.created_at,
        })
    }

    #[inline]
    pub fn contains(&self, id: OrderId) -> bool {
        self.ids.contains_key(&id)
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Remove every order. Used by benchmarks between iterations.
    pub fn clear(&mut self) {
        let capacity = self.slab.capacity();
        self.slab = Slab::new(capacity);
        self.bids.clear();
        self.asks.clear();
        self.best_bid = None;
        self.best_ask = None;
        self.ids.clear();
    }

    /// Pre-fault the node pool.
    pub fn warm_up(&mut self) {
        self.slab.warm_up();
    }

    // ========================================================================
    // Depth and statistics
    // ========================================================================

    /// Top-`levels` bid aggregation, best (highest) price first.
    pub fn bid_depth(&self, levels: usize) -> Vec<DepthLevel> {
        let mut prices: Vec<Price> = self.bids.keys().copied().collect();
        prices.sort_unstable_by(|a, b| b.cmp(a));
        self.collect_depth(Side::Buy, &prices, levels)
    }

    /// Top-`levels` ask aggregation, best (lowest) price first.
    pub fn ask_depth(&self, levels: usize) -> Vec<DepthLevel> {
        let mut prices: Vec<Price> = self.asks.keys().copied().collect();
        prices.sort_unstable();
        self.collect_depth(Side::Sell, &prices, levels)
    }

    fn collect_depth(&self, side: Side, prices: &[Price], levels: usize) -> Vec<DepthLevel> {
        prices
            .iter()
            .take(levels)
            .filter_map(|&price| {
                let level = match side {
                    Side::Buy => self.bids.get(&price),
                    Side::Sell => self.asks.get(&price),
                }?;
                Some(DepthLevel {
                    price,
                    quantity: level.total_quantity(),
                    orders: level.order_count(),
                })
            })
            .collect()
    }

    /// Sum of open quantity across all bid levels.
    pub fn total_bid_quantity(&self) -> Quantity {
        self.bids.values().map(|level| level.total_quantity()).sum()
    }

    /// Sum of open quantity across all ask levels.
    pub fn total_ask_quantity(&self) -> Quantity {
        self.asks.values().map(|level| level.total_quantity()).sum()
    }

    pub fn stats(&self) -> BookStats {
        BookStats {
            total_orders: self.ids.len(),
            bid_levels: self.bids.len(),
            ask_levels: self.asks.len(),
            total_bid_quantity: self.total_bid_quantity(),
            total_ask_quantity: self.total_ask_quantity(),
        }
    }

    // ========================================================================
    // Matching support (crate-internal)
    // ========================================================================

    /// Execute `qty` (clamped to the front order's open quantity) against
    /// the front order of the best level on `side`.
    ///
    /// A fill to zero removes the order from its level and the id-index and
    /// releases its slot in the same step; the level is erased when it
    /// empties and the cached best price moves.
    pub(crate) fn fill_best_front(&mut self, side: Side, qty: Quantity) -> Option<FrontFill> {
        let price = match side {
            Side::Buy => self.best_bid?,
            Side::Sell => self.best_ask?,
        };
        let level = match side {
            Side::Buy => self.bids.get_mut(&price),
            Side::Sell => self.asks.get_mut(&price),
        }?;
        let slot = level.front()?;

        let node = self.slab.get_mut(slot);
        let filled = qty.min(node.remaining);
        node.remaining -= filled;
        node.status = if node.remaining == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };

        let order_id = node.order_id;
        let remaining = node.remaining;
        let quantity = node.quantity;
        let status = node.status;
        level.reduce(filled);

        if remaining == 0 {
            // Unlink, drop the id entry, and release the slot together.
            level.remove_front(&mut self.slab);
            let emptied = level.is_empty();
            self.ids.remove(&order_id);
            self.slab.release(slot);
            if emptied {
                self.erase_level(side, price);
            }
        }

        Some(FrontFill {
            order_id,
            price,
            filled,
            remaining,
            total_filled: quantity - remaining,
            status,
        })
    }

    fn erase_level(&mut self, side: Side, price: Price) {
        match side {
            Side::Buy => {
                self.bids.remove(&price);
                if self.best_bid == Some(price) {
                    self.best_bid = self.bids.keys().copied().max();
                }
            }
            Side::Sell => {
                self.asks.remove(&price);
                if self.best_ask == Some(price) {
                    self.best_ask = self.asks.keys().copied().min();
                }
            }
        }
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("symbol", &self.symbol)
            .field("best_bid", &self.best_bid)
            .field("best_ask", &self.best_ask)
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("orders", &self.ids.len())
            .finish()
    }
}
