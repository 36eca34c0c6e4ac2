//! JSON telemetry frames.
//!
//! The broadcast fabric (dashboard, websocket bridge) is external; these
//! types are its interface. Each frame serializes as a JSON object tagged by
//! a `type` field, with prices in display units.

use serde::Serialize;

use crate::events::Trade;
use crate::matching::MatchingStats;
use crate::order_book::OrderBook;
use crate::risk::RiskManager;
use crate::types::{price_to_display, OrderId, Quantity, Timestamp};

/// One side's aggregated level in a snapshot.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct DepthEntry {
    pub price: f64,
    pub quantity: Quantity,
    pub orders: u32,
}

/// A position row in a risk frame.
#[derive(Clone, Debug, Serialize)]
pub struct PositionFrame {
    pub symbol: String,
    pub quantity: i64,
    pub average_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_bought: Quantity,
    pub total_sold: Quantity,
}

/// A telemetry frame, tagged by `type`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Trade {
        symbol: String,
        price: f64,
        quantity: Quantity,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        value: f64,
        timestamp: Timestamp,
    },
    OrderbookSnapshot {
        symbol: String,
        best_bid: Option<f64>,
        best_ask: Option<f64>,
        spread: Option<f64>,
        mid_price: Option<f64>,
        bids: Vec<DepthEntry>,
        asks: Vec<DepthEntry>,
    },
    Metrics {
        symbol: String,
        total_trades: u64,
        total_volume: u64,
        total_value: f64,
        market_orders_matched: u64,
        limit_orders_matched: u64,
        resting_orders: usize,
        bid_levels: usize,
        ask_levels: usize,
    },
    Risk {
        daily_pnl: f64,
        total_pnl: f64,
        current_equity: f64,
        drawdown: f64,
        positions: Vec<PositionFrame>,
    },
}

impl Frame {
    pub fn trade(trade: &Trade) -> Self {
        Frame::Trade {
            symbol: trade.symbol.clone(),
            price: price_to_display(trade.price),
            quantity: trade.quantity,
            buy_order_id: trade.buy_order_id,
            sell_order_id: trade.sell_order_id,
            value: trade.value(),
            timestamp: trade.timestamp,
        }
    }

    pub fn book_snapshot(book: &OrderBook, depth: usize) -> Self {
        let entry = |level: &crate::order_book::DepthLevel| DepthEntry {
            price: price_to_display(level.price),
            quantity: level.quantity,
            orders: level.orders,
        };
        Frame::OrderbookSnapshot {
            symbol: book.symbol().to_string(),
            best_bid: book.best_bid().map(price_to_display),
            best_ask: book.best_ask().map(price_to_display),
            spread: book.spread().map(price_to_display),
            mid_price: book.mid_price(),
            bids: book.bid_depth(depth).iter().map(entry).collect(),
            asks: book.ask_depth(depth).iter().map(entry).collect(),
        }
    }

    pub fn metrics(stats: MatchingStats, book: &OrderBook) -> Self {
        let book_stats = book.stats();
        Frame::Metrics {
            symbol: book.symbol().to_string(),
            total_trades: stats.total_trades,
            total_volume: stats.total_volume,
            total_value: stats.total_value,
            market_orders_matched: stats.market_orders_matched,
            limit_orders_matched: stats.limit_orders_matched,
            resting_orders: book_stats.total_orders,
            bid_levels: book_stats.bid_levels,
            ask_levels: book_stats.ask_levels,
        }
    }

    pub fn risk(risk: &RiskManager) -> Self {
        Frame::Risk {
            daily_pnl: risk.daily_pnl(),
            total_pnl: risk.total_pnl(),
            current_equity: risk.current_equity(),
            drawdown: risk.current_drawdown(),
            positions: risk
                .positions()
                .map(|position| PositionFrame {
                    symbol: position.symbol.clone(),
                    quantity: position.quantity,
                    average_price: position.average_price,
                    realized_pnl: position.realized_pnl,
                    unrealized_pnl: position.unrealized_pnl,
                    total_bought: position.total_bought,
                    total_sold: position.total_sold,
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
