//! Pre-trade risk checks and the position / PnL ledger.
//!
//! The validator inspects an order against the configured limits and the
//! current ledger and returns a verdict; it never mutates the book. Checks
//! run in a fixed order and the first failure wins, so a rejection reason is
//! deterministic. After execution, `update_position` is the sole mutator of
//! the ledger; the aggressor side always comes from the submitted order.
//!
//! Prices enter fixed-point and are converted once to display units; all
//! PnL, value, and equity accounting is in display-unit f64.

use rustc_hash::FxHashMap;
use tracing::error;

use crate::events::Trade;
use crate::order::Order;
use crate::types::{price_to_display, OrderKind, Price, Quantity, Side, Symbol};

/// Trading constraints. Immutable for a session unless explicitly replaced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RiskLimits {
    /// Max single order quantity.
    pub max_order_size: Quantity,
    /// Max single order notional, display units.
    pub max_order_value: f64,
    /// Max absolute position, long or short.
    pub max_position_size: i64,
    /// Max absolute position notional, display units.
    pub max_position_value: f64,
    /// Max loss per day before new orders are rejected.
    pub max_daily_loss: f64,
    /// Max drawdown from the equity peak.
    pub max_drawdown: f64,
    /// Order rate limit; 0 disables the check.
    pub max_orders_per_second: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_size: 10_000,
            max_order_value: 1_000_000.0,
            max_position_size: 50_000,
            max_position_value: 5_000_000.0,
            max_daily_loss: 100_000.0,
            max_drawdown: 200_000.0,
            max_orders_per_second: 100,
        }
    }
}

/// A signed position in one symbol with weighted-average cost.
#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    pub symbol: Symbol,
    /// Positive long, negative short.
    pub quantity: i64,
    /// Weighted-average entry price, display units.
    pub average_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_bought: Quantity,
    pub total_sold: Quantity,
}

impl Position {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            quantity: 0,
            average_price: 0.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            total_bought: 0,
            total_sold: 0,
        }
    }

    #[inline]
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    #[inline]
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    #[inline]
    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    /// Absolute notional at `mark`, display units.
    pub fn market_value(&self, mark: f64) -> f64 {
        self.quantity.unsigned_abs() as f64 * mark
    }

    fn mark(&mut self, mark: f64) {
        self.unrealized_pnl = if self.quantity == 0 {
            0.0
        } else {
            self.quantity as f64 * (mark - self.average_price)
        };
    }
}

/// Verdict of a pre-trade check. The first failing check determines the
/// variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validation {
    Accepted,
    RejectedOrderSize,
    RejectedOrderValue,
    RejectedPositionLimit,
    RejectedPositionValue,
    RejectedDailyLoss,
    RejectedDrawdown,
    RejectedRateLimit,
}

impl Validation {
    #[inline]
    pub fn is_accepted(self) -> bool {
        self == Validation::Accepted
    }
}

impl std::fmt::Display for Validation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Validation::Accepted => "ACCEPTED",
            Validation::RejectedOrderSize => "REJECTED: order size too large",
            Validation::RejectedOrderValue => "REJECTED: order value too large",
            Validation::RejectedPositionLimit => "REJECTED: position limit exceeded",
            Validation::RejectedPositionValue => "REJECTED: position value too large",
            Validation::RejectedDailyLoss => "REJECTED: daily loss limit exceeded",
            Validation::RejectedDrawdown => "REJECTED: drawdown limit exceeded",
            Validation::RejectedRateLimit => "REJECTED: rate limit exceeded",
        };
        f.write_str(text)
    }
}

/// Fixed one-second submission window.
#[derive(Clone, Copy, Debug, Default)]
struct RateWindow {
    second: u64,
    count: u32,
}

impl RateWindow {
    fn admit(&mut self, timestamp_ns: u64, per_second: u32) -> bool {
        if per_second == 0 {
            return true;
        }
        let second = timestamp_ns / 1_000_000_000;
        if second != self.second {
            self.second = second;
            self.count = 0;
        }
        self.count += 1;
        self.count <= per_second
    }
}

/// Enforces limits and tracks positions, PnL, and equity.
pub struct RiskManager {
    limits: RiskLimits,
    positions: FxHashMap<Symbol, Position>,
    daily_pnl: f64,
    peak_equity: f64,
    current_equity: f64,
    rate: RateWindow,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            positions: FxHashMap::default(),
            daily_pnl: 0.0,
            peak_equity: 0.0,
            current_equity: 0.0,
            rate: RateWindow::default(),
        }
    }

    /// Validate an order before submission.
    ///
    /// `reference_price` prices market orders (limit orders use their own
    /// limit). The checks run in a fixed order; the first failure wins.
    pub fn validate(&mut self, order: &Order, reference_price: Price) -> Validation {
        let limits = self.limits;

        if order.quantity > limits.max_order_size {
            return Validation::RejectedOrderSize;
        }

        let effective_price = match order.kind {
            OrderKind::Market => price_to_display(reference_price),
            OrderKind::Limit(price) => price_to_display(price),
        };
        let order_value = order.quantity as f64 * effective_price;
        if order_value > limits.max_order_value {
            return Validation::RejectedOrderValue;
        }

        let current = self
            .positions
            .get(&order.symbol)
            .map(|position| position.quantity)
            .unwrap_or(0);
        let prospective = match order.side {
            Side::Buy => current + order.quantity as i64,
            Side::Sell => current - order.quantity as i64,
        };
        if prospective.abs() > limits.max_position_size {
            return Validation::RejectedPositionLimit;
        }

        let prospective_value = prospective.unsigned_abs() as f64 * effective_price;
        if prospective_value > limits.max_position_value {
            return Validation::RejectedPositionValue;
        }

        if self.daily_pnl < -limits.max_daily_loss {
            return Validation::RejectedDailyLoss;
        }

        if self.peak_equity - self.current_equity > limits.max_drawdown {
            return Validation::RejectedDrawdown;
        }

        if !self.rate.admit(order.created_at, limits.max_orders_per_second) {
            return Validation::RejectedRateLimit;
        }

        Validation::Accepted
    }

    /// Apply an execution to the ledger. `aggressor_side` is the side of
    /// the submitted order that produced the trade.
    pub fn update_position(&mut self, trade: &Trade, aggressor_side: Side) {
        let position = self
            .positions
            .entry(trade.symbol.clone())
            .or_insert_with(|| Position::new(trade.symbol.clone()));

        let price = price_to_display(trade.price);
        let qty = trade.quantity;

        match aggressor_side {
            Side::Buy => {
                position.total_bought += qty;

                if position.quantity >= 0 {
                    // Opening or increasing a long.
                    let held = position.quantity as f64;
                    let denominator = position.quantity + qty as i64;
                    if denominator == 0 {
                        error!(symbol = %trade.symbol, "degenerate average-price divisor");
                        return;
                    }
                    position.average_price =
                        (held * position.average_price + qty as f64 * price) / denominator as f64;
                    position.quantity = denominator;
                } else {
                    // Covering a short.
                    let closing = (qty as i64).min(-position.quantity);
                    let pnl = closing as f64 * (position.average_price - price);
                    position.realized_pnl += pnl;
                    self.daily_pnl += pnl;

                    position.quantity += qty as i64;
                    if position.quantity > 0 {
                        // Flipped long; the overshoot opens at the trade price.
                        position.average_price = price;
                    }
                }
            }
            Side::Sell => {
                position.total_sold += qty;

                if position.quantity <= 0 {
                    // Opening or increasing a short.
                    let held = (-position.quantity) as f64;
                    let denominator = -position.quantity + qty as i64;
                    if denominator == 0 {
                        error!(symbol = %trade.symbol, "degenerate average-price divisor");
                        return;
                    }
                    position.average_price =
                        (held * position.average_price + qty as f64 * price) / denominator as f64;
                    position.quantity -= qty as i64;
                } else {
                    // Reducing a long.
                    let closing = (qty as i64).min(position.quantity);
                    let pnl = closing as f64 * (price - position.average_price);
                    position.realized_pnl += pnl;
                    self.daily_pnl += pnl;

                    position.quantity -= qty as i64;
                    if position.quantity < 0 {
                        // Flipped short.
                        position.average_price = price;
                    }
                }
            }
        }

        self.refresh_equity();
    }

    /// Recompute a symbol's unrealized PnL at `mark_price`.
    pub fn update_unrealized_pnl(&mut self, symbol: &str, mark_price: Price) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.mark(price_to_display(mark_price));
        }
        self.refresh_equity();
    }

    fn refresh_equity(&mut self) {
        let unrealized: f64 = self
            .positions
            .values()
            .map(|position| position.unrealized_pnl)
            .sum();
        self.current_equity = self.daily_pnl + unrealized;
        if self.current_equity > self.peak_equity {
            self.peak_equity = self.current_equity;
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn daily_pnl(&self) -> f64 {
        self.daily_pnl
    }

    /// Realized daily PnL plus unrealized PnL across positions.
    pub fn total_pnl(&self) -> f64 {
        self.daily_pnl
            + self
                .positions
                .values()
                .map(|position| position.unrealized_pnl)
                .sum::<f64>()
    }

    pub fn current_equity(&self) -> f64 {
        self.current_equity
    }

    pub fn current_drawdown(&self) -> f64 {
        self.peak_equity - self.current_equity
    }

    /// Zero the daily counters. Positions and averages carry across
    /// sessions.
    pub fn reset_daily(&mut self) {
        self.daily_pnl = 0.0;
        for position in self.positions.values_mut() {
            position.realized_pnl = 0.0;
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn set_limits(&mut self, limits: RiskLimits) {
        self.limits = limits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYM: &str = "ACME";

    fn trade(price: Price, qty: Quantity) -> Trade {
        Trade {
            buy_order_id: 1,
            sell_order_id: 2,
            symbol: SYM.to_string(),
            price,
            quantity: qty,
            timestamp: 0,
        }
    }

    fn manager() -> RiskManager {
        RiskManager::new(RiskLimits::default())
    }

    #[test]
    fn test_accepts_within_limits() {
        let mut risk = manager();
        let order = Order::limit(1, SYM, Side::Buy, 15000, 100);
        assert_eq!(risk.validate(&order, 0), Validation::Accepted);
    }

    #[test]
    fn test_order_size_is_first_check() {
        let mut risk = RiskManager::new(RiskLimits {
            max_order_size: 10,
            max_order_value: 1.0, // would also fail, but size wins
            ..RiskLimits::default()
        });
        let order = Order::limit(1, SYM, Side::Buy, 15000, 100);
        assert_eq!(risk.validate(&order, 0), Validation::RejectedOrderSize);
    }

    #[test]
    fn test_order_value_uses_reference_for_market() {
        let mut risk = RiskManager::new(RiskLimits {
            max_order_value: 10_000.0,
            ..RiskLimits::default()
        });

        // 100 × $150.00 = $15,000 > $10,000.
        let market = Order::market(1, SYM, Side::Buy, 100);
        assert_eq!(risk.validate(&market, 15000), Validation::RejectedOrderValue);

        // Cheap reference passes.
        assert_eq!(risk.validate(&market, 5000), Validation::Accepted);

        // Limit orders price themselves.
        let limit = Order::limit(2, SYM, Side::Buy, 15000, 100);
        assert_eq!(risk.validate(&limit, 0), Validation::RejectedOrderValue);
    }

    #[test]
    fn test_prospective_position_limit() {
        let mut risk = RiskManager::new(RiskLimits {
            max_position_size: 150,
            ..RiskLimits::default()
        });
        risk.update_position(&trade(15000, 100), Side::Buy);

        let buy = Order::limit(1, SYM, Side::Buy, 15000, 60);
        assert_eq!(risk.validate(&buy, 0), Validation::RejectedPositionLimit);

        // Selling reduces exposure and passes.
        let sell = Order::limit(2, SYM, Side::Sell, 15000, 60);
        assert_eq!(risk.validate(&sell, 0), Validation::Accepted);

        // The short side is limited symmetrically.
        let flip = Order::limit(3, SYM, Side::Sell, 15000, 260);
        assert_eq!(risk.validate(&flip, 0), Validation::RejectedPositionLimit);
    }

    #[test]
    fn test_prospective_position_value() {
        let mut risk = RiskManager::new(RiskLimits {
            max_position_value: 20_000.0,
            ..RiskLimits::default()
        });
        let order = Order::limit(1, SYM, Side::Buy, 15000, 200); // $30,000 notional
        assert_eq!(risk.validate(&order, 0), Validation::RejectedPositionValue);
    }

    #[test]
    fn test_daily_loss_gate() {
        let mut risk = RiskManager::new(RiskLimits {
            max_daily_loss: 100.0,
            ..RiskLimits::default()
        });

        // Lose $200: buy 100 @ 152.00, sell 100 @ 150.00.
        risk.update_position(&trade(15200, 100), Side::Buy);
        risk.update_position(&trade(15000, 100), Side::Sell);
        assert!((risk.daily_pnl() + 200.0).abs() < 1e-9);

        let order = Order::limit(1, SYM, Side::Buy, 15000, 1);
        assert_eq!(risk.validate(&order, 0), Validation::RejectedDailyLoss);
    }

    #[test]
    fn test_drawdown_gate() {
        let mut risk = RiskManager::new(RiskLimits {
            max_drawdown: 500.0,
            max_daily_loss: 1_000_000.0,
            ..RiskLimits::default()
        });

        // Gain $1000, then give it back: peak 1000, equity 0.
        risk.update_position(&trade(15000, 100), Side::Buy);
        risk.update_position(&trade(16000, 100), Side::Sell);
        risk.update_position(&trade(16000, 100), Side::Buy);
        risk.update_position(&trade(15000, 100), Side::Sell);

        assert!((risk.current_drawdown() - 1000.0).abs() < 1e-9);
        let order = Order::limit(1, SYM, Side::Buy, 15000, 1);
        assert_eq!(risk.validate(&order, 0), Validation::RejectedDrawdown);
    }

    #[test]
    fn test_rate_limit_window() {
        let mut risk = RiskManager::new(RiskLimits {
            max_orders_per_second: 2,
            ..RiskLimits::default()
        });

        let mut order = Order::limit(1, SYM, Side::Buy, 15000, 1);
        order.created_at = 5_000_000_000;
        assert_eq!(risk.validate(&order, 0), Validation::Accepted);
        assert_eq!(risk.validate(&order, 0), Validation::Accepted);
        assert_eq!(risk.validate(&order, 0), Validation::RejectedRateLimit);

        // Next second, the window resets.
        order.created_at = 6_000_000_000;
        assert_eq!(risk.validate(&order, 0), Validation::Accepted);
    }

    #[test]
    fn test_weighted_average_open() {
        let mut risk = manager();
        risk.update_position(&trade(15000, 100), Side::Buy);
        risk.update_position(&trade(15100, 100), Side::Buy);

        let position = risk.position(SYM).unwrap();
        assert_eq!(position.quantity, 200);
        assert!((position.average_price - 150.5).abs() < 1e-9);
        assert_eq!(position.total_bought, 200);
        assert_eq!(position.total_sold, 0);
    }

    #[test]
    fn test_round_trip_realizes_pnl() {
        let mut risk = manager();
        risk.update_position(&trade(15000, 100), Side::Buy);
        risk.update_position(&trade(15200, 100), Side::Sell);

        let position = risk.position(SYM).unwrap();
        assert!(position.is_flat());
        assert!((position.realized_pnl - 200.0).abs() < 1e-9);
        assert!((risk.daily_pnl() - 200.0).abs() < 1e-9);
        assert_eq!(position.total_bought, 100);
        assert_eq!(position.total_sold, 100);
    }

    #[test]
    fn test_short_round_trip() {
        let mut risk = manager();
        risk.update_position(&trade(15200, 100), Side::Sell);
        risk.update_position(&trade(15000, 100), Side::Buy);

        let position = risk.position(SYM).unwrap();
        assert!(position.is_flat());
        assert!((position.realized_pnl - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_flip_long_to_short() {
        let mut risk = manager();
        risk.update_position(&trade(15000, 100), Side::Buy);
        // Sell 150: closes 100 at +$2 each, opens 50 short at 152.00.
        risk.update_position(&trade(15200, 150), Side::Sell);

        let position = risk.position(SYM).unwrap();
        assert_eq!(position.quantity, -50);
        assert!((position.average_price - 152.0).abs() < 1e-9);
        assert!((position.realized_pnl - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_unrealized_and_equity() {
        let mut risk = manager();
        risk.update_position(&trade(15000, 100), Side::Buy);

        risk.update_unrealized_pnl(SYM, 15100);
        let position = risk.position(SYM).unwrap();
        assert!((position.unrealized_pnl - 100.0).abs() < 1e-9);
        assert!((risk.total_pnl() - 100.0).abs() < 1e-9);
        assert!((risk.current_equity() - 100.0).abs() < 1e-9);

        // Mark back down; the peak stays and drawdown opens.
        risk.update_unrealized_pnl(SYM, 14950);
        assert!((risk.current_drawdown() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_position_has_no_unrealized() {
        let mut risk = manager();
        risk.update_position(&trade(15000, 100), Side::Buy);
        risk.update_position(&trade(15100, 100), Side::Sell);

        risk.update_unrealized_pnl(SYM, 20000);
        assert_eq!(risk.position(SYM).unwrap().unrealized_pnl, 0.0);
    }

    #[test]
    fn test_reset_daily_preserves_positions() {
        let mut risk = manager();
        risk.update_position(&trade(15000, 100), Side::Buy);
        risk.update_position(&trade(15200, 50), Side::Sell);

        risk.reset_daily();
        assert_eq!(risk.daily_pnl(), 0.0);

        let position = risk.position(SYM).unwrap();
        assert_eq!(position.realized_pnl, 0.0);
        assert_eq!(position.quantity, 50);
        assert!((position.average_price - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_validation_display() {
        assert_eq!(Validation::Accepted.to_string(), "ACCEPTED");
        assert_eq!(
            Validation::RejectedRateLimit.to_string(),
            "REJECTED: rate limit exceeded"
        );
    }
}
