//! End-to-end matching scenarios.
//!
//! Exercises the submission path through the engine facade: crossing,
//! partial fills, market sweeps, priority rules, and the PnL round trip.
//! Prices are fixed-point hundredths (150.00 -> 15000).

use tickmatch::{Engine, Order, OrderStatus, RiskLimits, Side};

const SYMBOL: &str = "ACME";

fn engine() -> Engine {
    Engine::new(SYMBOL, 100_000)
}

fn limit(id: u64, side: Side, price: i64, qty: u64) -> Order {
    Order::limit(id, SYMBOL, side, price, qty)
}

fn market(id: u64, side: Side, qty: u64) -> Order {
    Order::market(id, SYMBOL, side, qty)
}

#[test]
fn test_simple_cross() {
    let mut engine = engine();

    engine.submit_order(&mut limit(1, Side::Sell, 15000, 100)).unwrap();
    let trades = engine.submit_order(&mut limit(2, Side::Buy, 15000, 100)).unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].buy_order_id, 2);
    assert_eq!(trades[0].sell_order_id, 1);
    assert_eq!(trades[0].price, 15000);
    assert_eq!(trades[0].quantity, 100);
    assert!(engine.book().is_empty());
}

#[test]
fn test_partial_fill_leaves_maker_resting() {
    let mut engine = engine();

    engine.submit_order(&mut limit(1, Side::Sell, 15000, 500)).unwrap();
    let trades = engine.submit_order(&mut limit(2, Side::Buy, 15000, 200)).unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].quantity, 200);

    let maker = engine.book().get(1).unwrap();
    assert_eq!(maker.remaining, 300);
    assert_eq!(maker.status, OrderStatus::PartiallyFilled);
    assert_eq!(engine.book().best_bid(), None);
    assert_eq!(engine.book().best_ask(), Some(15000));
}

#[test]
fn test_market_sweep_walks_levels_in_order() {
    let mut engine = engine();

    engine.submit_order(&mut limit(1, Side::Sell, 15000, 100)).unwrap();
    engine.submit_order(&mut limit(2, Side::Sell, 15050, 100)).unwrap();
    engine.submit_order(&mut limit(3, Side::Sell, 15100, 100)).unwrap();

    let mut order = market(4, Side::Buy, 250);
    let trades = engine.submit_order(&mut order).unwrap();

    assert_eq!(trades.len(), 3);
    assert_eq!((trades[0].price, trades[0].quantity), (15000, 100));
    assert_eq!((trades[1].price, trades[1].quantity), (15050, 100));
    assert_eq!((trades[2].price, trades[2].quantity), (15100, 50));

    let survivor = engine.book().get(3).unwrap();
    assert_eq!(survivor.remaining, 50);
    assert_eq!(engine.book().order_count(), 1);
}

#[test]
fn test_price_time_priority_within_level() {
    let mut engine = engine();

    engine.submit_order(&mut limit(1, Side::Sell, 15000, 100)).unwrap();
    engine.submit_order(&mut limit(2, Side::Sell, 15000, 100)).unwrap();
    engine.submit_order(&mut limit(3, Side::Sell, 15000, 100)).unwrap();

    let trades = engine.submit_order(&mut limit(4, Side::Buy, 15000, 100)).unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].sell_order_id, 1);
    assert!(engine.book().contains(2));
    assert!(engine.book().contains(3));
}

#[test]
fn test_price_improvement_accrues_to_aggressor() {
    let mut engine = engine();

    engine.submit_order(&mut limit(1, Side::Sell, 14950, 100)).unwrap();
    let trades = engine.submit_order(&mut limit(2, Side::Buy, 15000, 100)).unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, 14950);
}

#[test]
fn test_pnl_round_trip() {
    // Flat -> buy 100 @ 150.00 -> sell 100 @ 152.00, both against resting
    // counter-parties. Only aggressions settle into the ledger.
    let mut engine = Engine::with_risk(SYMBOL, 100_000, RiskLimits::default());

    engine.submit_order(&mut limit(10, Side::Sell, 15000, 100)).unwrap();
    engine.submit_order(&mut limit(1, Side::Buy, 15000, 100)).unwrap();

    {
        let position = engine.risk().unwrap().position(SYMBOL).unwrap();
        assert_eq!(position.quantity, 100);
        assert!((position.average_price - 150.0).abs() < 1e-9);
    }

    engine.submit_order(&mut limit(11, Side::Buy, 15200, 100)).unwrap();
    engine.submit_order(&mut limit(2, Side::Sell, 15200, 100)).unwrap();

    let risk = engine.risk().unwrap();
    let position = risk.position(SYMBOL).unwrap();
    assert_eq!(position.quantity, 0);
    assert!((position.realized_pnl - 200.0).abs() < 1e-9);
    assert!((risk.daily_pnl() - 200.0).abs() < 1e-9);
}

#[test]
fn test_quantity_conservation() {
    let mut engine = engine();

    engine.submit_order(&mut limit(1, Side::Sell, 15000, 80)).unwrap();
    engine.submit_order(&mut limit(2, Side::Sell, 15050, 80)).unwrap();

    // Partial: trades sum below the submitted quantity, order not filled.
    let mut partial = limit(3, Side::Buy, 15050, 250);
    let trades = engine.submit_order(&mut partial).unwrap();
    let traded: u64 = trades.iter().map(|trade| trade.quantity).sum();
    assert_eq!(traded, 160);
    assert!(traded < partial.quantity);
    assert_ne!(partial.status, OrderStatus::Filled);
    assert_eq!(partial.remaining, partial.quantity - traded);

    // Full: equality holds exactly when the order ends filled.
    assert!(engine.cancel_order(3));
    engine.submit_order(&mut limit(4, Side::Sell, 15050, 90)).unwrap();
    let mut full = limit(5, Side::Buy, 15050, 90);
    let trades = engine.submit_order(&mut full).unwrap();
    let traded: u64 = trades.iter().map(|trade| trade.quantity).sum();
    assert_eq!(traded, full.quantity);
    assert_eq!(full.status, OrderStatus::Filled);
}

#[test]
fn test_book_never_crossed_at_rest() {
    let mut engine = engine();
    let assert_uncrossed = |engine: &Engine| {
        if let (Some(bid), Some(ask)) = (engine.book().best_bid(), engine.book().best_ask()) {
            assert!(bid < ask, "crossed book: bid {bid} >= ask {ask}");
        }
    };

    engine.submit_order(&mut limit(1, Side::Sell, 15000, 100)).unwrap();
    assert_uncrossed(&engine);

    // Crossing buy larger than the ask: residual rests above the old ask.
    engine.submit_order(&mut limit(2, Side::Buy, 15100, 200)).unwrap();
    assert_uncrossed(&engine);
    assert_eq!(engine.book().best_bid(), Some(15100));

    // Crossing sell smaller than the bid.
    engine.submit_order(&mut limit(3, Side::Sell, 15050, 50)).unwrap();
    assert_uncrossed(&engine);
    assert_eq!(engine.book().best_bid(), Some(15100));

    engine.submit_order(&mut limit(4, Side::Sell, 15150, 40)).unwrap();
    assert_uncrossed(&engine);
    assert_eq!(engine.book().best_ask(), Some(15150));
}

#[test]
fn test_cancel_is_idempotent_on_gone_ids() {
    let mut engine = engine();
    engine.submit_order(&mut limit(1, Side::Buy, 15000, 100)).unwrap();

    assert!(engine.cancel_order(1));
    let hash = engine.state_hash();

    assert!(!engine.cancel_order(1));
    assert!(!engine.cancel_order(42));
    assert_eq!(engine.state_hash(), hash);
}

#[test]
fn test_modify_loses_time_priority() {
    let mut engine = engine();

    engine.submit_order(&mut limit(1, Side::Sell, 15000, 100)).unwrap();
    engine.submit_order(&mut limit(2, Side::Sell, 15000, 100)).unwrap();

    // Order 1 re-enters at the same price and drops behind order 2.
    assert!(engine.modify_order(1, 15000, 100));

    let trades = engine.submit_order(&mut limit(3, Side::Buy, 15000, 100)).unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].sell_order_id, 2);
    assert!(engine.book().contains(1));
}

#[test]
fn test_market_residual_is_discarded() {
    let mut engine = engine();
    engine.submit_order(&mut limit(1, Side::Sell, 15000, 100)).unwrap();

    let mut order = market(2, Side::Buy, 150);
    let trades = engine.submit_order(&mut order).unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(order.status, OrderStatus::PartiallyFilled);
    assert_eq!(order.remaining, 50);
    assert!(engine.book().is_empty());
}

#[test]
fn test_limit_residual_rests_at_limit() {
    let mut engine = engine();
    engine.submit_order(&mut limit(1, Side::Sell, 15000, 100)).unwrap();

    engine.submit_order(&mut limit(2, Side::Buy, 15020, 150)).unwrap();

    let resting = engine.book().get(2).unwrap();
    assert_eq!(resting.price, 15020);
    assert_eq!(resting.remaining, 50);
    assert_eq!(engine.book().best_bid(), Some(15020));
}
