//! Risk gating through the engine facade.
//!
//! The validator's own check ordering is unit-tested next to its
//! implementation; these tests cover the wiring: rejected orders never
//! touch the book, executions settle into the ledger, and the ledger state
//! feeds back into later verdicts.

use tickmatch::{Engine, Order, RiskLimits, Side, Validation};

const SYMBOL: &str = "ACME";

fn limit(id: u64, side: Side, price: i64, qty: u64) -> Order {
    Order::limit(id, SYMBOL, side, price, qty)
}

#[test]
fn test_rejected_order_never_reaches_book() {
    let limits = RiskLimits {
        max_order_size: 50,
        ..RiskLimits::default()
    };
    let mut engine = Engine::with_risk(SYMBOL, 10_000, limits);

    let mut order = limit(1, Side::Buy, 15000, 100);
    assert_eq!(
        engine.submit_order(&mut order).unwrap_err(),
        Validation::RejectedOrderSize
    );
    assert!(engine.book().is_empty());
    assert_eq!(engine.stats().total_trades, 0);
}

#[test]
fn test_first_failing_check_wins() {
    // Order violates both size and value caps; size is checked first.
    let limits = RiskLimits {
        max_order_size: 10,
        max_order_value: 1.0,
        ..RiskLimits::default()
    };
    let mut engine = Engine::with_risk(SYMBOL, 10_000, limits);

    let verdict = engine.submit_order(&mut limit(1, Side::Buy, 15000, 100)).unwrap_err();
    assert_eq!(verdict, Validation::RejectedOrderSize);
}

#[test]
fn test_position_limit_blocks_accumulation() {
    let limits = RiskLimits {
        max_position_size: 150,
        ..RiskLimits::default()
    };
    let mut engine = Engine::with_risk(SYMBOL, 10_000, limits);

    engine.submit_order(&mut limit(10, Side::Sell, 15000, 100)).unwrap();
    engine.submit_order(&mut limit(1, Side::Buy, 15000, 100)).unwrap();
    assert_eq!(engine.risk().unwrap().position(SYMBOL).unwrap().quantity, 100);

    engine.submit_order(&mut limit(11, Side::Sell, 15000, 100)).unwrap();
    let verdict = engine.submit_order(&mut limit(2, Side::Buy, 15000, 100)).unwrap_err();
    assert_eq!(verdict, Validation::RejectedPositionLimit);

    // Reducing the exposure is still allowed.
    engine.submit_order(&mut limit(12, Side::Buy, 14990, 50)).unwrap();
    assert!(engine.submit_order(&mut limit(3, Side::Sell, 14990, 50)).is_ok());
}

#[test]
fn test_daily_loss_locks_out_new_orders() {
    let limits = RiskLimits {
        max_daily_loss: 100.0,
        ..RiskLimits::default()
    };
    let mut engine = Engine::with_risk(SYMBOL, 10_000, limits);

    // Buy 100 @ 152.00, sell 100 @ 150.00: realized -200.
    engine.submit_order(&mut limit(10, Side::Sell, 15200, 100)).unwrap();
    engine.submit_order(&mut limit(1, Side::Buy, 15200, 100)).unwrap();
    engine.submit_order(&mut limit(11, Side::Buy, 15000, 100)).unwrap();
    engine.submit_order(&mut limit(2, Side::Sell, 15000, 100)).unwrap();

    assert!((engine.risk().unwrap().daily_pnl() + 200.0).abs() < 1e-9);

    let verdict = engine.submit_order(&mut limit(3, Side::Buy, 15000, 1)).unwrap_err();
    assert_eq!(verdict, Validation::RejectedDailyLoss);

    // A daily reset clears the gate.
    engine.risk_mut().unwrap().reset_daily();
    assert!(engine.submit_order(&mut limit(4, Side::Buy, 15000, 1)).is_ok());
}

#[test]
fn test_market_orders_are_valued_at_reference_price() {
    let limits = RiskLimits {
        max_order_value: 10_000.0,
        ..RiskLimits::default()
    };
    let mut engine = Engine::with_risk(SYMBOL, 10_000, limits);

    // Establish a last trade price of 150.00.
    engine.submit_order(&mut limit(10, Side::Sell, 15000, 10)).unwrap();
    engine.submit_order(&mut limit(1, Side::Buy, 15000, 10)).unwrap();
    assert_eq!(engine.reference_price(), 15000);

    // 100 x $150.00 = $15,000 over the $10,000 cap.
    let mut market = Order::market(2, SYMBOL, Side::Buy, 100);
    assert_eq!(
        engine.submit_order(&mut market).unwrap_err(),
        Validation::RejectedOrderValue
    );

    // 50 x $150.00 passes.
    let mut market = Order::market(3, SYMBOL, Side::Buy, 50);
    assert!(engine.submit_order(&mut market).is_ok());
}

#[test]
fn test_rate_limit_through_engine() {
    let limits = RiskLimits {
        max_orders_per_second: 2,
        ..RiskLimits::default()
    };
    let mut engine = Engine::with_risk(SYMBOL, 10_000, limits);

    let at = |id: u64, ts: u64| {
        let mut order = limit(id, Side::Buy, 15000, 1);
        order.created_at = ts;
        order
    };

    assert!(engine.submit_order(&mut at(1, 5_000_000_000)).is_ok());
    assert!(engine.submit_order(&mut at(2, 5_400_000_000)).is_ok());
    assert_eq!(
        engine.submit_order(&mut at(3, 5_900_000_000)).unwrap_err(),
        Validation::RejectedRateLimit
    );
    assert!(engine.submit_order(&mut at(4, 6_000_000_000)).is_ok());
}

#[test]
fn test_mark_price_drives_drawdown() {
    let limits = RiskLimits {
        max_drawdown: 500.0,
        ..RiskLimits::default()
    };
    let mut engine = Engine::with_risk(SYMBOL, 10_000, limits);

    engine.submit_order(&mut limit(10, Side::Sell, 15000, 100)).unwrap();
    engine.submit_order(&mut limit(1, Side::Buy, 15000, 100)).unwrap();

    // Mark up: equity peaks at +1000 unrealized.
    engine.update_mark_price(16000);
    assert!((engine.risk().unwrap().current_equity() - 1000.0).abs() < 1e-9);

    // Mark back down: drawdown of 1000 from the peak blocks new orders.
    engine.update_mark_price(15000);
    assert!((engine.risk().unwrap().current_drawdown() - 1000.0).abs() < 1e-9);

    let verdict = engine.submit_order(&mut limit(2, Side::Buy, 15000, 1)).unwrap_err();
    assert_eq!(verdict, Validation::RejectedDrawdown);
}

#[test]
fn test_engine_without_risk_never_rejects() {
    let mut engine = Engine::new(SYMBOL, 10_000);
    let mut huge = limit(1, Side::Buy, 15000, u64::MAX / 4);
    assert!(engine.submit_order(&mut huge).is_ok());
}
