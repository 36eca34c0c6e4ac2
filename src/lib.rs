//! # Tickmatch
//!
//! A deterministic, single-symbol central limit order book and matching
//! engine with pre-trade risk controls.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one thread owns the book exclusively; concurrent
//!   submitters hand off through a ring buffer or serialize at the boundary
//! - **Price-Time Priority**: better price wins; among equals, earlier
//!   arrival wins, with FIFO queues per price level
//! - **Fixed-Point Prices**: hundredths of the display unit, no float
//!   comparisons anywhere near the book
//! - **Pooled Storage**: resting orders live in a pre-allocated slab of
//!   cache-line-sized nodes; no hot-path heap allocation
//!
//! ## Architecture
//!
//! ```text
//! [Boundary (FIX/TCP)] --> [SPSC Ring] --> [Engine Thread]
//!                                          risk -> match -> ledger
//!                                               |
//!                                       [Trades + Events]
//! ```

pub mod command;
pub mod config;
pub mod engine;
pub mod events;
pub mod fix;
pub mod matching;
pub mod order;
pub mod order_book;
pub mod price_level;
pub mod risk;
pub mod slab;
pub mod telemetry;
pub mod types;

// Re-exports for convenience
pub use command::{Command, OutputEvent, RejectReason};
pub use config::Config;
pub use engine::Engine;
pub use events::{OrderUpdate, Trade};
pub use matching::{MatchingEngine, MatchingStats};
pub use order::Order;
pub use order_book::{BookStats, DepthLevel, OrderBook};
pub use risk::{Position, RiskLimits, RiskManager, Validation};
pub use types::{OrderId, OrderKind, OrderStatus, Price, Quantity, Side, Symbol, Timestamp};
