//! A price/time-priority limit order book for a single instrument.
//!
//! The engine keeps buy and sell liquidity in two price ladders with FIFO
//! queues per level, matches crossing orders under continuous-trading rules
//! and hands back the executed trades. Five order types are supported
//! (good-till-cancel, good-for-day, fill-and-kill, fill-or-kill and market),
//! cancels and modifies run in O(1) through an id index, and a background
//! task owned by the book expires good-for-day orders at a configurable
//! local cutoff.
//!
//! ```
//! use lob_engine::{Order, OrderType, Orderbook, Side};
//!
//! let book = Orderbook::new();
//! book.add_order(Order::new(OrderType::GoodTillCancel, 1, Side::Buy, 100, 10));
//! let trades = book.add_order(Order::new(OrderType::GoodTillCancel, 2, Side::Sell, 100, 10));
//!
//! assert_eq!(trades.len(), 1);
//! assert_eq!(trades[0].quantity(), 10);
//! assert!(book.is_empty());
//! ```

mod arena;
pub mod errors;
pub mod levels;
pub mod orderbook;
pub mod orders;
pub mod simulate;
pub mod trade;

pub use errors::OrderError;
pub use levels::{BookDepth, LevelInfo};
pub use orderbook::Orderbook;
pub use orders::{Order, OrderId, OrderModify, OrderType, Price, Quantity, Side};
pub use trade::{Trade, TradeInfo, Trades};
