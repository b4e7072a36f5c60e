//! Simulation harness for noisy order flow against the engine.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp1, Normal};
use serde::Serialize;
use tracing::{debug, info};

use crate::orderbook::Orderbook;
use crate::orders::{Order, OrderType, Price, Quantity, Side};

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of orders to submit.
    pub orders: u64,
    /// RNG seed so runs are reproducible.
    pub seed: u64,
    /// Starting mid price.
    pub start_mid: f64,
    /// N(0, σ) drift applied to the mid each tick.
    pub noise_sigma: f64,
    /// Average order size (unit-exp * mean_qty).
    pub mean_qty: f64,
    /// How far from the mid to quote.
    pub spread: f64,
    /// Probability of cancelling a random earlier order each tick.
    pub cancel_rate: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            orders: 10_000,
            seed: 42,
            start_mid: 100.0,
            noise_sigma: 0.5,
            mean_qty: 8.0,
            spread: 1.0,
            cancel_rate: 0.05,
        }
    }
}

/// Tally of what a simulation run did to the book.
#[derive(Debug, Default, Serialize)]
pub struct SimReport {
    pub orders_submitted: u64,
    pub trades: u64,
    pub volume: u64,
    pub resting: usize,
    pub best_bid: Option<(Price, Quantity)>,
    pub best_ask: Option<(Price, Quantity)>,
}

/// Drives `book` with a seeded random flow: the mid price follows a normal
/// drift, sizes are exponential, and the order-type mix is mostly resting
/// limits with occasional market, fill-and-kill, fill-or-kill and
/// good-for-day submissions.
pub fn run(book: &Orderbook, cfg: &SimConfig) -> SimReport {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let drift = Normal::new(0.0, cfg.noise_sigma).expect("noise_sigma >= 0");

    let mut mid = cfg.start_mid;
    let mut report = SimReport::default();

    for id in 1..=cfg.orders {
        mid += drift.sample(&mut rng);

        // size ~ Exp1 * mean_qty (rounded up to >= 1)
        let unit: f64 = Exp1.sample(&mut rng);
        let quantity = (unit * cfg.mean_qty).max(1.0).round() as Quantity;

        // quote around mid; drift makes older quotes go stale and cross
        let (side, quote) = if rng.random_bool(0.5) {
            (Side::Buy, mid - cfg.spread)
        } else {
            (Side::Sell, mid + cfg.spread)
        };
        let price = quote.max(1.0).round() as Price;

        let order = match rng.random_range(0..100u32) {
            0..=4 => Order::market(id, side, quantity),
            5..=9 => Order::new(OrderType::FillAndKill, id, side, price, quantity),
            10..=12 => Order::new(OrderType::FillOrKill, id, side, price, quantity),
            13..=24 => Order::new(OrderType::GoodForDay, id, side, price, quantity),
            _ => Order::new(OrderType::GoodTillCancel, id, side, price, quantity),
        };

        let trades = book.add_order(order);
        report.orders_submitted += 1;
        if !trades.is_empty() {
            let filled: u64 = trades.iter().map(|t| t.quantity()).sum();
            report.trades += trades.len() as u64;
            report.volume += filled;
            debug!(
                order_id = id,
                ?side,
                price,
                fills = trades.len(),
                filled,
                "sim tick crossed"
            );
        }

        // churn the ladders a little so cancels get exercised too
        if rng.random_bool(cfg.cancel_rate) {
            book.cancel_order(rng.random_range(1..=id));
        }
    }

    report.resting = book.len();
    report.best_bid = book.best_bid();
    report.best_ask = book.best_ask();
    info!(
        orders = report.orders_submitted,
        trades = report.trades,
        volume = report.volume,
        resting = report.resting,
        "simulation done"
    );
    report
}
