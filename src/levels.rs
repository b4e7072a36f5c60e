//! Per-price aggregates and the public depth snapshot types.

use serde::Serialize;

use crate::orders::{Price, Quantity};

/// Running totals for one price across both ladders.
///
/// Maintained incrementally on every order event so fill-or-kill feasibility
/// can be answered without walking the queues. Keying by price alone is
/// unambiguous because a non-crossed book never holds bids and asks at the
/// same price.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LevelData {
    pub(crate) quantity: Quantity,
    pub(crate) count: u64,
}

/// How an order event changes a level's aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LevelAction {
    /// New resting order: quantity and count both grow.
    Add,
    /// Order leaves the level (cancel, expiry or full fill): both shrink.
    Remove,
    /// Partial fill: quantity shrinks, count is unchanged.
    Match,
}

/// One aggregated depth entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub price: Price,
    pub quantity: Quantity,
}

/// Point-in-time aggregated depth, detached from the book's storage.
///
/// Bids are ordered best-first (descending price), asks best-first
/// (ascending price).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BookDepth {
    pub bids: Vec<LevelInfo>,
    pub asks: Vec<LevelInfo>,
}
