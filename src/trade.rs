use serde::Serialize;

use crate::orders::{OrderId, Price, Quantity};

/// One side's view of an execution
///
/// - The order id is the resting order that participated
/// - The price is that order's own resting price
/// - Quantity is the amount filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TradeInfo {
    pub order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
}

/// A matched execution between one bid and one ask.
///
/// Both legs carry the same quantity. Their prices agree except immediately
/// after a market-order promotion, where each party keeps its own stored
/// price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trade {
    pub bid: TradeInfo,
    pub ask: TradeInfo,
}

impl Trade {
    pub fn quantity(&self) -> Quantity {
        self.bid.quantity
    }
}

pub type Trades = Vec<Trade>;
