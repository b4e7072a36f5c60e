use serde::{Deserialize, Serialize};

use crate::errors::OrderError;

/// Opaque, caller-supplied order identifier.
pub type OrderId = u64;
/// Signed price in ticks.
pub type Price = i64;
/// Unsigned order size.
pub type Quantity = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,  // bid
    Sell, // ask
}

/// How long an order stays working once admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Rests until filled or cancelled.
    GoodTillCancel,
    /// Rests like [`OrderType::GoodTillCancel`] but is cancelled at the
    /// day's cutoff by the expiry task.
    GoodForDay,
    /// Matches what it can immediately; any remainder is cancelled.
    FillAndKill,
    /// Matches its entire quantity immediately or is not admitted at all.
    FillOrKill,
    /// Priced by the engine at admission; see `Orderbook::add_order`.
    Market,
}

/// A single order and its fill accounting.
///
/// Constructed by the caller and owned by the book from admission until it is
/// filled, cancelled or expired. `price` is `None` only for a market order
/// that has not yet been promoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    side: Side,
    order_type: OrderType,
    price: Option<Price>,
    initial_quantity: Quantity,
    remaining_quantity: Quantity,
}

impl Order {
    pub fn new(
        order_type: OrderType,
        id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            id,
            side,
            order_type,
            price: Some(price),
            initial_quantity: quantity,
            remaining_quantity: quantity,
        }
    }

    /// A market order carries no price until the engine promotes it.
    pub fn market(id: OrderId, side: Side, quantity: Quantity) -> Self {
        Self {
            id,
            side,
            order_type: OrderType::Market,
            price: None,
            initial_quantity: quantity,
            remaining_quantity: quantity,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn price(&self) -> Option<Price> {
        self.price
    }

    pub fn initial_quantity(&self) -> Quantity {
        self.initial_quantity
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.remaining_quantity
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.initial_quantity - self.remaining_quantity
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity == 0
    }

    /// Price of an admitted order. Admission either assigns a price or
    /// rejects, so orders inside the book always have one.
    pub(crate) fn resting_price(&self) -> Price {
        self.price.expect("admitted orders always carry a price")
    }

    /// Consumes `quantity` from the remaining amount.
    pub fn fill(&mut self, quantity: Quantity) -> Result<(), OrderError> {
        if quantity > self.remaining_quantity {
            return Err(OrderError::Overfill {
                id: self.id,
                requested: quantity,
                remaining: self.remaining_quantity,
            });
        }
        self.remaining_quantity -= quantity;
        Ok(())
    }

    /// Promotes a market order into a resting good-till-cancel order at
    /// `price`. One-way; any other order type is refused.
    pub fn to_good_till_cancel(&mut self, price: Price) -> Result<(), OrderError> {
        if self.order_type != OrderType::Market {
            return Err(OrderError::NotMarket { id: self.id });
        }
        self.price = Some(price);
        self.order_type = OrderType::GoodTillCancel;
        Ok(())
    }
}

/// Replacement request for a resting order.
///
/// Applied as cancel-then-add: the replacement keeps the original's order
/// type but re-enters the queue as a fresh arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderModify {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
}

impl OrderModify {
    pub fn new(order_id: OrderId, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            order_id,
            side,
            price,
            quantity,
        }
    }

    pub fn into_order(self, order_type: OrderType) -> Order {
        match order_type {
            OrderType::Market => Order::market(self.order_id, self.side, self.quantity),
            other => Order::new(other, self.order_id, self.side, self.price, self.quantity),
        }
    }
}
