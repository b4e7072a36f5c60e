//! The order book core: dual price ladders, order index, per-level
//! aggregates, the matching loop and the good-for-day expiry task.
//!
//! An [`Orderbook`] owns four containers behind one mutex:
//! - `bids` / `asks`: ordered maps from price to a FIFO queue of resting
//!   orders, keyed so the *first* entry of each map is the best level
//!   (bids descend via [`Reverse`], asks ascend naturally),
//! - `index`: order id to arena slot, giving O(1) cancel and modify,
//! - `levels`: per-price aggregate quantity and order count, kept in lock
//!   step with the ladders so fill-or-kill feasibility never walks a queue.
//!
//! The queues themselves live in a slab arena ([`crate::arena`]); the slot
//! stored in the index doubles as the position handle inside the level's
//! doubly-linked FIFO.
//!
//! A background thread owned by the book wakes at a configurable local
//! cutoff (16:00 by default) and cancels every resting good-for-day order
//! through the normal cancel path. Dropping the book signals and joins it.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime};
use tracing::{debug, info, warn};

use crate::arena::{LevelQueue, OrderArena, Slot};
use crate::levels::{BookDepth, LevelAction, LevelData, LevelInfo};
use crate::orders::{Order, OrderId, OrderModify, OrderType, Price, Quantity, Side};
use crate::trade::{Trade, TradeInfo, Trades};

/// Local wall-clock hour at which good-for-day orders expire by default.
const MARKET_CLOSE_HOUR: u32 = 16;

/// Padding added to the timed wait so the expiry thread cannot wake just
/// before the cutoff it computed.
const EXPIRY_SLACK: Duration = Duration::from_millis(100);

fn market_close() -> NaiveTime {
    NaiveTime::from_hms_opt(MARKET_CLOSE_HOUR, 0, 0).expect("16:00:00 is a valid time of day")
}

/// Duration from `now` until the next occurrence of `close`, plus slack.
fn time_until_close(now: DateTime<Local>, close: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(close);
    let next = if now.time() < close {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now.naive_local()).to_std().unwrap_or_default() + EXPIRY_SLACK
}

/// The four containers. Only ever touched under the book mutex.
#[derive(Default)]
struct BookState {
    arena: OrderArena,
    bids: BTreeMap<Reverse<Price>, LevelQueue>,
    asks: BTreeMap<Price, LevelQueue>,
    index: HashMap<OrderId, Slot>,
    levels: HashMap<Price, LevelData>,
}

impl BookState {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn best_bid_price(&self) -> Option<Price> {
        self.bids.keys().next().map(|&Reverse(price)| price)
    }

    fn best_ask_price(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    fn worst_bid_price(&self) -> Option<Price> {
        self.bids.keys().next_back().map(|&Reverse(price)| price)
    }

    fn worst_ask_price(&self) -> Option<Price> {
        self.asks.keys().next_back().copied()
    }

    fn best(&self, side: Side) -> Option<(Price, Quantity)> {
        let price = match side {
            Side::Buy => self.best_bid_price()?,
            Side::Sell => self.best_ask_price()?,
        };
        let data = self.levels.get(&price).copied().unwrap_or_default();
        Some((price, data.quantity))
    }

    fn order_type_of(&self, order_id: OrderId) -> Option<OrderType> {
        self.index
            .get(&order_id)
            .map(|&slot| self.arena.get(slot).order.order_type())
    }

    /// True iff an order at `price` would cross the opposite side's best.
    fn can_match(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => match self.best_ask_price() {
                Some(best_ask) => price >= best_ask,
                None => false,
            },
            Side::Sell => match self.best_bid_price() {
                Some(best_bid) => price <= best_bid,
                None => false,
            },
        }
    }

    /// Fill-or-kill pre-check: is there at least `quantity` of crossable
    /// liquidity at prices no worse than `price`?
    ///
    /// Walks the aggregates rather than the queues. A level is crossable for
    /// a buy iff it sits between the best ask and the limit (symmetric for a
    /// sell), so the per-level predicate makes iteration order irrelevant.
    fn can_fully_fill(&self, side: Side, price: Price, quantity: Quantity) -> bool {
        if !self.can_match(side, price) {
            return false;
        }
        let threshold = match side {
            Side::Buy => self.best_ask_price(),
            Side::Sell => self.best_bid_price(),
        }
        .expect("can_match implies a non-empty opposite side");

        let mut needed = quantity;
        for (&level_price, data) in &self.levels {
            let crossable = match side {
                Side::Buy => level_price >= threshold && level_price <= price,
                Side::Sell => level_price <= threshold && level_price >= price,
            };
            if !crossable {
                continue;
            }
            if data.quantity >= needed {
                return true;
            }
            needed -= data.quantity;
        }
        false
    }

    fn update_level(&mut self, price: Price, quantity: Quantity, action: LevelAction) {
        let data = self.levels.entry(price).or_default();
        match action {
            LevelAction::Add => {
                data.count += 1;
                data.quantity += quantity;
            }
            LevelAction::Remove => {
                data.count -= 1;
                data.quantity -= quantity;
            }
            LevelAction::Match => {
                data.quantity -= quantity;
            }
        }
        if data.count == 0 {
            self.levels.remove(&price);
        }
    }

    fn add_order(&mut self, mut order: Order) -> Trades {
        if self.index.contains_key(&order.id()) {
            warn!(order_id = order.id(), "duplicate order id ignored");
            return Trades::new();
        }
        if order.initial_quantity() == 0 {
            warn!(order_id = order.id(), "zero-quantity order ignored");
            return Trades::new();
        }

        // A market order is promoted to a resting limit at the *worst*
        // opposite price, which guarantees it crosses every resting opposite
        // level; with nothing on the opposite side it is rejected outright.
        if order.order_type() == OrderType::Market {
            let worst = match order.side() {
                Side::Buy => self.worst_ask_price(),
                Side::Sell => self.worst_bid_price(),
            };
            match worst {
                Some(price) => order
                    .to_good_till_cancel(price)
                    .expect("only market orders reach promotion"),
                None => {
                    debug!(
                        order_id = order.id(),
                        side = ?order.side(),
                        "market order rejected: opposite side empty"
                    );
                    return Trades::new();
                }
            }
        }

        let id = order.id();
        let side = order.side();
        let order_type = order.order_type();
        let initial = order.initial_quantity();
        let price = order.resting_price();

        if order_type == OrderType::FillAndKill && !self.can_match(side, price) {
            debug!(order_id = id, price, "fill-and-kill rejected: nothing to match");
            return Trades::new();
        }
        if order_type == OrderType::FillOrKill && !self.can_fully_fill(side, price, initial) {
            debug!(
                order_id = id,
                price,
                quantity = initial,
                "fill-or-kill rejected: insufficient crossable quantity"
            );
            return Trades::new();
        }

        let slot = match side {
            Side::Buy => {
                let queue = self.bids.entry(Reverse(price)).or_default();
                self.arena.push_back(queue, order)
            }
            Side::Sell => {
                let queue = self.asks.entry(price).or_default();
                self.arena.push_back(queue, order)
            }
        };
        self.index.insert(id, slot);
        self.update_level(price, initial, LevelAction::Add);
        debug!(order_id = id, ?side, price, quantity = initial, "order admitted");

        let trades = self.match_orders();

        // A fill-and-kill must not rest: drop whatever the match left behind.
        if order_type == OrderType::FillAndKill && self.index.contains_key(&id) {
            self.cancel(id);
        }

        trades
    }

    /// Drains all crossable liquidity, strictly price/time.
    ///
    /// The outer loop pins the current best levels and stops once the book is
    /// uncrossed; the inner loop consumes the two head orders one fill at a
    /// time until either level queue empties.
    fn match_orders(&mut self) -> Trades {
        let mut trades = Trades::new();
        loop {
            let (Some(bid_price), Some(ask_price)) =
                (self.best_bid_price(), self.best_ask_price())
            else {
                break;
            };
            if bid_price < ask_price {
                break;
            }

            loop {
                let Some(bid_slot) = self.bids.get(&Reverse(bid_price)).and_then(|q| q.head())
                else {
                    break;
                };
                let Some(ask_slot) = self.asks.get(&ask_price).and_then(|q| q.head()) else {
                    break;
                };

                let quantity = Quantity::min(
                    self.arena.get(bid_slot).order.remaining_quantity(),
                    self.arena.get(ask_slot).order.remaining_quantity(),
                );

                let bid_order = &mut self.arena.get_mut(bid_slot).order;
                bid_order
                    .fill(quantity)
                    .expect("fill sized by min of both remainders");
                let bid = TradeInfo {
                    order_id: bid_order.id(),
                    price: bid_order.resting_price(),
                    quantity,
                };

                let ask_order = &mut self.arena.get_mut(ask_slot).order;
                ask_order
                    .fill(quantity)
                    .expect("fill sized by min of both remainders");
                let ask = TradeInfo {
                    order_id: ask_order.id(),
                    price: ask_order.resting_price(),
                    quantity,
                };

                trades.push(Trade { bid, ask });

                self.settle_leg(Side::Buy, bid_price, bid_slot, quantity);
                self.settle_leg(Side::Sell, ask_price, ask_slot, quantity);
            }
        }
        trades
    }

    /// Post-fill bookkeeping for one participant: a filled order is popped,
    /// de-indexed and freed (erasing its level if that empties it); a
    /// surviving partial only shrinks the level aggregates.
    fn settle_leg(&mut self, side: Side, price: Price, slot: Slot, quantity: Quantity) {
        if !self.arena.get(slot).order.is_filled() {
            self.update_level(price, quantity, LevelAction::Match);
            return;
        }

        let id = self.arena.get(slot).order.id();
        self.index.remove(&id);
        match side {
            Side::Buy => {
                let queue = self
                    .bids
                    .get_mut(&Reverse(price))
                    .expect("a settling order's level exists");
                self.arena.remove(queue, slot);
                let empty = queue.is_empty();
                if empty {
                    self.bids.remove(&Reverse(price));
                }
            }
            Side::Sell => {
                let queue = self
                    .asks
                    .get_mut(&price)
                    .expect("a settling order's level exists");
                self.arena.remove(queue, slot);
                let empty = queue.is_empty();
                if empty {
                    self.asks.remove(&price);
                }
            }
        }
        self.update_level(price, quantity, LevelAction::Remove);
        debug!(order_id = id, price, "order fully filled");
    }

    /// Removes a resting order in O(1) via its arena slot. Unknown ids are a
    /// no-op.
    fn cancel(&mut self, order_id: OrderId) {
        let Some(slot) = self.index.remove(&order_id) else {
            return;
        };
        let (side, price, remaining) = {
            let order = &self.arena.get(slot).order;
            (
                order.side(),
                order.resting_price(),
                order.remaining_quantity(),
            )
        };
        match side {
            Side::Buy => {
                let queue = self
                    .bids
                    .get_mut(&Reverse(price))
                    .expect("an indexed order's level exists");
                self.arena.remove(queue, slot);
                let empty = queue.is_empty();
                if empty {
                    self.bids.remove(&Reverse(price));
                }
            }
            Side::Sell => {
                let queue = self
                    .asks
                    .get_mut(&price)
                    .expect("an indexed order's level exists");
                self.arena.remove(queue, slot);
                let empty = queue.is_empty();
                if empty {
                    self.asks.remove(&price);
                }
            }
        }
        self.update_level(price, remaining, LevelAction::Remove);
        debug!(order_id, ?side, price, remaining, "order cancelled");
    }

    fn depth(&self) -> BookDepth {
        BookDepth {
            bids: self
                .bids
                .iter()
                .map(|(&Reverse(price), queue)| LevelInfo {
                    price,
                    quantity: self.arena.queue_quantity(queue),
                })
                .collect(),
            asks: self
                .asks
                .iter()
                .map(|(&price, queue)| LevelInfo {
                    price,
                    quantity: self.arena.queue_quantity(queue),
                })
                .collect(),
        }
    }

    fn day_order_ids(&self) -> Vec<OrderId> {
        self.index
            .values()
            .map(|&slot| &self.arena.get(slot).order)
            .filter(|order| order.order_type() == OrderType::GoodForDay)
            .map(Order::id)
            .collect()
    }

    /// Exhaustive audit of the cross-container invariants. Test-only; the
    /// operations above maintain these incrementally.
    #[cfg(test)]
    fn check_invariants(&self) {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        for (&id, &slot) in &self.index {
            let order = &self.arena.get(slot).order;
            assert_eq!(order.id(), id, "index entry points at its own order");
            assert!(seen.insert(id), "order id indexed once");
            let in_queue = match order.side() {
                Side::Buy => self
                    .bids
                    .get(&Reverse(order.resting_price()))
                    .is_some_and(|queue| self.arena.iter(queue).any(|o| o.id() == id)),
                Side::Sell => self
                    .asks
                    .get(&order.resting_price())
                    .is_some_and(|queue| self.arena.iter(queue).any(|o| o.id() == id)),
            };
            assert!(in_queue, "indexed order {id} rests at its stated price");
        }

        let mut queued = 0usize;
        let mut ladder_prices = HashSet::new();
        let bid_levels = self
            .bids
            .iter()
            .map(|(&Reverse(price), queue)| (price, queue));
        let ask_levels = self.asks.iter().map(|(&price, queue)| (price, queue));
        for (price, queue) in bid_levels.chain(ask_levels) {
            assert!(!queue.is_empty(), "level {price} exists iff non-empty");
            ladder_prices.insert(price);
            let len = self.arena.queue_len(queue);
            let quantity = self.arena.queue_quantity(queue);
            queued += len;
            let data = self.levels.get(&price).copied().unwrap_or_default();
            assert_eq!(data.count, len as u64, "aggregate count at {price}");
            assert_eq!(data.quantity, quantity, "aggregate quantity at {price}");
            for order in self.arena.iter(queue) {
                assert_eq!(order.resting_price(), price);
                assert!(self.index.contains_key(&order.id()));
            }
        }
        assert_eq!(queued, self.index.len(), "every queued order is indexed");
        for price in self.levels.keys() {
            assert!(
                ladder_prices.contains(price),
                "no aggregate entry for absent price {price}"
            );
        }

        if let (Some(bid), Some(ask)) = (self.best_bid_price(), self.best_ask_price()) {
            assert!(bid < ask, "book is never left crossed");
        }
    }
}

struct Shared {
    book: Mutex<BookState>,
    shutdown: AtomicBool,
    shutdown_cv: Condvar,
    close: NaiveTime,
}

/// A price/time-priority limit order book for one instrument.
///
/// All operations serialize on a single internal lock, so the book can be
/// shared across caller threads (e.g. inside an `Arc`). One background
/// thread, owned by the book, expires good-for-day orders at the configured
/// cutoff; it is signalled and joined when the book is dropped.
pub struct Orderbook {
    shared: Arc<Shared>,
    prune_handle: Option<JoinHandle<()>>,
}

impl Orderbook {
    /// A book whose day orders expire at the default 16:00 local cutoff.
    pub fn new() -> Self {
        Self::with_close(market_close())
    }

    /// A book whose day orders expire at `close` (local wall clock).
    pub fn with_close(close: NaiveTime) -> Self {
        let shared = Arc::new(Shared {
            book: Mutex::new(BookState::default()),
            shutdown: AtomicBool::new(false),
            shutdown_cv: Condvar::new(),
            close,
        });
        let worker = Arc::clone(&shared);
        let prune_handle = std::thread::Builder::new()
            .name("gfd-expiry".into())
            .spawn(move || prune_day_orders(&worker))
            .expect("failed to spawn expiry thread");
        Self {
            shared,
            prune_handle: Some(prune_handle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BookState> {
        self.shared.book.lock().unwrap()
    }

    /// Admits `order` and returns the trades it produced, possibly none.
    ///
    /// Duplicate ids, unpromotable market orders and infeasible
    /// fill-and-kill / fill-or-kill submissions leave the book unchanged and
    /// return no trades. A market order that survives admission rests as
    /// good-till-cancel at the *worst* opposite price, so any residual quotes
    /// at that aggressive level rather than at the former best.
    pub fn add_order(&self, order: Order) -> Trades {
        self.lock().add_order(order)
    }

    /// Cancels a resting order. Absent ids are ignored.
    pub fn cancel_order(&self, order_id: OrderId) {
        self.lock().cancel(order_id);
    }

    /// Replaces a resting order, keeping its order type but resetting its
    /// time priority, and returns any trades the replacement produced.
    /// Absent ids produce no trades and change nothing.
    pub fn modify_order(&self, modify: OrderModify) -> Trades {
        let order_type = {
            let book = self.lock();
            match book.order_type_of(modify.order_id) {
                Some(order_type) => order_type,
                None => return Trades::new(),
            }
        };
        self.cancel_order(modify.order_id);
        self.add_order(modify.into_order(order_type))
    }

    /// Number of resting orders across all levels of both sides.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        self.lock().best(Side::Buy)
    }

    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        self.lock().best(Side::Sell)
    }

    /// Aggregated depth snapshot: bids descending, asks ascending. The copy
    /// does not reference book storage.
    pub fn depth(&self) -> BookDepth {
        self.lock().depth()
    }

    /// Runs one expiry cycle inline: cancels every resting good-for-day
    /// order through the normal cancel path. This is the same work the
    /// background thread performs at the cutoff.
    pub fn expire_day_orders(&self) {
        let ids = self.lock().day_order_ids();
        if ids.is_empty() {
            return;
        }
        info!(count = ids.len(), "expiring day orders");
        let mut book = self.lock();
        for id in ids {
            book.cancel(id);
        }
    }

    /// Stops the expiry thread and waits for it to finish. Runs on drop;
    /// callers may invoke it earlier to release the thread deterministically.
    pub fn close(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.shutdown_cv.notify_all();
        if let Some(handle) = self.prune_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Default for Orderbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Orderbook {
    fn drop(&mut self) {
        self.close();
    }
}

/// Body of the expiry thread.
///
/// Each cycle waits on the book lock's condition variable until the next
/// cutoff, or a shutdown signal, whichever comes first, then collects the
/// resting good-for-day ids and cancels them. The shutdown flag is re-checked
/// after every wake-up; a spurious wake recomputes the wait and sleeps again.
fn prune_day_orders(shared: &Shared) {
    loop {
        let wait = time_until_close(Local::now(), shared.close);
        {
            let book = shared.book.lock().unwrap();
            if shared.shutdown.load(Ordering::Acquire) {
                return;
            }
            let (_book, result) = shared.shutdown_cv.wait_timeout(book, wait).unwrap();
            if shared.shutdown.load(Ordering::Acquire) {
                return;
            }
            if !result.timed_out() {
                continue;
            }
        }

        let ids = shared.book.lock().unwrap().day_order_ids();
        if ids.is_empty() {
            continue;
        }
        info!(count = ids.len(), "market close reached; expiring day orders");
        let mut book = shared.book.lock().unwrap();
        for id in ids {
            book.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gtc(id: OrderId, side: Side, price: Price, quantity: Quantity) -> Order {
        Order::new(OrderType::GoodTillCancel, id, side, price, quantity)
    }

    fn gfd(id: OrderId, side: Side, price: Price, quantity: Quantity) -> Order {
        Order::new(OrderType::GoodForDay, id, side, price, quantity)
    }

    fn fak(id: OrderId, side: Side, price: Price, quantity: Quantity) -> Order {
        Order::new(OrderType::FillAndKill, id, side, price, quantity)
    }

    fn fok(id: OrderId, side: Side, price: Price, quantity: Quantity) -> Order {
        Order::new(OrderType::FillOrKill, id, side, price, quantity)
    }

    /// State-level harness so unit tests can audit the containers after
    /// every operation without going through the lock.
    struct Harness {
        state: BookState,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                state: BookState::default(),
            }
        }

        fn add(&mut self, order: Order) -> Trades {
            let trades = self.state.add_order(order);
            self.state.check_invariants();
            trades
        }

        fn cancel(&mut self, order_id: OrderId) {
            self.state.cancel(order_id);
            self.state.check_invariants();
        }
    }

    #[test]
    fn basic_cross_fills_both_sides() {
        let mut book = Harness::new();
        assert!(book.add(gtc(1, Side::Buy, 100, 10)).is_empty());
        let trades = book.add(gtc(2, Side::Sell, 100, 10));

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].bid.order_id, 1);
        assert_eq!(trades[0].ask.order_id, 2);
        assert_eq!(trades[0].bid.price, 100);
        assert_eq!(trades[0].ask.price, 100);
        assert_eq!(trades[0].quantity(), 10);
        assert_eq!(book.state.len(), 0);
    }

    #[test]
    fn partial_fill_leaves_residual_bid() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Buy, 100, 10));
        let trades = book.add(gtc(2, Side::Sell, 100, 6));

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quantity(), 6);
        assert_eq!(book.state.len(), 1);

        let depth = book.state.depth();
        assert_eq!(
            depth.bids,
            vec![LevelInfo {
                price: 100,
                quantity: 4
            }]
        );
        assert!(depth.asks.is_empty());
    }

    #[test]
    fn no_cross_when_prices_do_not_touch() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Buy, 99, 10));
        let trades = book.add(gtc(2, Side::Sell, 101, 10));
        assert!(trades.is_empty());
        assert_eq!(book.state.len(), 2);
        assert_eq!(book.state.best_bid_price(), Some(99));
        assert_eq!(book.state.best_ask_price(), Some(101));
    }

    #[test]
    fn fifo_within_a_level() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Sell, 100, 4));
        book.add(gtc(2, Side::Sell, 100, 6));

        let trades = book.add(gtc(3, Side::Buy, 100, 9));
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].ask.order_id, 1);
        assert_eq!(trades[0].quantity(), 4);
        assert_eq!(trades[1].ask.order_id, 2);
        assert_eq!(trades[1].quantity(), 5);

        // id=2 keeps the remainder at the front of the level
        let depth = book.state.depth();
        assert_eq!(
            depth.asks,
            vec![LevelInfo {
                price: 100,
                quantity: 1
            }]
        );
    }

    #[test]
    fn better_priced_levels_fill_first() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Sell, 101, 3));
        book.add(gtc(2, Side::Sell, 100, 2));

        let trades = book.add(gtc(3, Side::Buy, 101, 5));
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].ask.order_id, 2);
        assert_eq!(trades[0].ask.price, 100);
        assert_eq!(trades[1].ask.order_id, 1);
        assert_eq!(trades[1].ask.price, 101);
        assert_eq!(book.state.len(), 0);
    }

    #[test]
    fn duplicate_id_is_ignored() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Buy, 100, 10));
        let trades = book.add(gtc(1, Side::Sell, 100, 10));
        assert!(trades.is_empty());
        assert_eq!(book.state.len(), 1);
        assert_eq!(book.state.best_bid_price(), Some(100));
    }

    #[test]
    fn zero_quantity_is_refused() {
        let mut book = Harness::new();
        assert!(book.add(gtc(1, Side::Buy, 100, 0)).is_empty());
        assert_eq!(book.state.len(), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Buy, 100, 10));
        book.cancel(1);
        assert_eq!(book.state.len(), 0);
        // absent and repeated cancels are no-ops
        book.cancel(1);
        book.cancel(42);
        assert_eq!(book.state.len(), 0);
    }

    #[test]
    fn cancel_unlinks_middle_of_queue() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Buy, 100, 1));
        book.add(gtc(2, Side::Buy, 100, 2));
        book.add(gtc(3, Side::Buy, 100, 3));
        book.cancel(2);

        let trades = book.add(gtc(4, Side::Sell, 100, 4));
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].bid.order_id, 1);
        assert_eq!(trades[1].bid.order_id, 3);
    }

    #[test]
    fn market_buy_promotes_to_worst_ask_and_rests() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Sell, 100, 2));
        book.add(gtc(2, Side::Sell, 101, 3));

        let trades = book.add(Order::market(3, Side::Buy, 10));
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].ask.price, 100);
        assert_eq!(trades[0].bid.price, 101, "buyer carries the promoted price");
        assert_eq!(trades[1].ask.price, 101);

        // residual rests as good-till-cancel at the promotion price
        assert_eq!(book.state.len(), 1);
        assert_eq!(book.state.best_bid_price(), Some(101));
        assert_eq!(book.state.order_type_of(3), Some(OrderType::GoodTillCancel));
        let depth = book.state.depth();
        assert_eq!(
            depth.bids,
            vec![LevelInfo {
                price: 101,
                quantity: 5
            }]
        );
    }

    #[test]
    fn market_sell_promotes_to_worst_bid() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Buy, 101, 2));
        book.add(gtc(2, Side::Buy, 100, 2));

        let trades = book.add(Order::market(3, Side::Sell, 3));
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].bid.price, 101);
        assert_eq!(trades[0].ask.price, 100, "seller carries the promoted price");
        assert_eq!(trades[1].bid.price, 100);
        assert_eq!(book.state.len(), 1);
    }

    #[test]
    fn market_order_rejected_on_empty_opposite_side() {
        let mut book = Harness::new();
        assert!(book.add(Order::market(1, Side::Buy, 5)).is_empty());
        assert_eq!(book.state.len(), 0);

        book.add(gtc(2, Side::Buy, 100, 5));
        assert!(book.add(Order::market(3, Side::Buy, 5)).is_empty());
        assert_eq!(book.state.len(), 1);
    }

    #[test]
    fn fak_rejected_without_a_cross() {
        let mut book = Harness::new();
        assert!(book.add(fak(1, Side::Buy, 99, 5)).is_empty());
        assert_eq!(book.state.len(), 0);

        book.add(gtc(2, Side::Sell, 100, 5));
        assert!(book.add(fak(3, Side::Buy, 99, 5)).is_empty());
        assert_eq!(book.state.len(), 1);
    }

    #[test]
    fn fak_residual_never_rests() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Sell, 100, 4));

        let trades = book.add(fak(2, Side::Buy, 100, 10));
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quantity(), 4);
        // the unfilled 6 lots are cancelled, not left quoting
        assert_eq!(book.state.len(), 0);
    }

    #[test]
    fn fok_rejected_when_depth_is_short() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Sell, 100, 3));
        book.add(gtc(2, Side::Sell, 101, 3));

        let trades = book.add(fok(3, Side::Buy, 101, 10));
        assert!(trades.is_empty());
        assert_eq!(book.state.len(), 2);
        let depth = book.state.depth();
        assert_eq!(
            depth.asks,
            vec![
                LevelInfo {
                    price: 100,
                    quantity: 3
                },
                LevelInfo {
                    price: 101,
                    quantity: 3
                },
            ]
        );
    }

    #[test]
    fn fok_fills_fully_within_its_limit() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Sell, 100, 3));
        book.add(gtc(2, Side::Sell, 101, 3));
        book.add(gtc(3, Side::Sell, 102, 5));

        let trades = book.add(fok(4, Side::Buy, 101, 6));
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].ask.price, 100);
        assert_eq!(trades[0].quantity(), 3);
        assert_eq!(trades[1].ask.price, 101);
        assert_eq!(trades[1].quantity(), 3);

        // levels 100 and 101 consumed, 102 untouched
        let depth = book.state.depth();
        assert_eq!(
            depth.asks,
            vec![LevelInfo {
                price: 102,
                quantity: 5
            }]
        );
    }

    #[test]
    fn fok_ignores_liquidity_beyond_its_limit() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Sell, 100, 3));
        book.add(gtc(2, Side::Sell, 102, 10));

        // 13 lots rest, but only 3 are within the limit of 101
        assert!(book.add(fok(3, Side::Buy, 101, 5)).is_empty());
        assert_eq!(book.state.len(), 2);
    }

    #[test]
    fn fok_sell_sums_bid_side_only() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Buy, 100, 4));
        book.add(gtc(2, Side::Buy, 99, 4));
        book.add(gtc(3, Side::Sell, 105, 50));

        let trades = book.add(fok(4, Side::Sell, 99, 8));
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].bid.order_id, 1);
        assert_eq!(trades[1].bid.order_id, 2);
        assert_eq!(book.state.len(), 1);
        assert_eq!(book.state.best_ask_price(), Some(105));
    }

    #[test]
    fn aggregates_track_partial_fills() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Buy, 100, 10));
        book.add(gtc(2, Side::Buy, 100, 10));
        book.add(gtc(3, Side::Sell, 100, 5));

        let data = book.state.levels.get(&100).copied().unwrap();
        assert_eq!(data.count, 2);
        assert_eq!(data.quantity, 15);
    }

    #[test]
    fn day_order_ids_selects_only_good_for_day() {
        let mut book = Harness::new();
        book.add(gtc(1, Side::Buy, 100, 5));
        book.add(gfd(2, Side::Buy, 99, 5));
        book.add(gfd(3, Side::Sell, 105, 5));

        let mut ids = book.state.day_order_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn wait_runs_to_today_close_before_the_cutoff() {
        let now = Local
            .with_ymd_and_hms(2024, 3, 4, 15, 0, 0)
            .single()
            .expect("unambiguous local time");
        let wait = time_until_close(now, market_close());
        assert_eq!(wait, Duration::from_secs(3600) + EXPIRY_SLACK);
    }

    #[test]
    fn wait_rolls_to_tomorrow_at_or_after_the_cutoff() {
        let now = Local
            .with_ymd_and_hms(2024, 3, 4, 16, 0, 0)
            .single()
            .expect("unambiguous local time");
        let wait = time_until_close(now, market_close());
        assert_eq!(wait, Duration::from_secs(24 * 3600) + EXPIRY_SLACK);
    }
}
