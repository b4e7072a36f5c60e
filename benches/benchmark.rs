use criterion::{Criterion, criterion_group, criterion_main};
use lob_engine::orderbook::Orderbook;
use lob_engine::orders::{Order, OrderType, Side};

fn setup_book(levels: i64, orders_per_level: u64) -> Orderbook {
    let book = Orderbook::new();
    let mut id = 0u64;
    // bids below 1000, asks above, so nothing crosses during setup
    for offset in 1..=levels {
        for _ in 0..orders_per_level {
            id += 1;
            book.add_order(Order::new(
                OrderType::GoodTillCancel,
                id,
                Side::Buy,
                1_000 - offset,
                10,
            ));
            id += 1;
            book.add_order(Order::new(
                OrderType::GoodTillCancel,
                id,
                Side::Sell,
                1_000 + offset,
                10,
            ));
        }
    }
    book
}

fn bench_add_then_cancel(c: &mut Criterion) {
    let book = setup_book(100, 10);
    let mut id = 1_000_000u64;
    c.bench_function("add then cancel a deep resting bid", |b| {
        b.iter(|| {
            id += 1;
            // rests far from the touch, so the book returns to its seeded state
            book.add_order(Order::new(OrderType::GoodTillCancel, id, Side::Buy, 500, 10));
            book.cancel_order(id);
        })
    });
}

fn bench_crossing_pair(c: &mut Criterion) {
    let book = setup_book(100, 10);
    let mut id = 2_000_000u64;
    c.bench_function("cross a fresh bid/ask pair", |b| {
        b.iter(|| {
            let ask = {
                id += 1;
                id
            };
            let bid = {
                id += 1;
                id
            };
            book.add_order(Order::new(OrderType::GoodTillCancel, ask, Side::Sell, 1_000, 10));
            let trades = book.add_order(Order::new(OrderType::GoodTillCancel, bid, Side::Buy, 1_000, 10));
            assert_eq!(trades.len(), 1);
        })
    });
}

fn bench_market_sweep(c: &mut Criterion) {
    let book = setup_book(100, 10);
    let mut id = 3_000_000u64;
    c.bench_function("market order sweeping five levels", |b| {
        b.iter(|| {
            // refill what the previous iteration consumed
            for offset in 1..=5 {
                id += 1;
                book.add_order(Order::new(
                    OrderType::GoodTillCancel,
                    id,
                    Side::Sell,
                    1_000 + offset,
                    10,
                ));
            }
            id += 1;
            let trades = book.add_order(Order::market(id, Side::Buy, 50));
            assert!(!trades.is_empty());
        })
    });
}

fn bench_depth_snapshot(c: &mut Criterion) {
    let book = setup_book(100, 10);
    c.bench_function("depth snapshot of a 200-level book", |b| {
        b.iter(|| {
            let depth = book.depth();
            assert_eq!(depth.bids.len() + depth.asks.len(), 200);
        })
    });
}

criterion_group!(
    benches,
    bench_add_then_cancel,
    bench_crossing_pair,
    bench_market_sweep,
    bench_depth_snapshot
);
criterion_main!(benches);
