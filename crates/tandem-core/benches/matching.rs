//! Matching benchmarks.
//!
//! Run with: cargo bench -p tandem-core

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tandem_core::{
    Ack, Engine, EngineConfig, EventSink, Instrument, ManualClock, Order, OrderId, OrderRequest,
    Price, PriorityBook, Quantity, Side, SideBook,
};

/// Sink that discards everything, so the benches measure matching only.
struct NullSink;

impl EventSink for NullSink {
    fn order_added(&self, _order: &Order, _timestamp: u64) {}
    fn order_deleted(&self, _id: OrderId, _instrument: Option<Instrument>, _success: bool, _timestamp: u64) {}
    fn order_executed(&self, _r: OrderId, _i: OrderId, _count: u32, _price: Price, _qty: Quantity, _timestamp: u64) {}
}

fn instrument() -> Instrument {
    Instrument::new("BENCH").unwrap()
}

fn order(id: u32, side: Side, price: u32, qty: u32) -> Order {
    Order::new(OrderId(id), instrument(), side, Price(price), Quantity(qty))
}

fn side_book(direction: Side) -> SideBook {
    SideBook::new(direction, Arc::new(NullSink), Arc::new(ManualClock::new()))
}

/// Benchmark inserting into a book with existing orders.
fn bench_insert_deep_book(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_deep_book");
    group.throughput(Throughput::Elements(1));

    for depth in [100u32, 1000, 10000] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let mut book = PriorityBook::new(Side::Sell);
            for i in 0..depth {
                book.push(order(i, Side::Sell, 10000 + (i % 100), 100));
            }
            let mut id = depth;
            b.iter(|| {
                id += 1;
                let handle = book.push(order(id, Side::Sell, 10000 + (id % 100), 100));
                // Keep the depth constant
                black_box(book.pop());
                black_box(handle)
            })
        });
    }

    group.finish();
}

/// Benchmark matching against multiple resting orders.
fn bench_match_multiple(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_multiple");
    group.throughput(Throughput::Elements(1));

    for count in [1u32, 5, 10] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut state = side_book(Side::Buy);
                    for i in 0..count {
                        state.insert(order(i, Side::Sell, 10000, 10));
                    }
                    state
                },
                |mut state| {
                    let mut buy = order(100, Side::Buy, 10000, 10 * count);
                    state.match_incoming(&mut buy, |id| {
                        black_box(id);
                    });
                    black_box(buy.remaining)
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark sweeping lazily cancelled orders.
fn bench_sweep_cancelled(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_cancelled");

    group.bench_function("1000_dead", |b| {
        b.iter_batched(
            || {
                let mut state = side_book(Side::Buy);
                for i in 0..1000 {
                    state.insert(order(i, Side::Sell, 10000, 10));
                }
                for i in 0..1000 {
                    state.cancel(OrderId(i), instrument());
                }
                state
            },
            |mut state| {
                let mut buy = order(5000, Side::Buy, 10000, 10);
                state.match_incoming(&mut buy, |_| {});
                black_box(state.book().len())
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

/// Round trip through router, coordinator and both actors.
fn bench_engine_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_round_trip");
    group.throughput(Throughput::Elements(2));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .unwrap();
    let engine = rt.block_on(async { Engine::start(EngineConfig::default(), Arc::new(NullSink)).unwrap() });
    let handle = engine.handle();

    group.bench_function("buy_then_sell", |b| {
        let mut id = 0u32;
        b.iter(|| {
            id += 2;
            rt.block_on(async {
                let buy = OrderRequest::buy(OrderId(id), instrument(), Price(100), Quantity(1));
                let sell = OrderRequest::sell(OrderId(id + 1), instrument(), Price(100), Quantity(1));
                let rested = handle.submit(buy).await.unwrap();
                let filled = handle.submit(sell).await.unwrap();
                debug_assert_eq!(filled, Ack::Filled);
                black_box((rested, filled))
            })
        })
    });

    group.finish();
    rt.block_on(engine.shutdown());
}

criterion_group!(
    benches,
    bench_insert_deep_book,
    bench_match_multiple,
    bench_sweep_cancelled,
    bench_engine_round_trip,
);

criterion_main!(benches);
