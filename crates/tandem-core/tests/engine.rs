//! End-to-end behaviour of the engine through its public handle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proptest::prelude::*;
use tandem_core::{
    Ack, Engine, EngineConfig, EngineError, Event, EventLog, Instrument, ManualClock, OrderId,
    OrderRequest, Price, Quantity, RejectReason, Side, TrySubmitError,
};

fn inst(code: &str) -> Instrument {
    Instrument::new(code).unwrap()
}

fn start(config: EngineConfig) -> (Engine, Arc<EventLog>) {
    let log = Arc::new(EventLog::new());
    let engine = Engine::start_with_clock(config, log.clone(), Arc::new(ManualClock::new())).unwrap();
    (engine, log)
}

fn executions(events: &[Event]) -> Vec<(u32, u32, u32, u32, u32)> {
    events
        .iter()
        .filter_map(|e| match *e {
            Event::Executed {
                resting_id,
                incoming_id,
                execution_count,
                price,
                quantity,
                ..
            } => Some((resting_id.0, incoming_id.0, execution_count, price.0, quantity.0)),
            _ => None,
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partial_fill_scenario() {
    let (engine, log) = start(EngineConfig::default());
    let h = engine.handle();
    let aapl = inst("AAPL");

    let ack = h.submit(OrderRequest::buy(OrderId(1), aapl, Price(100), Quantity(10))).await;
    assert_eq!(ack, Ok(Ack::Resting { remaining: Quantity(10) }));
    let ack = h.submit(OrderRequest::sell(OrderId(2), aapl, Price(90), Quantity(4))).await;
    assert_eq!(ack, Ok(Ack::Filled));

    // 1 still rests with 6: a sell of 6 at its price fills completely
    let ack = h.submit(OrderRequest::sell(OrderId(3), aapl, Price(100), Quantity(7))).await;
    assert_eq!(ack, Ok(Ack::Resting { remaining: Quantity(1) }));

    engine.shutdown().await;
    let events = log.take();
    assert_eq!(
        executions(&events),
        vec![(1, 2, 1, 100, 4), (1, 3, 2, 100, 6)]
    );
    let added: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::Added { order, .. } => Some(order.order_id.0),
            _ => None,
        })
        .collect();
    assert_eq!(added, vec![1, 3]);
}

#[tokio::test]
async fn test_cancel_scenario() {
    let (engine, log) = start(EngineConfig::default());
    let h = engine.handle();
    let ibm = inst("IBM");

    h.submit(OrderRequest::sell(OrderId(3), ibm, Price(50), Quantity(5))).await.unwrap();
    // Bare cancel: instrument resolved from the router's index
    assert_eq!(h.submit(OrderRequest::cancel(OrderId(3))).await, Ok(Ack::Cancelled));
    let ack = h.submit(OrderRequest::buy(OrderId(4), ibm, Price(55), Quantity(5))).await;
    assert_eq!(ack, Ok(Ack::Resting { remaining: Quantity(5) }));

    engine.shutdown().await;
    let events = log.take();
    assert!(executions(&events).is_empty());
    assert!(matches!(events[0], Event::Added { order, .. } if order.order_id == OrderId(3)));
    assert!(matches!(
        events[1],
        Event::Deleted { order_id: OrderId(3), success: true, instrument: Some(i), .. } if i == ibm
    ));
}

#[tokio::test]
async fn test_cancel_unknown_order() {
    let (engine, log) = start(EngineConfig::default());
    let h = engine.handle();

    assert_eq!(h.submit(OrderRequest::cancel(OrderId(999))).await, Ok(Ack::CancelRejected));
    // Known instrument, unknown id
    h.submit(OrderRequest::buy(OrderId(1), inst("X"), Price(1), Quantity(1))).await.unwrap();
    let ack = h
        .submit(OrderRequest::cancel(OrderId(998)).with_instrument(inst("X")))
        .await;
    assert_eq!(ack, Ok(Ack::CancelRejected));

    engine.shutdown().await;
    let deletes: Vec<(u32, bool)> = log
        .take()
        .into_iter()
        .filter_map(|e| match e {
            Event::Deleted { order_id, success, .. } => Some((order_id.0, success)),
            _ => None,
        })
        .collect();
    assert_eq!(deletes, vec![(999, false), (998, false)]);
}

#[tokio::test]
async fn test_fifo_at_equal_price() {
    let (engine, log) = start(EngineConfig::default());
    let h = engine.handle();
    let es = inst("ES");

    for id in 1..=3 {
        h.submit(OrderRequest::buy(OrderId(id), es, Price(200), Quantity(2))).await.unwrap();
    }
    h.submit(OrderRequest::buy(OrderId(4), es, Price(201), Quantity(1))).await.unwrap();
    assert_eq!(
        h.submit(OrderRequest::sell(OrderId(10), es, Price(199), Quantity(6))).await,
        Ok(Ack::Filled)
    );

    engine.shutdown().await;
    let fills: Vec<(u32, u32, u32)> = executions(&log.take())
        .into_iter()
        .map(|(resting, _, _, price, qty)| (resting, price, qty))
        .collect();
    assert_eq!(fills, vec![(4, 201, 1), (1, 200, 2), (2, 200, 2), (3, 200, 1)]);
}

#[tokio::test]
async fn test_validation_rejects() {
    let (engine, log) = start(EngineConfig::default());
    let h = engine.handle();
    let cl = inst("CL");

    let zero = OrderRequest::buy(OrderId(1), cl, Price(10), Quantity(0));
    assert_eq!(h.submit(zero).await, Ok(Ack::Rejected(RejectReason::InvalidQuantity)));

    let mut bare = OrderRequest::sell(OrderId(2), cl, Price(10), Quantity(1));
    bare.instrument = None;
    assert_eq!(h.submit(bare).await, Ok(Ack::Rejected(RejectReason::MissingInstrument)));

    h.submit(OrderRequest::sell(OrderId(3), cl, Price(10), Quantity(1))).await.unwrap();
    let dup = OrderRequest::buy(OrderId(3), inst("GC"), Price(5), Quantity(1));
    assert_eq!(h.submit(dup).await, Ok(Ack::Rejected(RejectReason::DuplicateOrderId)));

    // Once 3 is filled its id is free again
    assert_eq!(
        h.submit(OrderRequest::buy(OrderId(4), cl, Price(10), Quantity(1))).await,
        Ok(Ack::Filled)
    );
    let reuse = OrderRequest::buy(OrderId(3), cl, Price(9), Quantity(1));
    assert_eq!(h.submit(reuse).await, Ok(Ack::Resting { remaining: Quantity(1) }));

    engine.shutdown().await;
    assert_eq!(executions(&log.take()), vec![(3, 4, 1, 10, 1)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_instruments_do_not_interfere() {
    let (engine, log) = start(EngineConfig::default().with_channel_capacity(4));
    let codes = ["A", "B", "C", "D", "E", "F"];

    let mut clients = Vec::new();
    for (n, code) in codes.iter().enumerate() {
        let h = engine.handle();
        let instrument = inst(code);
        let base = (n as u32 + 1) * 10_000;
        clients.push(tokio::spawn(async move {
            for i in 0..200u32 {
                let id = OrderId(base + 2 * i);
                let buy = OrderRequest::buy(id, instrument, Price(100), Quantity(3));
                assert!(matches!(h.submit(buy).await, Ok(Ack::Resting { .. })));
                let sell = OrderRequest::sell(OrderId(id.0 + 1), instrument, Price(100), Quantity(3));
                assert_eq!(h.submit(sell).await, Ok(Ack::Filled));
            }
        }));
    }
    for client in clients {
        client.await.unwrap();
    }
    engine.shutdown().await;

    let fills = executions(&log.take());
    assert_eq!(fills.len(), codes.len() * 200);
    for (resting, incoming, count, price, qty) in fills {
        // Each sell trades only with the buy submitted just before it
        assert_eq!(incoming, resting + 1);
        assert_eq!((count, price, qty), (1, 100, 3));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_fill_after_successful_cancel() {
    let (engine, log) = start(EngineConfig::default().with_channel_capacity(2));
    let nq = inst("NQ");

    let makers = {
        let h = engine.handle();
        tokio::spawn(async move {
            for i in 0..300u32 {
                let id = OrderId(1 + i);
                let _ = h.submit(OrderRequest::sell(id, nq, Price(100 + i % 5), Quantity(2))).await;
                if i % 2 == 0 {
                    let _ = h.submit(OrderRequest::cancel(id)).await;
                }
            }
        })
    };
    let takers = {
        let h = engine.handle();
        tokio::spawn(async move {
            for i in 0..300u32 {
                let id = OrderId(100_000 + i);
                let _ = h.submit(OrderRequest::buy(id, nq, Price(104), Quantity(1))).await;
            }
        })
    };
    makers.await.unwrap();
    takers.await.unwrap();
    engine.shutdown().await;

    let mut cancelled = HashSet::new();
    for event in log.take() {
        match event {
            Event::Deleted { order_id, success: true, .. } => {
                assert!(cancelled.insert(order_id), "deleted twice: {order_id}");
            }
            Event::Executed { resting_id, .. } => {
                assert!(!cancelled.contains(&resting_id), "fill after cancel: {resting_id}");
            }
            _ => {}
        }
    }
}

/// Replays the event log into the resting book: id → (side, price, open quantity).
fn rebuild_book(events: &[Event]) -> HashMap<OrderId, (Side, Price, u32)> {
    let mut book = HashMap::new();
    for event in events {
        match *event {
            Event::Added { order, .. } => {
                book.insert(order.order_id, (order.side, order.price, order.remaining.0));
            }
            Event::Executed { resting_id, quantity, .. } => {
                let (_, _, open) = book
                    .get_mut(&resting_id)
                    .unwrap_or_else(|| panic!("execution against unknown order {resting_id}"));
                assert!(*open >= quantity.0, "order {resting_id} overfilled");
                *open -= quantity.0;
            }
            Event::Deleted { order_id, success: true, .. } => {
                book.remove(&order_id);
            }
            Event::Deleted { .. } => {}
        }
    }
    book.retain(|_, (_, _, open)| *open > 0);
    book
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_flow_never_crosses_book() {
    for round in 0..5u32 {
        let (engine, log) = start(EngineConfig::default().with_channel_capacity(4));
        let es = inst("ES");

        let mut clients = Vec::new();
        for c in 0..8u32 {
            let h = engine.handle();
            clients.push(tokio::spawn(async move {
                let mut pending = Vec::new();
                for i in 0..200u32 {
                    let id = OrderId(c * 1_000 + i + 1);
                    let side = if (i + c + round) % 2 == 0 { Side::Buy } else { Side::Sell };
                    let price = Price(90 + (i * 7 + c * 3 + round) % 21);
                    let quantity = Quantity(1 + (i + c) % 5);
                    let mut request = OrderRequest::limit(id, es, side, price, quantity);
                    // Pipelined: keep submitting while earlier requests are in flight
                    loop {
                        match h.try_submit(request) {
                            Ok(ack) => {
                                pending.push(ack);
                                break;
                            }
                            Err(TrySubmitError::Full(back)) => {
                                request = back;
                                tokio::task::yield_now().await;
                            }
                            Err(err) => panic!("engine closed: {err}"),
                        }
                    }
                }
                for ack in pending {
                    assert!(matches!(ack.await, Ok(Ack::Resting { .. } | Ack::Filled)));
                }
            }));
        }
        for client in clients {
            client.await.unwrap();
        }
        engine.shutdown().await;

        let book = rebuild_book(&log.take());
        let best_bid = book.values().filter(|(side, ..)| *side == Side::Buy).map(|(_, p, _)| *p).max();
        let best_ask = book.values().filter(|(side, ..)| *side == Side::Sell).map(|(_, p, _)| *p).min();
        if let (Some(bid), Some(ask)) = (best_bid, best_ask) {
            assert!(bid < ask, "round {round}: crossed book, bid {bid} >= ask {ask}");
        }
    }
}

#[tokio::test]
async fn test_cancel_instrument_tag_wins_over_index() {
    let (engine, log) = start(EngineConfig::default());
    let h = engine.handle();
    let (aa, bb) = (inst("AA"), inst("BB"));

    assert!(matches!(h.submit(OrderRequest::buy(OrderId(1), aa, Price(10), Quantity(5))).await, Ok(Ack::Resting { .. })));
    assert!(matches!(h.submit(OrderRequest::buy(OrderId(2), bb, Price(10), Quantity(5))).await, Ok(Ack::Resting { .. })));

    // Tagged with the wrong instrument: BB's coordinator does not know id 1
    let mis_tagged = OrderRequest::cancel(OrderId(1)).with_instrument(bb);
    assert_eq!(h.submit(mis_tagged).await, Ok(Ack::CancelRejected));
    // Tagged with an instrument that has never traded
    let unknown = OrderRequest::cancel(OrderId(1)).with_instrument(inst("CC"));
    assert_eq!(h.submit(unknown).await, Ok(Ack::CancelRejected));

    // The order still rests, and a bare cancel finds it through the index
    assert_eq!(h.submit(OrderRequest::cancel(OrderId(1))).await, Ok(Ack::Cancelled));
    engine.shutdown().await;

    let deletes: Vec<(Option<Instrument>, bool)> = log
        .take()
        .into_iter()
        .filter_map(|e| match e {
            Event::Deleted { order_id: OrderId(1), instrument, success, .. } => Some((instrument, success)),
            _ => None,
        })
        .collect();
    assert_eq!(deletes, vec![(Some(bb), false), (Some(inst("CC")), false), (Some(aa), true)]);
}

#[tokio::test]
async fn test_submit_after_shutdown() {
    let (engine, _log) = start(EngineConfig::default());
    let h = engine.handle();
    engine.shutdown().await;
    assert_eq!(
        h.submit(OrderRequest::cancel(OrderId(1))).await,
        Err(EngineError::Closed)
    );
}

#[derive(Clone, Debug)]
enum Op {
    Limit { side: Side, price: u32, qty: u32, instrument: usize },
    Cancel { target: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<bool>(), 95u32..106, 1u32..20, 0usize..2).prop_map(|(buy, price, qty, instrument)| Op::Limit {
            side: if buy { Side::Buy } else { Side::Sell },
            price,
            qty,
            instrument,
        }),
        1 => (0usize..64).prop_map(|target| Op::Cancel { target }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_quantity_conserved(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let instruments = [inst("P0"), inst("P1")];

        let (acks, events, originals) = rt.block_on(async {
            let (engine, log) = start(EngineConfig::default().with_channel_capacity(2));
            let h = engine.handle();
            let mut acks = HashMap::new();
            let mut originals = HashMap::new();
            for (n, op) in ops.iter().enumerate() {
                let id = OrderId(n as u32 + 1);
                match *op {
                    Op::Limit { side, price, qty, instrument } => {
                        let req = OrderRequest::limit(id, instruments[instrument], side, Price(price), Quantity(qty));
                        originals.insert(id, (qty, price));
                        acks.insert(id, h.submit(req).await.unwrap());
                    }
                    Op::Cancel { target } => {
                        let _ = h.submit(OrderRequest::cancel(OrderId(target as u32 + 1))).await.unwrap();
                    }
                }
            }
            engine.shutdown().await;
            (acks, log.take(), originals)
        });

        let mut incoming_filled: HashMap<OrderId, u32> = HashMap::new();
        let mut resting_filled: HashMap<OrderId, u32> = HashMap::new();
        let mut dead = HashSet::new();
        for event in &events {
            match *event {
                Event::Executed { resting_id, incoming_id, price, quantity, .. } => {
                    prop_assert!(!dead.contains(&resting_id));
                    // Trades print at the resting order's price
                    prop_assert_eq!(price.0, originals[&resting_id].1);
                    *incoming_filled.entry(incoming_id).or_default() += quantity.0;
                    *resting_filled.entry(resting_id).or_default() += quantity.0;
                }
                Event::Deleted { order_id, success: true, .. } => {
                    dead.insert(order_id);
                }
                _ => {}
            }
        }

        for (id, ack) in &acks {
            let (original, _) = originals[id];
            let taken = incoming_filled.get(id).copied().unwrap_or(0);
            let given = resting_filled.get(id).copied().unwrap_or(0);
            match *ack {
                Ack::Filled => prop_assert_eq!(taken, original),
                Ack::Resting { remaining } => {
                    prop_assert_eq!(taken + remaining.0, original);
                    prop_assert!(given <= remaining.0);
                }
                other => prop_assert!(false, "unexpected ack {:?}", other),
            }
        }
    }
}
