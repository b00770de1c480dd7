//! Event counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tandem_core::{EventSink, Instrument, Order, OrderId, Price, Quantity};

/// Counts book events, then forwards them to the wrapped sink.
#[derive(Debug, Default)]
pub struct EventCounters<S> {
    inner: S,
    added: AtomicU64,
    cancelled: AtomicU64,
    cancel_misses: AtomicU64,
    executions: AtomicU64,
    executed_quantity: AtomicU64,
}

impl<S: EventSink> EventCounters<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            added: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            cancel_misses: AtomicU64::new(0),
            executions: AtomicU64::new(0),
            executed_quantity: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            added: self.added.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            cancel_misses: self.cancel_misses.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            executed_quantity: self.executed_quantity.load(Ordering::Relaxed),
        }
    }
}

impl<S: EventSink> EventSink for EventCounters<S> {
    fn order_added(&self, order: &Order, timestamp: u64) {
        self.added.fetch_add(1, Ordering::Relaxed);
        self.inner.order_added(order, timestamp);
    }

    fn order_deleted(&self, order_id: OrderId, instrument: Option<Instrument>, success: bool, timestamp: u64) {
        let counter = if success { &self.cancelled } else { &self.cancel_misses };
        counter.fetch_add(1, Ordering::Relaxed);
        self.inner.order_deleted(order_id, instrument, success, timestamp);
    }

    fn order_executed(
        &self,
        resting_id: OrderId,
        incoming_id: OrderId,
        execution_count: u32,
        price: Price,
        quantity: Quantity,
        timestamp: u64,
    ) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        self.executed_quantity.fetch_add(u64::from(quantity.0), Ordering::Relaxed);
        self.inner
            .order_executed(resting_id, incoming_id, execution_count, price, quantity, timestamp);
    }
}

/// Point-in-time copy of [`EventCounters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub added: u64,
    pub cancelled: u64,
    pub cancel_misses: u64,
    pub executions: u64,
    pub executed_quantity: u64,
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Orders added:      {:>10}", self.added)?;
        writeln!(f, "  Cancels:           {:>10}", self.cancelled)?;
        writeln!(f, "  Cancel misses:     {:>10}", self.cancel_misses)?;
        writeln!(f, "  Executions:        {:>10}", self.executions)?;
        write!(f, "  Executed quantity: {:>10}", self.executed_quantity)
    }
}
