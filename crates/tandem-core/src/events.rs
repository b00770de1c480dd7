//! Event sink boundary.
//!
//! Side actors report every book change through an [`EventSink`]. Sinks are
//! fire-and-forget: they must not block for long and cannot fail in a way
//! that rolls back matching state.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::fixed::{Price, Quantity};
use crate::order::{Instrument, Order, OrderId};

/// Receiver of book events. Called from side actor tasks.
pub trait EventSink: Send + Sync + 'static {
    /// An order started resting.
    fn order_added(&self, order: &Order, timestamp: u64);

    /// A cancel was processed. `success` is false if the order was already gone.
    fn order_deleted(&self, order_id: OrderId, instrument: Option<Instrument>, success: bool, timestamp: u64);

    /// A resting order traded against an incoming one, at the resting price.
    fn order_executed(
        &self,
        resting_id: OrderId,
        incoming_id: OrderId,
        execution_count: u32,
        price: Price,
        quantity: Quantity,
        timestamp: u64,
    );
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn order_added(&self, order: &Order, timestamp: u64) {
        (**self).order_added(order, timestamp)
    }

    fn order_deleted(&self, order_id: OrderId, instrument: Option<Instrument>, success: bool, timestamp: u64) {
        (**self).order_deleted(order_id, instrument, success, timestamp)
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
        (**self).order_executed(resting_id, incoming_id, execution_count, price, quantity, timestamp)
    }
}

/// Owned form of a sink call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Added {
        order: Order,
        timestamp: u64,
    },
    Deleted {
        order_id: OrderId,
        instrument: Option<Instrument>,
        success: bool,
        timestamp: u64,
    },
    Executed {
        resting_id: OrderId,
        incoming_id: OrderId,
        execution_count: u32,
        price: Price,
        quantity: Quantity,
        timestamp: u64,
    },
}

/// Sink that keeps every event in memory. Used by tests and the replay tool.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<Event>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        // A panic while holding the lock leaves a Vec that is still valid.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: Event) {
        self.lock().push(event);
    }

    /// Copy of everything recorded so far, in arrival order.
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl EventSink for EventLog {
    fn order_added(&self, order: &Order, timestamp: u64) {
        self.record(Event::Added { order: *order, timestamp });
    }

    fn order_deleted(&self, order_id: OrderId, instrument: Option<Instrument>, success: bool, timestamp: u64) {
        self.record(Event::Deleted { order_id, instrument, success, timestamp });
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
        self.record(Event::Executed {
            resting_id,
            incoming_id,
            execution_count,
            price,
            quantity,
            timestamp,
        });
    }
}

/// Sink that writes each event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn order_added(&self, order: &Order, timestamp: u64) {
        tracing::info!(
            target: "tandem::events",
            order_id = order.order_id.0,
            instrument = %order.instrument,
            side = %order.side,
            price = order.price.0,
            quantity = order.remaining.0,
            timestamp,
            "order added"
        );
    }

    fn order_deleted(&self, order_id: OrderId, instrument: Option<Instrument>, success: bool, timestamp: u64) {
        tracing::info!(
            target: "tandem::events",
            order_id = order_id.0,
            instrument = instrument.as_ref().map(Instrument::as_str).unwrap_or("-"),
            success,
            timestamp,
            "order deleted"
        );
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
        tracing::info!(
            target: "tandem::events",
            resting_id = resting_id.0,
            incoming_id = incoming_id.0,
            execution_count,
            price = price.0,
            quantity = quantity.0,
            timestamp,
            "order executed"
        );
    }
}
