//! Per-instrument hand-off tokens.
//!
//! Each side has a one-permit semaphore ("buy in flight", "sell in flight")
//! and a cell holding the price of the order currently in flight on that
//! side. The coordinator takes a side's token before dispatching, and reads
//! the other side's cell to decide whether it must also wait for that side.
//! The permit travels inside the dispatched message; whichever actor
//! finishes the operation drops it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};

use crate::error::Ack;
use crate::fixed::Price;
use crate::order::Side;

/// Cell value while no priced order is in flight.
const IDLE: u64 = u64::MAX;

#[derive(Clone, Debug)]
struct Lane {
    token: Arc<Semaphore>,
    in_flight: Arc<AtomicU64>,
}

impl Lane {
    fn new() -> Self {
        Self {
            token: Arc::new(Semaphore::new(1)),
            in_flight: Arc::new(AtomicU64::new(IDLE)),
        }
    }
}

/// Both tokens of one instrument. Clones share the same tokens.
#[derive(Clone, Debug)]
pub(crate) struct HandOff {
    lanes: [Lane; 2],
}

impl HandOff {
    pub(crate) fn new() -> Self {
        Self {
            lanes: [Lane::new(), Lane::new()],
        }
    }

    /// Wait for `side`'s token. `None` only if the semaphore was closed.
    pub(crate) fn acquire(&self, side: Side) -> impl Future<Output = Option<InFlight>> + Send + 'static {
        let lane = self.lanes[side.index()].clone();
        async move {
            let permit = lane.token.acquire_owned().await.ok()?;
            Some(InFlight {
                cell: lane.in_flight,
                _permit: permit,
            })
        }
    }

    /// Price of the order in flight on `side`, if it is a priced order.
    pub(crate) fn in_flight_price(&self, side: Side) -> Option<Price> {
        match self.lanes[side.index()].in_flight.load(Ordering::Acquire) {
            IDLE => None,
            raw => Some(Price(raw as u32)),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_available(&self, side: Side) -> bool {
        self.lanes[side.index()].token.available_permits() == 1
    }
}

/// A held token. Dropping it clears the in-flight price, then frees the token.
#[derive(Debug)]
pub(crate) struct InFlight {
    cell: Arc<AtomicU64>,
    _permit: OwnedSemaphorePermit,
}

impl InFlight {
    pub(crate) fn set_price(&self, price: Price) {
        self.cell.store(u64::from(price.0), Ordering::Release);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        // Runs before the permit field is dropped.
        self.cell.store(IDLE, Ordering::Release);
    }
}

/// Completion handle carried with a dispatched request.
#[derive(Debug)]
pub(crate) struct Ticket {
    done: oneshot::Sender<Ack>,
    in_flight: Option<InFlight>,
}

impl Ticket {
    pub(crate) fn new(done: oneshot::Sender<Ack>, in_flight: Option<InFlight>) -> Self {
        Self { done, in_flight }
    }

    /// Release the token and deliver the outcome.
    pub(crate) fn complete(self, ack: Ack) {
        let Ticket { done, in_flight } = self;
        drop(in_flight);
        // The submitter may have given up waiting; nothing to do then.
        let _ = done.send(ack);
    }
}
