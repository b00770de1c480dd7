//! Side actors.
//!
//! Each instrument runs two actors. The buy-matching actor owns the book of
//! resting sells and matches incoming buys against it; the sell-matching
//! actor owns the resting buys. Whatever an incoming order does not fill is
//! handed to the sibling, which rests it in the book it owns.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::book::PriorityBook;
use crate::clock::Clock;
use crate::error::Ack;
use crate::events::EventSink;
use crate::fixed::{Price, Quantity};
use crate::handoff::Ticket;
use crate::order::{Instrument, Order, OrderId, Side};
use crate::pool::OrderHandle;
use crate::shutdown::ShutdownSignal;

/// Message handled by a side actor.
#[derive(Debug)]
pub(crate) enum Command {
    /// New order of the actor's matching direction.
    Match { order: Order, ticket: Ticket },
    /// Remainder forwarded by the sibling, to rest in this actor's book.
    Insert { order: Order, ticket: Ticket },
    /// Remove a resting order from this actor's book.
    Cancel {
        order_id: OrderId,
        instrument: Instrument,
        ticket: Ticket,
    },
}

/// Tells the coordinator and the router that an id left the books.
#[derive(Clone, Debug)]
pub(crate) struct DeletionNotifier {
    coordinator: mpsc::UnboundedSender<OrderId>,
    router: mpsc::UnboundedSender<OrderId>,
}

impl DeletionNotifier {
    pub(crate) fn new(
        coordinator: mpsc::UnboundedSender<OrderId>,
        router: mpsc::UnboundedSender<OrderId>,
    ) -> Self {
        Self { coordinator, router }
    }

    pub(crate) fn notify(&self, order_id: OrderId) {
        // Receivers only disappear during shutdown.
        let _ = self.coordinator.send(order_id);
        let _ = self.router.send(order_id);
    }
}

/// Matching state owned by one side actor.
///
/// Synchronous and single-owner; the actor task wraps it.
pub struct SideBook {
    direction: Side,
    book: PriorityBook,
    index: HashMap<OrderId, OrderHandle>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl SideBook {
    /// State for the actor matching incoming orders of `direction`.
    /// Its book holds resting orders of the opposite side.
    pub fn new(direction: Side, sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            direction,
            book: PriorityBook::new(direction.opposite()),
            index: HashMap::new(),
            sink,
            clock,
        }
    }

    /// Side of the incoming orders this state matches.
    pub fn direction(&self) -> Side {
        self.direction
    }

    pub fn book(&self) -> &PriorityBook {
        &self.book
    }

    /// Whether `order_id` rests here with quantity left.
    pub fn contains(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    /// Match `incoming` against the book until it is filled, the book is
    /// empty, or prices no longer cross.
    ///
    /// `on_filled` receives the id of every resting order that this call
    /// fills completely.
    pub fn match_incoming(&mut self, incoming: &mut Order, mut on_filled: impl FnMut(OrderId)) {
        debug_assert_eq!(incoming.side, self.direction);

        while !incoming.is_done() {
            let Some(resting) = self.book.peek_top_mut() else {
                break;
            };

            // Lazy sweep of cancelled orders
            if resting.is_done() {
                self.book.pop();
                continue;
            }

            let (bid, ask) = match self.direction {
                Side::Buy => (incoming.price, resting.price),
                Side::Sell => (resting.price, incoming.price),
            };
            if !Price::crosses(bid, ask) {
                break;
            }

            let fill = incoming.remaining.min(resting.remaining);
            incoming.fill(fill);
            resting.fill(fill);
            resting.execution_count += 1;

            let resting_id = resting.order_id;
            let execution_count = resting.execution_count;
            let price = resting.price;
            let resting_done = resting.is_done();

            self.sink.order_executed(
                resting_id,
                incoming.order_id,
                execution_count,
                price,
                fill,
                self.clock.now(),
            );

            if resting_done {
                self.index.remove(&resting_id);
                on_filled(resting_id);
                self.book.pop();
            }
        }
    }

    /// Rest `order` in the book. Returns the quantity now resting.
    pub fn insert(&mut self, mut order: Order) -> Quantity {
        debug_assert_eq!(order.side, self.book.side());

        order.timestamp = self.clock.now();
        let handle = self.book.push(order);
        self.index.insert(order.order_id, handle);
        self.sink.order_added(&order, order.timestamp);
        order.remaining
    }

    /// Lazily delete a resting order. Returns false if it was not here.
    pub fn cancel(&mut self, order_id: OrderId, instrument: Instrument) -> bool {
        let resting = self
            .index
            .remove(&order_id)
            .and_then(|handle| self.book.get_mut(handle));

        let found = match resting {
            Some(order) => {
                order.remaining = Quantity::ZERO;
                true
            }
            None => false,
        };
        self.sink
            .order_deleted(order_id, Some(instrument), found, self.clock.now());
        found
    }
}

/// Task owning one [`SideBook`].
pub(crate) struct SideActor {
    state: SideBook,
    inbox: mpsc::Receiver<Command>,
    sibling: mpsc::Sender<Command>,
    deletions: DeletionNotifier,
    shutdown: ShutdownSignal,
}

impl SideActor {
    pub(crate) fn new(
        state: SideBook,
        inbox: mpsc::Receiver<Command>,
        sibling: mpsc::Sender<Command>,
        deletions: DeletionNotifier,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            state,
            inbox,
            sibling,
            deletions,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        let direction = self.state.direction();
        debug!(%direction, "side actor started");

        loop {
            let command = tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                command = self.inbox.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            self.handle(command).await;
        }

        debug!(%direction, resting = self.state.book().live_len(), "side actor stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Match { mut order, ticket } => {
                if order.side != self.state.direction() {
                    self.drop_misrouted("match", order.order_id, ticket);
                    return;
                }
                debug!(order_id = order.order_id.0, side = %order.side, price = order.price.0, "matching");

                let deletions = &self.deletions;
                self.state
                    .match_incoming(&mut order, |filled| deletions.notify(filled));

                if order.is_done() {
                    self.deletions.notify(order.order_id);
                    ticket.complete(Ack::Filled);
                    return;
                }

                // The sibling finishes the operation and releases the token.
                let order_id = order.order_id;
                if self.sibling.send(Command::Insert { order, ticket }).await.is_err() {
                    warn!(order_id = order_id.0, "sibling actor gone, remainder abandoned");
                }
            }
            Command::Insert { order, ticket } => {
                if order.side != self.state.book().side() {
                    self.drop_misrouted("insert", order.order_id, ticket);
                    return;
                }
                let remaining = self.state.insert(order);
                ticket.complete(Ack::Resting { remaining });
            }
            Command::Cancel {
                order_id,
                instrument,
                ticket,
            } => {
                if self.state.cancel(order_id, instrument) {
                    self.deletions.notify(order_id);
                    ticket.complete(Ack::Cancelled);
                } else {
                    ticket.complete(Ack::CancelRejected);
                }
            }
        }
    }

    fn drop_misrouted(&self, kind: &'static str, order_id: OrderId, ticket: Ticket) {
        warn!(
            order_id = order_id.0,
            kind,
            direction = %self.state.direction(),
            "misrouted message dropped"
        );
        // Routing indexes recorded this id at dispatch; let them forget it.
        self.deletions.notify(order_id);
        ticket.complete(Ack::Dropped);
    }
}
