//! Per-instrument coordinator.
//!
//! Serializes the hand-off between the two side actors of one instrument.
//! Before a buy is dispatched the coordinator takes the buy token; if a sell
//! that could cross the buy is still in flight it also waits for the sell
//! token. Sells are symmetric. Orders that cannot touch each other run in
//! parallel on the two actors.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::actor::{Command, DeletionNotifier, SideActor, SideBook};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::Ack;
use crate::events::EventSink;
use crate::fixed::Price;
use crate::handoff::{HandOff, InFlight, Ticket};
use crate::order::{Instrument, Order, OrderId, OrderKind, OrderRequest, Side};
use crate::shutdown::ShutdownSignal;

/// A validated request on its way to a coordinator.
#[derive(Debug)]
pub(crate) struct Submission {
    pub(crate) request: OrderRequest,
    pub(crate) done: oneshot::Sender<Ack>,
}

/// Shared pieces every instrument needs.
#[derive(Clone)]
pub(crate) struct InstrumentContext {
    pub(crate) config: EngineConfig,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) router_deletions: mpsc::UnboundedSender<OrderId>,
    pub(crate) shutdown: ShutdownSignal,
}

pub(crate) struct Coordinator {
    instrument: Instrument,
    inbox: mpsc::Receiver<Submission>,
    /// Indexed by the side each actor matches.
    actors: [mpsc::Sender<Command>; 2],
    handoff: HandOff,
    /// Resting (or about to rest) order id → matching side of the owning actor.
    owners: HashMap<OrderId, Side>,
    deletions: mpsc::UnboundedReceiver<OrderId>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownSignal,
}

/// Start the coordinator and both side actors of `instrument`.
///
/// Returns the coordinator's inbound sender.
pub(crate) fn spawn_instrument(
    instrument: Instrument,
    ctx: &InstrumentContext,
    tasks: &mut JoinSet<()>,
) -> mpsc::Sender<Submission> {
    let capacity = ctx.config.channel_capacity;
    let (submit_tx, submit_rx) = mpsc::channel(capacity);
    let (buy_tx, buy_rx) = mpsc::channel(capacity);
    let (sell_tx, sell_rx) = mpsc::channel(capacity);
    let (deletion_tx, deletion_rx) = mpsc::unbounded_channel();
    let notifier = DeletionNotifier::new(deletion_tx, ctx.router_deletions.clone());

    let buy_actor = SideActor::new(
        SideBook::new(Side::Buy, ctx.sink.clone(), ctx.clock.clone()),
        buy_rx,
        sell_tx.clone(),
        notifier.clone(),
        ctx.shutdown.clone(),
    );
    let sell_actor = SideActor::new(
        SideBook::new(Side::Sell, ctx.sink.clone(), ctx.clock.clone()),
        sell_rx,
        buy_tx.clone(),
        notifier,
        ctx.shutdown.clone(),
    );
    let coordinator = Coordinator {
        instrument,
        inbox: submit_rx,
        actors: [buy_tx, sell_tx],
        handoff: HandOff::new(),
        owners: HashMap::new(),
        deletions: deletion_rx,
        sink: ctx.sink.clone(),
        clock: ctx.clock.clone(),
        shutdown: ctx.shutdown.clone(),
    };

    tasks.spawn(buy_actor.run());
    tasks.spawn(sell_actor.run());
    tasks.spawn(coordinator.run());
    debug!(%instrument, "instrument started");

    submit_tx
}

impl Coordinator {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                Some(order_id) = self.deletions.recv() => {
                    self.owners.remove(&order_id);
                }
                submission = self.inbox.recv() => {
                    let Some(submission) = submission else { break };
                    if !self.handle(submission).await {
                        break;
                    }
                }
            }
        }
        debug!(instrument = %self.instrument, tracked = self.owners.len(), "coordinator stopped");
    }

    /// Returns false once the instrument is shutting down.
    async fn handle(&mut self, submission: Submission) -> bool {
        let Submission { request, done } = submission;
        match request.kind {
            OrderKind::Buy => self.dispatch(Side::Buy, request, done).await,
            OrderKind::Sell => self.dispatch(Side::Sell, request, done).await,
            OrderKind::Cancel => self.cancel(request.order_id, done).await,
        }
    }

    async fn dispatch(&mut self, side: Side, request: OrderRequest, done: oneshot::Sender<Ack>) -> bool {
        let Some(in_flight) = self.acquire(side).await else {
            return false;
        };

        // A remainder rests in the book of the actor matching the other side.
        let contra = side.opposite();
        self.owners.insert(request.order_id, contra);

        if let Some(contra_price) = self.handoff.in_flight_price(contra) {
            let may_cross = match side {
                Side::Buy => Price::crosses(request.price, contra_price),
                Side::Sell => Price::crosses(contra_price, request.price),
            };
            if may_cross {
                trace!(order_id = request.order_id.0, %side, "waiting on contra side");
                match self.acquire(contra).await {
                    Some(contra_token) => drop(contra_token),
                    None => return false,
                }
            }
        }

        in_flight.set_price(request.price);
        let order = Order::new(request.order_id, self.instrument, side, request.price, request.quantity);
        let ticket = Ticket::new(done, Some(in_flight));
        self.actors[side.index()]
            .send(Command::Match { order, ticket })
            .await
            .is_ok()
    }

    async fn cancel(&mut self, order_id: OrderId, done: oneshot::Sender<Ack>) -> bool {
        let Some(owner) = self.owners.remove(&order_id) else {
            self.sink
                .order_deleted(order_id, Some(self.instrument), false, self.clock.now());
            let _ = done.send(Ack::CancelRejected);
            return true;
        };

        // The order's own side token: its insertion may still be in flight.
        let Some(in_flight) = self.acquire(owner.opposite()).await else {
            return false;
        };
        let ticket = Ticket::new(done, Some(in_flight));
        self.actors[owner.index()]
            .send(Command::Cancel {
                order_id,
                instrument: self.instrument,
                ticket,
            })
            .await
            .is_ok()
    }

    /// Wait for a token, applying deletion notifications meanwhile.
    async fn acquire(&mut self, side: Side) -> Option<InFlight> {
        let acquire = self.handoff.acquire(side);
        tokio::pin!(acquire);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.wait() => return None,
                Some(order_id) = self.deletions.recv() => {
                    self.owners.remove(&order_id);
                }
                token = &mut acquire => return token,
            }
        }
    }
}
