//! Instrument router.
//!
//! Validates client requests, resolves the instrument of bare cancels
//! through an id index, and forwards each request to its instrument's
//! coordinator. Coordinators and their actors are created on first use.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::coordinator::{spawn_instrument, InstrumentContext, Submission};
use crate::error::{Ack, RejectReason};
use crate::order::{Instrument, OrderId, OrderKind, OrderRequest};

/// A request as queued on the router's inbound channel.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) request: OrderRequest,
    pub(crate) done: oneshot::Sender<Ack>,
}

pub(crate) struct Router {
    ctx: InstrumentContext,
    inbox: mpsc::Receiver<Envelope>,
    coordinators: HashMap<Instrument, mpsc::Sender<Submission>>,
    /// Live order id → instrument.
    instruments: HashMap<OrderId, Instrument>,
    deletions: mpsc::UnboundedReceiver<OrderId>,
    tasks: JoinSet<()>,
}

impl Router {
    /// `ctx.router_deletions` must feed `deletions`.
    pub(crate) fn new(
        ctx: InstrumentContext,
        inbox: mpsc::Receiver<Envelope>,
        deletions: mpsc::UnboundedReceiver<OrderId>,
    ) -> Self {
        Self {
            ctx,
            inbox,
            coordinators: HashMap::new(),
            instruments: HashMap::new(),
            deletions,
            tasks: JoinSet::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        info!("router started");
        loop {
            tokio::select! {
                biased;
                _ = self.ctx.shutdown.wait() => break,
                Some(order_id) = self.deletions.recv() => {
                    self.instruments.remove(&order_id);
                }
                envelope = self.inbox.recv() => {
                    let Some(envelope) = envelope else { break };
                    if !self.route(envelope).await {
                        break;
                    }
                }
            }
        }

        // Dropping our senders lets idle coordinators see a closed inbox too.
        self.coordinators.clear();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "instrument task failed");
            }
        }
        info!(live_orders = self.instruments.len(), "router stopped");
    }

    /// Returns false once the engine is shutting down.
    async fn route(&mut self, envelope: Envelope) -> bool {
        let Envelope { mut request, done } = envelope;

        let instrument = match request.kind {
            OrderKind::Cancel => {
                let known = request
                    .instrument
                    .or_else(|| self.instruments.get(&request.order_id).copied());
                match known {
                    Some(instrument) if self.coordinators.contains_key(&instrument) => instrument,
                    _ => {
                        self.reject_cancel(request.order_id, known, done);
                        return true;
                    }
                }
            }
            OrderKind::Buy | OrderKind::Sell => match self.validate(&request) {
                Ok(instrument) => {
                    self.instruments.insert(request.order_id, instrument);
                    instrument
                }
                Err(reason) => {
                    warn!(order_id = request.order_id.0, ?reason, "request rejected");
                    let _ = done.send(Ack::Rejected(reason));
                    return true;
                }
            },
        };
        request.instrument = Some(instrument);

        let coordinator = match self.coordinators.get(&instrument) {
            Some(tx) => tx.clone(),
            None => {
                let tx = spawn_instrument(instrument, &self.ctx, &mut self.tasks);
                self.coordinators.insert(instrument, tx.clone());
                tx
            }
        };

        debug!(order_id = request.order_id.0, %instrument, kind = ?request.kind, "routing");
        // Keep applying deletions while the coordinator pushes back.
        loop {
            tokio::select! {
                biased;
                _ = self.ctx.shutdown.wait() => return false,
                Some(order_id) = self.deletions.recv() => {
                    self.instruments.remove(&order_id);
                }
                permit = coordinator.reserve() => {
                    return match permit {
                        Ok(permit) => {
                            permit.send(Submission { request, done });
                            true
                        }
                        Err(_) => false,
                    };
                }
            }
        }
    }

    fn validate(&self, request: &OrderRequest) -> Result<Instrument, RejectReason> {
        if request.quantity.is_zero() {
            return Err(RejectReason::InvalidQuantity);
        }
        let instrument = request.instrument.ok_or(RejectReason::MissingInstrument)?;
        if self.instruments.contains_key(&request.order_id) {
            return Err(RejectReason::DuplicateOrderId);
        }
        Ok(instrument)
    }

    fn reject_cancel(&self, order_id: OrderId, instrument: Option<Instrument>, done: oneshot::Sender<Ack>) {
        debug!(order_id = order_id.0, "cancel for unknown order");
        self.ctx
            .sink
            .order_deleted(order_id, instrument, false, self.ctx.clock.now());
        let _ = done.send(Ack::CancelRejected);
    }
}
