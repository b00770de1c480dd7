//! Engine entry point.
//!
//! [`Engine::start`] spawns the router on the current tokio runtime and
//! returns a handle. Clients submit through cloneable [`EngineHandle`]s and
//! await an [`Ack`] per request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::EngineConfig;
use crate::coordinator::InstrumentContext;
use crate::error::{Ack, ConfigError, EngineError};
use crate::events::EventSink;
use crate::order::OrderRequest;
use crate::router::{Envelope, Router};
use crate::shutdown::ShutdownSignal;

/// Running engine. Dropping it without [`Engine::shutdown`] still stops
/// every task, but without waiting for them.
pub struct Engine {
    handle: EngineHandle,
    trigger: watch::Sender<bool>,
    router: JoinHandle<()>,
}

impl Engine {
    /// Start with a [`MonotonicClock`]. Must be called inside a tokio runtime.
    pub fn start(config: EngineConfig, sink: Arc<dyn EventSink>) -> Result<Self, ConfigError> {
        Self::start_with_clock(config, sink, Arc::new(MonotonicClock::new()))
    }

    pub fn start_with_clock(
        config: EngineConfig,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (trigger, shutdown) = ShutdownSignal::channel();
        let (tx, rx) = mpsc::channel(config.router_capacity);
        let (deletion_tx, deletion_rx) = mpsc::unbounded_channel();
        let ctx = InstrumentContext {
            config,
            sink,
            clock,
            router_deletions: deletion_tx,
            shutdown,
        };
        let router = tokio::spawn(Router::new(ctx, rx, deletion_rx).run());
        info!(
            channel_capacity = config.channel_capacity,
            router_capacity = config.router_capacity,
            "engine started"
        );

        Ok(Self {
            handle: EngineHandle { tx },
            trigger,
            router,
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Signal every task to stop and wait until they have.
    ///
    /// Requests still queued are abandoned; their submitters see
    /// [`EngineError::Abandoned`].
    pub async fn shutdown(self) {
        self.trigger.send_replace(true);
        if let Err(err) = self.router.await {
            warn!(error = %err, "router task failed");
        }
        info!("engine stopped");
    }
}

/// Cloneable submission handle.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: mpsc::Sender<Envelope>,
}

impl EngineHandle {
    /// Submit and wait for the outcome. Waits for queue space if the router
    /// is backed up.
    pub async fn submit(&self, request: OrderRequest) -> Result<Ack, EngineError> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(Envelope { request, done })
            .await
            .map_err(|_| EngineError::Closed)?;
        rx.await.map_err(|_| EngineError::Abandoned)
    }

    /// Submit without waiting for queue space.
    ///
    /// On a full queue the request is handed back so the caller can retry.
    pub fn try_submit(&self, request: OrderRequest) -> Result<Pending, TrySubmitError> {
        let (done, rx) = oneshot::channel();
        match self.tx.try_send(Envelope { request, done }) {
            Ok(()) => Ok(Pending { rx }),
            Err(mpsc::error::TrySendError::Full(envelope)) => Err(TrySubmitError::Full(envelope.request)),
            Err(mpsc::error::TrySendError::Closed(envelope)) => Err(TrySubmitError::Closed(envelope.request)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Failure of [`EngineHandle::try_submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrySubmitError {
    #[error("engine queue is full")]
    Full(OrderRequest),
    #[error("engine is shut down")]
    Closed(OrderRequest),
}

impl TrySubmitError {
    pub fn into_request(self) -> OrderRequest {
        match self {
            TrySubmitError::Full(request) | TrySubmitError::Closed(request) => request,
        }
    }
}

/// Outcome of a request accepted by [`EngineHandle::try_submit`].
///
/// Await it, or poll it without blocking via [`Pending::try_ack`].
#[derive(Debug)]
pub struct Pending {
    rx: oneshot::Receiver<Ack>,
}

impl Pending {
    /// `Ok(None)` while the request is still being processed.
    pub fn try_ack(&mut self) -> Result<Option<Ack>, EngineError> {
        match self.rx.try_recv() {
            Ok(ack) => Ok(Some(ack)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(EngineError::Abandoned),
        }
    }
}

impl Future for Pending {
    type Output = Result<Ack, EngineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| EngineError::Abandoned))
    }
}
