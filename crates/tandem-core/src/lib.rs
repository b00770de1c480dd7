//! # Tandem Core
//!
//! Concurrent limit-order matching engine.
//!
//! ## Design Principles
//! - Two actors per instrument, each owning the book of the opposite side
//! - Message passing only; books are never shared or locked
//! - Per-side hand-off tokens keep crossing operations apart and let
//!   independent ones run in parallel
//! - Lazy deletion: cancels zero an order in place, scans pop it later
//! - Integer prices and quantities (no floats)

pub mod actor;
pub mod book;
pub mod clock;
pub mod config;
mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod fixed;
mod handoff;
pub mod order;
pub mod pool;
mod router;
pub mod shutdown;

pub use actor::SideBook;
pub use book::PriorityBook;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::EngineConfig;
pub use engine::{Engine, EngineHandle, Pending, TrySubmitError};
pub use error::{Ack, ConfigError, EngineError, RejectReason};
pub use events::{Event, EventLog, EventSink, TracingSink};
pub use fixed::{Price, Quantity};
pub use order::{Instrument, InstrumentError, Order, OrderId, OrderKind, OrderRequest, Side};
pub use pool::{OrderHandle, OrderPool};
