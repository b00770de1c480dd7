//! Submission outcomes and engine errors.

use crate::fixed::Quantity;

/// Why a request was refused before reaching a book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RejectReason {
    /// Buy or sell with zero quantity.
    InvalidQuantity = 1,
    /// Buy or sell without an instrument.
    MissingInstrument = 2,
    /// Buy or sell reusing the id of an order that is still live.
    DuplicateOrderId = 3,
    /// Frame could not be decoded into a request.
    Malformed = 4,
}

impl TryFrom<u8> for RejectReason {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            1 => Ok(RejectReason::InvalidQuantity),
            2 => Ok(RejectReason::MissingInstrument),
            3 => Ok(RejectReason::DuplicateOrderId),
            4 => Ok(RejectReason::Malformed),
            other => Err(other),
        }
    }
}

/// Completion delivered to the submitter of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ack {
    /// Order (partially filled or not) now rests with this quantity.
    Resting { remaining: Quantity },
    /// Order fully filled on arrival.
    Filled,
    /// Cancel removed a resting order.
    Cancelled,
    /// Cancel found nothing to remove.
    CancelRejected,
    /// Request refused before reaching a book.
    Rejected(RejectReason),
    /// Request reached an actor that could not handle it and was dropped.
    Dropped,
}

/// Failure to obtain a completion from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("engine is shut down")]
    Closed,
    #[error("request was abandoned during shutdown")]
    Abandoned,
}

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    ZeroCapacity { name: &'static str },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
