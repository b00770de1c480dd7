//! Order types shared by the router, coordinators and side actors.

use core::fmt;

use arrayvec::ArrayString;

use crate::fixed::{Price, Quantity};

/// Longest instrument code accepted, in bytes.
pub const MAX_INSTRUMENT_LEN: usize = 16;

/// Side of the book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Bid side (buyers).
    Buy = 0,
    /// Ask side (sellers).
    Sell = 1,
}

impl Side {
    /// Get the opposite side.
    #[inline(always)]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Array slot for per-side state.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Side {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(Side::Buy),
            1 => Ok(Side::Sell),
            other => Err(other),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

/// What a client request asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderKind {
    Buy,
    Sell,
    Cancel,
}

impl OrderKind {
    /// Book side for buy/sell requests, `None` for cancels.
    #[inline(always)]
    pub const fn side(self) -> Option<Side> {
        match self {
            OrderKind::Buy => Some(Side::Buy),
            OrderKind::Sell => Some(Side::Sell),
            OrderKind::Cancel => None,
        }
    }
}

impl From<Side> for OrderKind {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => OrderKind::Buy,
            Side::Sell => OrderKind::Sell,
        }
    }
}

/// Caller-assigned order identifier, unique across all instruments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct OrderId(pub u32);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error building an [`Instrument`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InstrumentError {
    #[error("instrument code is empty")]
    Empty,
    #[error("instrument code longer than 16 bytes")]
    TooLong,
    #[error("instrument code must be printable ASCII")]
    NotAscii,
}

/// Instrument code, stored inline so orders stay `Copy`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instrument(ArrayString<MAX_INSTRUMENT_LEN>);

impl Instrument {
    /// Build from a code such as `"AAPL"`.
    pub fn new(code: &str) -> Result<Self, InstrumentError> {
        if code.is_empty() {
            return Err(InstrumentError::Empty);
        }
        if !code.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(InstrumentError::NotAscii);
        }
        ArrayString::from(code)
            .map(Self)
            .map_err(|_| InstrumentError::TooLong)
    }

    /// Decode a NUL-padded wire field. An all-NUL field means "no instrument".
    pub fn from_padded(bytes: &[u8]) -> Result<Option<Self>, InstrumentError> {
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        if len == 0 {
            return Ok(None);
        }
        if bytes[len..].iter().any(|&b| b != 0) {
            return Err(InstrumentError::NotAscii);
        }
        let code = core::str::from_utf8(&bytes[..len]).map_err(|_| InstrumentError::NotAscii)?;
        Self::new(code).map(Some)
    }

    /// Encode as a NUL-padded wire field.
    pub fn to_padded(&self) -> [u8; MAX_INSTRUMENT_LEN] {
        let mut out = [0u8; MAX_INSTRUMENT_LEN];
        out[..self.0.len()].copy_from_slice(self.0.as_bytes());
        out
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<&str> for Instrument {
    type Error = InstrumentError;

    fn try_from(code: &str) -> Result<Self, InstrumentError> {
        Self::new(code)
    }
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0.as_str(), f)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// A client request as decoded at the transport boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderRequest {
    pub order_id: OrderId,
    /// Optional for cancels; resolved by the router's id index.
    pub instrument: Option<Instrument>,
    pub kind: OrderKind,
    pub price: Price,
    pub quantity: Quantity,
}

impl OrderRequest {
    /// New limit order on `side`.
    pub fn limit(order_id: OrderId, instrument: Instrument, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            order_id,
            instrument: Some(instrument),
            kind: side.into(),
            price,
            quantity,
        }
    }

    pub fn buy(order_id: OrderId, instrument: Instrument, price: Price, quantity: Quantity) -> Self {
        Self::limit(order_id, instrument, Side::Buy, price, quantity)
    }

    pub fn sell(order_id: OrderId, instrument: Instrument, price: Price, quantity: Quantity) -> Self {
        Self::limit(order_id, instrument, Side::Sell, price, quantity)
    }

    /// Cancel by id alone.
    pub fn cancel(order_id: OrderId) -> Self {
        Self {
            order_id,
            instrument: None,
            kind: OrderKind::Cancel,
            price: Price::ZERO,
            quantity: Quantity::ZERO,
        }
    }

    pub fn with_instrument(mut self, instrument: Instrument) -> Self {
        self.instrument = Some(instrument);
        self
    }
}

/// Matching state of a single order.
///
/// `timestamp` is set when the order is accepted into a resting book; an
/// incoming order that never rests keeps the value 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub instrument: Instrument,
    pub side: Side,
    pub price: Price,
    /// Zero means filled or cancelled.
    pub remaining: Quantity,
    pub timestamp: u64,
    /// Fills received while resting.
    pub execution_count: u32,
}

impl Order {
    /// Create a new, not yet resting order.
    pub fn new(order_id: OrderId, instrument: Instrument, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            order_id,
            instrument,
            side,
            price,
            remaining: quantity,
            timestamp: 0,
            execution_count: 0,
        }
    }

    /// Check whether the order is dead (filled or cancelled).
    #[inline(always)]
    pub const fn is_done(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Fill the order by the given quantity.
    ///
    /// # Panics
    /// Debug-panics if qty > remaining.
    #[inline(always)]
    pub fn fill(&mut self, qty: Quantity) {
        debug_assert!(qty <= self.remaining, "Fill quantity exceeds remaining");
        self.remaining = self.remaining.saturating_sub(qty);
    }
}
