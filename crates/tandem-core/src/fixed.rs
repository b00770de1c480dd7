//! Integer prices and quantities.
//!
//! Prices are compared exactly; there is no tick scaling and no floating
//! point anywhere in the matching path.

use core::fmt;

/// Limit price in integer units, as carried on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Price(pub u32);

impl Price {
    pub const ZERO: Self = Self(0);

    /// Whether a buy limited at `bid` can trade with a sell limited at `ask`.
    /// Holds for either aggressor.
    #[inline(always)]
    pub const fn crosses(bid: Price, ask: Price) -> bool {
        bid.0 >= ask.0
    }
}

impl From<u32> for Price {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Open quantity of an order. Zero marks a dead order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Quantity(pub u32);

impl Quantity {
    pub const ZERO: Self = Self(0);

    #[inline(always)]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Quantity left after filling `fill`, never below zero.
    #[inline(always)]
    pub const fn saturating_sub(self, fill: Self) -> Self {
        Self(self.0.saturating_sub(fill.0))
    }
}

impl From<u32> for Quantity {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
