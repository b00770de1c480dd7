//! Latency and event metrics for the matching engine.
//!
//! Submit-to-ack latencies go into an HdrHistogram; book events are
//! counted by [`EventCounters`], which sits in front of any other sink.

use std::fmt;

use hdrhistogram::{CreationError, Histogram};

pub mod counters;

pub use counters::{CounterSnapshot, EventCounters};

/// Nanosecond latency distribution.
pub struct LatencyHistogram {
    inner: Histogram<u64>,
}

impl LatencyHistogram {
    /// Auto-resizing histogram with 3 significant digits.
    pub fn new() -> Result<Self, CreationError> {
        Self::with_precision(3)
    }

    /// `sigfig` must be between 0 and 5.
    pub fn with_precision(sigfig: u8) -> Result<Self, CreationError> {
        Histogram::new(sigfig).map(|inner| Self { inner })
    }

    #[inline(always)]
    pub fn record(&mut self, nanos: u64) {
        // Auto-resizing, so recording cannot go out of range
        let _ = self.inner.record(nanos);
    }

    /// Fold in samples taken by another client.
    pub fn merge(&mut self, other: &LatencyHistogram) {
        let _ = self.inner.add(&other.inner);
    }

    /// Latency at `percentile` (0.0 to 100.0).
    pub fn percentile(&self, percentile: f64) -> u64 {
        self.inner.value_at_quantile(percentile / 100.0)
    }

    pub fn count(&self) -> u64 {
        self.inner.len()
    }

    pub fn clear(&mut self) {
        self.inner.reset();
    }

    pub fn summary(&self) -> Summary {
        Summary {
            count: self.count(),
            min: self.inner.min(),
            p50: self.percentile(50.0),
            p90: self.percentile(90.0),
            p99: self.percentile(99.0),
            p999: self.percentile(99.9),
            max: self.inner.max(),
            mean: self.inner.mean(),
        }
    }
}

/// Render nanoseconds in the largest unit that keeps the value above one.
pub fn format_nanos(nanos: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "s"), (1_000_000, "ms"), (1_000, "μs")];
    for (scale, unit) in UNITS {
        if nanos >= scale {
            return format!("{:.2} {unit}", nanos as f64 / scale as f64);
        }
    }
    format!("{nanos} ns")
}

/// Percentiles of a [`LatencyHistogram`], in nanoseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub count: u64,
    pub min: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
    pub mean: f64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Samples: {:>10}", self.count)?;
        let rows = [
            ("Min:", self.min),
            ("P50:", self.p50),
            ("P90:", self.p90),
            ("P99:", self.p99),
            ("P99.9:", self.p999),
        ];
        for (label, nanos) in rows {
            writeln!(f, "  {label:<8} {:>10}", format_nanos(nanos))?;
        }
        write!(f, "  {:<8} {:>10}", "Max:", format_nanos(self.max))
    }
}

/// Cheap timestamps for per-request timing, read from the TSC where available.
pub struct Stopwatch {
    clock: quanta::Clock,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            clock: quanta::Clock::new(),
        }
    }

    /// Opaque start mark for [`Stopwatch::elapsed_nanos`].
    #[inline(always)]
    pub fn start(&self) -> u64 {
        self.clock.raw()
    }

    #[inline(always)]
    pub fn elapsed_nanos(&self, start: u64) -> u64 {
        self.clock.delta_as_nanos(start, self.clock.raw())
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
