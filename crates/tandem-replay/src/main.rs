//! Tandem Replay - synthetic order flow through the matching engine.
//!
//! Several clients submit seeded buy/sell/cancel streams concurrently
//! across many instruments and measure submit-to-ack latency.

mod workload;

use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use tandem_core::config::env_or;
use tandem_core::{
    Ack, Engine, EngineConfig, EngineHandle, EventSink, Instrument, Order, OrderId, OrderRequest,
    Price, Quantity,
};
use tandem_metrics::{EventCounters, LatencyHistogram, Stopwatch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::workload::WorkloadConfig;

/// Drops every event; only the counters in front of it matter here.
struct Discard;

impl EventSink for Discard {
    fn order_added(&self, _order: &Order, _timestamp: u64) {}

    fn order_deleted(&self, _order_id: OrderId, _instrument: Option<Instrument>, _success: bool, _timestamp: u64) {}

    fn order_executed(
        &self,
        _resting_id: OrderId,
        _incoming_id: OrderId,
        _execution_count: u32,
        _price: Price,
        _quantity: Quantity,
        _timestamp: u64,
    ) {
    }
}

/// Completions seen by one client.
#[derive(Debug, Default, Clone, Copy)]
struct AckTally {
    resting: u64,
    filled: u64,
    cancelled: u64,
    cancel_rejected: u64,
    rejected: u64,
    dropped: u64,
}

impl AckTally {
    fn record(&mut self, ack: Ack) {
        match ack {
            Ack::Resting { .. } => self.resting += 1,
            Ack::Filled => self.filled += 1,
            Ack::Cancelled => self.cancelled += 1,
            Ack::CancelRejected => self.cancel_rejected += 1,
            Ack::Rejected(_) => self.rejected += 1,
            Ack::Dropped => self.dropped += 1,
        }
    }

    /// Requests refused or dropped before reaching a book.
    fn unreached(&self) -> u64 {
        self.rejected + self.dropped
    }

    fn merge(&mut self, other: AckTally) {
        self.resting += other.resting;
        self.filled += other.filled;
        self.cancelled += other.cancelled;
        self.cancel_rejected += other.cancel_rejected;
        self.rejected += other.rejected;
        self.dropped += other.dropped;
    }
}

fn workload_from_env() -> Result<WorkloadConfig, Box<dyn Error>> {
    let defaults = WorkloadConfig::default();
    Ok(WorkloadConfig {
        seed: env_or("TANDEM_REPLAY_SEED", defaults.seed)?,
        clients: env_or("TANDEM_REPLAY_CLIENTS", defaults.clients)?,
        orders_per_client: env_or("TANDEM_REPLAY_ORDERS", defaults.orders_per_client)?,
        instruments: env_or("TANDEM_REPLAY_INSTRUMENTS", defaults.instruments)?,
        cancel_percent: env_or("TANDEM_REPLAY_CANCEL_PERCENT", defaults.cancel_percent)?,
        ..defaults
    })
}

async fn run_client(
    handle: EngineHandle,
    requests: Vec<OrderRequest>,
) -> Result<(LatencyHistogram, AckTally), Box<dyn Error + Send + Sync>> {
    let mut latency = LatencyHistogram::new()?;
    let mut tally = AckTally::default();
    let watch = Stopwatch::new();

    for request in requests {
        let start = watch.start();
        let ack = handle.submit(request).await?;
        latency.record(watch.elapsed_nanos(start));
        tally.record(ack);
    }
    Ok((latency, tally))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    TANDEM REPLAY ENGINE                      ║");
    println!("║         Concurrent Matching Engine Benchmark                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let workload = workload_from_env()?;
    let engine_config = EngineConfig::from_env()?;

    println!("[1/3] Generating workload...");
    let streams = workload::generate(&workload)?;
    let total: usize = streams.iter().map(Vec::len).sum();
    println!(
        "   {} clients x {} requests over {} instruments (seed {})",
        workload.clients, workload.orders_per_client, workload.instruments, workload.seed
    );

    let counters = Arc::new(EventCounters::new(Discard));
    let engine = Engine::start(engine_config, counters.clone())?;
    info!(requests = total, clients = workload.clients, "replay started");

    println!("[2/3] Replaying...");
    let start = Instant::now();
    let clients: Vec<_> = streams
        .into_iter()
        .map(|stream| tokio::spawn(run_client(engine.handle(), stream)))
        .collect();

    let mut latency = LatencyHistogram::new()?;
    let mut tally = AckTally::default();
    for client in clients {
        let (client_latency, client_tally) = client.await?.map_err(|e| e.to_string())?;
        latency.merge(&client_latency);
        tally.merge(client_tally);
    }
    let elapsed = start.elapsed();
    let rate = total as f64 / elapsed.as_secs_f64();
    info!(?elapsed, rate = rate as u64, "replay finished");
    if tally.unreached() > 0 {
        warn!(rejected = tally.rejected, dropped = tally.dropped, "requests did not reach a book");
    }

    println!("[3/3] Shutting down...");
    engine.shutdown().await;

    println!("\n   Processed {} requests in {:.2?}", total, elapsed);
    println!("   Rate: {:.0} requests/sec", rate);
    println!("   Submit-to-ack latency");
    println!("{}", latency.summary());
    println!("   Book events");
    println!("{}", counters.snapshot());

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                      REPLAY SUMMARY                          ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Rate:            {:>12.0} requests/sec                  ║", rate);
    println!("║  Resting:         {:>12}                               ║", tally.resting);
    println!("║  Filled:          {:>12}                               ║", tally.filled);
    println!("║  Cancelled:       {:>12}                               ║", tally.cancelled);
    println!("║  Cancel rejected: {:>12}                               ║", tally.cancel_rejected);
    println!("║  Rejected:        {:>12}                               ║", tally.rejected);
    println!("║  Dropped:         {:>12}                               ║", tally.dropped);
    println!("╚══════════════════════════════════════════════════════════════╝");

    Ok(())
}
