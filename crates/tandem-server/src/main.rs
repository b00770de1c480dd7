//! Tandem server: TCP order entry in front of the matching engine,
//! with book events published over UDP.

mod config;
mod logging;

use std::error::Error;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use tandem_core::{Engine, EventSink, TracingSink};
use tandem_feed::Publisher;
use tandem_net::Gateway;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::logging::LogFormat;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    logging::init(LogFormat::from_env())?;

    let config = ServerConfig::from_env()?;
    info!(?config, "starting tandem server");

    let sink: Arc<dyn EventSink> = match config.feed_addr {
        Some(addr) => {
            info!(%addr, "publishing market data");
            Arc::new(Publisher::new(addr)?)
        }
        None => Arc::new(TracingSink),
    };

    let engine = Engine::start(config.engine, sink)?;
    let mut gateway = Gateway::bind(config.listen_addr, engine.handle(), config.gateway)?;
    info!(addr = %gateway.local_addr(), "gateway listening");

    let stop = gateway.shutdown_handle();
    let core = config.gateway_core;
    let gateway_thread = thread::Builder::new()
        .name("tandem-gateway".into())
        .spawn(move || {
            if let Some(core) = core {
                pin_to_core(core);
            }
            if let Err(e) = gateway.run() {
                error!(error = %e, "gateway stopped");
            }
        })?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    stop.store(true, Ordering::Release);
    if gateway_thread.join().is_err() {
        error!("gateway thread panicked");
    }
    engine.shutdown().await;

    info!("stopped");
    Ok(())
}

fn pin_to_core(core: usize) {
    let target = core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|id| id.id == core));
    match target {
        Some(id) if core_affinity::set_for_current(id) => info!(core, "gateway pinned"),
        _ => warn!(core, "could not pin gateway thread"),
    }
}
