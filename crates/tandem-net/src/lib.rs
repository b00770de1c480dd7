//! Network gateway for low-latency TCP order entry.
//!
//! Uses mio for non-blocking event-driven networking.

pub mod codec;
pub mod gateway;

pub use gateway::{Gateway, GatewayConfig, GatewayError};
