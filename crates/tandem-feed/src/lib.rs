//! Market data feed publisher.
//!
//! Publishes book events (adds, deletes, executions) via UDP unicast or
//! multicast.

pub mod publisher;

pub use publisher::Publisher;
