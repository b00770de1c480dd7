//! Tracing subscriber setup.

use std::env;
use std::error::Error;

use tracing_subscriber::{fmt, EnvFilter};

/// Output format, from `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line output.
    #[default]
    Compact,
    /// Multi-line human-readable output.
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }

    pub fn from_env() -> Self {
        env::var("LOG_FORMAT").map(|s| Self::parse(&s)).unwrap_or_default()
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the `info` default.
pub fn init(format: LogFormat) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_thread_names(true);

    match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    }
}
