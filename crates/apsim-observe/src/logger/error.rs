use thiserror::Error;
use tracing_subscriber::{filter::ParseError, util::TryInitError};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}' (expected text, json or journald)")]
    InvalidFormat(String),

    #[error("journald output needs Linux and the `journald` feature")]
    JournaldNotSupported,

    #[cfg(all(target_os = "linux", feature = "journald"))]
    #[error("cannot connect to journald")]
    JournaldUnavailable(#[source] std::io::Error),

    #[error("log filter is empty")]
    EmptyFilter,

    #[error("invalid log filter '{directive}'")]
    InvalidFilter {
        directive: String,
        #[source]
        source: ParseError,
    },

    #[error("a global logger is already installed")]
    AlreadyInitialized(#[source] TryInitError),
}
