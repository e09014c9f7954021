//! Relay error types.
//!
//! [`RelayError`] is the central error type of the library. Failures inside
//! the multiplexer loop never surface here: they are converted to log
//! records on the loop thread. Only configuration and start-up failures are
//! returned to callers.

use std::net::SocketAddr;

/// Error returned by configuration loading and server start-up.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// `start()` was called while the loop thread is still active.
    #[error("tcp server is already running")]
    AlreadyRunning,

    /// The listening socket (or its readiness poller) could not be set up.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The loop thread could not be spawned.
    #[error("failed to spawn tcp server thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// A configuration value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidConfig {
        /// Environment key.
        key: &'static str,
        /// Raw value that failed to parse.
        value: String,
    },

    /// Any other I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            RelayError::AlreadyRunning.to_string(),
            "tcp server is already running"
        );

        let err = RelayError::InvalidConfig {
            key: "TCP_LISTEN_ADDR",
            value: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "invalid value for TCP_LISTEN_ADDR: \"nope\"");
    }

    #[test]
    fn bind_error_keeps_source() {
        use std::error::Error as _;

        let err = RelayError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 16666)),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().starts_with("failed to bind 127.0.0.1:16666"));
        assert!(err.source().is_some());
    }
}
