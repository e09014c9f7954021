//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).
//!
//! | Key                   | Default         |
//! |-----------------------|-----------------|
//! | `HTTP_LISTEN_ADDR`    | `0.0.0.0:8000`  |
//! | `TCP_LISTEN_ADDR`     | `0.0.0.0:16666` |
//! | `POLL_TIMEOUT_MS`     | `1000`          |
//! | `POLL_EVENT_CAPACITY` | `1024`          |
//! | `DEBUG`               | unset           |

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::RelayError;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_TCP_ADDR: &str = "0.0.0.0:16666";

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address of the HTTP ingress (e.g. `0.0.0.0:8000`).
    pub http_listen_addr: SocketAddr,

    /// Socket address TCP subscribers connect to (e.g. `0.0.0.0:16666`).
    pub tcp_listen_addr: SocketAddr,

    /// Upper bound of one readiness poll, in milliseconds. Also bounds how
    /// long a stop request can go unobserved.
    pub poll_timeout_ms: u64,

    /// Number of readiness events fetched per poll.
    pub poll_event_capacity: usize,

    /// Verbose logging plus a listener that logs every notification.
    pub debug: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            http_listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            tcp_listen_addr: SocketAddr::from(([0, 0, 0, 0], 16666)),
            poll_timeout_ms: 1000,
            poll_event_capacity: 1024,
            debug: false,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidConfig`] if a listen address is set but
    /// cannot be parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Numeric settings fall back to their defaults on missing or invalid
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidConfig`] for an unparsable listen
    /// address.
    pub fn from_source<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let http_listen_addr = parse_addr(&lookup, "HTTP_LISTEN_ADDR", DEFAULT_HTTP_ADDR)?;
        let tcp_listen_addr = parse_addr(&lookup, "TCP_LISTEN_ADDR", DEFAULT_TCP_ADDR)?;

        let poll_timeout_ms = parse_or(&lookup, "POLL_TIMEOUT_MS", defaults.poll_timeout_ms);
        let poll_event_capacity =
            parse_or(&lookup, "POLL_EVENT_CAPACITY", defaults.poll_event_capacity).max(1);

        let debug = parse_flag(lookup("DEBUG").as_deref());

        Ok(Self {
            http_listen_addr,
            tcp_listen_addr,
            poll_timeout_ms,
            poll_event_capacity,
            debug,
        })
    }

    /// Readiness poll timeout as a [`Duration`].
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

fn parse_addr<F>(lookup: &F, key: &'static str, default: &str) -> Result<SocketAddr, RelayError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.parse()
        .map_err(|_| RelayError::InvalidConfig { key, value: raw })
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// A flag is on when present, unless explicitly `0` or `false`.
fn parse_flag(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(v) => !(v == "0" || v.eq_ignore_ascii_case("false")),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<RelayConfig, RelayError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        RelayConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_empty() {
        let Ok(config) = load(&[]) else {
            panic!("defaults must load");
        };
        assert_eq!(config.http_listen_addr.port(), 8000);
        assert_eq!(config.tcp_listen_addr.port(), 16666);
        assert_eq!(config.poll_timeout(), Duration::from_secs(1));
        assert_eq!(config.poll_event_capacity, 1024);
        assert!(!config.debug);
    }

    #[test]
    fn overrides_are_applied() {
        let Ok(config) = load(&[
            ("HTTP_LISTEN_ADDR", "127.0.0.1:9000"),
            ("TCP_LISTEN_ADDR", "127.0.0.1:17000"),
            ("POLL_TIMEOUT_MS", "250"),
            ("DEBUG", "yes"),
        ]) else {
            panic!("overrides must load");
        };
        assert_eq!(config.http_listen_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.tcp_listen_addr.to_string(), "127.0.0.1:17000");
        assert_eq!(config.poll_timeout_ms, 250);
        assert!(config.debug);
    }

    #[test]
    fn invalid_address_is_an_error() {
        let result = load(&[("TCP_LISTEN_ADDR", "not-an-addr")]);
        let Err(RelayError::InvalidConfig { key, value }) = result else {
            panic!("expected InvalidConfig");
        };
        assert_eq!(key, "TCP_LISTEN_ADDR");
        assert_eq!(value, "not-an-addr");
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let Ok(config) = load(&[("POLL_TIMEOUT_MS", "soon"), ("POLL_EVENT_CAPACITY", "0")]) else {
            panic!("config must load");
        };
        assert_eq!(config.poll_timeout_ms, 1000);
        assert_eq!(config.poll_event_capacity, 1);
    }

    #[test]
    fn debug_flag_values() {
        assert!(!parse_flag(None));
        assert!(parse_flag(Some("")));
        assert!(parse_flag(Some("1")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(Some("FALSE")));
    }
}
