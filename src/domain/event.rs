//! Events carried by the [`super::EventBus`].
//!
//! An [`Event`] is a named notification produced by the HTTP ingress (or by
//! the process itself on shutdown) and fanned out to every subscriber of its
//! [`EventKind`].

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Discriminator used to route events to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A named notification to forward to connected TCP clients.
    Notify,
    /// Reserved system-wide shutdown broadcast.
    Shutdown,
}

impl EventKind {
    /// Returns the stable numeric code of this kind.
    ///
    /// `Shutdown` keeps the historical `666` so that tooling keyed on the
    /// number keeps working.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Notify => 1,
            Self::Shutdown => 666,
        }
    }

    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notify => "notify",
            Self::Shutdown => "shutdown",
        }
    }
}

/// A published event.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Routing kind.
    pub kind: EventKind,
    /// Event payload. For `Notify` this is the event name taken from the
    /// request path.
    pub payload: String,
    /// Publication timestamp.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }
}
