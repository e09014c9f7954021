//! Type-safe subscription handle.
//!
//! [`SubscriptionId`] is a newtype wrapper around [`uuid::Uuid`] (v4) so that
//! a handle returned by [`super::EventBus::subscribe`] cannot be confused
//! with any other identifier.

use std::fmt;

use serde::Serialize;

/// Handle identifying one listener registration on the event bus.
///
/// Generated once per `subscribe` call. Passing it to
/// [`super::EventBus::unsubscribe`] removes exactly that listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(uuid::Uuid);

impl SubscriptionId {
    /// Creates a new random `SubscriptionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
