//! Shared state injected into the HTTP ingress handlers.

use crate::domain::EventBus;

/// State available to ingress handlers via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct IngressState {
    /// Bus every accepted request publishes to.
    pub event_bus: EventBus,
}

impl IngressState {
    /// Creates the state around an existing bus.
    #[must_use]
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}
