//! Domain layer: events, subscription handles, and the event bus.
//!
//! The bus is the only bridge between the HTTP ingress (publisher) and the
//! TCP side (one listener per connected client).

pub mod event;
pub mod event_bus;
pub mod subscription_id;

pub use event::{Event, EventKind};
pub use event_bus::{EventBus, Listener};
pub use subscription_id::SubscriptionId;
