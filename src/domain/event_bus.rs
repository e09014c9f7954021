//! Synchronous in-process publish/subscribe registry.
//!
//! [`EventBus`] keeps an ordered list of `(kind, listener)` registrations
//! behind a [`parking_lot::Mutex`]. Publishing snapshots the matching
//! listeners, releases the lock, and only then invokes them on the calling
//! thread, so a listener that writes to a socket (or subscribes,
//! unsubscribes, or publishes again) never runs under the lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Event, EventKind, SubscriptionId};

/// Callback invoked for every published event of the subscribed kind.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct Registration {
    id: SubscriptionId,
    kind: EventKind,
    listener: Listener,
}

/// Process-wide event bus, constructed once by the composition root and
/// handed to every component that needs it.
///
/// Cloning is cheap: clones share the same registrations.
#[derive(Clone, Default)]
pub struct EventBus {
    registrations: Arc<Mutex<Vec<Registration>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.registrations.lock().len())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for events of `kind`.
    ///
    /// Listeners of the same kind are invoked in registration order.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.registrations.lock().push(Registration {
            id,
            kind,
            listener: Arc::new(listener),
        });
        tracing::trace!(
            subscription = %id,
            kind = kind.as_str(),
            kind_code = kind.code(),
            "listener subscribed"
        );
        id
    }

    /// Removes the listener registered under `id`.
    ///
    /// Returns `false` if it was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registrations = self.registrations.lock();
        let Some(pos) = registrations.iter().position(|r| r.id == id) else {
            return false;
        };
        registrations.remove(pos);
        true
    }

    /// Invokes every listener currently registered for `kind`, synchronously
    /// and in registration order.
    ///
    /// Returns the number of listeners invoked. Publishing with no listeners
    /// is a no-op.
    pub fn publish(&self, kind: EventKind, payload: impl Into<String>) -> usize {
        let listeners: Vec<Listener> = self
            .registrations
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| Arc::clone(&r.listener))
            .collect();

        let event = Event::new(kind, payload);
        if listeners.is_empty() {
            tracing::trace!(kind = kind.as_str(), kind_code = kind.code(), "no listeners for event");
            return 0;
        }

        for listener in &listeners {
            listener(&event);
        }
        tracing::trace!(
            kind = kind.as_str(),
            kind_code = kind.code(),
            listeners = listeners.len(),
            "event published"
        );
        listeners.len()
    }

    /// Returns the number of listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registrations
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }
}
