//! Client connection set and handler registry.
//!
//! Owned and mutated by the multiplexer thread only. The ordered slot list
//! always starts with the two reserved entries (control channel, listening
//! socket); every client slot after them has exactly one handler in the
//! registry and vice versa.

use std::collections::HashMap;

use super::{ConnectionHandler, ConnectionId};

/// One tracked descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Reserved slot 0.
    Control,
    /// Reserved slot 1.
    Listener,
    /// An accepted client.
    Client(ConnectionId),
}

/// Number of reserved slots at the front of the set.
pub const RESERVED_SLOTS: usize = 2;

/// Tracked descriptors plus the handler of every client.
#[derive(Debug)]
pub struct ConnectionSet {
    slots: Vec<Slot>,
    handlers: HashMap<ConnectionId, ConnectionHandler>,
    next_id: usize,
}

impl Default for ConnectionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSet {
    /// Creates a set holding only the reserved slots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::Control, Slot::Listener],
            handlers: HashMap::new(),
            next_id: 0,
        }
    }

    /// Id the next inserted client will get.
    #[must_use]
    pub const fn next_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id)
    }

    /// Tracks a new client together with its handler.
    pub fn insert(&mut self, handler: ConnectionHandler) {
        let id = handler.id();
        self.next_id = self.next_id.max(id.get() + 1);
        self.slots.push(Slot::Client(id));
        if let Some(previous) = self.handlers.insert(id, handler) {
            tracing::error!(conn = %id, "connection id reused, terminating previous handler");
            previous.terminate();
        }
    }

    /// Stops tracking `id`, handing its handler back.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionHandler> {
        self.slots.retain(|slot| *slot != Slot::Client(id));
        self.handlers.remove(&id)
    }

    /// Handler of `id`, if tracked.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionHandler> {
        self.handlers.get(&id)
    }

    /// Ordered slots, reserved ones included.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of tracked descriptors, reserved ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`: the reserved slots are never removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of live handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Checks that client slots and handlers are in one-to-one
    /// correspondence.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.slots.len() == self.handlers.len() + RESERVED_SLOTS
            && self
                .slots
                .iter()
                .skip(RESERVED_SLOTS)
                .all(|slot| matches!(slot, Slot::Client(id) if self.handlers.contains_key(id)))
    }

    /// Removes every client, in slot order.
    pub fn drain(&mut self) -> Vec<ConnectionHandler> {
        let ids: Vec<ConnectionId> = self
            .slots
            .drain(RESERVED_SLOTS..)
            .filter_map(|slot| match slot {
                Slot::Client(id) => Some(id),
                Slot::Control | Slot::Listener => None,
            })
            .collect();
        ids.into_iter()
            .filter_map(|id| self.handlers.remove(&id))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventBus, EventKind};
    use crate::tcp::ClientStream;
    use crate::tcp::handler::tests::FakeStream;
    use std::sync::Arc;

    fn add(set: &mut ConnectionSet, bus: &EventBus) -> ConnectionId {
        let id = set.next_id();
        let stream = Arc::new(FakeStream::default()) as Arc<dyn ClientStream>;
        set.insert(ConnectionHandler::new(id, stream, bus));
        id
    }

    #[test]
    fn starts_with_reserved_slots() {
        let set = ConnectionSet::new();
        assert_eq!(set.slots(), &[Slot::Control, Slot::Listener]);
        assert_eq!(set.handler_count(), 0);
        assert!(set.is_consistent());
    }

    #[test]
    fn bijection_holds_across_accepts_and_disconnects() {
        let bus = EventBus::new();
        let mut set = ConnectionSet::new();

        let a = add(&mut set, &bus);
        let b = add(&mut set, &bus);
        let c = add(&mut set, &bus);
        assert_eq!(set.len() - RESERVED_SLOTS, set.handler_count());
        assert!(set.is_consistent());

        let Some(removed) = set.remove(b) else {
            panic!("b must be tracked");
        };
        removed.terminate();
        assert_eq!(set.len() - RESERVED_SLOTS, set.handler_count());
        assert!(set.is_consistent());
        assert_eq!(
            set.slots(),
            &[Slot::Control, Slot::Listener, Slot::Client(a), Slot::Client(c)]
        );

        let d = add(&mut set, &bus);
        assert_ne!(d, b);
        assert_eq!(bus.listener_count(EventKind::Notify), set.handler_count());
        assert!(set.remove(b).is_none());
    }

    #[test]
    fn drain_empties_clients_in_order() {
        let bus = EventBus::new();
        let mut set = ConnectionSet::new();
        let a = add(&mut set, &bus);
        let b = add(&mut set, &bus);

        let drained: Vec<ConnectionId> = set.drain().iter().map(ConnectionHandler::id).collect();
        assert_eq!(drained, vec![a, b]);
        assert_eq!(set.len(), RESERVED_SLOTS);
        assert!(set.is_consistent());
        assert_eq!(bus.listener_count(EventKind::Notify), 0);
    }
}
