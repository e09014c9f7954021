//! Per-client bridge between the event bus and one socket.
//!
//! A [`ConnectionHandler`] subscribes to [`EventKind::Notify`] when it is
//! created and writes every notification to its client as one
//! newline-terminated frame. It never reads from the socket and never
//! decides that the client is gone; that is the multiplexer's job.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{ClientStream, ConnectionId};
use crate::domain::{Event, EventBus, EventKind, SubscriptionId};

/// Frame terminator appended to every payload.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Encodes an event into the bytes written to a client.
#[must_use]
pub fn encode_frame(event: &Event) -> Vec<u8> {
    let mut frame = Vec::with_capacity(event.payload.len() + 1);
    frame.extend_from_slice(event.payload.as_bytes());
    frame.push(FRAME_DELIMITER);
    frame
}

/// How far one write attempt got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sent {
    /// Every byte went out.
    All,
    /// The socket stopped accepting bytes after this many.
    Blocked(usize),
    /// The socket failed; already logged.
    Failed,
}

/// State shared with the bus listener closure.
#[derive(Debug)]
struct Outlet {
    id: ConnectionId,
    stream: Arc<dyn ClientStream>,
    terminated: AtomicBool,
    /// Unsent tail of a frame the socket only partly accepted. At most one
    /// frame long; new frames are not queued behind it.
    remainder: Mutex<Vec<u8>>,
}

impl Outlet {
    fn forward(&self, event: &Event) {
        if self.terminated.load(Ordering::Acquire) {
            return;
        }

        // Held across the writes so frames from concurrent publishers never
        // interleave on the socket.
        let mut remainder = self.remainder.lock();
        if !remainder.is_empty() {
            match self.write(&remainder) {
                Sent::All => remainder.clear(),
                Sent::Blocked(n) => {
                    let len = remainder.len();
                    remainder.drain(..n.min(len));
                    tracing::warn!(
                        conn = %self.id,
                        pending = remainder.len(),
                        "client still behind on previous frame, dropping event"
                    );
                    return;
                }
                Sent::Failed => {
                    remainder.clear();
                    return;
                }
            }
        }

        let frame = encode_frame(event);
        match self.write(&frame) {
            Sent::All => {
                tracing::trace!(conn = %self.id, bytes = frame.len(), "event forwarded");
            }
            Sent::Blocked(0) => {
                tracing::warn!(conn = %self.id, dropped = frame.len(), "client not ready, dropping frame");
            }
            Sent::Blocked(n) => {
                let rest = frame.get(n..).unwrap_or_default();
                tracing::debug!(conn = %self.id, pending = rest.len(), "frame truncated, keeping the rest");
                remainder.extend_from_slice(rest);
            }
            Sent::Failed => {}
        }
    }

    /// Writes as much of `bytes` as the socket takes without blocking.
    fn write(&self, bytes: &[u8]) -> Sent {
        let mut written = 0;
        while let Some(rest) = bytes.get(written..)
            && !rest.is_empty()
        {
            match self.stream.send(rest) {
                Ok(0) => {
                    tracing::warn!(conn = %self.id, "client socket accepted no bytes");
                    return Sent::Blocked(written);
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Sent::Blocked(written),
                Err(e) => {
                    tracing::warn!(conn = %self.id, error = %e, "send to client failed");
                    return Sent::Failed;
                }
            }
        }
        Sent::All
    }
}

/// Forwards bus notifications to one accepted client.
#[derive(Debug)]
pub struct ConnectionHandler {
    outlet: Arc<Outlet>,
    bus: EventBus,
    subscription: SubscriptionId,
}

impl ConnectionHandler {
    /// Wraps an accepted client and subscribes it to notifications.
    #[must_use]
    pub fn new(id: ConnectionId, stream: Arc<dyn ClientStream>, bus: &EventBus) -> Self {
        let outlet = Arc::new(Outlet {
            id,
            stream,
            terminated: AtomicBool::new(false),
            remainder: Mutex::new(Vec::new()),
        });

        let listener = Arc::clone(&outlet);
        let subscription = bus.subscribe(EventKind::Notify, move |event| listener.forward(event));

        Self {
            outlet,
            bus: bus.clone(),
            subscription,
        }
    }

    /// Identifier of the client this handler serves.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.outlet.id
    }

    /// The client socket.
    #[must_use]
    pub fn stream(&self) -> &Arc<dyn ClientStream> {
        &self.outlet.stream
    }

    /// Unsubscribes from the bus and stops forwarding.
    ///
    /// Idempotent, and does not touch the socket, so it is safe after the
    /// owner has already closed it.
    pub fn terminate(&self) {
        if self.outlet.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.bus.unsubscribe(self.subscription);
        tracing::debug!(conn = %self.outlet.id, "connection handler terminated");
    }

    /// Returns `true` once [`terminate`](Self::terminate) has run.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.outlet.terminated.load(Ordering::Acquire)
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        self.terminate();
    }
}
