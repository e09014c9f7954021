//! Readiness abstraction the multiplexer loop is written against.
//!
//! The loop never touches raw descriptors. It waits on a [`Transport`] for
//! the next ready set, accepts through it, and asks each [`ClientStream`]
//! whether its peer has gone away. The production implementation lives in
//! [`super::mio_transport`]; tests drive the loop with in-memory fakes.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::ConnectionId;

/// Cross-thread wake-up used exclusively to ask the loop to stop.
///
/// Signalling more than once is allowed.
pub trait ControlChannel: Send + Sync + fmt::Debug {
    /// Wakes the loop thread.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the wake-up could not be
    /// delivered.
    fn signal(&self) -> io::Result<()>;
}

/// One accepted client connection.
///
/// Shared between the loop thread (closure detection, close) and the
/// connection handler (sends from the publisher's thread).
pub trait ClientStream: Send + Sync + fmt::Debug {
    /// Writes as much of `bytes` as the socket accepts without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::WouldBlock`] when the send buffer is full,
    /// or any other I/O error from the socket.
    fn send(&self, bytes: &[u8]) -> io::Result<usize>;

    /// Non-destructive check for peer closure: a zero-length peek means the
    /// peer shut down its side.
    fn is_peer_closed(&self) -> bool;

    /// Shuts the connection down. Safe to call more than once.
    fn close(&self);

    /// Remote address, when known.
    fn peer_addr(&self) -> Option<SocketAddr>;
}

/// A source flagged by [`Transport::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The control channel was signalled.
    Control,
    /// The listening socket has pending connections.
    Listener,
    /// A client socket became readable.
    Client(ConnectionId),
}

/// Readiness source owning the listening socket and the registrations of
/// every accepted client.
pub trait Transport: Send + fmt::Debug {
    /// Returns the control channel that wakes this transport's `wait`.
    fn control_channel(&self) -> Arc<dyn ControlChannel>;

    /// Blocks until at least one source is ready or `timeout` elapses, then
    /// appends the ready sources to `ready`.
    ///
    /// # Errors
    ///
    /// Returns the poll error. [`io::ErrorKind::Interrupted`] and
    /// [`io::ErrorKind::TimedOut`] are expected and non-fatal.
    fn wait(&mut self, ready: &mut Vec<Readiness>, timeout: Duration) -> io::Result<()>;

    /// Accepts one pending connection and registers it for readability
    /// under `id`. Returns `Ok(None)` when nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns the accept or registration error.
    fn accept(&mut self, id: ConnectionId) -> io::Result<Option<Arc<dyn ClientStream>>>;

    /// Removes the registration of `id`. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns the deregistration error.
    fn deregister(&mut self, id: ConnectionId) -> io::Result<()>;

    /// Address the listening socket is bound to.
    ///
    /// # Errors
    ///
    /// Returns the underlying socket error.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Factory producing a freshly bound [`Transport`] for every server start.
pub trait Bind: Send + Sync + fmt::Debug {
    /// Address this binder will bind to.
    fn addr(&self) -> SocketAddr;

    /// Creates the listening socket and its readiness source.
    ///
    /// # Errors
    ///
    /// Returns the socket, bind, listen, or poller creation error.
    fn bind(&self) -> io::Result<Box<dyn Transport>>;
}
