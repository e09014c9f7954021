//! The connection multiplexer.
//!
//! [`Multiplexer`] owns the listening socket and every accepted client, and
//! runs one readiness loop on a dedicated `tcp-server` thread:
//!
//! 1. wait for readiness, bounded by the poll timeout;
//! 2. a signalled control channel ends the loop, before anything else;
//! 3. a readable listener is drained of pending connections, each one
//!    getting a [`ConnectionHandler`];
//! 4. every readable client is peeked, and a zero-length peek closes the
//!    socket and terminates its handler in the same step.
//!
//! On exit, by any path, all clients are closed and their handlers
//! terminated before the listening socket is dropped.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use super::transport::{Bind, ControlChannel, Readiness, Transport};
use super::{ConnectionHandler, ConnectionId, ConnectionSet, MioBinder};
use crate::config::RelayConfig;
use crate::domain::EventBus;
use crate::error::RelayError;

/// Name of the loop thread.
pub const THREAD_NAME: &str = "tcp-server";

/// Cloneable handle that asks a running [`Multiplexer`] to stop.
#[derive(Debug)]
pub struct StopHandle(Arc<dyn ControlChannel>);

impl Clone for StopHandle {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl StopHandle {
    /// Signals the control channel. Fire-and-forget, may be repeated.
    pub fn stop(&self) {
        if let Err(e) = self.0.signal() {
            tracing::error!(error = %e, "failed to signal tcp server stop");
        }
    }
}

/// TCP server fanning bus notifications out to every connected client.
#[derive(Debug)]
pub struct Multiplexer {
    binder: Arc<dyn Bind>,
    bus: EventBus,
    poll_timeout: Duration,
    control: Option<StopHandle>,
    thread: Option<JoinHandle<()>>,
    connections: Arc<AtomicUsize>,
}

impl Multiplexer {
    /// Creates a stopped multiplexer.
    #[must_use]
    pub fn new(binder: Arc<dyn Bind>, bus: EventBus, poll_timeout: Duration) -> Self {
        Self {
            binder,
            bus,
            poll_timeout,
            control: None,
            thread: None,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a stopped multiplexer listening on the configured TCP
    /// address.
    #[must_use]
    pub fn from_config(config: &RelayConfig, bus: EventBus) -> Self {
        let binder = MioBinder::new(config.tcp_listen_addr, config.poll_event_capacity);
        Self::new(Arc::new(binder), bus, config.poll_timeout())
    }

    /// Binds the listening socket and spawns the loop thread.
    ///
    /// Returns the bound address once the socket is listening.
    ///
    /// # Errors
    ///
    /// - [`RelayError::AlreadyRunning`] if the loop thread is still active.
    /// - [`RelayError::Bind`] if the listening socket cannot be set up.
    /// - [`RelayError::Spawn`] if the thread cannot be created.
    pub fn start(&mut self) -> Result<SocketAddr, RelayError> {
        if let Some(thread) = &self.thread
            && !thread.is_finished()
        {
            return Err(RelayError::AlreadyRunning);
        }
        self.join();

        let addr = self.binder.addr();
        let transport = self.binder.bind().map_err(|source| {
            tracing::error!(%addr, error = %source, "tcp server setup failed");
            RelayError::Bind { addr, source }
        })?;
        let local_addr = transport.local_addr()?;
        let control = StopHandle(transport.control_channel());

        let event_loop = EventLoop::new(
            transport,
            self.bus.clone(),
            self.poll_timeout,
            Arc::clone(&self.connections),
        );
        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || event_loop.run())
            .map_err(RelayError::Spawn)?;

        self.control = Some(control);
        self.thread = Some(thread);
        tracing::info!(addr = %local_addr, "tcp server listening");
        Ok(local_addr)
    }

    /// Asks the loop to exit. Does not wait; call [`join`](Self::join).
    ///
    /// Idempotent, and a no-op when not started.
    pub fn stop(&self) {
        if let Some(control) = &self.control {
            control.stop();
        }
    }

    /// Handle for stopping the loop from another thread, if started.
    #[must_use]
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.control.clone()
    }

    /// Blocks until the loop thread has exited. No-op when no thread runs.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("tcp server thread panicked");
        }
        self.control = None;
    }

    /// Returns `true` while the loop thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Number of connected clients, as last published by the loop.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

/// State owned by the loop thread.
struct EventLoop {
    transport: Box<dyn Transport>,
    bus: EventBus,
    poll_timeout: Duration,
    set: ConnectionSet,
    gauge: Arc<AtomicUsize>,
}

impl EventLoop {
    fn new(
        transport: Box<dyn Transport>,
        bus: EventBus,
        poll_timeout: Duration,
        gauge: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            transport,
            bus,
            poll_timeout,
            set: ConnectionSet::new(),
            gauge,
        }
    }

    fn run(mut self) {
        tracing::info!("tcp server loop started");
        let mut ready = Vec::new();

        loop {
            ready.clear();
            match self.transport.wait(&mut ready, self.poll_timeout) {
                Ok(()) => {}
                Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "readiness poll failed, stopping tcp server");
                    break;
                }
            }

            if ready.contains(&Readiness::Control) {
                tracing::info!("received stop request");
                break;
            }
            if ready.contains(&Readiness::Listener) {
                self.accept_pending();
            }
            for readiness in &ready {
                if let Readiness::Client(id) = *readiness {
                    self.check_peer(id);
                }
            }

            debug_assert!(self.set.is_consistent());
            self.gauge.store(self.set.handler_count(), Ordering::Release);
        }

        self.shutdown();
    }

    fn accept_pending(&mut self) {
        loop {
            let id = self.set.next_id();
            match self.transport.accept(id) {
                Ok(Some(stream)) => {
                    tracing::debug!(conn = %id, peer = ?stream.peer_addr(), "new connection");
                    self.set
                        .insert(ConnectionHandler::new(id, stream, &self.bus));
                }
                Ok(None) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn check_peer(&mut self, id: ConnectionId) {
        let Some(handler) = self.set.get(id) else {
            return;
        };
        if handler.stream().is_peer_closed() {
            tracing::debug!(conn = %id, "client disconnected");
            self.release(id);
        }
    }

    fn release(&mut self, id: ConnectionId) {
        let Some(handler) = self.set.remove(id) else {
            return;
        };
        self.close(&handler);
    }

    fn close(&mut self, handler: &ConnectionHandler) {
        if let Err(e) = self.transport.deregister(handler.id()) {
            tracing::warn!(conn = %handler.id(), error = %e, "deregister failed");
        }
        handler.stream().close();
        handler.terminate();
    }

    fn shutdown(mut self) {
        for handler in self.set.drain() {
            self.close(&handler);
        }
        self.gauge.store(0, Ordering::Release);
        drop(self.transport);
        tracing::info!("tcp server stopped");
    }
}
