//! [`Transport`] backed by `mio` (epoll on Linux).
//!
//! Token layout: `0` is the control channel ([`mio::Waker`], an eventfd on
//! Linux), `1` the listening socket, and every client is registered under
//! `CLIENT_TOKEN_BASE + id`.

use std::collections::HashMap;
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};

use super::ConnectionId;
use super::transport::{Bind, ClientStream, ControlChannel, Readiness, Transport};

const CONTROL: Token = Token(0);
const LISTENER: Token = Token(1);
const CLIENT_TOKEN_BASE: usize = 2;

/// Control channel waking a [`MioTransport`].
#[derive(Debug)]
pub struct MioControl(Waker);

impl ControlChannel for MioControl {
    fn signal(&self) -> io::Result<()> {
        self.0.wake()
    }
}

/// A client socket accepted by [`MioTransport`]. Non-blocking.
#[derive(Debug)]
pub struct TcpClient {
    stream: TcpStream,
    peer: Option<SocketAddr>,
}

impl ClientStream for TcpClient {
    fn send(&self, bytes: &[u8]) -> io::Result<usize> {
        (&self.stream).write(bytes)
    }

    fn is_peer_closed(&self) -> bool {
        let mut probe = [0u8; 1];
        match self.stream.peek(&mut probe) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "peek failed, treating peer as closed");
                true
            }
        }
    }

    fn close(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both)
            && e.kind() != io::ErrorKind::NotConnected
        {
            tracing::debug!(error = %e, "shutdown of client socket failed");
        }
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Listening socket plus the poller every descriptor is registered with.
#[derive(Debug)]
pub struct MioTransport {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    control: Arc<MioControl>,
    clients: HashMap<ConnectionId, RawFd>,
}

impl MioTransport {
    /// Binds `addr` (with `SO_REUSEADDR`) and registers the listener and
    /// the control channel.
    ///
    /// # Errors
    ///
    /// Returns the poller, bind, or registration error.
    pub fn bind(addr: SocketAddr, event_capacity: usize) -> io::Result<Self> {
        let poll = Poll::new()?;
        let control = Arc::new(MioControl(Waker::new(poll.registry(), CONTROL)?));

        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(event_capacity.max(1)),
            listener,
            control,
            clients: HashMap::new(),
        })
    }
}

impl Transport for MioTransport {
    fn control_channel(&self) -> Arc<dyn ControlChannel> {
        Arc::clone(&self.control) as Arc<dyn ControlChannel>
    }

    fn wait(&mut self, ready: &mut Vec<Readiness>, timeout: Duration) -> io::Result<()> {
        self.poll.poll(&mut self.events, Some(timeout))?;
        for event in &self.events {
            let readiness = match event.token() {
                CONTROL => Readiness::Control,
                LISTENER => Readiness::Listener,
                Token(raw) => Readiness::Client(ConnectionId::new(raw - CLIENT_TOKEN_BASE)),
            };
            ready.push(readiness);
        }
        Ok(())
    }

    fn accept(&mut self, id: ConnectionId) -> io::Result<Option<Arc<dyn ClientStream>>> {
        let (mut stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e),
        };

        self.poll.registry().register(
            &mut stream,
            Token(CLIENT_TOKEN_BASE + id.get()),
            Interest::READABLE,
        )?;
        self.clients.insert(id, stream.as_raw_fd());

        Ok(Some(Arc::new(TcpClient {
            stream,
            peer: Some(peer),
        })))
    }

    fn deregister(&mut self, id: ConnectionId) -> io::Result<()> {
        match self.clients.remove(&id) {
            Some(fd) => self.poll.registry().deregister(&mut SourceFd(&fd)),
            None => Ok(()),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// [`Bind`] implementation producing [`MioTransport`]s.
#[derive(Debug, Clone)]
pub struct MioBinder {
    addr: SocketAddr,
    event_capacity: usize,
}

impl MioBinder {
    /// Creates a binder for `addr` fetching up to `event_capacity` readiness
    /// events per poll.
    #[must_use]
    pub const fn new(addr: SocketAddr, event_capacity: usize) -> Self {
        Self {
            addr,
            event_capacity,
        }
    }
}

impl Bind for MioBinder {
    fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn bind(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(MioTransport::bind(self.addr, self.event_capacity)?))
    }
}
