//! TCP side of the relay: readiness abstraction, mio transport, per-client
//! handlers, and the connection multiplexer that ties them together.

pub mod connection_id;
pub mod connection_set;
pub mod handler;
pub mod mio_transport;
pub mod server;
pub mod transport;

pub use connection_id::ConnectionId;
pub use connection_set::ConnectionSet;
pub use handler::ConnectionHandler;
pub use mio_transport::{MioBinder, MioTransport};
pub use server::{Multiplexer, StopHandle};
pub use transport::{Bind, ClientStream, ControlChannel, Readiness, Transport};
