//! # notify-relay
//!
//! Notification relay: lightweight HTTP requests are translated into named
//! events, and every event is fanned out to all long-lived TCP clients.
//! Clients subscribe implicitly by staying connected.
//!
//! ## Architecture
//!
//! ```text
//! HTTP clients                         TCP subscribers
//!     │                                      ▲
//!     ├── HTTP Ingress (http/)               │
//!     │                                      │
//!     ├── EventBus (domain/) ──► ConnectionHandler (tcp/)
//!     │                                      ▲
//!     │                  Multiplexer (tcp/) ─┘
//!     │                  one mio readiness loop, own thread
//!     │
//!     └── Shutdown event ──► HTTP Ingress + Multiplexer stop
//! ```

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod signal;
pub mod tcp;
