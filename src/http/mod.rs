//! HTTP ingress: turns request paths into `Notify` events.

pub mod dto;
pub mod ingress;

pub use ingress::{router, serve, shutdown_signal};
