//! Response bodies of the HTTP ingress.

use serde::Serialize;

/// Acknowledgement returned for every ingress request.
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Published event name, `None` for the root path.
    pub event: Option<String>,
    /// Number of listeners the event was delivered to.
    pub delivered: usize,
    /// Time the request was handled (RFC 3339).
    pub timestamp: String,
}
