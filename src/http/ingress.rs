//! Axum router and serve loop of the HTTP ingress.
//!
//! Every request, whatever its method, is answered with `200 OK`. A request
//! for any path other than `/` publishes [`EventKind::Notify`] with the path
//! (minus its leading `/`) as payload.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;

use super::dto::NotifyResponse;
use crate::app_state::IngressState;
use crate::domain::{EventBus, EventKind};

/// Builds the ingress router.
pub fn router(state: IngressState) -> Router {
    Router::new()
        .fallback(notify_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `ANY /{event}` — publish `event` to every subscriber.
async fn notify_handler(State(state): State<IngressState>, uri: Uri) -> impl IntoResponse {
    let name = event_name(uri.path());
    let delivered = match name {
        Some(name) => {
            let delivered = state.event_bus.publish(EventKind::Notify, name);
            tracing::debug!(event = name, delivered, "published event");
            delivered
        }
        None => 0,
    };

    (
        StatusCode::OK,
        Json(NotifyResponse {
            status: "ok",
            event: name.map(str::to_string),
            delivered,
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
}

/// Event name carried by a request path; `None` for the root path.
fn event_name(path: &str) -> Option<&str> {
    let name = path.strip_prefix('/').unwrap_or(path);
    (!name.is_empty()).then_some(name)
}

/// Serves the ingress on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns the I/O error that ended the accept loop.
pub async fn serve<F>(listener: TcpListener, state: IngressState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "http ingress listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("http ingress stopped");
    Ok(())
}

/// Resolves once [`EventKind::Shutdown`] is published on `bus`.
///
/// The listener is registered immediately, so a shutdown published before
/// the future is first polled is not missed.
pub fn shutdown_signal(bus: &EventBus) -> impl Future<Output = ()> + Send + 'static {
    let notify = Arc::new(Notify::new());
    let waker = Arc::clone(&notify);
    let subscription = bus.subscribe(EventKind::Shutdown, move |_| waker.notify_one());
    let bus = bus.clone();

    async move {
        notify.notified().await;
        bus.unsubscribe(subscription);
        tracing::info!("shutdown requested, stopping http ingress");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use parking_lot::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    fn recording_bus() -> (EventBus, Arc<Mutex<Vec<String>>>) {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(EventKind::Notify, move |e| sink.lock().push(e.payload.clone()));
        (bus, seen)
    }

    async fn call(bus: &EventBus, method: Method, uri: &str) -> serde_json::Value {
        let app = router(IngressState::new(bus.clone()));
        let Ok(req) = Request::builder().method(method).uri(uri).body(Body::empty()) else {
            panic!("invalid request");
        };
        let Ok(resp) = app.oneshot(req).await else {
            panic!("router failed");
        };
        assert_eq!(resp.status(), StatusCode::OK);
        let Ok(body) = axum::body::to_bytes(resp.into_body(), 10_000).await else {
            panic!("body read failed");
        };
        let Ok(json) = serde_json::from_slice(&body) else {
            panic!("body is not json");
        };
        json
    }

    #[test]
    fn event_name_strips_leading_slash() {
        assert_eq!(event_name("/"), None);
        assert_eq!(event_name(""), None);
        assert_eq!(event_name("/alpha"), Some("alpha"));
        assert_eq!(event_name("/a/b"), Some("a/b"));
    }

    #[tokio::test]
    async fn path_is_published_as_event() {
        let (bus, seen) = recording_bus();
        let json = call(&bus, Method::GET, "/alpha?ignored=1").await;

        assert_eq!(json["status"], "ok");
        assert_eq!(json["event"], "alpha");
        assert_eq!(json["delivered"], 1);
        assert_eq!(*seen.lock(), vec!["alpha".to_string()]);
    }

    #[tokio::test]
    async fn root_path_publishes_nothing() {
        let (bus, seen) = recording_bus();
        let json = call(&bus, Method::GET, "/").await;

        assert!(json["event"].is_null());
        assert_eq!(json["delivered"], 0);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn any_method_is_accepted() {
        let (bus, seen) = recording_bus();
        call(&bus, Method::POST, "/deploy").await;
        call(&bus, Method::PUT, "/rollback").await;
        assert_eq!(*seen.lock(), vec!["deploy".to_string(), "rollback".to_string()]);
    }

    #[tokio::test]
    async fn publish_without_subscribers_still_succeeds() {
        let bus = EventBus::new();
        let json = call(&bus, Method::GET, "/nobody").await;
        assert_eq!(json["delivered"], 0);
    }

    #[tokio::test]
    async fn shutdown_signal_resolves_on_shutdown_event() {
        let bus = EventBus::new();
        let signal = shutdown_signal(&bus);
        assert_eq!(bus.listener_count(EventKind::Shutdown), 1);

        bus.publish(EventKind::Shutdown, "");
        let done = tokio::time::timeout(Duration::from_secs(1), signal).await;
        assert!(done.is_ok());
        assert_eq!(bus.listener_count(EventKind::Shutdown), 0);
    }
}
