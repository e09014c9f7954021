//! Interrupt handling for the relay process.

use std::future::Future;
use std::io;

use crate::domain::{EventBus, EventKind};

/// Exit status used when a second interrupt cuts the graceful shutdown short.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Turns interrupts into shutdown requests.
///
/// The first interrupt publishes [`EventKind::Shutdown`] on `bus`. Returns
/// `true` when a second one arrives while that shutdown is still running,
/// and `false` if waiting for an interrupt fails.
pub async fn watch_interrupts<F, Fut>(bus: EventBus, mut interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(e) = interrupt().await {
        tracing::warn!(error = %e, "cannot listen for interrupts");
        return false;
    }
    tracing::info!("interrupt received, shutting down (interrupt again to force)");
    bus.publish(EventKind::Shutdown, "");

    match interrupt().await {
        Ok(()) => {
            tracing::warn!("second interrupt received, exiting now");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for interrupts");
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn counting_bus() -> (EventBus, Arc<AtomicUsize>) {
        let bus = EventBus::new();
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&shutdowns);
        bus.subscribe(EventKind::Shutdown, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (bus, shutdowns)
    }

    #[tokio::test]
    async fn second_interrupt_forces_exit() {
        let (bus, shutdowns) = counting_bus();
        let presses = Arc::new(Notify::new());
        let source = Arc::clone(&presses);
        let watcher = tokio::spawn(watch_interrupts(bus, move || {
            let source = Arc::clone(&source);
            async move {
                source.notified().await;
                Ok(())
            }
        }));

        presses.notify_one();
        for _ in 0..100 {
            if shutdowns.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(!watcher.is_finished());

        presses.notify_one();
        let Ok(Ok(forced)) = tokio::time::timeout(Duration::from_secs(1), watcher).await else {
            panic!("watcher did not return after the second interrupt");
        };
        assert!(forced);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unavailable_signal_publishes_nothing() {
        let (bus, shutdowns) = counting_bus();
        let forced = watch_interrupts(bus, || async { Err(io::Error::other("no signal handler")) }).await;
        assert!(!forced);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 0);
    }
}
