//! notify-relay entry point.
//!
//! Composes the event bus, the TCP multiplexer, and the HTTP ingress, and
//! turns an interrupt into a `Shutdown` event.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use notify_relay::app_state::IngressState;
use notify_relay::config::RelayConfig;
use notify_relay::domain::{EventBus, EventKind};
use notify_relay::http;
use notify_relay::signal;
use notify_relay::tcp::Multiplexer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RelayConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
    tracing::info!(
        http = %config.http_listen_addr,
        tcp = %config.tcp_listen_addr,
        "starting notify-relay"
    );

    let event_bus = EventBus::new();
    if config.debug {
        event_bus.subscribe(EventKind::Notify, |event| {
            tracing::debug!(
                kind_code = event.kind.code(),
                event = %serde_json::to_string(event).unwrap_or_default(),
                "received event"
            );
        });
    }

    // TCP side
    let mut server = Multiplexer::from_config(&config, event_bus.clone());
    server.start().context("starting tcp server")?;
    if let Some(stop) = server.stop_handle() {
        event_bus.subscribe(EventKind::Shutdown, move |_| stop.stop());
    }

    // Interrupt → shutdown broadcast; a second interrupt exits at once
    tokio::spawn({
        let event_bus = event_bus.clone();
        async move {
            if signal::watch_interrupts(event_bus, tokio::signal::ctrl_c).await {
                std::process::exit(signal::FORCED_EXIT_CODE);
            }
        }
    });

    // HTTP side
    let shutdown = http::shutdown_signal(&event_bus);
    let served = match tokio::net::TcpListener::bind(config.http_listen_addr).await {
        Ok(listener) => http::serve(listener, IngressState::new(event_bus.clone()), shutdown)
            .await
            .context("serving http ingress"),
        Err(e) => {
            tracing::error!(addr = %config.http_listen_addr, error = %e, "http socket setup failed");
            Err::<(), _>(e).context("binding http ingress")
        }
    };
    if served.is_err() {
        event_bus.publish(EventKind::Shutdown, "");
    }

    tokio::task::spawn_blocking(move || server.join())
        .await
        .context("joining tcp server")?;
    tracing::info!("notify-relay stopped");

    served
}
