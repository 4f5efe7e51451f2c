use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use echolink_core::{
    load_station_credentials, AppConfig, FileCredentialStore, LinkEvent, LinkEventSender,
    LinkStateCell, LinkStateManager, LoopbackStation, NoopLiveness,
};
use echolink_server::{ConnectionService, PosixSocketTuning};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,echolink_server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Echolink server starting...");

    // Configuration
    let config = match std::env::var("ECHOLINK_CONFIG") {
        Ok(path) => AppConfig::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        Err(_) => AppConfig::default(),
    };
    let credentials_path = std::env::var("ECHOLINK_CREDENTIALS")
        .unwrap_or_else(|_| "echolink-credentials.json".into());
    let flap_secs = std::env::var("ECHOLINK_FLAP_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0);

    // Credentials: file store first, compiled defaults per missing key
    let store = FileCredentialStore::new(&credentials_path, &config.station.namespace);
    let credentials = load_station_credentials(&store, &config.station);

    // Link State Manager owning the loopback station and the echo service
    let link = Arc::new(LinkStateCell::new());
    let (sender, events) = LinkEventSender::channel();
    let station = LoopbackStation::new(sender);
    let injector = station.sender();
    let service = ConnectionService::new(
        config.service.clone(),
        link.clone(),
        Arc::new(PosixSocketTuning),
        Arc::new(NoopLiveness),
    )
    .context("Invalid service configuration")?;
    let mut manager = LinkStateManager::new(station, service, link.clone());
    manager
        .start(&credentials, &config.station.static_ip)
        .context("Wi-Fi station startup failed")?;

    // The manager blocks on its event channel, so it gets its own thread.
    // The loopback station holds a sender, so shutdown goes through a flag.
    let shutdown = Arc::new(AtomicBool::new(false));
    let manager_shutdown = shutdown.clone();
    let manager_handle = std::thread::Builder::new()
        .name("link-manager".into())
        .spawn(move || manager.run_until(events, &manager_shutdown))
        .context("Failed to spawn link manager")?;

    // Optional link-loss simulation
    let flap_handle = tokio::spawn(async move {
        match flap_secs {
            Some(secs) => simulate_link_flaps(injector, Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    });

    tracing::info!("🚀 Echolink server ready!");
    tracing::info!("   Echo port: {}", config.service.port);
    tracing::info!("   Credentials file: {}", credentials_path);
    tracing::info!("");
    tracing::info!("Try:");
    tracing::info!("   nc 127.0.0.1 {}", config.service.port);

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = flap_handle => {
            tracing::warn!("Link simulation stopped");
        }
    }

    if manager_handle.is_finished() {
        tracing::warn!("Link manager exited early");
    }
    shutdown.store(true, Ordering::Release);
    tokio::task::spawn_blocking(move || manager_handle.join())
        .await
        .context("Failed to wait for link manager")?
        .map_err(|_| anyhow::anyhow!("Link manager panicked"))?;

    tracing::info!("Shutdown complete, link is {}", link.get());
    Ok(())
}

/// Periodically drop the simulated link; the loopback station reconnects
/// on the manager's next connect attempt.
async fn simulate_link_flaps(injector: LinkEventSender, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;

    loop {
        interval.tick().await;
        tracing::info!("Simulating Wi-Fi link loss");
        if !injector.send(LinkEvent::StationDisconnected) {
            tracing::error!("Failed to inject link event - manager may have stopped");
            break;
        }
    }
}
