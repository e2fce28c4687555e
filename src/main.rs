//! sonaflow: control daemon for the SonaFlow audio wearable
//!
//! The daemon runs the device's application loop against simulated
//! hardware and provides:
//! - Explicit state machine coordinating the device's modes
//! - Link manager with a bounded outbound frame queue and drain task
//! - Fixed 10-byte wire frames carrying one loudness feature each
//! - Feature source reducing microphone frames to a loudness level
//!
//! Out of scope:
//! - Real radio and microphone drivers (simulated stand-ins only)
//! - Interpreting inbound control frames beyond publishing them

mod codec;
mod config;
mod events;
mod feature;
mod indicator;
mod lifecycle;
mod link;
mod state;
mod storage;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::DeviceEvent;
use crate::feature::{FeatureSource, SyntheticInput};
use crate::indicator::TracingIndicator;
use crate::lifecycle::ShutdownSignal;
use crate::link::{LinkManager, SimulatedRadio, CHARACTERISTIC_UUID};
use crate::state::{Coordinator, Mode};
use crate::storage::{CsvFeatureLog, FeatureLog, NullFeatureLog};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "sonaflow starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.data_dir, device_name = %config.device_name, "configuration loaded");

    let mut shutdown = ShutdownSignal::install().context("failed to install signal handlers")?;

    // Radio -> link manager
    let (radio_tx, radio_rx) = mpsc::channel(32);
    // Link manager -> coordinator
    let (link_tx, link_rx) = mpsc::channel(32);
    // Coordinator -> observers
    let (event_tx, event_rx) = broadcast::channel::<DeviceEvent>(64);

    let radio = Arc::new(SimulatedRadio::new(radio_tx, config.peer_script()));
    let link = Arc::new(LinkManager::new(
        radio.clone(),
        config.link_settings(),
        link_tx,
    ));
    info!(
        characteristic = ?CHARACTERISTIC_UUID,
        queue_capacity = config.queue_capacity,
        "link manager initialized"
    );

    // Without the microphone there is nothing to stream
    let source = FeatureSource::acquire(|| {
        SyntheticInput::open(config.simulation.tone_hz, config.simulation.envelope_secs)
    })
    .context("failed to initialize feature source")?;

    let feature_log: Arc<dyn FeatureLog> = match CsvFeatureLog::open(&config.feature_log_path()) {
        Ok(log) => {
            info!(path = %log.path().display(), "feature log opened");
            Arc::new(log)
        }
        Err(e) => {
            warn!(%e, "continuing without feature log");
            Arc::new(NullFeatureLog)
        }
    };

    let coordinator = Arc::new(Coordinator::new(
        link.clone(),
        source,
        Arc::new(TracingIndicator::new()),
        feature_log,
        config.timing(),
        event_tx.clone(),
    ));

    coordinator.set_mode_raw(config.initial_mode).await;

    if let Err(e) = radio.start() {
        error!(?e, "failed to start radio");
        coordinator.set_mode(Mode::FatalError).await;
    }

    info!("device initialized, entering main loop");

    // Each long-running context gets its own task
    let mut drive = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.run().await }
    });
    let mut dispatch = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.run_dispatch(link_rx).await }
    });
    let mut drain = tokio::spawn({
        let link = Arc::clone(&link);
        async move { link.run_drain().await }
    });
    let mut radio_events = tokio::spawn({
        let link = Arc::clone(&link);
        async move { link.run_events(radio_rx).await }
    });
    let mut event_log = tokio::spawn(log_device_events(event_rx));

    tokio::select! {
        result = &mut drive => {
            if let Err(e) = result {
                error!(?e, "application loop task failed");
            }
        }

        result = &mut dispatch => {
            match result {
                Ok(()) => info!("link event dispatch exited"),
                Err(e) => error!(?e, "link event dispatch task failed"),
            }
        }

        result = &mut drain => {
            match result {
                Ok(Ok(())) => info!("outbound drain exited"),
                Ok(Err(e)) => error!(?e, "outbound drain error"),
                Err(e) => error!(?e, "outbound drain task failed"),
            }
        }

        result = &mut radio_events => {
            match result {
                Ok(()) => info!("radio event loop exited"),
                Err(e) => error!(?e, "radio event task failed"),
            }
        }

        _ = &mut event_log => {
            info!("device event logger exited");
        }

        signal = shutdown.recv() => {
            info!(signal, "shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    for task in [&drive, &dispatch, &radio_events, &event_log] {
        task.abort();
    }
    drain.abort();

    if let Err(e) = link.disconnect() {
        warn!(?e, "failed to disconnect peer");
    }
    if let Err(e) = link.stop_advertising() {
        warn!(?e, "failed to stop advertising");
    }

    info!(
        mode = %coordinator.mode(),
        notifications = radio.notifications(),
        "sonaflow stopped"
    );

    Ok(())
}

async fn log_device_events(mut event_rx: broadcast::Receiver<DeviceEvent>) {
    loop {
        match event_rx.recv().await {
            Ok(event) => info!(%event, "device event"),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "device event receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
