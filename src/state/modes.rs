//! Enter, execute and exit behaviour of each mode

use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};

use tracing::{debug, error, info, trace, warn};

use crate::codec::Sample;
use crate::feature::FeatureError;
use crate::indicator::colors;
use crate::link::LinkError;

use super::machine::Coordinator;
use super::mode::Mode;

impl Coordinator {
    /// Runs with the transition lock held, so it must never call
    /// `set_mode` or `request_transition`; either would deadlock.
    pub(super) async fn enter(&self, mode: Mode) {
        match mode {
            Mode::Uninitialized => {}

            Mode::WaitingForConnection => {
                info!("waiting for connection");
                self.indicator.show(colors::WAITING);

                if self.link.is_advertising() {
                    debug!("already advertising, no action needed");
                } else if let Err(e) = self.link.start_advertising() {
                    // The link retries on its next advertising event.
                    warn!(?e, "could not start advertising on entering wait");
                }
            }

            Mode::ConnectedIdle => {
                self.indicator.show(colors::CONNECTED);
            }

            Mode::Streaming => {
                self.sequence.store(0, Ordering::SeqCst);
                info!("streaming session started");
                self.indicator.show(colors::STREAMING);
            }

            Mode::FatalError => {
                error!("fatal error, halting until external reset");
                self.heartbeat_lit.store(true, Ordering::SeqCst);
                self.indicator.show(colors::FAULT);
            }
        }
    }

    pub(super) async fn exit(&self, mode: Mode) {
        if mode == Mode::Streaming {
            info!(
                next_sequence = self.sequence.load(Ordering::SeqCst),
                "streaming session ended"
            );
        }
    }

    pub(super) async fn execute(&self, mode: Mode) {
        match mode {
            Mode::Uninitialized => self.wait_for_bring_up().await,
            Mode::WaitingForConnection => tokio::time::sleep(self.timing.idle_poll).await,
            Mode::ConnectedIdle => {
                self.request_transition(Mode::ConnectedIdle, Mode::Streaming)
                    .await;
                tokio::time::sleep(self.timing.connected_idle_delay).await;
            }
            Mode::Streaming => self.stream_once().await,
            Mode::FatalError => self.heartbeat().await,
        }
    }

    async fn wait_for_bring_up(&self) {
        let mut mode_rx = self.subscribe_mode();
        // The coordinator holds the sender, so this only ends on a transition.
        let _ = mode_rx.wait_for(|mode| *mode != Mode::Uninitialized).await;
    }

    async fn stream_once(&self) {
        if !self.link.is_connected() {
            warn!("link lost while streaming, returning to wait");
            self.request_transition(Mode::Streaming, Mode::WaitingForConnection)
                .await;
            return;
        }

        let feature = match self.read_feature().await {
            Ok(feature) => feature,
            Err(e) => {
                warn!(%e, "failed to get audio feature");
                tokio::time::sleep(self.timing.stream_interval).await;
                return;
            }
        };

        let sample = Sample {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            timestamp_ms: self.uptime_ms(),
            feature,
        };

        if let Err(e) = self
            .feature_log
            .log_feature(sample.timestamp_ms, sample.sequence, sample.feature)
        {
            debug!(%e, "feature log write failed");
        }

        match self.link.send(sample).await {
            Ok(()) => trace!(sequence = sample.sequence, feature, "sample queued"),
            Err(LinkError::QueueFull) => {
                warn!(sequence = sample.sequence, "outbound queue full, dropping sample")
            }
            Err(e) => warn!(?e, sequence = sample.sequence, "failed to queue sample"),
        }

        tokio::time::sleep(self.timing.stream_interval).await;
    }

    /// Capture one feature on the blocking pool so a slow read never
    /// holds up the link and dispatch tasks.
    async fn read_feature(&self) -> Result<i8, FeatureError> {
        let source = Arc::clone(&self.source);
        let read = tokio::task::spawn_blocking(move || {
            source
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_feature()
        });

        match read.await {
            Ok(result) => result,
            Err(e) => {
                error!(%e, "feature read task failed");
                Err(FeatureError::HardwareUnavailable)
            }
        }
    }

    async fn heartbeat(&self) {
        let lit = !self.heartbeat_lit.fetch_xor(true, Ordering::SeqCst);
        if lit {
            self.indicator.show(colors::FAULT);
        } else {
            self.indicator.off();
        }
        tokio::time::sleep(self.timing.heartbeat).await;
    }
}
