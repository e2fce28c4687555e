//! Coordinator: owns the current mode and drives it
//!
//! The current mode lives in a watch channel whose internal lock is the
//! only place the mode is swapped. Whole exit/swap/enter sequences are
//! serialized by a separate transition lock, so concurrent requests
//! resolve into complete exit/enter pairs. Hooks run outside the swap
//! lock and never request transitions themselves.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::events::{DeviceEvent, LinkEvent};
use crate::feature::FeatureSource;
use crate::indicator::StatusIndicator;
use crate::link::LinkManager;
use crate::storage::FeatureLog;

use super::mode::Mode;

/// Delays used by the mode behaviours
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Pause between streaming iterations
    pub stream_interval: Duration,
    /// Sleep per idle step while waiting for a peer
    pub idle_poll: Duration,
    /// Pause after ConnectedIdle hands over to Streaming
    pub connected_idle_delay: Duration,
    /// Half period of the fault blink
    pub heartbeat: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            stream_interval: Duration::from_millis(20),
            idle_poll: Duration::from_millis(100),
            connected_idle_delay: Duration::from_millis(10),
            heartbeat: Duration::from_millis(500),
        }
    }
}

/// The application state machine
pub struct Coordinator {
    pub(super) mode_tx: watch::Sender<Mode>,
    transition: Mutex<()>,
    pub(super) link: Arc<LinkManager>,
    /// Reads block on the hardware, so they run on the blocking pool
    pub(super) source: Arc<std::sync::Mutex<FeatureSource>>,
    pub(super) indicator: Arc<dyn StatusIndicator>,
    pub(super) feature_log: Arc<dyn FeatureLog>,
    event_tx: broadcast::Sender<DeviceEvent>,
    pub(super) timing: Timing,
    booted_at: Instant,
    /// Next sequence number of the streaming session
    pub(super) sequence: AtomicU16,
    pub(super) heartbeat_lit: AtomicBool,
}

impl Coordinator {
    /// Build the coordinator around already initialized collaborators.
    ///
    /// Starts in `Uninitialized`; the caller makes the first transition.
    pub fn new(
        link: Arc<LinkManager>,
        source: FeatureSource,
        indicator: Arc<dyn StatusIndicator>,
        feature_log: Arc<dyn FeatureLog>,
        timing: Timing,
        event_tx: broadcast::Sender<DeviceEvent>,
    ) -> Self {
        let (mode_tx, _) = watch::channel(Mode::Uninitialized);

        Self {
            mode_tx,
            transition: Mutex::new(()),
            link,
            source: Arc::new(std::sync::Mutex::new(source)),
            indicator,
            feature_log,
            event_tx,
            timing,
            booted_at: Instant::now(),
            sequence: AtomicU16::new(0),
            heartbeat_lit: AtomicBool::new(false),
        }
    }

    /// The current mode
    pub fn mode(&self) -> Mode {
        *self.mode_tx.borrow()
    }

    /// Observe mode changes
    pub fn subscribe_mode(&self) -> watch::Receiver<Mode> {
        self.mode_tx.subscribe()
    }

    /// Sequence number the next streamed sample will carry
    #[cfg(test)]
    pub fn next_sequence(&self) -> u16 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Milliseconds since the coordinator was created, wrapping at 2^32
    pub fn uptime_ms(&self) -> u32 {
        self.booted_at.elapsed().as_millis() as u32
    }

    /// Transition to `target`.
    ///
    /// Returns whether a transition happened. Requesting the current mode
    /// is a no-op; nothing leaves `FatalError`.
    pub async fn set_mode(&self, target: Mode) -> bool {
        let _guard = self.transition.lock().await;
        self.transition_locked(target).await
    }

    /// Transition to a mode given by its raw identifier.
    ///
    /// Identifiers with no valid target behind them fail safe into
    /// `FatalError`.
    pub async fn set_mode_raw(&self, raw: u8) -> bool {
        match Mode::from_raw(raw) {
            Ok(target) => self.set_mode(target).await,
            Err(e) => {
                error!(%e, "transition to unknown mode requested");
                self.set_mode(Mode::FatalError).await
            }
        }
    }

    /// Transition from `from` to `to`, unless something else already moved
    /// the machine out of `from`. Used by the drive loop so that its own
    /// requests never override an event-driven transition.
    pub(super) async fn request_transition(&self, from: Mode, to: Mode) -> bool {
        let _guard = self.transition.lock().await;

        let current = self.mode();
        if current != from {
            debug!(%from, %to, %current, "discarding stale transition request");
            return false;
        }
        self.transition_locked(to).await
    }

    async fn transition_locked(&self, target: Mode) -> bool {
        let current = self.mode();
        if current == target {
            return false;
        }

        if current.is_terminal() {
            warn!(%current, %target, "ignoring transition out of terminal mode");
            return false;
        }

        let target = if target == Mode::Uninitialized {
            error!("Uninitialized is not a valid transition target");
            Mode::FatalError
        } else {
            target
        };

        info!(from = %current, to = %target, "mode transition");

        self.exit(current).await;
        self.emit(DeviceEvent::ModeExited { mode: current });

        self.mode_tx.send_replace(target);

        self.enter(target).await;
        self.emit(DeviceEvent::ModeEntered { mode: target });

        true
    }

    fn emit(&self, event: DeviceEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    /// Run one execute step of the current mode.
    ///
    /// A transition requested while the step runs is picked up by the
    /// next step.
    pub async fn step(&self) {
        let mode = self.mode();
        self.execute(mode).await;
    }

    /// The drive loop. Never returns.
    pub async fn run(&self) {
        info!(mode = %self.mode(), "drive loop started");
        loop {
            self.step().await;
        }
    }

    /// Apply link events to the state machine until the link goes away
    pub async fn run_dispatch(&self, mut link_rx: mpsc::Receiver<LinkEvent>) {
        info!("link event dispatcher started");

        while let Some(event) = link_rx.recv().await {
            self.handle_link_event(event).await;
        }

        info!("link event dispatcher stopped");
    }

    pub(crate) async fn handle_link_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::Connected { handle } => {
                info!(%handle, "event: peer connected");
                self.set_mode(Mode::ConnectedIdle).await;
            }
            LinkEvent::Disconnected { reason } => {
                info!(reason, "event: peer disconnected");
                self.set_mode(Mode::WaitingForConnection).await;
            }
            LinkEvent::PacketReceived(frame) => {
                debug!(
                    frame_type = frame.frame_type(),
                    sequence = frame.sequence(),
                    payload = frame.payload(),
                    "event: control frame"
                );
                self.emit(DeviceEvent::ControlFrame {
                    frame_type: frame.frame_type(),
                    sample: frame.sample(),
                });
            }
        }
    }
}
