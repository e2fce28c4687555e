//! Link manager: advertising lifecycle, connection handle, outbound queue
//!
//! Three contexts touch the link:
//! - the radio event context ([`LinkManager::run_events`]) is the only
//!   writer of the connection handle and forwards [`LinkEvent`]s to the
//!   coordinator,
//! - the drive loop enqueues samples through [`LinkManager::send`],
//! - the drain loop ([`LinkManager::run_drain`]) is the queue's only
//!   consumer and turns frames into notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{self, Frame, Sample};
use crate::events::LinkEvent;

use super::radio::{AdvertisingData, ConnectionHandle, RadioDriver, RadioError, RadioEvent};

/// Link configuration fixed at construction
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// Advertised device name
    pub device_name: String,
    /// Advertised service identifier
    pub service_uuid: [u8; 16],
    /// Outbound queue slots
    pub queue_capacity: usize,
    /// Longest `send` waits for a free slot
    pub enqueue_timeout: Duration,
}

/// Errors from the link manager
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("outbound queue full")]
    QueueFull,

    #[error("outbound queue closed")]
    QueueClosed,

    #[error("drain task is already running")]
    DrainAlreadyRunning,

    #[error(transparent)]
    Radio(#[from] RadioError),
}

/// Owns the wireless side of the device
pub struct LinkManager {
    radio: Arc<dyn RadioDriver>,
    settings: LinkSettings,
    advertising: AtomicBool,
    connection: watch::Sender<Option<ConnectionHandle>>,
    queue_tx: mpsc::Sender<Frame>,
    queue_rx: Mutex<Option<mpsc::Receiver<Frame>>>,
    event_tx: mpsc::Sender<LinkEvent>,
}

impl LinkManager {
    /// Create the link manager.
    ///
    /// `event_tx` is where connection events for the coordinator go.
    pub fn new(
        radio: Arc<dyn RadioDriver>,
        settings: LinkSettings,
        event_tx: mpsc::Sender<LinkEvent>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(settings.queue_capacity.max(1));
        let (connection, _) = watch::channel(None);

        Self {
            radio,
            settings,
            advertising: AtomicBool::new(false),
            connection,
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            event_tx,
        }
    }

    /// Whether a peer is connected
    pub fn is_connected(&self) -> bool {
        self.connection.borrow().is_some()
    }

    /// Handle of the connected peer, if any
    pub fn connection(&self) -> Option<ConnectionHandle> {
        *self.connection.borrow()
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising.load(Ordering::SeqCst)
    }

    /// Start advertising. No-op while already advertising.
    pub fn start_advertising(&self) -> Result<(), LinkError> {
        if self.advertising.swap(true, Ordering::SeqCst) {
            debug!("already advertising");
            return Ok(());
        }

        let data = AdvertisingData {
            device_name: self.settings.device_name.clone(),
            service_uuid: self.settings.service_uuid,
        };

        if let Err(e) = self.radio.start_advertising(&data) {
            self.advertising.store(false, Ordering::SeqCst);
            error!(?e, "failed to start advertising");
            return Err(e.into());
        }

        info!(name = %data.device_name, "advertising started");
        Ok(())
    }

    pub fn stop_advertising(&self) -> Result<(), LinkError> {
        if !self.advertising.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.radio.stop_advertising()?;
        info!("advertising stopped");
        Ok(())
    }

    /// Ask the radio to drop the current peer. The handle is cleared when
    /// the resulting disconnect event arrives.
    pub fn disconnect(&self) -> Result<(), LinkError> {
        match self.connection() {
            Some(handle) => {
                info!(%handle, "disconnecting peer");
                self.radio.disconnect(handle)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Frame `sample` and queue it for transmission.
    ///
    /// Waits at most the configured enqueue timeout for a free slot.
    pub async fn send(&self, sample: Sample) -> Result<(), LinkError> {
        let frame = codec::encode(&sample);
        self.queue_tx
            .send_timeout(frame, self.settings.enqueue_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => LinkError::QueueFull,
                SendTimeoutError::Closed(_) => LinkError::QueueClosed,
            })
    }

    /// Drain the outbound queue into notifications.
    ///
    /// Runs until the queue closes. Frames dequeued with no peer are dropped.
    pub async fn run_drain(&self) -> Result<(), LinkError> {
        let mut queue_rx = self
            .queue_rx
            .lock()
            .await
            .take()
            .ok_or(LinkError::DrainAlreadyRunning)?;

        info!("drain task started");

        while let Some(frame) = queue_rx.recv().await {
            self.transmit(&frame);
        }

        info!("drain task stopped");
        Ok(())
    }

    fn transmit(&self, frame: &Frame) {
        let Some(handle) = self.connection() else {
            trace!(sequence = frame.sequence(), "no peer, dropping frame");
            return;
        };

        if let Err(e) = self.radio.notify(handle, frame.as_bytes()) {
            error!(?e, %handle, sequence = frame.sequence(), "error sending notification");
        }
    }

    /// Process radio stack events until the stack's channel closes
    pub async fn run_events(&self, mut radio_rx: mpsc::Receiver<RadioEvent>) {
        info!("radio event loop started");

        while let Some(event) = radio_rx.recv().await {
            self.handle_radio_event(event).await;
        }

        info!("radio event loop stopped");
    }

    pub(crate) async fn handle_radio_event(&self, event: RadioEvent) {
        match event {
            RadioEvent::Synced => {
                info!("radio stack synchronized");
                self.restart_advertising();
            }

            RadioEvent::Reset { reason } => {
                warn!(reason, "radio stack reset");
            }

            RadioEvent::Connected { handle } => {
                info!(%handle, "device connected");
                // Connectable advertising ends once a central connects.
                self.advertising.store(false, Ordering::SeqCst);
                let previous = self.connection.send_replace(Some(handle));
                if let Some(previous) = previous {
                    warn!(%previous, %handle, "replacing existing connection");
                }
                self.forward(LinkEvent::Connected { handle }).await;
            }

            RadioEvent::Disconnected { handle, reason } => {
                warn!(%handle, reason, "device disconnected");
                self.connection.send_replace(None);
                self.forward(LinkEvent::Disconnected { reason }).await;
                self.restart_advertising();
            }

            RadioEvent::AdvertisingComplete { reason } => {
                info!(reason, "advertising complete");
                self.advertising.store(false, Ordering::SeqCst);
                self.restart_advertising();
            }

            RadioEvent::Subscribe { handle, notify } => {
                info!(%handle, notify, "subscription changed");
            }

            RadioEvent::Write { handle, data } => match codec::decode(&data) {
                Ok(frame) => {
                    debug!(%handle, sequence = frame.sequence(), "control frame received");
                    self.forward(LinkEvent::PacketReceived(frame)).await;
                }
                Err(e) => {
                    warn!(%handle, %e, "failed to decode received packet");
                }
            },
        }
    }

    fn restart_advertising(&self) {
        if let Err(e) = self.start_advertising() {
            warn!(?e, "advertising restart failed");
        }
    }

    async fn forward(&self, event: LinkEvent) {
        if self.event_tx.send(event).await.is_err() {
            warn!("link event receiver dropped");
        }
    }
}
