//! Radio stack boundary
//!
//! The link manager drives the radio through [`RadioDriver`] and receives
//! the stack's asynchronous happenings as [`RadioEvent`]s on a channel.
//! [`SimulatedRadio`] plays a peer that connects, subscribes, writes one
//! control frame and drops, over and over.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::codec::{self, Sample};

/// 128-bit UUID of the primary feature service
pub const SERVICE_UUID: [u8; 16] = [
    0xF9, 0x22, 0x93, 0x63, 0x04, 0x49, 0x01, 0x9A, 0x79, 0x4E, 0x6E, 0x54, 0x5C, 0x42, 0xF8,
    0x8C,
];

/// 128-bit UUID of the write + notify feature characteristic
pub const CHARACTERISTIC_UUID: [u8; 16] = [
    0x9B, 0xD7, 0x43, 0x8A, 0x6E, 0x82, 0x93, 0xAD, 0x47, 0x45, 0x2B, 0x4A, 0x24, 0x86, 0x37,
    0x2A,
];

/// HCI reason code for "remote user terminated connection"
const REMOTE_USER_TERMINATED: i32 = 0x13;

/// Identifier of the connected peer as assigned by the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub u16);

impl std::fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discovery fields for one advertising run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingData {
    /// Human-readable name carried in the scan response
    pub device_name: String,
    /// Service identifier carried in the advertisement
    pub service_uuid: [u8; 16],
}

/// Lower-level events raised by the radio stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// Host and controller are in sync; the stack is usable
    Synced,
    /// The stack reset itself
    Reset { reason: i32 },
    /// A central connected
    Connected { handle: ConnectionHandle },
    /// The link dropped
    Disconnected { handle: ConnectionHandle, reason: i32 },
    /// An advertising run ended without a connection
    AdvertisingComplete { reason: i32 },
    /// The peer changed its notification subscription
    Subscribe {
        handle: ConnectionHandle,
        notify: bool,
    },
    /// The peer wrote to the feature characteristic
    Write {
        handle: ConnectionHandle,
        data: Vec<u8>,
    },
}

/// Errors reported by a radio driver
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RadioError {
    #[error("radio stack rejected advertising: {0}")]
    Advertising(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("radio driver error: {0}")]
    Driver(String),
}

/// Commands the link manager issues to the radio stack
pub trait RadioDriver: Send + Sync {
    /// Begin connectable, general-discoverable advertising
    fn start_advertising(&self, data: &AdvertisingData) -> Result<(), RadioError>;

    fn stop_advertising(&self) -> Result<(), RadioError>;

    /// Send `data` as a notification on the feature characteristic
    fn notify(&self, handle: ConnectionHandle, data: &[u8]) -> Result<(), RadioError>;

    /// Terminate the link to `handle`
    fn disconnect(&self, handle: ConnectionHandle) -> Result<(), RadioError>;
}

/// Timing of the simulated peer
#[derive(Debug, Clone, Copy)]
pub struct PeerScript {
    /// Delay between advertising start and the peer connecting
    pub connect_after: Duration,
    /// How long the peer stays connected
    pub session: Duration,
}

/// Radio stand-in that runs a scripted peer against the link manager
pub struct SimulatedRadio {
    events: mpsc::Sender<RadioEvent>,
    script: PeerScript,
    advertising: Arc<AtomicBool>,
    next_handle: Arc<AtomicU16>,
    notifications: AtomicU64,
}

impl SimulatedRadio {
    pub fn new(events: mpsc::Sender<RadioEvent>, script: PeerScript) -> Self {
        Self {
            events,
            script,
            advertising: Arc::new(AtomicBool::new(false)),
            next_handle: Arc::new(AtomicU16::new(1)),
            notifications: AtomicU64::new(0),
        }
    }

    /// Bring the simulated stack up; reports `Synced` once ready
    pub fn start(&self) -> Result<(), RadioError> {
        self.events
            .try_send(RadioEvent::Synced)
            .map_err(|e| RadioError::Driver(format!("event channel unavailable: {e}")))?;
        info!("simulated radio stack started");
        Ok(())
    }

    /// Notifications delivered so far
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }
}

impl RadioDriver for SimulatedRadio {
    fn start_advertising(&self, data: &AdvertisingData) -> Result<(), RadioError> {
        let runtime = Handle::try_current()
            .map_err(|e| RadioError::Advertising(format!("no runtime for peer: {e}")))?;

        self.advertising.store(true, Ordering::SeqCst);
        debug!(name = %data.device_name, "simulated advertising started");

        let events = self.events.clone();
        let advertising = Arc::clone(&self.advertising);
        let handle = ConnectionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let script = self.script;

        runtime.spawn(async move {
            tokio::time::sleep(script.connect_after).await;
            if !advertising.swap(false, Ordering::SeqCst) {
                debug!("advertising stopped before simulated peer connected");
                return;
            }

            let half = script.session / 2;
            let session = [
                RadioEvent::Connected { handle },
                RadioEvent::Subscribe {
                    handle,
                    notify: true,
                },
            ];
            for event in session {
                if events.send(event).await.is_err() {
                    return;
                }
            }

            tokio::time::sleep(half).await;
            let control = codec::encode(&Sample {
                sequence: 0,
                timestamp_ms: 0,
                feature: 1,
            });
            let writes = [
                RadioEvent::Write {
                    handle,
                    data: control.as_bytes().to_vec(),
                },
                // Truncated write, exercises the receive-side rejection.
                RadioEvent::Write {
                    handle,
                    data: control.as_bytes()[..4].to_vec(),
                },
            ];
            for event in writes {
                if events.send(event).await.is_err() {
                    return;
                }
            }

            tokio::time::sleep(half).await;
            let _ = events
                .send(RadioEvent::Disconnected {
                    handle,
                    reason: REMOTE_USER_TERMINATED,
                })
                .await;
        });

        Ok(())
    }

    fn stop_advertising(&self) -> Result<(), RadioError> {
        self.advertising.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn notify(&self, handle: ConnectionHandle, data: &[u8]) -> Result<(), RadioError> {
        // The stack is gone once nobody consumes its events.
        if self.events.is_closed() {
            return Err(RadioError::Notify(format!("stack down, {handle} unreachable")));
        }
        let count = self.notifications.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(%handle, len = data.len(), count, "simulated notification");
        Ok(())
    }

    fn disconnect(&self, handle: ConnectionHandle) -> Result<(), RadioError> {
        self.events
            .try_send(RadioEvent::Disconnected {
                handle,
                reason: REMOTE_USER_TERMINATED,
            })
            .map_err(|e| {
                warn!(%handle, "failed to queue simulated disconnect");
                RadioError::Driver(e.to_string())
            })
    }
}
