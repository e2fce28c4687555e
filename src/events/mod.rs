//! Events crossing task boundaries
//!
//! [`LinkEvent`]s flow from the radio event context to the coordinator's
//! dispatcher over an mpsc channel. [`DeviceEvent`]s are broadcast by the
//! coordinator for observers (logging, tests).

use serde::Serialize;

use crate::codec::{Frame, Sample};
use crate::link::ConnectionHandle;
use crate::state::Mode;

/// Connection-level events raised by the link manager
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A peer connected; the link now holds its handle
    Connected { handle: ConnectionHandle },

    /// The peer dropped; the link has already cleared its handle
    Disconnected { reason: i32 },

    /// A valid control frame arrived on the writable characteristic
    PacketReceived(Frame),
}

/// Events emitted by the coordinator
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// The outgoing mode's exit hook has run
    ModeExited { mode: Mode },

    /// The incoming mode's enter hook has run
    ModeEntered { mode: Mode },

    /// Control frame received from the peer
    ControlFrame { frame_type: u8, sample: Sample },
}

impl std::fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceEvent::ModeExited { mode } => write!(f, "MODE_EXITED ({mode})"),
            DeviceEvent::ModeEntered { mode } => write!(f, "MODE_ENTERED ({mode})"),
            DeviceEvent::ControlFrame { frame_type, sample } => write!(
                f,
                "CONTROL_FRAME (type={frame_type:#04x} seq={} payload={})",
                sample.sequence, sample.feature
            ),
        }
    }
}
