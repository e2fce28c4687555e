//! Operating modes of the device

use serde::Serialize;

/// The closed set of modes the coordinator can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Mode {
    /// Before bring-up has requested the first real mode
    Uninitialized = 0,
    /// Advertising, no peer
    WaitingForConnection = 1,
    /// Peer just connected; hands over to Streaming on the next step
    ConnectedIdle = 2,
    /// Sampling and transmitting features
    Streaming = 3,
    /// Terminal fault, needs an external reset
    FatalError = 4,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl Mode {
    /// Resolve a raw mode identifier into a transition target.
    ///
    /// `Uninitialized` is never a valid target, so its identifier is
    /// rejected along with everything outside the known range.
    pub fn from_raw(raw: u8) -> Result<Self, UnknownMode> {
        match raw {
            1 => Ok(Mode::WaitingForConnection),
            2 => Ok(Mode::ConnectedIdle),
            3 => Ok(Mode::Streaming),
            4 => Ok(Mode::FatalError),
            _ => Err(UnknownMode(raw)),
        }
    }

    /// Whether no transition may leave this mode
    pub fn is_terminal(self) -> bool {
        self == Mode::FatalError
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Uninitialized => write!(f, "Uninitialized"),
            Mode::WaitingForConnection => write!(f, "WaitingForConnection"),
            Mode::ConnectedIdle => write!(f, "ConnectedIdle"),
            Mode::Streaming => write!(f, "Streaming"),
            Mode::FatalError => write!(f, "FatalError"),
        }
    }
}

/// A transition was requested to an identifier with no mode behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode identifier {0}")]
pub struct UnknownMode(pub u8);
