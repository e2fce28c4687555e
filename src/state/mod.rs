//! Application state machine
//!
//! One coordinator owns the current mode:
//! - Uninitialized: before bring-up picks the first mode
//! - WaitingForConnection: advertising, idling
//! - ConnectedIdle: pass-through into Streaming
//! - Streaming: sample, frame, queue, repeat
//! - FatalError: terminal, blinks until reset

mod machine;
mod mode;
mod modes;

pub use machine::{Coordinator, Timing};
pub use mode::{Mode, UnknownMode};
