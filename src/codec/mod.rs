//! Wire codec for the feature link
//!
//! Pure functions turning a [`Sample`] into a fixed-size [`Frame`] and
//! validating frames received from the peer. No I/O, no shared state.

mod frame;

pub use frame::{
    checksum, decode, encode, Frame, MalformedFrame, Sample, FRAME_LEN,
    FRAME_TYPE_AUDIO_FEATURE, SYNC_BYTE,
};
