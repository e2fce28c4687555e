//! Fixed 10-byte feature frame
//!
//! Layout (multi-byte fields big-endian):
//!
//! | offset | field     |
//! |--------|-----------|
//! | 0      | sync      |
//! | 1      | type      |
//! | 2..4   | sequence  |
//! | 4..8   | timestamp |
//! | 8      | payload   |
//! | 9      | checksum  |

use serde::Serialize;

/// Total encoded length of a frame
pub const FRAME_LEN: usize = 10;

/// Sync byte opening every frame
pub const SYNC_BYTE: u8 = 0xAA;

/// Frame type for audio feature samples
pub const FRAME_TYPE_AUDIO_FEATURE: u8 = 0x01;

const CHECKSUM_OFFSET: usize = FRAME_LEN - 1;

/// One feature sample as produced by a streaming iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    /// Per-session sequence number, wraps at 65536
    pub sequence: u16,
    /// Milliseconds since boot
    pub timestamp_ms: u32,
    /// Scaled loudness feature
    pub feature: i8,
}

/// Why a byte buffer was rejected as a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedFrame {
    #[error("malformed frame: expected 10 bytes, got {0}")]
    Length(usize),

    #[error("malformed frame: bad sync byte {0:#04x}")]
    Sync(u8),

    #[error("malformed frame: checksum {received:#04x} does not match computed {computed:#04x}")]
    Checksum { computed: u8, received: u8 },
}

/// An encoded, validated frame. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Raw wire bytes
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn frame_type(&self) -> u8 {
        self.0[1]
    }

    pub fn sequence(&self) -> u16 {
        u16::from_be_bytes([self.0[2], self.0[3]])
    }

    pub fn timestamp_ms(&self) -> u32 {
        u32::from_be_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
    }

    pub fn payload(&self) -> i8 {
        self.0[8] as i8
    }

    pub fn checksum(&self) -> u8 {
        self.0[CHECKSUM_OFFSET]
    }

    /// The sample this frame carries
    pub fn sample(&self) -> Sample {
        Sample {
            sequence: self.sequence(),
            timestamp_ms: self.timestamp_ms(),
            feature: self.payload(),
        }
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = MalformedFrame;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        decode(bytes)
    }
}

/// XOR of every byte in `bytes`
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Serialize a sample into a frame
pub fn encode(sample: &Sample) -> Frame {
    let mut buf = [0u8; FRAME_LEN];
    buf[0] = SYNC_BYTE;
    buf[1] = FRAME_TYPE_AUDIO_FEATURE;
    buf[2..4].copy_from_slice(&sample.sequence.to_be_bytes());
    buf[4..8].copy_from_slice(&sample.timestamp_ms.to_be_bytes());
    buf[8] = sample.feature as u8;
    buf[CHECKSUM_OFFSET] = checksum(&buf[..CHECKSUM_OFFSET]);
    Frame(buf)
}

/// Validate and parse a received buffer.
///
/// The type byte is carried through unchecked; only length, sync and
/// checksum decide validity.
pub fn decode(bytes: &[u8]) -> Result<Frame, MalformedFrame> {
    let buf: [u8; FRAME_LEN] = bytes
        .try_into()
        .map_err(|_| MalformedFrame::Length(bytes.len()))?;

    if buf[0] != SYNC_BYTE {
        return Err(MalformedFrame::Sync(buf[0]));
    }

    let frame = Frame(buf);
    let computed = checksum(&buf[..CHECKSUM_OFFSET]);
    if computed != frame.checksum() {
        return Err(MalformedFrame::Checksum {
            computed,
            received: frame.checksum(),
        });
    }

    Ok(frame)
}
