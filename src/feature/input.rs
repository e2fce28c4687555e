//! Audio input collaborator
//!
//! The sampling hardware is opaque to the core: anything that can fill a
//! buffer of PCM samples within a bounded time implements [`AudioInput`].

use std::f64::consts::TAU;

/// Right shift turning a raw 32-bit I2S word into 16-bit PCM
const RAW_TO_PCM_SHIFT: u32 = 12;

/// Sample rate of the microphone channel
pub const SAMPLE_RATE_HZ: u32 = 44_100;

/// Errors from the sampling hardware
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("audio driver error: {0}")]
    Driver(String),

    #[error("invalid audio configuration: {0}")]
    InvalidConfig(String),
}

/// Exclusive handle on a sampling resource
pub trait AudioInput: Send {
    /// Fill `dest` with PCM samples, returning how many were written.
    ///
    /// Blocks at most for the hardware timeout; a timeout with nothing
    /// captured returns `Ok(0)`.
    fn read(&mut self, dest: &mut [i16]) -> Result<usize, AudioError>;
}

/// Convert one raw 32-bit capture word to 16-bit PCM
pub fn pcm_from_raw(raw: i32) -> i16 {
    (raw >> RAW_TO_PCM_SHIFT).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Tone generator standing in for the microphone.
///
/// Produces raw capture words of a sine whose amplitude swells and fades
/// over `envelope_secs`, so the loudness feature sweeps its range.
#[derive(Debug)]
pub struct SyntheticInput {
    tone_hz: f64,
    envelope_secs: f64,
    sample_index: u64,
}

impl SyntheticInput {
    /// Acquire the synthetic channel
    pub fn open(tone_hz: f64, envelope_secs: f64) -> Result<Self, AudioError> {
        let nyquist = SAMPLE_RATE_HZ as f64 / 2.0;
        if !(tone_hz > 0.0 && tone_hz < nyquist) {
            return Err(AudioError::InvalidConfig(format!(
                "tone {tone_hz} Hz outside (0, {nyquist}) Hz"
            )));
        }
        if !(envelope_secs > 0.0) {
            return Err(AudioError::InvalidConfig(format!(
                "envelope period {envelope_secs} s must be positive"
            )));
        }

        Ok(Self {
            tone_hz,
            envelope_secs,
            sample_index: 0,
        })
    }

    fn next_raw(&mut self) -> i32 {
        let t = self.sample_index as f64 / SAMPLE_RATE_HZ as f64;
        self.sample_index += 1;

        let envelope = 0.5 - 0.5 * (TAU * t / self.envelope_secs).cos();
        let value = envelope * (TAU * self.tone_hz * t).sin();
        (value * i32::MAX as f64) as i32
    }
}

impl AudioInput for SyntheticInput {
    fn read(&mut self, dest: &mut [i16]) -> Result<usize, AudioError> {
        for slot in dest.iter_mut() {
            *slot = pcm_from_raw(self.next_raw());
        }
        Ok(dest.len())
    }
}
