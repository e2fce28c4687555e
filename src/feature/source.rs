//! Loudness feature extraction
//!
//! One feature per request: capture an analysis frame, take its RMS,
//! express it in dB above a fixed floor and rescale into `0..=127`.

use tracing::{debug, error, info};

use super::input::{AudioError, AudioInput};

/// Samples per analysis frame
pub const FRAME_SAMPLES: usize = 256;

/// RMS treated as 0 dB; anything quieter reads as silence
const REFERENCE_RMS: f64 = 20.0;

/// dB level mapped to the top of the output range
const MAX_DB_LEVEL: f64 = 96.0;

/// Errors from the feature source
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("sampling hardware unavailable")]
    HardwareUnavailable,

    #[error("sampling hardware read failed: {0}")]
    Read(#[from] AudioError),

    #[error("failed to acquire sampling hardware: {0}")]
    InitializationFailure(AudioError),
}

/// Produces one scalar feature per call from an exclusively owned input
pub struct FeatureSource {
    input: Option<Box<dyn AudioInput>>,
    frame: Vec<i16>,
}

impl FeatureSource {
    /// Acquire the sampling resource through `open`.
    ///
    /// Bring-up treats a failure here as fatal.
    pub fn acquire<I, F>(open: F) -> Result<Self, FeatureError>
    where
        I: AudioInput + 'static,
        F: FnOnce() -> Result<I, AudioError>,
    {
        match open() {
            Ok(input) => {
                info!(frame_samples = FRAME_SAMPLES, "feature source acquired input");
                Ok(Self::new(Box::new(input)))
            }
            Err(e) => {
                error!(?e, "failed to acquire audio input");
                Err(FeatureError::InitializationFailure(e))
            }
        }
    }

    /// Wrap an already acquired input
    pub fn new(input: Box<dyn AudioInput>) -> Self {
        Self {
            input: Some(input),
            frame: vec![0; FRAME_SAMPLES],
        }
    }

    /// A source whose hardware was never acquired
    #[cfg(test)]
    pub fn unavailable() -> Self {
        Self {
            input: None,
            frame: vec![0; FRAME_SAMPLES],
        }
    }

    pub fn is_available(&self) -> bool {
        self.input.is_some()
    }

    /// Capture one analysis frame and reduce it to a feature.
    ///
    /// A read that times out with no samples yields `Ok(0)`.
    pub fn get_feature(&mut self) -> Result<i8, FeatureError> {
        let input = self.input.as_mut().ok_or(FeatureError::HardwareUnavailable)?;

        let read = input.read(&mut self.frame)?.min(self.frame.len());
        if read == 0 {
            debug!("audio read returned no samples");
            return Ok(0);
        }

        Ok(loudness_feature(&self.frame[..read]))
    }
}

impl std::fmt::Debug for FeatureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureSource")
            .field("available", &self.is_available())
            .field("frame_samples", &self.frame.len())
            .finish()
    }
}

/// Root-mean-square magnitude of a PCM frame
pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_of_squares: i64 = samples.iter().map(|&s| i64::from(s) * i64::from(s)).sum();
    (sum_of_squares as f64 / samples.len() as f64).sqrt()
}

/// Scale a PCM frame's loudness into the feature range `0..=127`
pub fn loudness_feature(samples: &[i16]) -> i8 {
    let db = 20.0 * (rms(samples).max(REFERENCE_RMS) / REFERENCE_RMS).log10();
    let scaled = db / MAX_DB_LEVEL * f64::from(i8::MAX);
    scaled.clamp(0.0, f64::from(i8::MAX)) as i8
}
