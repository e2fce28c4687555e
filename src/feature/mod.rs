//! Feature source: audio in, one signed byte of loudness out

mod input;
mod source;

pub use input::{pcm_from_raw, AudioError, AudioInput, SyntheticInput, SAMPLE_RATE_HZ};
pub use source::{loudness_feature, rms, FeatureError, FeatureSource, FRAME_SAMPLES};
