//! Audio post-processing, spatialization, and playback

pub mod normalize;
pub mod playback;
pub mod spatial;

use std::time::Duration;

pub use normalize::{BITS_PER_SAMPLE, CHANNELS, NormalizedAudio, SAMPLE_RATE, normalize, samples_to_wav};
pub use playback::{ActiveSound, PlaybackControls, PlaybackEngine};

/// Shortest playback window scheduled for any utterance. Degenerate
/// near-zero durations would end the modulation loop before the first tick.
pub const MIN_PLAYBACK: Duration = Duration::from_millis(50);

/// Clamp a reported waveform duration up to the playback floor.
#[must_use]
pub fn clamp_playback_duration(duration: Duration) -> Duration {
    duration.max(MIN_PLAYBACK)
}
