//! Chat speaker identities
//!
//! Every chat participant gets a persistent voice identity on first
//! utterance: a spot in the room, a base pitch, a vibrato signature, and
//! fixed speech rate/pitch biases. The identity survives the session in the
//! registry and can leave it as a recovery code.

mod recovery;
mod registry;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use registry::SpeakerRegistry;

use crate::Result;
use crate::audio::spatial::Vec3;

/// A per-language voice assignment. Validity is re-verified against the
/// synthesizer before every use; a failing entry gets re-rolled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedVoice {
    pub name: String,
    #[serde(default)]
    pub valid: bool,
}

/// A chat participant's persistent voice identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,

    /// Fixed spot in the room, each component in [-1, 1]
    pub position: Vec3,

    /// Base pitch bias, [-max_pitch_factor, +max_pitch_factor]
    pub pitch: f32,

    /// Initial vibrato phase, [0, 2π)
    pub tremble_begin: f32,

    /// Vibrato phase advance per modulation tick
    pub tremble_speed: f32,

    /// Vibrato amplitude
    pub tremble_factor: f32,

    /// Fixed speech rate bias, percent
    pub speech_rate: i16,

    /// Fixed speech pitch bias, percent
    pub speech_pitch: i8,

    /// Language tag → assigned synthesizer voice
    #[serde(default)]
    pub voices: HashMap<String, AssignedVoice>,

    /// When this speaker last spoke
    #[serde(default = "Utc::now")]
    pub last_spoke: DateTime<Utc>,
}

impl Speaker {
    /// Roll a fresh identity for `name`.
    ///
    /// Slow trembles get a wider amplitude range: a barely-moving sine is
    /// inaudible at the normal cap, so it trades speed for depth.
    pub fn roll(name: impl Into<String>, max_pitch_factor: f32, rng: &mut impl Rng) -> Self {
        let tremble_speed: f32 = rng.gen_range(0.0..1.0);
        let factor_cap = if tremble_speed < 0.02 { 2.0 } else { 0.3 };

        Self {
            name: name.into(),
            position: Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ),
            pitch: rng.gen_range(-1.0..1.0_f32) * max_pitch_factor,
            tremble_begin: rng.gen_range(0.0..std::f32::consts::TAU),
            tremble_speed,
            tremble_factor: rng.gen_range(0.0..factor_cap),
            speech_rate: rng.gen_range(-80..100),
            speech_pitch: rng.gen_range(-50..50),
            voices: HashMap::new(),
            last_spoke: Utc::now(),
        }
    }

    /// Export this identity as a compact portable token.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_recovery_code(&self) -> Result<String> {
        recovery::encode(self)
    }

    /// Rebuild an identity from a recovery code.
    ///
    /// # Errors
    ///
    /// Returns error if the token is malformed
    pub fn from_recovery_code(code: &str) -> Result<Self> {
        recovery::decode(code)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn rolled_speaker_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let speaker = Speaker::roll("test", 1.0, &mut rng);
            assert!(speaker.position.x >= -1.0 && speaker.position.x < 1.0);
            assert!(speaker.pitch >= -1.0 && speaker.pitch < 1.0);
            assert!(speaker.tremble_begin >= 0.0 && speaker.tremble_begin < std::f32::consts::TAU);
            assert!(speaker.tremble_speed >= 0.0 && speaker.tremble_speed < 1.0);
            assert!(speaker.speech_rate >= -80 && speaker.speech_rate < 100);
            assert!(speaker.speech_pitch >= -50 && speaker.speech_pitch < 50);
        }
    }

    #[test]
    fn slow_tremble_widens_amplitude_cap() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut saw_deep = false;
        for _ in 0..5000 {
            let speaker = Speaker::roll("test", 1.0, &mut rng);
            if speaker.tremble_speed >= 0.02 {
                assert!(speaker.tremble_factor < 0.3);
            } else if speaker.tremble_factor >= 0.3 {
                saw_deep = true;
            }
        }
        // 5000 rolls make a slow-and-deep signature overwhelmingly likely
        assert!(saw_deep);
    }

    #[test]
    fn base_pitch_scales_with_max_factor() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let speaker = Speaker::roll("test", 0.25, &mut rng);
            assert!(speaker.pitch.abs() <= 0.25);
        }
    }
}
