//! Voice assignment
//!
//! Each (speaker, language) pair gets a randomly chosen installed voice the
//! first time it is needed. Assignments are sticky but re-verified against
//! the synthesizer before every use — uninstalled or broken voices are
//! re-rolled up to a bound, after which the speech job proceeds best-effort
//! and lets the downstream synthesis failure get logged instead of blocking
//! the chat pipeline.

use std::sync::Arc;

use rand::Rng;

use crate::speaker::{AssignedVoice, Speaker};
use crate::speech::engine::{Synthesizer, VoiceInfo};
use crate::{Error, Result};

/// Resolves (speaker, language) to a synthesizer voice
pub struct VoiceAssigner {
    synthesizer: Arc<dyn Synthesizer>,
    retry_bound: u32,
}

impl VoiceAssigner {
    #[must_use]
    pub fn new(synthesizer: Arc<dyn Synthesizer>, retry_bound: u32) -> Self {
        Self {
            synthesizer,
            retry_bound,
        }
    }

    /// Voice name for `speaker` in `language`, re-rolling until a valid one
    /// sticks or the bound runs out.
    ///
    /// Exhausting the bound is not an error: the last assignment stays in
    /// place (marked invalid) and is returned anyway.
    ///
    /// # Errors
    ///
    /// Returns error only if the voice catalog itself is unavailable
    pub fn voice_for_language(&self, speaker: &mut Speaker, language: &str) -> Result<String> {
        if let Some(entry) = speaker.voices.get(language) {
            if self.synthesizer.probe_voice(&entry.name) {
                return Ok(entry.name.clone());
            }
            tracing::debug!(
                speaker = %speaker.name,
                language,
                voice = %entry.name,
                "assigned voice no longer selectable, re-rolling"
            );
        }

        let mut tries = self.retry_bound.max(1);
        loop {
            let candidate = self.random_voice(language)?;
            let valid = self.synthesizer.probe_voice(&candidate);
            speaker.voices.insert(
                language.to_string(),
                AssignedVoice {
                    name: candidate.clone(),
                    valid,
                },
            );

            if valid {
                tracing::debug!(
                    speaker = %speaker.name,
                    language,
                    voice = %candidate,
                    "voice assigned"
                );
                return Ok(candidate);
            }

            tries -= 1;
            if tries == 0 {
                tracing::warn!(
                    speaker = %speaker.name,
                    language,
                    voice = %candidate,
                    "couldn't find a working voice, proceeding best-effort"
                );
                return Ok(candidate);
            }
        }
    }

    /// Random installed voice for `language`, falling back to the primary
    /// language subtag, then to the whole catalog.
    fn random_voice(&self, language: &str) -> Result<String> {
        let voices = self.synthesizer.voices()?;
        if voices.is_empty() {
            return Err(Error::Synthesis("no installed voices".to_string()));
        }

        let primary = language.split('-').next().unwrap_or(language);

        let exact: Vec<&VoiceInfo> = voices.iter().filter(|v| v.language == language).collect();
        let pool = if exact.is_empty() {
            let related: Vec<&VoiceInfo> = voices
                .iter()
                .filter(|v| v.language.split('-').next() == Some(primary))
                .collect();
            if related.is_empty() {
                voices.iter().collect()
            } else {
                related
            }
        } else {
            exact
        };

        let pick = rand::thread_rng().gen_range(0..pool.len());
        Ok(pool[pick].name.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    struct StubSynthesizer {
        voices: Vec<VoiceInfo>,
        valid: fn(&str) -> bool,
        probes: AtomicUsize,
    }

    impl StubSynthesizer {
        fn new(voices: &[(&str, &str)], valid: fn(&str) -> bool) -> Arc<Self> {
            Arc::new(Self {
                voices: voices
                    .iter()
                    .map(|(name, language)| VoiceInfo {
                        name: (*name).to_string(),
                        language: (*language).to_string(),
                    })
                    .collect(),
                valid,
                probes: AtomicUsize::new(0),
            })
        }
    }

    impl Synthesizer for StubSynthesizer {
        fn voices(&self) -> Result<Vec<VoiceInfo>> {
            Ok(self.voices.clone())
        }

        fn probe_voice(&self, voice: &str) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            (self.valid)(voice)
        }

        fn render_ssml(&self, _: &str, _: Option<&str>) -> Result<Vec<u8>> {
            unreachable!("assignment tests never render")
        }

        fn render_text(&self, _: &str, _: Option<&str>) -> Result<Vec<u8>> {
            unreachable!("assignment tests never render")
        }
    }

    fn speaker() -> Speaker {
        Speaker::roll("bob", 1.0, &mut StdRng::seed_from_u64(5))
    }

    #[test]
    fn assigns_language_matching_voice() {
        let synth = StubSynthesizer::new(&[("english", "en"), ("german", "de")], |_| true);
        let assigner = VoiceAssigner::new(synth, 10);
        let mut speaker = speaker();

        let voice = assigner.voice_for_language(&mut speaker, "de").unwrap();
        assert_eq!(voice, "german");
        assert!(speaker.voices["de"].valid);
    }

    #[test]
    fn assignment_is_sticky() {
        let synth = StubSynthesizer::new(&[("a", "en"), ("b", "en"), ("c", "en")], |_| true);
        let assigner = VoiceAssigner::new(Arc::clone(&synth) as Arc<dyn Synthesizer>, 10);
        let mut speaker = speaker();

        let first = assigner.voice_for_language(&mut speaker, "en").unwrap();
        for _ in 0..20 {
            let again = assigner.voice_for_language(&mut speaker, "en").unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn falls_back_to_primary_subtag_then_catalog() {
        let synth = StubSynthesizer::new(&[("english-us", "en-us"), ("welsh", "cy")], |_| true);
        let assigner = VoiceAssigner::new(synth, 10);

        // "en" has no exact entry but en-us shares the primary subtag
        let mut a = speaker();
        assert_eq!(
            assigner.voice_for_language(&mut a, "en").unwrap(),
            "english-us"
        );

        // nothing matches "ja" at all, any catalog voice will do
        let mut b = speaker();
        let voice = assigner.voice_for_language(&mut b, "ja").unwrap();
        assert!(voice == "english-us" || voice == "welsh");
    }

    #[test]
    fn exhausted_retries_leave_best_effort_assignment() {
        let synth = StubSynthesizer::new(&[("english", "en")], |_| false);
        let assigner = VoiceAssigner::new(Arc::clone(&synth) as Arc<dyn Synthesizer>, 10);
        let mut speaker = speaker();

        // every probe fails; the call still returns an assignment
        let voice = assigner.voice_for_language(&mut speaker, "de").unwrap();
        assert_eq!(voice, "english");

        let entry = &speaker.voices["de"];
        assert_eq!(entry.name, "english");
        assert!(!entry.valid);
        assert_eq!(synth.probes.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn invalid_existing_assignment_is_rerolled() {
        let synth = StubSynthesizer::new(&[("english", "en")], |v| v != "gone");
        let assigner = VoiceAssigner::new(synth, 10);
        let mut speaker = speaker();
        speaker.voices.insert(
            "en".to_string(),
            AssignedVoice {
                name: "gone".to_string(),
                valid: true,
            },
        );

        let voice = assigner.voice_for_language(&mut speaker, "en").unwrap();
        assert_eq!(voice, "english");
        assert!(speaker.voices["en"].valid);
    }

    #[test]
    fn empty_catalog_is_an_error() {
        let synth = StubSynthesizer::new(&[], |_| true);
        let assigner = VoiceAssigner::new(synth, 10);
        assert!(
            assigner
                .voice_for_language(&mut speaker(), "en")
                .is_err()
        );
    }
}
