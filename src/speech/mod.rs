//! Speech orchestration
//!
//! Wires the whole utterance pipeline together: detect the message
//! language, resolve the speaker's voice, render markup, synthesize through
//! the configured backend, normalize, and play with live modulation.

pub mod backend;
pub mod engine;
pub mod host;
pub mod markup;
pub mod pool;
pub mod voices;
pub mod worker;

use std::sync::Arc;

use crate::audio::playback::PlaybackEngine;
use crate::audio::{clamp_playback_duration, normalize};
use crate::config::Config;
use crate::speaker::{Speaker, SpeakerRegistry};
use crate::speech::backend::SpeechBackend;
use crate::speech::markup::MarkupBuilder;
use crate::speech::voices::VoiceAssigner;
use crate::vr::VrTracker;
use crate::Result;

pub use backend::backend_for_config;
pub use engine::{EspeakSynthesizer, Synthesizer, VoiceInfo};
pub use host::SpeechRequest;
pub use pool::WorkerPool;

/// The full utterance pipeline
pub struct SpeechService {
    backend: Arc<dyn SpeechBackend>,
    synthesizer: Arc<dyn Synthesizer>,
    assigner: VoiceAssigner,
    markup: MarkupBuilder,
    registry: Arc<SpeakerRegistry>,
    playback: PlaybackEngine,
    max_pitch_factor: f32,
    default_language: String,
}

impl SpeechService {
    /// Assemble the pipeline from configuration. With a worker-pool backend
    /// this also spawns any configured prewarm workers.
    ///
    /// # Errors
    ///
    /// Returns error if the prosody pattern is invalid, no audio output is
    /// available, or a prewarm worker fails to spawn
    pub async fn new(
        config: &Config,
        registry: Arc<SpeakerRegistry>,
        synthesizer: Arc<dyn Synthesizer>,
        vr: Arc<dyn VrTracker>,
    ) -> Result<Self> {
        let backend = backend_for_config(&config.speech, Arc::clone(&synthesizer)).await?;

        Ok(Self {
            backend,
            synthesizer: Arc::clone(&synthesizer),
            assigner: VoiceAssigner::new(synthesizer, config.speech.voice_retry_bound),
            markup: MarkupBuilder::new(&config.prosody)?,
            registry,
            playback: PlaybackEngine::new(vr, &config.audio)?,
            max_pitch_factor: config.audio.max_pitch_factor,
            default_language: config.speech.default_language.clone(),
        })
    }

    /// Speak `text` in `name`'s character voice. The identity is created on
    /// first sight and any fresh voice assignment is written back to the
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails; callers at the job
    /// boundary log it and move on
    pub async fn speak_as(&self, name: &str, text: &str) -> Result<()> {
        self.registry.touch(name);
        let mut speaker = self.registry.get_or_create(name);
        let result = self.speak_speaker(&mut speaker, text).await;
        // voice assignments stick even when the utterance itself failed,
        // unless the identity was reset while we were speaking
        if self.registry.get(name).is_some() {
            self.registry.insert(speaker);
        }
        result
    }

    /// Speak `text` through a throwaway character: announcements still get
    /// a voice and a tremble, they just don't persist one.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    pub async fn speak_anonymous(&self, text: &str) -> Result<()> {
        let mut speaker = Speaker::roll("", self.max_pitch_factor, &mut rand::thread_rng());
        self.speak_speaker(&mut speaker, text).await
    }

    /// Speak a raw SSML document with an explicit voice, no character
    /// modulation.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    pub async fn speak_ssml(&self, voice: &str, ssml: &str) -> Result<()> {
        let mut sink = Vec::new();
        self.backend.fill_with_speech(voice, ssml, &mut sink).await?;
        self.play(None, &sink).await
    }

    /// Installed voice catalog of the underlying synthesizer.
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be enumerated
    pub fn voices(&self) -> Result<Vec<VoiceInfo>> {
        self.synthesizer.voices()
    }

    async fn speak_speaker(&self, speaker: &mut Speaker, text: &str) -> Result<()> {
        let language = detect_language(text, &self.default_language);
        let voice = self.assigner.voice_for_language(speaker, &language)?;
        let ssml = self.markup.build(speaker, text, &voice);

        tracing::debug!(
            speaker = %speaker.name,
            language,
            voice = %voice,
            "synthesizing utterance"
        );

        let mut sink = Vec::new();
        self.backend.fill_with_speech(&voice, &ssml, &mut sink).await?;
        self.play(Some(speaker), &sink).await
    }

    async fn play(&self, speaker: Option<&Speaker>, wav: &[u8]) -> Result<()> {
        if wav.is_empty() {
            return Ok(());
        }

        let audio = normalize(wav)?;
        let duration = clamp_playback_duration(audio.duration);
        self.playback.play(speaker, &audio, duration).await
    }
}

/// Best-effort language of `text` as a primary subtag, e.g. "en" or "de".
#[must_use]
pub fn detect_language(text: &str, fallback: &str) -> String {
    whatlang::detect_lang(text)
        .map_or_else(|| fallback.to_string(), |lang| iso_tag(lang).to_string())
}

/// Map detected languages onto the primary subtags used by voice catalogs.
/// Unmapped languages fall back to English rather than failing the pipeline.
fn iso_tag(lang: whatlang::Lang) -> &'static str {
    use whatlang::Lang;
    match lang {
        Lang::Deu => "de",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Pol => "pl",
        Lang::Swe => "sv",
        Lang::Tur => "tr",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Cmn => "zh",
        Lang::Vie => "vi",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        _ => "en",
    }
}
