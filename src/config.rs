//! Configuration management
//!
//! Supports `~/.config/sabercast/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Sabercast runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Speech dispatch configuration
    pub speech: SpeechConfig,

    /// Prosody jitter configuration
    pub prosody: ProsodyConfig,

    /// Audio playback configuration
    pub audio: AudioConfig,

    /// VR head-tracking configuration
    pub vr: VrConfig,
}

/// Which synthesis backend serves speech requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// In-process synthesis
    Local,
    /// Pool of out-of-process workers
    WorkerPool,
}

/// Speech dispatch configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Backend selection
    pub backend: BackendKind,

    /// Path to the worker binary; defaults to `sabercast-speechd` next to
    /// the running executable
    pub worker_binary: Option<PathBuf>,

    /// Path to the synthesis engine binary
    pub engine_binary: PathBuf,

    /// Maximum attempts for a single fill operation
    pub max_fill_tries: u32,

    /// Maximum handshake attempts against a freshly spawned worker
    pub handshake_tries: u32,

    /// Linear backoff step between retries, in milliseconds
    pub backoff_step_ms: u64,

    /// Workers spawned eagerly at startup
    pub prewarm_workers: usize,

    /// Bound on voice re-rolls before giving up with a best-effort voice
    pub voice_retry_bound: u32,

    /// Fallback language tag when detection finds nothing
    pub default_language: String,
}

/// Prosody jitter configuration.
///
/// The interjection pattern marks short, vowel-heavy words ("oh", "waah")
/// for guaranteed jitter. The default is tuned for Latin scripts and is a
/// product choice, not a law — override it for other alphabets.
#[derive(Debug, Clone)]
pub struct ProsodyConfig {
    /// A token gets random prosody with probability 1-in-`word_jitter_odds`;
    /// zero disables random jitter entirely
    pub word_jitter_odds: u32,

    /// Regex matched against whole tokens to force jitter
    pub interjection_pattern: String,

    /// Per-word pitch offset range, percent
    pub pitch_jitter_min: i32,
    pub pitch_jitter_max: i32,

    /// Per-word rate offset range, percent
    pub rate_jitter_min: i32,
    pub rate_jitter_max: i32,
}

/// Audio playback configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Scale applied to the per-tick pitch signal, and the half-range of a
    /// speaker's base pitch roll
    pub max_pitch_factor: f32,

    /// Modulation loop tick, in milliseconds
    pub modulation_tick_ms: u64,
}

/// VR head-tracking configuration
#[derive(Debug, Clone)]
pub struct VrConfig {
    /// Steer playback spatialization from the headset pose
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speech: SpeechConfig {
                backend: BackendKind::WorkerPool,
                worker_binary: None,
                engine_binary: PathBuf::from("espeak-ng"),
                max_fill_tries: 10,
                handshake_tries: 20,
                backoff_step_ms: 100,
                prewarm_workers: 0,
                voice_retry_bound: 10,
                default_language: "en".to_string(),
            },
            prosody: ProsodyConfig {
                word_jitter_odds: 10,
                interjection_pattern:
                    "^(([a-zA-Z]{2})|([a-zA-ZöÖäÄüÜ][aAeEiIoOuUöyYÖäÄüÜhH]+[a-zA-Z]))$"
                        .to_string(),
                pitch_jitter_min: -100,
                pitch_jitter_max: 100,
                rate_jitter_min: -100,
                rate_jitter_max: 50,
            },
            audio: AudioConfig {
                max_pitch_factor: 1.0,
                modulation_tick_ms: 10,
            },
            vr: VrConfig { enabled: false },
        }
    }
}

impl Config {
    /// Load configuration, overlaying the platform config file (if any)
    /// onto the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be parsed
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit TOML file path.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let file: ConfigFile = toml::from_str(&raw)?;

        let mut config = Self::default();
        config.apply(file);
        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        let speech = file.speech;
        if let Some(v) = speech.backend {
            self.speech.backend = v;
        }
        if let Some(v) = speech.worker_binary {
            self.speech.worker_binary = Some(v);
        }
        if let Some(v) = speech.engine_binary {
            self.speech.engine_binary = v;
        }
        if let Some(v) = speech.max_fill_tries {
            self.speech.max_fill_tries = v;
        }
        if let Some(v) = speech.handshake_tries {
            self.speech.handshake_tries = v;
        }
        if let Some(v) = speech.backoff_step_ms {
            self.speech.backoff_step_ms = v;
        }
        if let Some(v) = speech.prewarm_workers {
            self.speech.prewarm_workers = v;
        }
        if let Some(v) = speech.voice_retry_bound {
            self.speech.voice_retry_bound = v;
        }
        if let Some(v) = speech.default_language {
            self.speech.default_language = v;
        }

        let prosody = file.prosody;
        if let Some(v) = prosody.word_jitter_odds {
            self.prosody.word_jitter_odds = v;
        }
        if let Some(v) = prosody.interjection_pattern {
            self.prosody.interjection_pattern = v;
        }
        if let Some(v) = prosody.pitch_jitter_min {
            self.prosody.pitch_jitter_min = v;
        }
        if let Some(v) = prosody.pitch_jitter_max {
            self.prosody.pitch_jitter_max = v;
        }
        if let Some(v) = prosody.rate_jitter_min {
            self.prosody.rate_jitter_min = v;
        }
        if let Some(v) = prosody.rate_jitter_max {
            self.prosody.rate_jitter_max = v;
        }

        let audio = file.audio;
        if let Some(v) = audio.max_pitch_factor {
            self.audio.max_pitch_factor = v;
        }
        if let Some(v) = audio.modulation_tick_ms {
            self.audio.modulation_tick_ms = v;
        }

        if let Some(v) = file.vr.enabled {
            self.vr.enabled = v;
        }
    }
}

/// Platform config file location (`~/.config/sabercast/config.toml` on Linux)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "sabercast")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    speech: SpeechFileConfig,

    #[serde(default)]
    prosody: ProsodyFileConfig,

    #[serde(default)]
    audio: AudioFileConfig,

    #[serde(default)]
    vr: VrFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct SpeechFileConfig {
    backend: Option<BackendKind>,
    worker_binary: Option<PathBuf>,
    engine_binary: Option<PathBuf>,
    max_fill_tries: Option<u32>,
    handshake_tries: Option<u32>,
    backoff_step_ms: Option<u64>,
    prewarm_workers: Option<usize>,
    voice_retry_bound: Option<u32>,
    default_language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProsodyFileConfig {
    word_jitter_odds: Option<u32>,
    interjection_pattern: Option<String>,
    pitch_jitter_min: Option<i32>,
    pitch_jitter_max: Option<i32>,
    rate_jitter_min: Option<i32>,
    rate_jitter_max: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct AudioFileConfig {
    max_pitch_factor: Option<f32>,
    modulation_tick_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VrFileConfig {
    enabled: Option<bool>,
}
