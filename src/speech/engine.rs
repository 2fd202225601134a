//! Synthesis engine boundary
//!
//! The engine turns markup or plain text into waveform bytes using a named
//! voice. The production implementation drives espeak-ng as a child process
//! per request; the worker host and the local backend both sit on top of
//! this trait.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Installed voice metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    /// Language tag, e.g. "en" or "en-us"
    pub language: String,
}

/// Renders text or markup into waveform bytes
pub trait Synthesizer: Send + Sync {
    /// Installed voice catalog.
    ///
    /// # Errors
    ///
    /// Returns error if the catalog cannot be enumerated
    fn voices(&self) -> Result<Vec<VoiceInfo>>;

    /// Attempt to select `voice`; assignments are re-verified with this
    /// before every use.
    fn probe_voice(&self, voice: &str) -> bool;

    /// Render an SSML document to WAV bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails or produces no audio
    fn render_ssml(&self, ssml: &str, default_voice: Option<&str>) -> Result<Vec<u8>>;

    /// Render plain text to WAV bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails or produces no audio
    fn render_text(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>>;
}

/// espeak-ng driven synthesizer.
///
/// Voices come from `espeak-ng --voices`; rendering pipes the input through
/// stdin with `--stdout` so no temp files are involved. espeak-ng emits
/// 22050 Hz 16-bit mono WAV, which is exactly the backend contract.
pub struct EspeakSynthesizer {
    binary: PathBuf,
    catalog: OnceLock<Vec<VoiceInfo>>,
}

impl EspeakSynthesizer {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            catalog: OnceLock::new(),
        }
    }

    fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| Error::Synthesis(format!("cannot run {}: {e}", self.binary.display())))?;

        if let Some(input) = stdin {
            child
                .stdin
                .take()
                .ok_or_else(|| Error::Synthesis("engine stdin unavailable".to_string()))?
                .write_all(input.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Synthesis(format!(
                "engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }

    fn render(&self, input: &str, voice: Option<&str>, markup: bool) -> Result<Vec<u8>> {
        let mut args = vec!["--stdout"];
        if markup {
            args.push("-m");
        }
        if let Some(voice) = voice {
            args.push("-v");
            args.push(voice);
        }

        let wav = self.run(&args, Some(input))?;
        if wav.is_empty() {
            return Err(Error::Synthesis("engine produced no audio".to_string()));
        }
        Ok(wav)
    }
}

impl Synthesizer for EspeakSynthesizer {
    fn voices(&self) -> Result<Vec<VoiceInfo>> {
        if let Some(catalog) = self.catalog.get() {
            return Ok(catalog.clone());
        }

        let listing = self.run(&["--voices"], None)?;
        let parsed = parse_voice_listing(&String::from_utf8_lossy(&listing));
        tracing::debug!(voices = parsed.len(), "loaded voice catalog");

        let _ = self.catalog.set(parsed.clone());
        Ok(parsed)
    }

    fn probe_voice(&self, voice: &str) -> bool {
        // a quiet render of nothing still loads the voice file
        self.run(&["-q", "-v", voice], Some("")).is_ok()
    }

    fn render_ssml(&self, ssml: &str, default_voice: Option<&str>) -> Result<Vec<u8>> {
        self.render(ssml, default_voice, true)
    }

    fn render_text(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        self.render(text, voice, false)
    }
}

/// Parse the fixed-column table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-gb           M  english             gmw/en
/// ```
fn parse_voice_listing(listing: &str) -> Vec<VoiceInfo> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            Some(VoiceInfo {
                language: fields[1].to_string(),
                name: fields[3].to_string(),
            })
        })
        .collect()
}
