//! Shared test utilities

// not every test binary uses every helper
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sabercast::audio::samples_to_wav;
use sabercast::speech::{Synthesizer, VoiceInfo};

/// Generate sine wave samples at the backend sample rate
#[must_use]
pub fn sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<i16> {
    let rate = sabercast::audio::SAMPLE_RATE as f32;
    let count = (rate * duration_secs) as usize;
    (0..count)
        .map(|i| {
            let t = i as f32 / rate;
            let value = amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin();
            (value * f32::from(i16::MAX)) as i16
        })
        .collect()
}

/// A short valid WAV clip for synthesis fixtures
#[must_use]
pub fn fixture_wav() -> Vec<u8> {
    samples_to_wav(&sine_samples(440.0, 0.1, 0.5)).expect("fixture wav")
}

/// Scriptable in-process synthesizer for worker-host fixtures
pub struct FakeSynthesizer {
    wav: Vec<u8>,
    render_delay: Duration,
    failures_left: AtomicUsize,
    pub renders: AtomicUsize,
}

impl FakeSynthesizer {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            wav: fixture_wav(),
            render_delay: Duration::ZERO,
            failures_left: AtomicUsize::new(0),
            renders: AtomicUsize::new(0),
        })
    }

    /// Every render blocks this long before answering.
    #[must_use]
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            wav: fixture_wav(),
            render_delay: delay,
            failures_left: AtomicUsize::new(0),
            renders: AtomicUsize::new(0),
        })
    }

    /// The first `count` renders fail before service recovers.
    #[must_use]
    pub fn failing_first(count: usize) -> Arc<Self> {
        Arc::new(Self {
            wav: fixture_wav(),
            render_delay: Duration::ZERO,
            failures_left: AtomicUsize::new(count),
            renders: AtomicUsize::new(0),
        })
    }

    fn render(&self) -> sabercast::Result<Vec<u8>> {
        self.renders.fetch_add(1, Ordering::SeqCst);

        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok()
        {
            return Err(sabercast::Error::Synthesis("scripted failure".to_string()));
        }

        if !self.render_delay.is_zero() {
            std::thread::sleep(self.render_delay);
        }
        Ok(self.wav.clone())
    }
}

impl Synthesizer for FakeSynthesizer {
    fn voices(&self) -> sabercast::Result<Vec<VoiceInfo>> {
        Ok(vec![
            VoiceInfo {
                name: "storm".to_string(),
                language: "en".to_string(),
            },
            VoiceInfo {
                name: "anna".to_string(),
                language: "de".to_string(),
            },
        ])
    }

    fn probe_voice(&self, _voice: &str) -> bool {
        true
    }

    fn render_ssml(&self, _ssml: &str, _default_voice: Option<&str>) -> sabercast::Result<Vec<u8>> {
        self.render()
    }

    fn render_text(&self, _text: &str, _voice: Option<&str>) -> sabercast::Result<Vec<u8>> {
        self.render()
    }
}
