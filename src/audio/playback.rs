//! Audio playback with live pitch and spatial control
//!
//! The output stream resamples the source waveform at a variable rate, so
//! pitch can be steered while the sound is playing. The modulation loop
//! updates pitch from the speaker's tremble signature every tick and, with
//! VR enabled, re-spatializes the emitter from the current head pose.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tokio::time::MissedTickBehavior;

use crate::audio::normalize::NormalizedAudio;
use crate::audio::spatial::{AudioEmitter, AudioListener, Quat, Vec3, stereo_gains};
use crate::config::AudioConfig;
use crate::speaker::Speaker;
use crate::vr::VrTracker;
use crate::{Error, Result};

/// Live controls shared with the output callback.
///
/// Pitch follows the game-audio convention: -1..1 is one octave down/up.
#[derive(Debug)]
pub struct PlaybackControls {
    state: Mutex<ControlState>,
}

#[derive(Debug, Clone, Copy)]
struct ControlState {
    pitch: f32,
    gains: [f32; 2],
}

impl PlaybackControls {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ControlState {
                pitch: 0.0,
                gains: [std::f32::consts::FRAC_1_SQRT_2; 2],
            }),
        })
    }

    /// Set the playback pitch, -1..1.
    pub fn set_pitch(&self, pitch: f32) {
        self.state.lock().expect("controls lock poisoned").pitch = pitch;
    }

    /// Recompute channel gains from listener and emitter state.
    pub fn apply_3d(&self, listener: &AudioListener, emitter: &AudioEmitter) {
        let gains = stereo_gains(listener, emitter);
        self.state.lock().expect("controls lock poisoned").gains = gains;
    }

    fn snapshot(&self) -> ControlState {
        *self.state.lock().expect("controls lock poisoned")
    }
}

/// An in-flight playback. Dropping the handle stops the stream.
pub struct ActiveSound {
    pub controls: Arc<PlaybackControls>,
    _stop: std::sync::mpsc::Sender<()>,
}

/// Plays normalized waveforms to the default output device
pub struct PlaybackEngine {
    config: StreamConfig,
    vr: Arc<dyn VrTracker>,
    listener: Mutex<AudioListener>,
    max_pitch_factor: f32,
    tick: Duration,
}

impl PlaybackEngine {
    /// Create a new playback engine on the default output device.
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output device/config is available
    pub fn new(vr: Arc<dyn VrTracker>, audio: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let candidates: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| c.sample_format() == SampleFormat::F32)
            .collect();

        let supported = candidates
            .iter()
            .find(|c| c.channels() == 2)
            .or_else(|| candidates.iter().find(|c| c.channels() == 1))
            .cloned()
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported.with_max_sample_rate().config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            config,
            vr,
            listener: Mutex::new(AudioListener::default()),
            max_pitch_factor: audio.max_pitch_factor,
            tick: Duration::from_millis(audio.modulation_tick_ms),
        })
    }

    /// Play `audio` for `duration`, steering pitch and spatialization from
    /// the speaker's tremble signature. Without a speaker the sound plays
    /// flat and this just waits out the duration.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be started
    pub async fn play(
        &self,
        speaker: Option<&Speaker>,
        audio: &NormalizedAudio,
        duration: Duration,
    ) -> Result<()> {
        let sound = self.start(audio.samples.clone(), audio.sample_rate)?;

        let Some(speaker) = speaker else {
            tokio::time::sleep(duration).await;
            return Ok(());
        };

        let mut emitter = AudioEmitter {
            position: speaker.position,
            velocity: Vec3::ZERO,
        };
        if self.vr.is_enabled() {
            emitter.position = self.vr.hmd_pose().rotation.rotate(speaker.position);
        }
        {
            let listener = self.listener.lock().expect("listener lock poisoned");
            sound.controls.apply_3d(&listener, &emitter);
        }

        let mut phase = f64::from(speaker.tremble_begin);
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while started.elapsed() < duration {
            ticker.tick().await;
            phase += f64::from(speaker.tremble_speed);

            if self.vr.is_enabled() {
                let pose = self.vr.hmd_pose();
                let position = pose.rotation.rotate(speaker.position);
                emitter.velocity = (position - emitter.position) * 100.0;
                emitter.position = position;

                let mut listener = self.listener.lock().expect("listener lock poisoned");
                listener.velocity = pose.velocity - emitter.position
                    + Quat::from_omega(pose.omega).rotate(emitter.position);
                sound.controls.apply_3d(&listener, &emitter);
            }

            let swing = phase.sin() * f64::from(speaker.tremble_factor);
            let pitch = (f64::from(speaker.pitch) + swing).clamp(-1.0, 1.0)
                * f64::from(self.max_pitch_factor);
            sound.controls.set_pitch(pitch as f32);
        }

        // let the stream drain its tail before tearing it down
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }

    /// Start rendering `samples` immediately on a dedicated thread.
    ///
    /// The stream object is not `Send`, so it lives on that thread for the
    /// handle's lifetime; the returned control block is shared with the
    /// output callback.
    ///
    /// # Errors
    ///
    /// Returns error if the playback thread cannot be spawned
    pub fn start(&self, samples: Vec<i16>, source_rate: u32) -> Result<ActiveSound> {
        let controls = PlaybackControls::new();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let config = self.config.clone();
        let callback_controls = Arc::clone(&controls);
        std::thread::Builder::new()
            .name("sabercast-playback".to_string())
            .spawn(move || {
                if let Err(e) = render_on_thread(samples, source_rate, &config, &callback_controls, &stop_rx)
                {
                    tracing::error!(error = %e, "playback thread failed");
                }
            })
            .map_err(|e| Error::Audio(format!("cannot spawn playback thread: {e}")))?;

        Ok(ActiveSound {
            controls,
            _stop: stop_tx,
        })
    }
}

fn render_on_thread(
    samples: Vec<i16>,
    source_rate: u32,
    config: &StreamConfig,
    controls: &Arc<PlaybackControls>,
    stop: &std::sync::mpsc::Receiver<()>,
) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let channels = config.channels as usize;
    let base_step = f64::from(source_rate) / f64::from(config.sample_rate.0);
    let controls = Arc::clone(controls);
    let mut playhead = 0.0_f64;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let state = controls.snapshot();
                let step = base_step * pitch_to_rate(state.pitch);

                for frame in data.chunks_mut(channels) {
                    let sample = sample_at(&samples, playhead);
                    playhead += step;

                    if channels >= 2 {
                        for (channel, out) in frame.iter_mut().enumerate() {
                            *out = match channel {
                                0 => sample * state.gains[0],
                                1 => sample * state.gains[1],
                                _ => 0.0,
                            };
                        }
                    } else {
                        for out in frame.iter_mut() {
                            *out = sample * f32::midpoint(state.gains[0], state.gains[1]);
                        }
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // park until the handle drops
    let _ = stop.recv();
    drop(stream);
    Ok(())
}

/// Playback-rate factor for a pitch in -1..1: one octave either way.
#[must_use]
pub fn pitch_to_rate(pitch: f32) -> f64 {
    2.0_f64.powf(f64::from(pitch))
}

/// Linearly interpolated sample at a fractional position, as -1..1 float.
/// Past the end of the waveform the stream renders silence.
fn sample_at(samples: &[i16], position: f64) -> f32 {
    let index = position as usize;
    if position < 0.0 || index >= samples.len() {
        return 0.0;
    }

    let current = f32::from(samples[index]) / 32768.0;
    let next = samples
        .get(index + 1)
        .map_or(0.0, |s| f32::from(*s) / 32768.0);
    let fraction = (position - index as f64) as f32;
    current + (next - current) * fraction
}
