//! Loudness normalization for synthesized waveforms
//!
//! Synthesis output varies wildly in level between voices; every utterance
//! is brought to full scale before playback so quiet voices are not drowned
//! out by loud ones.

use std::io::Cursor;
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::{Error, Result};

/// Sample rate shared with the synthesis backend
pub const SAMPLE_RATE: u32 = 22050;

/// Bit depth shared with the synthesis backend
pub const BITS_PER_SAMPLE: u16 = 16;

/// Channel count shared with the synthesis backend
pub const CHANNELS: u16 = 1;

/// A decoded, level-normalized waveform ready for playback
#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub duration: Duration,
}

/// Decode `wav`, bring its peak to full scale, and report the duration.
///
/// A silent waveform (peak zero) or one already at full scale passes through
/// unchanged, which also makes the operation idempotent: normalizing twice
/// gives the same samples as normalizing once.
///
/// # Errors
///
/// Returns error if the container cannot be parsed or is not 16-bit mono
pub fn normalize(wav: &[u8]) -> Result<NormalizedAudio> {
    let mut reader = WavReader::new(Cursor::new(wav))?;
    let spec = reader.spec();
    if spec.channels != CHANNELS
        || spec.bits_per_sample != BITS_PER_SAMPLE
        || spec.sample_format != SampleFormat::Int
    {
        return Err(Error::Audio(format!(
            "unexpected waveform format: {} ch / {} bit",
            spec.channels, spec.bits_per_sample
        )));
    }

    let mut samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let duration = Duration::from_secs_f64(samples.len() as f64 / f64::from(spec.sample_rate));

    let peak = samples
        .iter()
        .map(|s| i32::from(*s).abs())
        .max()
        .unwrap_or(0);
    tracing::debug!(peak, samples = samples.len(), "normalizing waveform");

    if peak != 0 && peak < i32::from(i16::MAX) {
        let scale = f32::from(i16::MAX) / peak as f32;
        for sample in &mut samples {
            let scaled = (f32::from(*sample) * scale).round() as i32;
            *sample = scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        }
    }

    Ok(NormalizedAudio {
        samples,
        sample_rate: spec.sample_rate,
        duration,
    })
}

/// Encode samples into a WAV container with the backend's format contract.
///
/// # Errors
///
/// Returns error if encoding fails
pub fn samples_to_wav(samples: &[i16]) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
