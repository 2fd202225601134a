//! Audio post-processing properties

mod common;

use std::time::Duration;

use sabercast::audio::{
    MIN_PLAYBACK, SAMPLE_RATE, clamp_playback_duration, normalize, samples_to_wav,
};

#[test]
fn quiet_waveform_is_amplified_to_full_scale() {
    let samples = common::sine_samples(440.0, 0.2, 0.25);
    let wav = samples_to_wav(&samples).unwrap();

    let audio = normalize(&wav).unwrap();

    let input_peak = samples.iter().map(|s| i32::from(*s).abs()).max().unwrap();
    let output_peak = audio
        .samples
        .iter()
        .map(|s| i32::from(*s).abs())
        .max()
        .unwrap();

    assert!(input_peak < i32::from(i16::MAX) / 2);
    assert_eq!(output_peak, i32::from(i16::MAX));
    assert_eq!(audio.samples.len(), samples.len());
}

#[test]
fn normalization_is_idempotent_at_full_scale() {
    let samples = common::sine_samples(440.0, 0.2, 0.25);
    let wav = samples_to_wav(&samples).unwrap();

    let once = normalize(&wav).unwrap();
    let twice = normalize(&samples_to_wav(&once.samples).unwrap()).unwrap();

    assert_eq!(twice.samples, once.samples);
}

#[test]
fn all_zero_waveform_normalizes_to_itself() {
    let samples = vec![0_i16; SAMPLE_RATE as usize / 10];
    let wav = samples_to_wav(&samples).unwrap();

    let audio = normalize(&wav).unwrap();
    assert_eq!(audio.samples, samples);
}

#[test]
fn reported_duration_matches_sample_count() {
    let samples = common::sine_samples(220.0, 0.75, 0.5);
    let wav = samples_to_wav(&samples).unwrap();

    let audio = normalize(&wav).unwrap();
    let expected = Duration::from_secs_f64(samples.len() as f64 / f64::from(SAMPLE_RATE));
    assert_eq!(audio.duration, expected);
}

#[test]
fn degenerate_durations_clamp_to_the_playback_floor() {
    // a 10 ms clip schedules a 50 ms playback window, exactly
    let samples = common::sine_samples(440.0, 0.01, 0.5);
    let wav = samples_to_wav(&samples).unwrap();

    let audio = normalize(&wav).unwrap();
    assert!(audio.duration < MIN_PLAYBACK);

    let window = clamp_playback_duration(audio.duration);
    assert_eq!(window, Duration::from_millis(50));

    // healthy durations pass through untouched
    let long = Duration::from_millis(900);
    assert_eq!(clamp_playback_duration(long), long);
}
