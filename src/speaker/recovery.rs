//! Recovery codes
//!
//! A speaker identity serialized to JSON, zlib-compressed, and
//! base64-encoded: short enough to paste into chat, complete enough to
//! restore the voice on another session.

use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::Speaker;
use crate::{Error, Result};

pub fn encode(speaker: &Speaker) -> Result<String> {
    let json = serde_json::to_vec(speaker)?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    Ok(BASE64.encode(compressed))
}

pub fn decode(code: &str) -> Result<Speaker> {
    let compressed = BASE64
        .decode(code.trim())
        .map_err(|e| Error::RecoveryCode(format!("invalid encoding: {e}")))?;

    let mut json = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| Error::RecoveryCode(format!("corrupt payload: {e}")))?;

    serde_json::from_slice(&json).map_err(|e| Error::RecoveryCode(format!("bad identity: {e}")))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::speaker::AssignedVoice;

    #[test]
    fn round_trip_preserves_identity() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut speaker = Speaker::roll("alice", 1.0, &mut rng);
        speaker.voices.insert(
            "en".to_string(),
            AssignedVoice {
                name: "storm".to_string(),
                valid: true,
            },
        );

        let code = encode(&speaker).unwrap();
        let restored = decode(&code).unwrap();

        assert_eq!(restored.name, speaker.name);
        assert_eq!(restored.position, speaker.position);
        assert!((restored.pitch - speaker.pitch).abs() < f32::EPSILON);
        assert!((restored.tremble_begin - speaker.tremble_begin).abs() < f32::EPSILON);
        assert!((restored.tremble_speed - speaker.tremble_speed).abs() < f32::EPSILON);
        assert!((restored.tremble_factor - speaker.tremble_factor).abs() < f32::EPSILON);
        assert_eq!(restored.speech_rate, speaker.speech_rate);
        assert_eq!(restored.speech_pitch, speaker.speech_pitch);
        assert_eq!(restored.voices["en"].name, "storm");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode("definitely not a code").is_err());
        // valid base64, not a zlib stream
        assert!(decode(&BASE64.encode(b"hello")).is_err());
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let mut rng = StdRng::seed_from_u64(9);
        let speaker = Speaker::roll("bob", 1.0, &mut rng);
        let code = format!("  {}\n", encode(&speaker).unwrap());
        assert_eq!(decode(&code).unwrap().name, "bob");
    }
}
