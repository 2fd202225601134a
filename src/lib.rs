//! Sabercast - Beat Saber stream companion
//!
//! This library provides the core functionality for sabercast:
//! - Per-user serialized speech dispatch
//! - Voice assignment and SSML prosody generation
//! - Synthesis via an in-process engine or a pool of worker processes
//! - Loudness normalization and pitch-modulated spatial playback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Chat boundary                       │
//! │   messages  │  rv / code / recover commands          │
//! └────────────────────┬────────────────────────────────┘
//!                      │  per-user serializer
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Speech pipeline                      │
//! │  language → voice → markup → backend → normalize    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            Playback + modulation loop                │
//! │   tremble pitch  │  VR-steered spatialization        │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod retry;
pub mod serializer;
pub mod speaker;
pub mod speech;
pub mod vr;

pub use chat::{ChatMessage, ChatService, SpeakTicket};
pub use config::Config;
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use serializer::TaskSerializer;
pub use speaker::{Speaker, SpeakerRegistry};
pub use speech::{EspeakSynthesizer, SpeechService, Synthesizer};
pub use vr::{DisabledTracker, HmdPose, VrTracker};
