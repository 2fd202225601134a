//! Concurrency-safe speaker registry
//!
//! Shared between the chat dispatcher, the voice assigner, and whatever
//! front-end wants to list speakers. A plain lock-protected map — readers
//! and writers may sit on any thread.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use super::{AssignedVoice, Speaker};

/// The set of known speakers, keyed by name
pub struct SpeakerRegistry {
    speakers: RwLock<HashMap<String, Speaker>>,
    max_pitch_factor: f32,
}

impl SpeakerRegistry {
    #[must_use]
    pub fn new(max_pitch_factor: f32) -> Self {
        Self {
            speakers: RwLock::new(HashMap::new()),
            max_pitch_factor,
        }
    }

    /// Fetch `name`'s identity, rolling a fresh one on first sight.
    pub fn get_or_create(&self, name: &str) -> Speaker {
        if let Some(speaker) = self.get(name) {
            return speaker;
        }

        let mut speakers = self.speakers.write().expect("registry lock poisoned");
        speakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(speaker = name, "rolling new speaker identity");
                Speaker::roll(name, self.max_pitch_factor, &mut rand::thread_rng())
            })
            .clone()
    }

    /// Snapshot of `name`'s identity, if known.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Speaker> {
        self.speakers
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Insert or replace a speaker under its own name.
    pub fn insert(&self, speaker: Speaker) {
        let mut speakers = self.speakers.write().expect("registry lock poisoned");
        speakers.insert(speaker.name.clone(), speaker);
    }

    /// Drop `name`'s identity. Returns whether one existed.
    pub fn remove(&self, name: &str) -> bool {
        self.speakers
            .write()
            .expect("registry lock poisoned")
            .remove(name)
            .is_some()
    }

    /// Record that `name` just spoke.
    pub fn touch(&self, name: &str) {
        let mut speakers = self.speakers.write().expect("registry lock poisoned");
        if let Some(speaker) = speakers.get_mut(name) {
            speaker.last_spoke = Utc::now();
        }
    }

    /// Store a voice assignment for (`name`, `language`).
    pub fn assign_voice(&self, name: &str, language: &str, voice: AssignedVoice) {
        let mut speakers = self.speakers.write().expect("registry lock poisoned");
        if let Some(speaker) = speakers.get_mut(name) {
            speaker.voices.insert(language.to_string(), voice);
        }
    }

    /// Drop only `language`'s voice assignment for `name`. Returns whether
    /// one existed.
    pub fn clear_voice(&self, name: &str, language: &str) -> bool {
        let mut speakers = self.speakers.write().expect("registry lock poisoned");
        speakers
            .get_mut(name)
            .is_some_and(|speaker| speaker.voices.remove(language).is_some())
    }

    /// Number of known speakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.speakers.read().expect("registry lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
