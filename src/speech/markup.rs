//! SSML document construction
//!
//! Chat text becomes a markup document carrying the speaker's fixed
//! pitch/rate bias plus randomized per-word prosody: a fraction of tokens —
//! and anything that looks like an interjection — gets its own pitch and
//! rate offset. The result is audibly characterful, never monotone.

use rand::Rng;
use regex::Regex;

use crate::config::ProsodyConfig;
use crate::speaker::Speaker;
use crate::{Error, Result};

/// URL pattern replaced with a literal "URL" token before tokenizing —
/// nobody wants their synthesizer spelling out a query string.
const URL_PATTERN: &str =
    r"https?://(www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_\+.~#?&/=]*)";

/// Builds SSML documents from chat text
pub struct MarkupBuilder {
    url_pattern: Regex,
    interjection: Regex,
    word_jitter_odds: u32,
    pitch_jitter: (i32, i32),
    rate_jitter: (i32, i32),
}

impl MarkupBuilder {
    /// # Errors
    ///
    /// Returns error if the configured interjection pattern is not a valid
    /// regex
    pub fn new(config: &ProsodyConfig) -> Result<Self> {
        let interjection = Regex::new(&config.interjection_pattern)
            .map_err(|e| Error::Config(format!("bad interjection pattern: {e}")))?;

        Ok(Self {
            url_pattern: Regex::new(URL_PATTERN).expect("url pattern is valid"),
            interjection,
            word_jitter_odds: config.word_jitter_odds,
            pitch_jitter: (config.pitch_jitter_min, config.pitch_jitter_max),
            rate_jitter: (config.rate_jitter_min, config.rate_jitter_max),
        })
    }

    /// Render `text` as an SSML document in `speaker`'s voice.
    #[must_use]
    pub fn build(&self, speaker: &Speaker, text: &str, voice: &str) -> String {
        let text = self.url_pattern.replace_all(text, "URL");
        let mut rng = rand::thread_rng();

        let mut body = String::new();
        for (i, word) in text.split(' ').enumerate() {
            if i > 0 {
                body.push(' ');
            }
            if self.jitter_fires(&mut rng) || self.interjection.is_match(word) {
                let pitch = rng.gen_range(self.pitch_jitter.0..self.pitch_jitter.1);
                let rate = rng.gen_range(self.rate_jitter.0..self.rate_jitter.1);
                body.push_str(&format!(
                    "<prosody pitch=\"{pitch:+}%\" rate=\"{rate:+}%\">{}</prosody>",
                    escape_xml(word)
                ));
            } else {
                body.push_str(&escape_xml(word));
            }
        }

        format!(
            "<speak version=\"1.0\" xmlns=\"https://www.w3.org/2001/10/synthesis\" xml:lang=\"en-US\">\
             <voice name=\"{}\">\
             <prosody pitch=\"{:+}%\" rate=\"{:+}%\">{body}</prosody>\
             </voice>\
             </speak>",
            escape_xml(voice),
            speaker.speech_pitch,
            speaker.speech_rate,
        )
    }

    fn jitter_fires(&self, rng: &mut impl Rng) -> bool {
        self.word_jitter_odds != 0 && rng.gen_range(0..self.word_jitter_odds) == 0
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::config::Config;

    fn builder(word_jitter_odds: u32) -> MarkupBuilder {
        let mut prosody = Config::default().prosody;
        prosody.word_jitter_odds = word_jitter_odds;
        MarkupBuilder::new(&prosody).unwrap()
    }

    fn speaker() -> Speaker {
        let mut rng = StdRng::seed_from_u64(11);
        let mut speaker = Speaker::roll("alice", 1.0, &mut rng);
        speaker.speech_pitch = -12;
        speaker.speech_rate = 40;
        speaker
    }

    #[test]
    fn wraps_voice_and_speaker_bias() {
        // odds 0: no random jitter, output is deterministic
        let ssml = builder(0).build(&speaker(), "greetings everyone", "storm");
        assert!(ssml.starts_with("<speak"));
        assert!(ssml.contains("<voice name=\"storm\">"));
        assert!(ssml.contains("<prosody pitch=\"-12%\" rate=\"+40%\">"));
        assert!(ssml.contains("greetings everyone"));
    }

    #[test]
    fn replaces_urls() {
        let ssml = builder(0).build(
            &speaker(),
            "check https://example.com/page?x=1 next",
            "storm",
        );
        assert!(!ssml.contains("example.com"));
        assert!(ssml.contains("check URL next"));
    }

    #[test]
    fn interjections_always_get_prosody() {
        // "oh" matches the two-letter interjection alternative
        let ssml = builder(0).build(&speaker(), "oh", "storm");
        assert!(ssml.matches("<prosody").count() >= 2, "{ssml}");
    }

    #[test]
    fn plain_words_stay_verbatim_without_jitter() {
        let ssml = builder(0).build(&speaker(), "greetings", "storm");
        // only the outer speaker prosody, nothing per-word
        assert_eq!(ssml.matches("<prosody").count(), 1);
    }

    #[test]
    fn certain_jitter_wraps_every_word() {
        let ssml = builder(1).build(&speaker(), "three plain words", "storm");
        // outer prosody plus one per word
        assert_eq!(ssml.matches("<prosody").count(), 4, "{ssml}");
    }

    #[test]
    fn escapes_markup_characters() {
        let ssml = builder(0).build(&speaker(), "a<b & c>d", "storm");
        assert!(ssml.contains("a&lt;b &amp; c&gt;d"));
    }

    #[test]
    fn zero_bias_is_signed() {
        let mut s = speaker();
        s.speech_pitch = 0;
        s.speech_rate = 0;
        let ssml = builder(0).build(&s, "hi there everyone", "storm");
        assert!(ssml.contains("pitch=\"+0%\" rate=\"+0%\""));
    }
}
