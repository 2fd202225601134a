//! Chat boundary
//!
//! The chat-protocol client itself lives outside this crate; what lives
//! here is everything it calls into — message dispatch through the per-user
//! serializer, and the command surface.

pub mod commands;

use std::sync::Arc;

use tokio::sync::oneshot;

pub use commands::CommandRegistry;

use crate::serializer::TaskSerializer;
use crate::speaker::SpeakerRegistry;
use crate::speech::SpeechService;

/// An incoming chat message
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub username: String,
    pub text: String,
    pub is_broadcaster: bool,
}

/// Handles for observing a queued utterance: `started` resolves when the
/// job begins executing, `finished` when its playback window is over.
pub struct SpeakTicket {
    pub started: oneshot::Receiver<()>,
    pub finished: oneshot::Receiver<()>,
}

/// Dispatches chat into the speech subsystem
pub struct ChatService {
    speech: Arc<SpeechService>,
    serializer: TaskSerializer,
    commands: CommandRegistry,
    read_broadcaster_messages: bool,
}

impl ChatService {
    #[must_use]
    pub fn new(speech: Arc<SpeechService>, registry: Arc<SpeakerRegistry>) -> Self {
        Self {
            speech,
            serializer: TaskSerializer::new(),
            commands: CommandRegistry::new(registry),
            read_broadcaster_messages: true,
        }
    }

    #[must_use]
    pub const fn with_broadcaster_muted(mut self) -> Self {
        self.read_broadcaster_messages = false;
        self
    }

    /// Read an incoming chat message aloud. Returns `None` when the message
    /// is filtered out.
    pub fn handle_message(&self, message: &ChatMessage) -> Option<SpeakTicket> {
        if message.is_broadcaster && !self.read_broadcaster_messages {
            return None;
        }
        Some(self.speak(Some(&message.username), &message.text))
    }

    /// Queue `text` for `username`'s voice. With no username the utterance
    /// is an announcement: unserialized, spoken through a throwaway
    /// character, free to overlap anything.
    ///
    /// Utterances for the same username run strictly in order and never
    /// overlap; different usernames speak concurrently.
    pub fn speak(&self, username: Option<&str>, text: &str) -> SpeakTicket {
        let (started_tx, started_rx) = oneshot::channel();

        let speech = Arc::clone(&self.speech);
        let username_owned = username.map(ToString::to_string);
        let text = text.to_string();

        let job = async move {
            let _ = started_tx.send(());
            let result = match &username_owned {
                Some(name) => speech.speak_as(name, &text).await,
                None => speech.speak_anonymous(&text).await,
            };
            if let Err(e) = result {
                // one speaker's failure stays in their queue: no audio, no
                // crash, just a log line
                tracing::error!(speaker = ?username_owned, error = %e, "speech job failed");
            }
        };

        let finished = self.serializer.enqueue(username, job);
        SpeakTicket {
            started: started_rx,
            finished,
        }
    }

    /// Dispatch a chat command (already stripped of its prefix) and return
    /// the reply line.
    pub fn dispatch_command(&self, username: &str, command: &str) -> String {
        self.commands.dispatch(username, command)
    }
}
