//! Chat command surface
//!
//! Short text commands a chat participant can use to manage their own voice
//! identity. Every handler returns a single reply line for the bot to send
//! back to the channel.

use std::sync::Arc;

use crate::speaker::{Speaker, SpeakerRegistry};

/// (aliases, help text) for every supported command
const COMMANDS: &[(&[&str], &str)] = &[
    (
        &["rv"],
        "Creates a new voice for the requester (optional language parameter like 'de' or 'en' to reset only that language)",
    ),
    (
        &["code"],
        "Gives you a recovery code you can redeem with the 'recover' command",
    ),
    (
        &["recover"],
        "Recovers your lost voice, pass the code you got from the 'code' command",
    ),
    (&["help", "commands"], "Shows this help"),
];

/// Dispatches voice-management chat commands
pub struct CommandRegistry {
    registry: Arc<SpeakerRegistry>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new(registry: Arc<SpeakerRegistry>) -> Self {
        Self { registry }
    }

    /// Run `command` (without its prefix character) for `username` and
    /// return the reply line.
    #[must_use]
    pub fn dispatch(&self, username: &str, command: &str) -> String {
        let command = command.trim();
        let (name, args) = command
            .split_once(char::is_whitespace)
            .unwrap_or((command, ""));
        let args = args.trim();

        match name {
            "rv" => self.reset_voice(username, args),
            "code" => self.recovery_code(username),
            "recover" => self.recover(username, args),
            "help" | "commands" => Self::help(),
            _ => format!("Unknown command '{name}', try 'help'"),
        }
    }

    /// Reset the requester's whole identity, or just one language's voice.
    fn reset_voice(&self, username: &str, language: &str) -> String {
        if language.is_empty() {
            if self.registry.remove(username) {
                ":+1:".to_string()
            } else {
                "You don't have a voice yet".to_string()
            }
        } else if self.registry.clear_voice(username, language) {
            ":+1:".to_string()
        } else {
            format!("No voice assigned for '{language}' yet")
        }
    }

    fn recovery_code(&self, username: &str) -> String {
        let Some(speaker) = self.registry.get(username) else {
            return "Sorry, who are you? peepoWTF".to_string();
        };

        match speaker.to_recovery_code() {
            Ok(code) => format!("Your code: {code}"),
            Err(e) => {
                tracing::error!(speaker = username, error = %e, "recovery code export failed");
                "Couldn't export your voice, sorry".to_string()
            }
        }
    }

    fn recover(&self, username: &str, code: &str) -> String {
        let speaker = match Speaker::from_recovery_code(code) {
            Ok(speaker) => speaker,
            Err(e) => {
                tracing::debug!(speaker = username, error = %e, "bad recovery code");
                return "That code doesn't look right".to_string();
            }
        };

        if speaker.name != username {
            return "Sorry, that voice was never yours!".to_string();
        }

        // redeeming replaces whatever identity the name holds now
        self.registry.remove(&speaker.name);
        self.registry.insert(speaker);
        ":+1:".to_string()
    }

    fn help() -> String {
        let mut lines = vec!["Supported commands:".to_string()];
        for (aliases, description) in COMMANDS {
            lines.push(format!("'{}': {description}", aliases.join("/")));
        }
        lines.join(" | ")
    }
}
