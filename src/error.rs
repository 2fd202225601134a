//! Error types for sabercast

use thiserror::Error;

/// Result type alias for sabercast operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sabercast
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech synthesis error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio decode/playback error
    #[error("audio error: {0}")]
    Audio(String),

    /// Worker process error
    #[error("worker error: {0}")]
    Worker(String),

    /// Retryable failure (busy pool, unanswered handshake, dropped channel)
    #[error("transient failure: {0}")]
    Transient(String),

    /// Recovery code error
    #[error("recovery code error: {0}")]
    RecoveryCode(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// WAV container error
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
}

impl Error {
    /// Whether this failure is worth retrying. Retry loops branch on this
    /// tag rather than on the error's variant tree.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Wrap any error as a transient failure for retry loops.
    pub fn transient(err: impl std::fmt::Display) -> Self {
        Self::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_tag() {
        assert!(Error::Transient("busy".into()).is_transient());
        assert!(!Error::Config("bad".into()).is_transient());
        assert!(!Error::Worker("gone".into()).is_transient());
    }

    #[test]
    fn transient_wraps_display() {
        let err = Error::transient(Error::Worker("channel dropped".into()));
        assert!(err.is_transient());
        assert!(err.to_string().contains("channel dropped"));
    }
}
