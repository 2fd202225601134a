//! Synthesis backend selection
//!
//! One trait, two homes for the actual rendering: in this process, or in a
//! pool of worker processes. Call sites never branch on which one they got.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendKind, SpeechConfig};
use crate::speech::engine::Synthesizer;
use crate::speech::pool::WorkerPool;
use crate::{Error, Result};

/// Produces audio bytes from markup using a named voice
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Render `ssml` with `voice` into `sink`.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails terminally
    async fn fill_with_speech(&self, voice: &str, ssml: &str, sink: &mut Vec<u8>) -> Result<()>;
}

/// In-process synthesis
pub struct LocalBackend {
    synthesizer: Arc<dyn Synthesizer>,
}

impl LocalBackend {
    #[must_use]
    pub fn new(synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl SpeechBackend for LocalBackend {
    async fn fill_with_speech(&self, voice: &str, ssml: &str, sink: &mut Vec<u8>) -> Result<()> {
        let synthesizer = Arc::clone(&self.synthesizer);
        let voice = voice.to_string();
        let ssml = ssml.to_string();

        let bytes = tokio::task::spawn_blocking(move || synthesizer.render_ssml(&ssml, Some(&voice)))
            .await
            .map_err(|e| Error::Synthesis(format!("synthesis task died: {e}")))??;

        sink.extend_from_slice(&bytes);
        Ok(())
    }
}

#[async_trait]
impl SpeechBackend for WorkerPool {
    async fn fill_with_speech(&self, voice: &str, ssml: &str, sink: &mut Vec<u8>) -> Result<()> {
        Self::fill_with_speech(self, voice, ssml, sink).await
    }
}

/// Build the backend selected by configuration, spawning any configured
/// prewarm workers.
///
/// # Errors
///
/// Returns error if a prewarm worker fails to spawn
pub async fn backend_for_config(
    config: &SpeechConfig,
    synthesizer: Arc<dyn Synthesizer>,
) -> Result<Arc<dyn SpeechBackend>> {
    match config.backend {
        BackendKind::Local => Ok(Arc::new(LocalBackend::new(synthesizer))),
        BackendKind::WorkerPool => {
            let pool = WorkerPool::for_config(config);
            for _ in 0..config.prewarm_workers {
                pool.grow().await?;
            }
            Ok(Arc::new(pool))
        }
    }
}
