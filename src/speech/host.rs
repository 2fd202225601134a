//! Speech worker host
//!
//! The HTTP surface of the out-of-process synthesizer: a fixed greeting for
//! liveness, a synthesis endpoint taking SSML or plain text, and an explicit
//! stop. The host exits on its own after sitting idle — workers are cheap to
//! respawn and expensive to leak.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::Result;
use crate::speech::engine::Synthesizer;

/// Synthesis request accepted by the worker. Markup wins when both forms
/// are present; the voice override applies to either.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    pub voice_name: Option<String>,

    #[serde(default)]
    pub ssml: Option<String>,

    #[serde(default)]
    pub text: Option<String>,
}

struct HostState {
    synthesizer: Arc<dyn Synthesizer>,
    activity: mpsc::Sender<()>,
    shutdown: mpsc::Sender<()>,
}

/// Liveness handshake
async fn hello(State(state): State<Arc<HostState>>) -> &'static str {
    let _ = state.activity.try_send(());
    "World"
}

/// Render a request to WAV bytes
async fn speak(
    State(state): State<Arc<HostState>>,
    Json(request): Json<SpeechRequest>,
) -> std::result::Result<Vec<u8>, (StatusCode, String)> {
    let _ = state.activity.try_send(());

    let synthesizer = Arc::clone(&state.synthesizer);
    let rendered = tokio::task::spawn_blocking(move || {
        let voice = request.voice_name.as_deref();
        if let Some(ssml) = &request.ssml {
            synthesizer.render_ssml(ssml, voice)
        } else if let Some(text) = &request.text {
            synthesizer.render_text(text, voice)
        } else {
            Err(crate::Error::Synthesis("empty request".to_string()))
        }
    })
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("synthesis task died: {e}"),
        )
    })?;

    rendered.map_err(|e| {
        tracing::error!(error = %e, "synthesis failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

/// Explicit shutdown
async fn stop(State(state): State<Arc<HostState>>) -> StatusCode {
    tracing::info!("stop requested");
    let _ = state.shutdown.try_send(());
    StatusCode::OK
}

/// Build the worker router. `activity` is pinged on every request so the
/// idle watchdog can re-arm; `shutdown` fires on the stop endpoint.
pub fn router(
    synthesizer: Arc<dyn Synthesizer>,
    activity: mpsc::Sender<()>,
    shutdown: mpsc::Sender<()>,
) -> Router {
    let state = Arc::new(HostState {
        synthesizer,
        activity,
        shutdown,
    });

    Router::new()
        .route("/hello", get(hello))
        .route("/speak", post(speak))
        .route("/stop", post(stop))
        .with_state(state)
}

/// Serve the worker on a loopback port until stopped or idle for
/// `idle_timeout`.
///
/// # Errors
///
/// Returns error if the port cannot be bound
pub async fn serve(port: u16, synthesizer: Arc<dyn Synthesizer>, idle_timeout: Duration) -> Result<()> {
    let (activity_tx, mut activity_rx) = mpsc::channel(8);
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

    let app = router(synthesizer, activity_tx, shutdown_tx);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tracing::info!(port, "speech worker listening");

    let quiesce = async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                answered = tokio::time::timeout(idle_timeout, activity_rx.recv()) => {
                    match answered {
                        Ok(Some(())) => {} // activity, re-arm the watchdog
                        Ok(None) | Err(_) => {
                            tracing::info!("idle timeout, shutting down");
                            break;
                        }
                    }
                }
            }
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(quiesce)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_partial_json() {
        let request: SpeechRequest = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(request.text.as_deref(), Some("hi"));
        assert!(request.ssml.is_none());
        assert!(request.voice_name.is_none());
    }

    #[test]
    fn request_round_trips() {
        let request = SpeechRequest {
            voice_name: Some("storm".to_string()),
            ssml: Some("<speak>hello</speak>".to_string()),
            text: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: SpeechRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.voice_name.as_deref(), Some("storm"));
        assert_eq!(back.ssml.as_deref(), Some("<speak>hello</speak>"));
    }
}
