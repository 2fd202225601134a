//! Remote synthesis worker client
//!
//! One client per worker process: spawn it on a free loopback port, open an
//! HTTP channel, and hold it until a request fails terminally. Connection
//! failures while the process boots are transient — the handshake retries
//! them under the caller's policy.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Child;
use tokio::sync::Mutex;

use crate::retry::{self, RetryPolicy};
use crate::speech::host::SpeechRequest;
use crate::{Error, Result};

/// Channel to one out-of-process synthesis worker
pub struct WorkerClient {
    port: u16,
    http: reqwest::Client,
    child: Mutex<Option<Child>>,
}

impl WorkerClient {
    /// Spawn the worker binary on `port` and wait for its handshake.
    ///
    /// # Errors
    ///
    /// Returns error if the process cannot be spawned, or the handshake
    /// retries run out, or the handshake answer is malformed
    pub async fn launch(binary: &Path, port: u16, handshake: &RetryPolicy) -> Result<Self> {
        let child = tokio::process::Command::new(binary)
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Worker(format!("cannot spawn {}: {e}", binary.display())))?;

        let client = Self {
            port,
            http: reqwest::Client::new(),
            child: Mutex::new(Some(child)),
        };

        retry::run(handshake, || client.hello()).await?;
        tracing::info!(port, "speech worker ready");
        Ok(client)
    }

    /// Open a channel to a worker that is already listening on `port`.
    ///
    /// # Errors
    ///
    /// Returns error if the handshake fails
    pub async fn connect(port: u16, handshake: &RetryPolicy) -> Result<Self> {
        let client = Self {
            port,
            http: reqwest::Client::new(),
            child: Mutex::new(None),
        };

        retry::run(handshake, || client.hello()).await?;
        Ok(client)
    }

    /// Liveness handshake: the worker answers the fixed greeting.
    async fn hello(&self) -> Result<()> {
        let answer = self
            .http
            .get(self.url("hello"))
            .send()
            .await
            .map_err(Error::transient)?
            .error_for_status()
            .map_err(Error::transient)?
            .text()
            .await
            .map_err(Error::transient)?;

        if answer == "World" {
            Ok(())
        } else {
            Err(Error::Worker(format!(
                "unexpected handshake answer: {answer:?}"
            )))
        }
    }

    /// Run a synthesis request, returning the rendered audio bytes.
    ///
    /// # Errors
    ///
    /// All failures are transient from the pool's point of view: the worker
    /// gets evicted and the request retried elsewhere
    pub async fn speak(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        let response = self
            .http
            .post(self.url("speak"))
            .json(request)
            .send()
            .await
            .map_err(Error::transient)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transient(format!("worker answered {status}: {body}")));
        }

        Ok(response.bytes().await.map_err(Error::transient)?.to_vec())
    }

    /// Tear the worker down. Safe to call on externally-managed workers.
    pub async fn dispose(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(port = self.port, error = %e, "worker already gone");
            }
        }
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}/{path}", self.port)
    }
}

/// Ask the OS for a currently-free loopback port.
///
/// # Errors
///
/// Returns error if no port can be bound
pub fn free_loopback_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}
