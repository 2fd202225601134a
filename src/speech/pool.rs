//! Out-of-process synthesis worker pool
//!
//! Routes each request to an idle worker, growing the pool on demand. The
//! lock shields only the select-or-spawn decision; synthesis I/O happens
//! outside it. A worker whose channel fails mid-request is evicted and the
//! whole fill retried, bounded by the fill policy.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SpeechConfig;
use crate::retry::{self, RetryPolicy};
use crate::speech::host::SpeechRequest;
use crate::speech::worker::{WorkerClient, free_loopback_port};
use crate::{Error, Result};

/// Spawns new workers for the pool
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    /// Bring up one fresh worker, handshake included.
    async fn spawn(&self) -> Result<WorkerClient>;
}

/// Launches `sabercast-speechd` child processes on free loopback ports
pub struct ProcessSpawner {
    binary: PathBuf,
    handshake: RetryPolicy,
}

impl ProcessSpawner {
    #[must_use]
    pub const fn new(binary: PathBuf, handshake: RetryPolicy) -> Self {
        Self { binary, handshake }
    }

    /// Resolve the worker binary: configured path, or the sibling of the
    /// running executable, or plain PATH lookup.
    #[must_use]
    pub fn resolve_binary(configured: Option<&PathBuf>) -> PathBuf {
        if let Some(path) = configured {
            return path.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("sabercast-speechd")))
            .filter(|candidate| candidate.exists())
            .unwrap_or_else(|| PathBuf::from("sabercast-speechd"))
    }
}

#[async_trait]
impl WorkerSpawner for ProcessSpawner {
    async fn spawn(&self) -> Result<WorkerClient> {
        let port = free_loopback_port()?;
        tracing::info!(port, "spawning speech worker");
        WorkerClient::launch(&self.binary, port, &self.handshake).await
    }
}

struct PoolWorker {
    client: Arc<WorkerClient>,
    busy: bool,
}

#[derive(Default)]
struct PoolState {
    workers: Vec<PoolWorker>,
    cursor: usize,
}

/// Dynamically-sized pool of synthesis workers
pub struct WorkerPool {
    state: tokio::sync::Mutex<PoolState>,
    /// Single-flight guard: concurrent callers that all miss wait for one
    /// spawn instead of each launching a worker
    spawn_guard: tokio::sync::Mutex<()>,
    spawner: Arc<dyn WorkerSpawner>,
    fill_policy: RetryPolicy,
}

impl WorkerPool {
    #[must_use]
    pub fn new(spawner: Arc<dyn WorkerSpawner>, fill_policy: RetryPolicy) -> Self {
        Self {
            state: tokio::sync::Mutex::new(PoolState::default()),
            spawn_guard: tokio::sync::Mutex::new(()),
            spawner,
            fill_policy,
        }
    }

    /// Pool configured for child-process workers.
    #[must_use]
    pub fn for_config(config: &SpeechConfig) -> Self {
        let step = std::time::Duration::from_millis(config.backoff_step_ms);
        let spawner = ProcessSpawner::new(
            ProcessSpawner::resolve_binary(config.worker_binary.as_ref()),
            RetryPolicy::new(config.handshake_tries, step),
        );
        Self::new(
            Arc::new(spawner),
            RetryPolicy::new(config.max_fill_tries, step),
        )
    }

    /// Synthesize `ssml` with `voice`, writing the audio into `sink`.
    ///
    /// # Errors
    ///
    /// Returns error once the fill retry budget is exhausted or a worker
    /// fails to spawn
    pub async fn fill_with_speech(&self, voice: &str, ssml: &str, sink: &mut Vec<u8>) -> Result<()> {
        let request = SpeechRequest {
            voice_name: Some(voice.to_string()),
            ssml: Some(ssml.to_string()),
            text: None,
        };

        let bytes = retry::run(&self.fill_policy, || async {
            let worker = self.checkout_or_spawn().await?;
            match worker.speak(&request).await {
                Ok(bytes) => {
                    self.checkin(&worker).await;
                    Ok(bytes)
                }
                Err(e) => {
                    tracing::warn!(port = worker.port(), error = %e, "worker failed, evicting");
                    self.evict(&worker).await;
                    Err(Error::transient(e))
                }
            }
        })
        .await?;

        sink.extend_from_slice(&bytes);
        Ok(())
    }

    /// Number of live workers.
    pub async fn worker_count(&self) -> usize {
        self.state.lock().await.workers.len()
    }

    /// Eagerly add one idle worker to the pool.
    ///
    /// # Errors
    ///
    /// Returns error if the spawn fails
    pub async fn grow(&self) -> Result<()> {
        let client = Arc::new(self.spawner.spawn().await?);
        self.state.lock().await.workers.push(PoolWorker {
            client,
            busy: false,
        });
        Ok(())
    }

    /// Round-robin scan for an idle worker, marking it busy.
    async fn try_checkout(&self) -> Option<Arc<WorkerClient>> {
        let mut state = self.state.lock().await;
        for _ in 0..state.workers.len() {
            if state.cursor >= state.workers.len() {
                state.cursor = 0;
            }
            let index = state.cursor;
            state.cursor += 1;

            if !state.workers[index].busy {
                state.workers[index].busy = true;
                return Some(Arc::clone(&state.workers[index].client));
            }
        }
        None
    }

    /// Checkout a free worker, spawning one if the pool is empty or fully
    /// busy (both transient conditions, but growth beats waiting).
    async fn checkout_or_spawn(&self) -> Result<Arc<WorkerClient>> {
        if let Some(client) = self.try_checkout().await {
            return Ok(client);
        }

        let _guard = self.spawn_guard.lock().await;

        // a worker may have been freed or spawned while we waited
        if let Some(client) = self.try_checkout().await {
            return Ok(client);
        }

        let client = Arc::new(self.spawner.spawn().await?);
        self.state.lock().await.workers.push(PoolWorker {
            client: Arc::clone(&client),
            busy: true,
        });
        Ok(client)
    }

    async fn checkin(&self, client: &Arc<WorkerClient>) {
        let mut state = self.state.lock().await;
        if let Some(worker) = state
            .workers
            .iter_mut()
            .find(|w| Arc::ptr_eq(&w.client, client))
        {
            worker.busy = false;
        }
    }

    async fn evict(&self, client: &Arc<WorkerClient>) {
        let removed = {
            let mut state = self.state.lock().await;
            state
                .workers
                .iter()
                .position(|w| Arc::ptr_eq(&w.client, client))
                .map(|index| state.workers.remove(index))
        };

        if let Some(worker) = removed {
            worker.client.dispose().await;
        }
    }
}
