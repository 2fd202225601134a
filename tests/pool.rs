//! Worker pool dispatch, growth, and failure-eviction behavior
//!
//! Workers here are real HTTP hosts served in-process over loopback, with a
//! scriptable synthesizer behind them — no child processes, no audio
//! hardware.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sabercast::RetryPolicy;
use sabercast::speech::host;
use sabercast::speech::pool::{WorkerPool, WorkerSpawner};
use sabercast::speech::worker::WorkerClient;
use sabercast::speech::Synthesizer;

use common::FakeSynthesizer;

/// Spawns in-process worker hosts on ephemeral loopback ports
struct FixtureSpawner {
    synthesizer: Arc<FakeSynthesizer>,
    spawned: AtomicUsize,
}

impl FixtureSpawner {
    fn new(synthesizer: Arc<FakeSynthesizer>) -> Arc<Self> {
        Arc::new(Self {
            synthesizer,
            spawned: AtomicUsize::new(0),
        })
    }

    fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerSpawner for FixtureSpawner {
    async fn spawn(&self) -> sabercast::Result<WorkerClient> {
        self.spawned.fetch_add(1, Ordering::SeqCst);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let (activity_tx, _activity_rx) = tokio::sync::mpsc::channel(8);
        let (stop_tx, _stop_rx) = tokio::sync::mpsc::channel(1);
        let app = host::router(
            Arc::clone(&self.synthesizer) as Arc<dyn Synthesizer>,
            activity_tx,
            stop_tx,
        );
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        WorkerClient::connect(port, &RetryPolicy::new(10, Duration::from_millis(10))).await
    }
}

fn pool_with(spawner: &Arc<FixtureSpawner>, max_fill_tries: u32) -> WorkerPool {
    WorkerPool::new(
        Arc::clone(spawner) as Arc<dyn WorkerSpawner>,
        RetryPolicy::new(max_fill_tries, Duration::from_millis(10)),
    )
}

#[tokio::test]
async fn fill_produces_the_rendered_audio() {
    let spawner = FixtureSpawner::new(FakeSynthesizer::new());
    let pool = pool_with(&spawner, 10);

    let mut sink = Vec::new();
    pool.fill_with_speech("storm", "<speak>hello</speak>", &mut sink)
        .await
        .unwrap();

    assert_eq!(sink, common::fixture_wav());
    assert_eq!(pool.worker_count().await, 1);
}

#[tokio::test]
async fn sequential_fills_reuse_the_same_worker() {
    let spawner = FixtureSpawner::new(FakeSynthesizer::new());
    let pool = pool_with(&spawner, 10);

    for _ in 0..5 {
        let mut sink = Vec::new();
        pool.fill_with_speech("storm", "<speak>again</speak>", &mut sink)
            .await
            .unwrap();
    }

    assert_eq!(spawner.spawn_count(), 1);
    assert_eq!(pool.worker_count().await, 1);
}

#[tokio::test]
async fn contention_over_idle_workers_spawns_exactly_one() {
    // 2 idle workers, 3 simultaneous requests: the first two dispatch to
    // the idle workers, the third triggers exactly one spawn - not three
    let spawner = FixtureSpawner::new(FakeSynthesizer::slow(Duration::from_millis(300)));
    let pool = pool_with(&spawner, 10);

    pool.grow().await.unwrap();
    pool.grow().await.unwrap();
    assert_eq!(spawner.spawn_count(), 2);

    let mut a = Vec::new();
    let mut b = Vec::new();
    let mut c = Vec::new();
    let (ra, rb, rc) = tokio::join!(
        pool.fill_with_speech("storm", "<speak>one</speak>", &mut a),
        pool.fill_with_speech("storm", "<speak>two</speak>", &mut b),
        pool.fill_with_speech("storm", "<speak>three</speak>", &mut c),
    );
    ra.unwrap();
    rb.unwrap();
    rc.unwrap();

    assert_eq!(spawner.spawn_count(), 3);
    assert_eq!(pool.worker_count().await, 3);
}

#[tokio::test]
async fn failing_worker_is_evicted_and_the_request_retried() {
    // the first render fails mid-request; the worker is removed and the
    // same request completes against a fresh one, transparently
    let spawner = FixtureSpawner::new(FakeSynthesizer::failing_first(1));
    let pool = pool_with(&spawner, 10);

    let mut sink = Vec::new();
    pool.fill_with_speech("storm", "<speak>retry me</speak>", &mut sink)
        .await
        .unwrap();

    assert_eq!(sink, common::fixture_wav());
    assert_eq!(spawner.spawn_count(), 2, "failed worker must be replaced");
    assert_eq!(pool.worker_count().await, 1, "failed worker must be evicted");
}

#[tokio::test]
async fn exhausted_fill_budget_is_terminal() {
    let spawner = FixtureSpawner::new(FakeSynthesizer::failing_first(usize::MAX));
    let pool = pool_with(&spawner, 3);

    let mut sink = Vec::new();
    let result = pool
        .fill_with_speech("storm", "<speak>doomed</speak>", &mut sink)
        .await;

    assert!(result.is_err());
    assert!(sink.is_empty());
    assert_eq!(spawner.spawn_count(), 3);
    assert_eq!(pool.worker_count().await, 0);
}
