//! Per-key serialized task execution
//!
//! Guarantees that actions queued under the same key run strictly in enqueue
//! order and never overlap, while actions under different keys run fully
//! concurrently. Used to keep one chat participant's utterances from talking
//! over each other without blocking anyone else's.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::oneshot;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Per-key FIFO execution queues with one drain worker per busy key.
#[derive(Clone, Default)]
pub struct TaskSerializer {
    queues: Arc<Mutex<HashMap<String, VecDeque<Job>>>>,
}

impl TaskSerializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` under `key`. The returned receiver resolves when the
    /// action has completed (or panicked). A `None` key runs the action
    /// immediately, unserialized.
    ///
    /// A failing action is the caller's concern: wrap the work so errors are
    /// handled inside `action` — the drain loop always proceeds to the next
    /// queued item.
    pub fn enqueue<F>(&self, key: Option<&str>, action: F) -> oneshot::Receiver<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            // one panicking action must not take the drain loop down with it
            if AssertUnwindSafe(action).catch_unwind().await.is_err() {
                tracing::error!("queued action panicked");
            }
            let _ = done_tx.send(());
        });

        let Some(key) = key else {
            tokio::spawn(job);
            return done_rx;
        };

        let needs_drain = {
            let mut queues = self.queues.lock().expect("serializer lock poisoned");
            match queues.get_mut(key) {
                Some(queue) => {
                    queue.push_back(job);
                    false
                }
                None => {
                    queues.insert(key.to_string(), VecDeque::from([job]));
                    true
                }
            }
        };

        if needs_drain {
            Self::drain(Arc::clone(&self.queues), key.to_string());
        }

        done_rx
    }

    /// Number of keys with work currently queued or running.
    #[must_use]
    pub fn busy_keys(&self) -> usize {
        self.queues.lock().expect("serializer lock poisoned").len()
    }

    fn drain(queues: Arc<Mutex<HashMap<String, VecDeque<Job>>>>, key: String) {
        tokio::spawn(async move {
            loop {
                // The pop and the removal share the enqueue mutex: a queue
                // observed empty is removed in the same critical section, so
                // an enqueue racing the removal either lands before it (and
                // gets drained here) or finds no queue and starts a fresh
                // drain worker. Nothing is silently dropped.
                let job = {
                    let mut queues = queues.lock().expect("serializer lock poisoned");
                    match queues.get_mut(&key).and_then(VecDeque::pop_front) {
                        Some(job) => job,
                        None => {
                            queues.remove(&key);
                            break;
                        }
                    }
                };
                job.await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn completion_resolves_after_action() {
        let serializer = TaskSerializer::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_inner = Arc::clone(&hits);
        let done = serializer.enqueue(Some("key"), async move {
            hits_inner.fetch_add(1, Ordering::SeqCst);
        });

        done.await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_queue_is_removed() {
        let serializer = TaskSerializer::new();
        serializer
            .enqueue(Some("key"), async {})
            .await
            .unwrap();

        // the drain worker removes the key once it observes the queue empty
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(serializer.busy_keys(), 0);
    }

    #[tokio::test]
    async fn unkeyed_actions_run_immediately() {
        let serializer = TaskSerializer::new();
        let done = serializer.enqueue(None, async {});
        done.await.unwrap();
        assert_eq!(serializer.busy_keys(), 0);
    }

    #[tokio::test]
    async fn panicking_action_does_not_stall_the_queue() {
        let serializer = TaskSerializer::new();

        let first = serializer.enqueue(Some("key"), async {
            panic!("boom");
        });
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_inner = Arc::clone(&ran);
        let second = serializer.enqueue(Some("key"), async move {
            ran_inner.fetch_add(1, Ordering::SeqCst);
        });

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
