//! Per-key request coalescing.
//!
//! The first caller for a key spawns the work; callers arriving while it is
//! still running await the same task and receive a clone of its output.
//! The task runs to completion even if every caller goes away, and removes
//! its own entry when done.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

type Flight<T> = Shared<BoxFuture<'static, Option<T>>>;

pub struct SingleFlight<K, T> {
    inflight: Arc<Mutex<HashMap<K, Flight<T>>>>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self { inflight: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Run `work` for `key`, or join the run already in progress.
    ///
    /// `work` is only called when no flight exists for `key`. Returns `None`
    /// if the work panicked or the runtime shut down before it finished.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(&key) {
                Some(flight) => {
                    tracing::debug!("joining in-flight capture");
                    flight.clone()
                }
                None => {
                    let flight = self.spawn(key.clone(), work());
                    inflight.insert(key, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// The entry is removed under the map lock, which the caller holds until
    /// the flight is inserted, so removal always follows insertion.
    fn spawn<Fut>(&self, key: K, work: Fut) -> Flight<T>
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let inflight = Arc::clone(&self.inflight);
        let task = tokio::spawn(async move {
            let output = AssertUnwindSafe(work).catch_unwind().await.ok();
            if output.is_none() {
                tracing::error!("in-flight capture panicked");
            }
            inflight.lock().await.remove(&key);
            output
        });

        async move { task.await.ok().flatten() }.boxed().shared()
    }

    /// Number of keys with a run in progress.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let flights = Arc::new(SingleFlight::<String, usize>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let flights = Arc::clone(&flights);
            let runs = Arc::clone(&runs);
            tasks.push(tokio::spawn(async move {
                flights
                    .run("post".to_string(), move || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        runs.fetch_add(1, Ordering::SeqCst) + 1
                    })
                    .await
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap(), Some(1));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flights.len().await, 0);
    }

    #[tokio::test]
    async fn test_sequential_callers_run_again() {
        let flights = SingleFlight::<String, u32>::new();

        let first = flights.run("a".into(), || async { 1 }).await;
        let second = flights.run("a".into(), || async { 2 }).await;

        assert_eq!((first, second), (Some(1), Some(2)));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_share() {
        let flights = SingleFlight::<String, &'static str>::new();

        let (a, b) = tokio::join!(
            flights.run("a".into(), || async { "a" }),
            flights.run("b".into(), || async { "b" }),
        );

        assert_eq!((a, b), (Some("a"), Some("b")));
    }

    #[tokio::test]
    async fn test_run_completes_after_caller_is_dropped() {
        let flights = Arc::new(SingleFlight::<String, ()>::new());
        let done = Arc::new(AtomicUsize::new(0));

        let caller = tokio::spawn({
            let flights = Arc::clone(&flights);
            let done = Arc::clone(&done);
            async move {
                flights
                    .run("post".into(), move || async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        done.fetch_add(1, Ordering::SeqCst);
                    })
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(flights.len().await, 0);
    }

    #[tokio::test]
    async fn test_panicking_run_is_cleared() {
        let flights = SingleFlight::<String, u32>::new();

        let output = flights.run("a".into(), || async { panic!("boom") }).await;
        assert_eq!(output, None);
        assert_eq!(flights.len().await, 0);

        assert_eq!(flights.run("a".into(), || async { 7 }).await, Some(7));
    }
}
