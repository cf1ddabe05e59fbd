//! Single-flight refresh: coalesces concurrent reconciliation requests
//! into one in-flight fetch. The first caller runs the fetch; callers
//! arriving while it runs wait for completion and are told the data is
//! already fresh instead of issuing a redundant round-trip.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

#[derive(Debug, PartialEq, Eq)]
pub enum RefreshOutcome<T> {
    /// This caller performed the fetch.
    Fetched(T),
    /// Another caller's in-flight fetch completed meanwhile.
    Coalesced,
}

#[derive(Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<Mutex<Option<watch::Receiver<bool>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` unless one is already in flight, in which case wait for
    /// it and report `Coalesced`. Errors propagate only to the caller that
    /// actually ran the fetch; coalesced callers treat completion (success
    /// or failure) as "a refresh just happened".
    pub async fn run<T, E, F, Fut>(&self, fetch: F) -> Result<RefreshOutcome<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut rx = {
            let mut guard = self.in_flight.lock().await;
            match guard.as_ref() {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(false);
                    *guard = Some(rx);
                    drop(guard);

                    let result = fetch().await;

                    let mut guard = self.in_flight.lock().await;
                    *guard = None;
                    let _ = tx.send(true);

                    return result.map(RefreshOutcome::Fetched);
                }
            }
        };

        // Wait until the leader signals completion. A dropped sender also
        // counts as completion (leader panicked or was cancelled).
        let _ = rx.wait_for(|done| *done).await;
        Ok(RefreshOutcome::Coalesced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn lone_caller_fetches() {
        let flight = SingleFlight::new();
        let outcome: Result<_, ()> = flight.run(|| async { Ok(42) }).await;
        assert_eq!(outcome.unwrap(), RefreshOutcome::Fetched(42));
    }

    #[tokio::test]
    async fn concurrent_callers_coalesce_into_one_fetch() {
        let flight = SingleFlight::new();
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..4 {
            let flight = flight.clone();
            let fetches = fetches.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run(|| async {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, ()>(7)
                    })
                    .await
                    .unwrap()
            }));
            // Give the first task time to take the slot before the rest arrive
            if i == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        let mut fetched = 0;
        let mut coalesced = 0;
        for handle in handles {
            match handle.await.unwrap() {
                RefreshOutcome::Fetched(v) => {
                    assert_eq!(v, 7);
                    fetched += 1;
                }
                RefreshOutcome::Coalesced => coalesced += 1,
            }
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(fetched, 1);
        assert_eq!(coalesced, 3);
    }

    #[tokio::test]
    async fn sequential_calls_each_fetch() {
        let flight = SingleFlight::new();
        for expected in [1, 2] {
            let outcome: Result<_, ()> = flight.run(|| async move { Ok(expected) }).await;
            assert_eq!(outcome.unwrap(), RefreshOutcome::Fetched(expected));
        }
    }

    #[tokio::test]
    async fn fetch_error_reaches_only_the_leader() {
        let flight = SingleFlight::new();
        let outcome: Result<RefreshOutcome<i32>, &str> =
            flight.run(|| async { Err("backend down") }).await;
        assert_eq!(outcome.unwrap_err(), "backend down");

        // The slot is released; the next caller fetches again
        let outcome: Result<_, &str> = flight.run(|| async { Ok(1) }).await;
        assert_eq!(outcome.unwrap(), RefreshOutcome::Fetched(1));
    }
}
