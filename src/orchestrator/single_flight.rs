use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::{collections::HashMap, future::Future, hash::Hash, sync::Arc};
use tracing::debug;

use crate::error::PlannerError;

type Flight<V> = Shared<BoxFuture<'static, Result<V, PlannerError>>>;
type Registry<K, V> = Arc<Mutex<HashMap<K, Flight<V>>>>;

/// How a caller took part in a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightRole {
    /// Started the build
    Leader,
    /// Awaited a build someone else started
    Joiner,
}

/// At most one in-flight computation per key.
///
/// The first caller for a key spawns the build on the runtime; callers that
/// arrive while it runs await the same [`Shared`] future and receive a clone
/// of its result. The build keeps running if every caller goes away, and the
/// key is released as soon as it settles.
pub struct SingleFlight<K, V> {
    inflight: Registry<K, V>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> std::fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.inflight.lock().len())
            .finish()
    }
}

/// Removes the key when the build finishes, panics or is aborted.
struct Release<K: Eq + Hash, V> {
    registry: Registry<K, V>,
    key: Option<K>,
}

impl<K: Eq + Hash, V> Drop for Release<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.registry.lock().remove(&key);
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a build in progress.
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.inflight.lock().contains_key(key)
    }

    /// Run `build` for `key` unless a build for it is already in flight, in
    /// which case wait for that one instead. `build` is only invoked by the
    /// leader.
    pub async fn run<F, Fut>(&self, key: K, build: F) -> (Result<V, PlannerError>, FlightRole)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, PlannerError>> + Send + 'static,
    {
        let (flight, role) = {
            let mut inflight = self.inflight.lock();
            match inflight.get(&key) {
                Some(existing) => (existing.clone(), FlightRole::Joiner),
                None => {
                    let release = Release {
                        registry: Arc::clone(&self.inflight),
                        key: Some(key.clone()),
                    };
                    let work = build();
                    let handle = tokio::spawn(async move {
                        let _release = release;
                        work.await
                    });
                    let flight: Flight<V> = async move {
                        handle.await.unwrap_or_else(|err| {
                            Err(PlannerError::TaskAborted(err.to_string()))
                        })
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key, flight.clone());
                    (flight, FlightRole::Leader)
                }
            }
        };

        if role == FlightRole::Joiner {
            debug!(target: "travel_buddy::orchestrator", "joined in-flight build");
        }
        (flight.await, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_build() {
        let flights: Arc<SingleFlight<String, u32>> = Arc::new(SingleFlight::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let callers = (0..5).map(|_| {
            let flights = Arc::clone(&flights);
            let builds = Arc::clone(&builds);
            async move {
                flights
                    .run("paris".to_string(), move || async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        Ok(42)
                    })
                    .await
            }
        });
        let results = futures::future::join_all(callers).await;

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|(value, _)| value == &Ok(42)));
        let leaders = results
            .iter()
            .filter(|(_, role)| *role == FlightRole::Leader)
            .count();
        assert_eq!(leaders, 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_errors_reach_every_caller_and_release_the_key() {
        let flights: Arc<SingleFlight<&'static str, u32>> = Arc::new(SingleFlight::new());
        let (first, second) = tokio::join!(
            flights.run("rome", || async {
                tokio::task::yield_now().await;
                Err(PlannerError::Unknown("boom".into()))
            }),
            flights.run("rome", || async { Ok(1) })
        );

        assert_eq!(first.0, Err(PlannerError::Unknown("boom".into())));
        assert_eq!(second.0, first.0);
        assert_eq!(second.1, FlightRole::Joiner);
        assert!(!flights.is_in_flight(&"rome"));

        let (retry, role) = flights.run("rome", || async { Ok(7) }).await;
        assert_eq!(retry, Ok(7));
        assert_eq!(role, FlightRole::Leader);
    }

    #[tokio::test]
    async fn test_panicking_build_is_reported_as_aborted() {
        let flights: SingleFlight<u8, u8> = SingleFlight::new();
        let (result, _) = flights
            .run(1, || async {
                let empty: Vec<u8> = Vec::new();
                Ok(empty[0])
            })
            .await;
        assert!(matches!(result, Err(PlannerError::TaskAborted(_))));
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_dropped_leader_does_not_cancel_the_build() {
        let flights: Arc<SingleFlight<u8, u8>> = Arc::new(SingleFlight::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&builds);
        let leader = {
            let flights = Arc::clone(&flights);
            tokio::spawn(async move {
                flights
                    .run(9, move || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(3)
                    })
                    .await
            })
        };
        while !flights.is_in_flight(&9) {
            tokio::task::yield_now().await;
        }
        leader.abort();

        let (joined, role) = flights.run(9, || async { Ok(0) }).await;
        assert_eq!(role, FlightRole::Joiner);
        assert_eq!(joined, Ok(3));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
