use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::time::Instant;
use tracing::{info, warn};

use super::{
    single_flight::{FlightRole, SingleFlight},
    state::{OrchestrationState, StateTracker},
};
use crate::{
    agents::{AgentContext, AgentRunner, PeerOutputs, SharedBundle},
    assembler::assemble,
    cache::{fingerprint, CacheStats, Fingerprint, ItineraryCache},
    config::PlannerConfig,
    error::{PlannerError, Result},
    sources::ExternalSourceGateway,
    types::{Itinerary, ItineraryResponse, TravelRequest},
};

/// Where a caller's itinerary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Served {
    Cache,
    /// This caller ran the build
    Built,
    /// This caller waited on someone else's build
    Joined,
}

#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub itinerary: Arc<Itinerary>,
    pub fingerprint: Fingerprint,
    pub served: Served,
}

/// Monitoring snapshot of a planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerStats {
    pub builds: u64,
    pub joins: u64,
    pub cache_hits: u64,
    pub failures: u64,
    pub in_flight: usize,
    pub cache: CacheStats,
}

#[derive(Debug, Default)]
struct Counters {
    builds: AtomicU64,
    joins: AtomicU64,
    cache_hits: AtomicU64,
    failures: AtomicU64,
}

/// What a finished flight hands to its leader and joiners.
#[derive(Debug, Clone)]
struct Flight {
    itinerary: Arc<Itinerary>,
    /// Found in the cache on the leader's re-check; nothing was built
    reused: bool,
}

/// State shared with spawned build tasks.
struct Pipeline {
    config: PlannerConfig,
    cache: Arc<ItineraryCache>,
    gateway: ExternalSourceGateway,
    runner: AgentRunner,
    counters: Counters,
}

/// Entry point: turns a [`TravelRequest`] into an [`Itinerary`], serving
/// repeats from cache and coalescing concurrent identical requests into a
/// single build.
pub struct TravelPlanner {
    pipeline: Arc<Pipeline>,
    flights: SingleFlight<Fingerprint, Flight>,
}

impl std::fmt::Debug for TravelPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TravelPlanner")
            .field("gateway", &self.pipeline.gateway)
            .field("runner", &self.pipeline.runner)
            .field("flights", &self.flights)
            .finish_non_exhaustive()
    }
}

impl TravelPlanner {
    pub fn new(
        config: PlannerConfig,
        cache: Arc<ItineraryCache>,
        gateway: ExternalSourceGateway,
        runner: AgentRunner,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                config,
                cache,
                gateway,
                runner,
                counters: Counters::default(),
            }),
            flights: SingleFlight::new(),
        }
    }

    /// Planner wired to the live sources, agents and cache described by
    /// `config`. Starts the primary cache reconnect loop when Redis is set.
    pub async fn from_config(config: PlannerConfig) -> Result<Self> {
        let cache = Arc::new(ItineraryCache::from_config(&config).await);
        if config.redis_url.is_some() {
            let _ = cache.spawn_reconnect(config.reconnect_interval);
        }
        let gateway = ExternalSourceGateway::from_config(&config);
        let runner = AgentRunner::from_config(&config)?;
        Ok(Self::new(config, cache, gateway, runner))
    }

    pub fn cache(&self) -> &Arc<ItineraryCache> {
        &self.pipeline.cache
    }

    /// Plan `request`, from cache when possible.
    pub async fn plan(&self, request: TravelRequest) -> Result<PlanOutcome> {
        let counters = &self.pipeline.counters;
        let mut tracker = StateTracker::new();

        if let Err(err) = request.validate(Utc::now().date_naive()) {
            counters.failures.fetch_add(1, Ordering::Relaxed);
            tracker.advance(OrchestrationState::Failed);
            return Err(err);
        }

        let key = fingerprint(&request);
        tracker.resolve(key.clone());

        // A build already running for this key will store its result; join it
        // rather than counting another cache miss.
        if !self.flights.is_in_flight(&key) {
            if let Some(itinerary) = self.pipeline.cache.get(&key).await {
                counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                tracker.advance(OrchestrationState::CacheHit);
                return Ok(PlanOutcome {
                    itinerary,
                    fingerprint: key,
                    served: Served::Cache,
                });
            }
        }

        tracker.advance(OrchestrationState::Locking);
        let pipeline = Arc::clone(&self.pipeline);
        let build_key = key.clone();
        let request = Arc::new(request);
        let (result, role) = self
            .flights
            .run(key.clone(), move || pipeline.build(build_key, request))
            .await;

        let flight = match result {
            Ok(flight) => flight,
            Err(err) => {
                if role == FlightRole::Joiner {
                    counters.joins.fetch_add(1, Ordering::Relaxed);
                    tracker.advance(OrchestrationState::Failed);
                }
                return Err(err);
            }
        };

        let served = match role {
            FlightRole::Leader if flight.reused => {
                counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                tracker.advance(OrchestrationState::CacheHit);
                Served::Cache
            }
            FlightRole::Leader => Served::Built,
            FlightRole::Joiner => {
                counters.joins.fetch_add(1, Ordering::Relaxed);
                tracker.advance(OrchestrationState::Cached);
                Served::Joined
            }
        };

        Ok(PlanOutcome {
            itinerary: flight.itinerary,
            fingerprint: key,
            served,
        })
    }

    /// Plan `request` and wrap the outcome for a transport layer.
    pub async fn respond(&self, request: TravelRequest) -> ItineraryResponse {
        let started = Instant::now();
        match self.plan(request).await {
            Ok(outcome) => {
                ItineraryResponse::success(outcome.itinerary.as_ref().clone(), started.elapsed())
            }
            Err(err) => ItineraryResponse::failure(&err, started.elapsed()),
        }
    }

    pub fn stats(&self) -> PlannerStats {
        let counters = &self.pipeline.counters;
        PlannerStats {
            builds: counters.builds.load(Ordering::Relaxed),
            joins: counters.joins.load(Ordering::Relaxed),
            cache_hits: counters.cache_hits.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            in_flight: self.flights.in_flight(),
            cache: self.pipeline.cache.stats(),
        }
    }
}

impl Pipeline {
    /// Full build under the overall request timeout. Only successful
    /// itineraries are written to the cache.
    ///
    /// The key is looked up again first: a caller can miss the cache while
    /// another build is still storing its result, then take the key once that
    /// build has released it.
    async fn build(self: Arc<Self>, key: Fingerprint, request: Arc<TravelRequest>) -> Result<Flight> {
        let mut tracker = StateTracker::locked(key.clone());
        if let Some(itinerary) = self.cache.peek(&key).await {
            tracker.advance(OrchestrationState::CacheHit);
            return Ok(Flight {
                itinerary,
                reused: true,
            });
        }

        self.counters.builds.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let deadline = self.config.request_timeout;

        let outcome = match tokio::time::timeout(deadline, self.fan_out(&mut tracker, &request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PlannerError::OrchestrationTimeout(deadline)),
        };

        match outcome {
            Ok(itinerary) => {
                let itinerary = Arc::new(itinerary);
                self.cache.put(&key, Arc::clone(&itinerary)).await;
                tracker.advance(OrchestrationState::Cached);
                info!(
                    target: "travel_buddy::orchestrator",
                    fingerprint = %key,
                    destination = %request.destination,
                    degraded = itinerary.degraded,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "itinerary built"
                );
                Ok(Flight {
                    itinerary,
                    reused: false,
                })
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracker.advance(OrchestrationState::Failed);
                warn!(
                    target: "travel_buddy::orchestrator",
                    fingerprint = %key,
                    error = %err,
                    code = err.error_code(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "planning failed"
                );
                Err(err)
            }
        }
    }

    async fn fan_out(&self, tracker: &mut StateTracker, request: &Arc<TravelRequest>) -> Result<Itinerary> {
        tracker.advance(OrchestrationState::Fanout);

        let gateway = self.gateway.clone();
        let destination = request.destination.clone();
        let dates = request.date_range();
        let bundle: SharedBundle = async move { Arc::new(gateway.gather(&destination, dates).await) }
            .boxed()
            .shared();

        // The bundle only progresses while polled, so drive it alongside the
        // tier-1 agents that are waiting on it.
        let ctx = AgentContext::new(Arc::clone(request), bundle.clone());
        let (external, (explorer, food)) = tokio::join!(bundle, self.runner.run_tier_one(&ctx));

        tracker.advance(OrchestrationState::Merging);
        let budget_ctx = ctx.with_peers(PeerOutputs {
            explorer: explorer.success().cloned(),
            food: food.success().cloned(),
        });
        let budget = self.runner.run_budget(&budget_ctx).await;

        let itinerary = assemble(
            request,
            &external,
            explorer,
            food,
            budget,
            &self.config.limits,
        )?;
        Ok(itinerary)
    }
}
