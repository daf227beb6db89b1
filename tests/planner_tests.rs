use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use travel_buddy_rs::{
    agents::{AgentContext, AgentFuture, AgentOutput, ExplorerPayload, FoodPayload},
    sources::{PlacesSource, SourceFuture, TransitSource, WeatherSource},
    types::{Activity, DateRange, FailureOrigin, Place, WeatherForecast},
    cache::CacheEntry,
    AgentRole, AgentRunner, BudgetCategory, CacheBackend, CacheError, DataSource, ExternalSourceGateway, ItineraryCache,
    PlannerConfig, PlannerError, Served, SourceTimeouts, TravelAgent, TravelPlanner,
    TravelPreference, TravelRequest,
};

fn paris() -> TravelRequest {
    TravelRequest::new(
        "Paris, France",
        500.0,
        BudgetCategory::Moderate,
        vec![TravelPreference::Culture, TravelPreference::Food],
        NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
    )
}

fn demo_gateway() -> ExternalSourceGateway {
    ExternalSourceGateway::from_config(&PlannerConfig::default())
}

fn planner(gateway: ExternalSourceGateway, runner: AgentRunner) -> TravelPlanner {
    let config = PlannerConfig::default();
    let cache = Arc::new(ItineraryCache::in_memory(
        config.cache_capacity,
        config.cache_ttl,
    ));
    TravelPlanner::new(config, cache, gateway, runner)
}

fn default_runner() -> AgentRunner {
    AgentRunner::from_config(&PlannerConfig::default()).unwrap()
}

/// Demo places, counting fetches and taking a while to answer.
#[derive(Debug, Default)]
struct CountingPlaces {
    calls: AtomicUsize,
}

impl DataSource for CountingPlaces {
    type Output = Vec<Place>;

    fn name(&self) -> &'static str {
        "places"
    }

    fn fetch<'a>(&'a self, destination: &'a str, dates: DateRange) -> SourceFuture<'a, Self::Output> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            PlacesSource::new(None).fetch(destination, dates).await
        })
    }
}

#[derive(Debug)]
struct HangingWeather;

impl DataSource for HangingWeather {
    type Output = Vec<WeatherForecast>;

    fn name(&self) -> &'static str {
        "weather"
    }

    fn fetch<'a>(&'a self, _: &'a str, _: DateRange) -> SourceFuture<'a, Self::Output> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        })
    }
}

#[derive(Debug)]
struct FixedExplorer(Vec<Activity>);

impl TravelAgent for FixedExplorer {
    fn role(&self) -> AgentRole {
        AgentRole::Explorer
    }

    fn run<'a>(&'a self, ctx: &'a AgentContext) -> AgentFuture<'a> {
        Box::pin(async move {
            // Still waits on the bundle like a real tier-1 agent.
            ctx.external().await;
            Ok(AgentOutput::Explorer(ExplorerPayload {
                activities: self.0.clone(),
                recommendations: Vec::new(),
            }))
        })
    }
}

#[derive(Debug)]
struct NoRestaurants;

impl TravelAgent for NoRestaurants {
    fn role(&self) -> AgentRole {
        AgentRole::Food
    }

    fn run<'a>(&'a self, _ctx: &'a AgentContext) -> AgentFuture<'a> {
        Box::pin(async { Ok(AgentOutput::Food(FoodPayload::default())) })
    }
}

#[derive(Debug)]
struct BrokenAgent(AgentRole);

impl TravelAgent for BrokenAgent {
    fn role(&self) -> AgentRole {
        self.0
    }

    fn run<'a>(&'a self, _ctx: &'a AgentContext) -> AgentFuture<'a> {
        Box::pin(async { Err(PlannerError::Generation("model returned garbage".into())) })
    }
}

#[derive(Debug)]
struct HangingAgent(AgentRole);

impl TravelAgent for HangingAgent {
    fn role(&self) -> AgentRole {
        self.0
    }

    fn run<'a>(&'a self, _ctx: &'a AgentContext) -> AgentFuture<'a> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(PlannerError::Unknown("never finishes".into()))
        })
    }
}

fn activity(name: &str, fee: f64) -> Activity {
    Activity {
        name: name.to_string(),
        description: String::new(),
        location: "Paris".to_string(),
        category: "landmark".to_string(),
        entry_fee: Some(fee),
        estimated_duration: 90,
        popularity_score: 8.0,
        uniqueness_score: 8.0,
    }
}

#[tokio::test]
async fn test_paris_weekend_end_to_end() {
    let planner = planner(demo_gateway(), default_runner());

    let first = planner.plan(paris()).await.unwrap();
    assert_eq!(first.served, Served::Built);

    let itinerary = first.itinerary.as_ref();
    assert_eq!(itinerary.destination, "Paris, France");
    assert_eq!(itinerary.day_plans.len(), 2);
    assert_eq!(
        itinerary.day_plans[1].date,
        NaiveDate::from_ymd_opt(2030, 6, 2).unwrap()
    );
    assert!(itinerary.activity_count() > 0);
    assert!(itinerary.day_plans.iter().all(|day| day.lunch.is_some()));
    assert!(itinerary
        .day_plans
        .iter()
        .all(|day| day.activity_count() <= 4));
    assert_eq!(itinerary.weather_forecast.len(), 2);
    assert_eq!(itinerary.emergency_contacts.len(), 4);
    assert!(!itinerary.degraded);
    assert!(!itinerary.recommendations.is_empty());

    let day_total: f64 = itinerary
        .day_plans
        .iter()
        .map(|day| day.total_estimated_cost)
        .sum();
    assert!((itinerary.total_estimated_cost - day_total).abs() < 1e-9);
    let utilization = itinerary.total_estimated_cost / itinerary.total_budget * 100.0;
    assert!((itinerary.budget_utilization_percentage - utilization).abs() < 1e-9);

    // Same trip, differently written.
    let mut again = paris();
    again.destination = "  paris,  FRANCE".to_string();
    again.travel_preferences = vec![TravelPreference::Food, TravelPreference::Culture];
    let second = planner.plan(again).await.unwrap();
    assert_eq!(second.served, Served::Cache);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(second.itinerary.as_ref(), itinerary);

    let stats = planner.stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.cache_hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_identical_requests_share_one_build() {
    let places = Arc::new(CountingPlaces::default());
    let gateway = ExternalSourceGateway::new(
        Arc::new(WeatherSource::new(None)),
        places.clone(),
        Arc::new(TransitSource::new(None)),
        SourceTimeouts::default(),
    );
    let planner = Arc::new(planner(gateway, default_runner()));

    let callers = (0..10).map(|_| {
        let planner = Arc::clone(&planner);
        async move { planner.plan(paris()).await }
    });
    let outcomes: Vec<_> = futures::future::join_all(callers)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(places.calls.load(Ordering::SeqCst), 1);
    let built = outcomes
        .iter()
        .filter(|outcome| outcome.served == Served::Built)
        .count();
    assert_eq!(built, 1);
    assert!(outcomes
        .iter()
        .all(|outcome| Arc::ptr_eq(&outcome.itinerary, &outcomes[0].itinerary)));

    let stats = planner.stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.joins, 9);
    assert_eq!(stats.in_flight, 0);
    // Joiners never touch the cache.
    assert_eq!(stats.cache.misses, 1);
    assert_eq!(stats.cache.hits, 0);
}

/// Primary store whose reads answer from a snapshot taken when the read
/// starts, after a scripted delay.
#[derive(Default)]
struct ScriptedStore {
    read_delays: Mutex<VecDeque<Duration>>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

#[async_trait]
impl CacheBackend for ScriptedStore {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let snapshot = self.entries.lock().get(key).cloned();
        let delay = self.read_delays.lock().pop_front().unwrap_or_default();
        tokio::time::sleep(delay).await;
        Ok(snapshot)
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries.lock().insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize, CacheError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.contains(pattern));
        Ok(before - entries.len())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.lock().clear();
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_cache_read_after_build_finishes_does_not_rebuild() {
    // First caller: 100ms miss, then a 100ms re-check before building.
    // Second caller starts at 50ms and misses on a 500ms read, so it only
    // reaches the single-flight registry after the first build released it.
    let store = Arc::new(ScriptedStore::default());
    store.read_delays.lock().extend([
        Duration::from_millis(100),
        Duration::from_millis(500),
        Duration::from_millis(100),
    ]);
    let config = PlannerConfig::default();
    let cache = Arc::new(ItineraryCache::with_primary(store.clone(), 16, config.cache_ttl).await);
    let planner = Arc::new(TravelPlanner::new(
        config,
        cache,
        demo_gateway(),
        default_runner(),
    ));

    let first = tokio::spawn({
        let planner = Arc::clone(&planner);
        async move { planner.plan(paris()).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = planner.plan(paris()).await.unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(first.served, Served::Built);
    assert_eq!(second.served, Served::Cache);
    assert_eq!(second.itinerary.destination, first.itinerary.destination);
    assert_eq!(second.fingerprint, first.fingerprint);

    let stats = planner.stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.joins, 0);
    assert_eq!(stats.cache.misses, 2);
    assert_eq!(store.entries.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cached_itinerary_expires_after_one_hour() {
    let places = Arc::new(CountingPlaces::default());
    let gateway = ExternalSourceGateway::new(
        Arc::new(WeatherSource::new(None)),
        places.clone(),
        Arc::new(TransitSource::new(None)),
        SourceTimeouts::default(),
    );
    let planner = planner(gateway, default_runner());

    assert_eq!(planner.plan(paris()).await.unwrap().served, Served::Built);

    tokio::time::advance(Duration::from_secs(59 * 60)).await;
    assert_eq!(planner.plan(paris()).await.unwrap().served, Served::Cache);

    tokio::time::advance(Duration::from_secs(2 * 60)).await;
    assert_eq!(planner.plan(paris()).await.unwrap().served, Served::Built);
    assert_eq!(places.calls.load(Ordering::SeqCst), 2);
    assert_eq!(planner.cache().stats().evictions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_weather_timeout_yields_degraded_itinerary() {
    let gateway = ExternalSourceGateway::new(
        Arc::new(HangingWeather),
        Arc::new(PlacesSource::new(None)),
        Arc::new(TransitSource::new(None)),
        SourceTimeouts::default(),
    );
    let planner = planner(gateway, default_runner());

    let started = tokio::time::Instant::now();
    let outcome = planner.plan(paris()).await.unwrap();
    assert!(started.elapsed() <= Duration::from_secs(10));

    let itinerary = outcome.itinerary.as_ref();
    assert!(itinerary.degraded);
    assert!(itinerary.weather_forecast.is_empty());
    assert_eq!(itinerary.soft_failures.len(), 1);
    assert_eq!(itinerary.soft_failures[0].origin, FailureOrigin::Weather);
    assert!(itinerary.activity_count() > 0);
    assert!(!itinerary
        .recommendations
        .iter()
        .any(|line| line.contains("weather expected")));
}

#[tokio::test]
async fn test_overage_is_reported_not_rejected() {
    let runner = AgentRunner::new(
        Arc::new(FixedExplorer(vec![
            activity("Eiffel Tower Summit", 50.0),
            activity("Louvre Guided Tour", 50.0),
            activity("Seine Dinner Cruise", 50.0),
        ])),
        Arc::new(NoRestaurants),
        Arc::new(travel_buddy_rs::agents::BudgetAgent::new()),
        Duration::from_secs(20),
    );
    let planner = planner(demo_gateway(), runner);

    let mut request = paris();
    request.budget = 100.0;
    let itinerary = planner.plan(request).await.unwrap().itinerary;

    assert_eq!(itinerary.total_estimated_cost, 150.0);
    assert_eq!(itinerary.budget_utilization_percentage, 150.0);
    assert!(itinerary.over_budget);
    assert!(itinerary.budget_breakdown.remaining_budget < 0.0);
    assert!(itinerary
        .recommendations
        .iter()
        .any(|line| line.contains("150%")));
}

#[tokio::test]
async fn test_failed_agent_falls_back_to_places() {
    let runner = AgentRunner::new(
        Arc::new(BrokenAgent(AgentRole::Explorer)),
        Arc::new(travel_buddy_rs::agents::FoodAgent::new()),
        Arc::new(travel_buddy_rs::agents::BudgetAgent::new()),
        Duration::from_secs(20),
    );
    let planner = planner(demo_gateway(), runner);

    let itinerary = planner.plan(paris()).await.unwrap().itinerary;
    assert!(itinerary.degraded);
    assert_eq!(itinerary.soft_failures.len(), 1);
    assert_eq!(itinerary.soft_failures[0].origin, FailureOrigin::Explorer);
    assert!(itinerary.soft_failures[0].reason.contains("garbage"));
    assert!(itinerary
        .day_plans
        .iter()
        .flat_map(|day| day.activities())
        .all(|activity| activity.name.starts_with("Paris ")));
    assert!(itinerary.activity_count() > 0);
}

#[tokio::test(start_paused = true)]
async fn test_overall_timeout_reaches_every_caller_and_is_not_cached() {
    let runner = AgentRunner::new(
        Arc::new(HangingAgent(AgentRole::Explorer)),
        Arc::new(travel_buddy_rs::agents::FoodAgent::new()),
        Arc::new(travel_buddy_rs::agents::BudgetAgent::new()),
        Duration::from_secs(120),
    );
    let planner = Arc::new(planner(demo_gateway(), runner));

    let (leader, joiner) = tokio::join!(planner.plan(paris()), planner.plan(paris()));
    let expected = PlannerError::OrchestrationTimeout(Duration::from_secs(30));
    assert_eq!(leader.unwrap_err(), expected);
    assert_eq!(joiner.unwrap_err(), expected);

    let stats = planner.stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.cache.fallback_entries, 0);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_planning() {
    let planner = planner(demo_gateway(), default_runner());
    let mut request = paris();
    request.travel_preferences.clear();

    let err = planner.plan(request.clone()).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_REQUEST");

    let response = planner.respond(request).await;
    assert!(!response.success);
    assert_eq!(response.error_code.as_deref(), Some("INVALID_REQUEST"));
    assert_eq!(planner.stats().builds, 0);
}
