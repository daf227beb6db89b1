//! Runtime configuration: API keys, timeouts, cache sizing and budget ratios.

use crate::{
    error::{PlannerError, Result},
    types::BudgetCategory,
};
use std::{env, time::Duration};

pub const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-4.1-mini";

/// Fraction of the total budget assigned to each spending category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetAllocation {
    pub accommodation: f64,
    pub food: f64,
    pub activities: f64,
    pub transportation: f64,
}

impl BudgetAllocation {
    pub fn for_category(category: BudgetCategory) -> Self {
        match category {
            BudgetCategory::Budget => Self {
                accommodation: 0.3,
                food: 0.4,
                activities: 0.2,
                transportation: 0.1,
            },
            BudgetCategory::Moderate => Self {
                accommodation: 0.4,
                food: 0.3,
                activities: 0.2,
                transportation: 0.1,
            },
            BudgetCategory::Luxury => Self {
                accommodation: 0.5,
                food: 0.25,
                activities: 0.15,
                transportation: 0.1,
            },
        }
    }

    /// Whatever the named categories leave over.
    pub fn miscellaneous(&self) -> f64 {
        (1.0 - self.accommodation - self.food - self.activities - self.transportation).max(0.0)
    }
}

/// Credentials and endpoint for the OpenAI-compatible text generator.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    /// Sampling temperature; the provider default applies when unset
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            max_tokens: Some(2000),
            temperature: None,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Per-source and global deadlines for the external source gateway.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTimeouts {
    pub weather: Duration,
    pub places: Duration,
    pub transit: Duration,
    /// Ceiling for the whole fan-out, whatever the individual budgets say
    pub global: Duration,
}

impl Default for SourceTimeouts {
    fn default() -> Self {
        Self {
            weather: Duration::from_secs(5),
            places: Duration::from_secs(8),
            transit: Duration::from_secs(5),
            global: Duration::from_secs(10),
        }
    }
}

/// Bounds used by the itinerary assembler's greedy fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyLimits {
    pub max_activities_per_day: usize,
    pub morning_slots: usize,
    pub afternoon_slots: usize,
    pub evening_slots: usize,
}

impl Default for AssemblyLimits {
    fn default() -> Self {
        Self {
            max_activities_per_day: 4,
            morning_slots: 2,
            afternoon_slots: 2,
            evening_slots: 1,
        }
    }
}

/// Top-level planner configuration.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub llm: Option<LlmConfig>,
    pub openweather_api_key: Option<String>,
    pub google_places_api_key: Option<String>,
    pub google_maps_api_key: Option<String>,
    pub redis_url: Option<String>,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub reconnect_interval: Duration,
    pub source_timeouts: SourceTimeouts,
    pub agent_timeout: Duration,
    pub request_timeout: Duration,
    pub limits: AssemblyLimits,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            llm: None,
            openweather_api_key: None,
            google_places_api_key: None,
            google_maps_api_key: None,
            redis_url: None,
            cache_ttl: Duration::from_secs(60 * 60),
            cache_capacity: 256,
            reconnect_interval: Duration::from_secs(30),
            source_timeouts: SourceTimeouts::default(),
            agent_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
            limits: AssemblyLimits::default(),
        }
    }
}

impl PlannerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_source_timeouts(mut self, timeouts: SourceTimeouts) -> Self {
        self.source_timeouts = timeouts;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_limits(mut self, limits: AssemblyLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build a configuration from the process environment, loading `.env` first.
    ///
    /// Missing API keys are not an error: the affected sources serve demo data
    /// and the agents rank places without a text generator.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(api_key) = non_empty_var("OPENAI_API_KEY") {
            let mut llm = LlmConfig::new(api_key);
            if let Some(base_url) =
                non_empty_var("OPENAI_BASE_URL").or_else(|| non_empty_var("OPENROUTER_BASE_URL"))
            {
                llm.base_url = base_url;
            }
            if let Some(model) = non_empty_var("TRAVEL_BUDDY_MODEL") {
                llm.model = model;
            }
            llm.temperature = parse_var::<f32>("TRAVEL_BUDDY_TEMPERATURE")?;
            config.llm = Some(llm);
        }

        config.openweather_api_key = non_empty_var("OPENWEATHER_API_KEY");
        config.google_places_api_key = non_empty_var("GOOGLE_PLACES_API_KEY");
        config.google_maps_api_key = non_empty_var("GOOGLE_MAPS_API_KEY");
        config.redis_url = non_empty_var("REDIS_URL");

        if let Some(capacity) = parse_var::<usize>("TRAVEL_BUDDY_CACHE_CAPACITY")? {
            config.cache_capacity = capacity.max(1);
        }
        if let Some(secs) = parse_var::<u64>("TRAVEL_BUDDY_CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("TRAVEL_BUDDY_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("TRAVEL_BUDDY_AGENT_TIMEOUT_SECS")? {
            config.agent_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("TRAVEL_BUDDY_SOURCE_TIMEOUT_SECS")? {
            config.source_timeouts.global = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match non_empty_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| PlannerError::Config(format!("{name} must be a number, got `{raw}`"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_never_exceed_budget() {
        for category in [
            BudgetCategory::Budget,
            BudgetCategory::Moderate,
            BudgetCategory::Luxury,
        ] {
            let allocation = BudgetAllocation::for_category(category);
            let total = allocation.accommodation
                + allocation.food
                + allocation.activities
                + allocation.transportation
                + allocation.miscellaneous();
            assert!(total <= 1.0 + 1e-9, "{category} over-allocates");
        }
    }

    #[test]
    fn test_defaults_match_recommended_deadlines() {
        let config = PlannerConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.source_timeouts.places, Duration::from_secs(8));
        assert_eq!(config.source_timeouts.global, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_cache_capacity_has_floor() {
        let config = PlannerConfig::new().with_cache_capacity(0);
        assert_eq!(config.cache_capacity, 1);
    }
}
