//! travel-buddy-rs: orchestration and caching core for a weekend itinerary planner
//!
//! A [`TravelPlanner`] turns a [`TravelRequest`] into a two-day [`Itinerary`]
//! by fanning out to weather, places and transit sources, running the
//! Explorer and Food agents alongside them, then the Budget agent, and
//! assembling the results. Finished itineraries are cached by request
//! fingerprint, and concurrent identical requests share a single build.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use travel_buddy_rs::{BudgetCategory, PlannerConfig, TravelPlanner, TravelPreference, TravelRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let planner = TravelPlanner::from_config(PlannerConfig::from_env()?).await?;
//!
//!     let request = TravelRequest::new(
//!         "Paris, France",
//!         500.0,
//!         BudgetCategory::Moderate,
//!         vec![TravelPreference::Culture, TravelPreference::Food],
//!         NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
//!     );
//!     let outcome = planner.plan(request).await?;
//!     println!("{}", serde_json::to_string_pretty(outcome.itinerary.as_ref())?);
//!     Ok(())
//! }
//! ```

extern crate self as travel_buddy_rs;

pub mod agents;
pub mod assembler;
pub mod cache;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod schemas;
pub mod services;
pub mod sources;
pub mod types;

pub use agents::{AgentResult, AgentRole, AgentRunner, TravelAgent};
pub use assembler::assemble;
pub use cache::{fingerprint, CacheBackend, CacheStats, Fingerprint, ItineraryCache};
pub use config::{AssemblyLimits, LlmConfig, PlannerConfig, SourceTimeouts};
pub use error::{AssemblyError, CacheError, PlannerError, Result, SourceError};
pub use orchestrator::{OrchestrationState, PlanOutcome, PlannerStats, Served, TravelPlanner};
pub use schemas::{CompletionSchema, SchemaHandle};
pub use services::{ChatGenerator, TextGenerator};
pub use sources::{DataSource, ExternalSourceGateway};
pub use types::{
    BudgetCategory, DayPlan, ExternalDataBundle, Itinerary, ItineraryResponse, TravelPreference,
    TravelRequest,
};

#[cfg(feature = "cli")]
pub mod cli;
