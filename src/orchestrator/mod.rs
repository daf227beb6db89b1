//! Request coordination: cache lookup, single-flight builds and the overall deadline.

pub mod planner;
pub mod single_flight;
pub mod state;

pub use planner::{PlanOutcome, PlannerStats, Served, TravelPlanner};
pub use single_flight::{FlightRole, SingleFlight};
pub use state::OrchestrationState;
