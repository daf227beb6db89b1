//! Recommendation producers and the runner that schedules them.
//!
//! Explorer and Food form tier 1 and run concurrently with the external
//! source gateway; Budget forms tier 2 and consumes their payloads.

pub mod budget;
pub mod explorer;
pub mod food;
pub mod runner;

use crate::{
    error::Result,
    types::{
        Activity, BudgetBreakdown, ExternalDataBundle, FailureOrigin, Restaurant, TravelRequest,
    },
};
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, pin::Pin, sync::Arc};

pub use budget::BudgetAgent;
pub use explorer::ExplorerAgent;
pub use food::FoodAgent;
pub use runner::AgentRunner;

/// External data that may still be in flight when an agent starts.
pub type SharedBundle = Shared<BoxFuture<'static, Arc<ExternalDataBundle>>>;

/// Boxed future returned by [`TravelAgent::run`].
pub type AgentFuture<'a> = Pin<Box<dyn Future<Output = Result<AgentOutput>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Explorer,
    Food,
    Budget,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Explorer => "explorer",
            AgentRole::Food => "food",
            AgentRole::Budget => "budget",
        }
    }

    pub fn failure_origin(&self) -> FailureOrigin {
        match self {
            AgentRole::Explorer => FailureOrigin::Explorer,
            AgentRole::Food => FailureOrigin::Food,
            AgentRole::Budget => FailureOrigin::Budget,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one agent run. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResult<T> {
    Success(T),
    Failure { reason: String },
}

impl<T> AgentResult<T> {
    pub fn failure(reason: impl Into<String>) -> Self {
        AgentResult::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AgentResult::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            AgentResult::Success(value) => Some(value),
            AgentResult::Failure { .. } => None,
        }
    }

    pub fn into_success(self) -> Option<T> {
        match self {
            AgentResult::Success(value) => Some(value),
            AgentResult::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            AgentResult::Success(_) => None,
            AgentResult::Failure { reason } => Some(reason.as_str()),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> AgentResult<U>) -> AgentResult<U> {
        match self {
            AgentResult::Success(value) => f(value),
            AgentResult::Failure { reason } => AgentResult::Failure { reason },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplorerPayload {
    pub activities: Vec<Activity>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodPayload {
    pub restaurants: Vec<Restaurant>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPayload {
    pub breakdown: BudgetBreakdown,
    pub recommendations: Vec<String>,
}

/// Payload of any agent, tagged by role.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    Explorer(ExplorerPayload),
    Food(FoodPayload),
    Budget(BudgetPayload),
}

impl AgentOutput {
    pub fn role(&self) -> AgentRole {
        match self {
            AgentOutput::Explorer(_) => AgentRole::Explorer,
            AgentOutput::Food(_) => AgentRole::Food,
            AgentOutput::Budget(_) => AgentRole::Budget,
        }
    }

    pub fn into_explorer(self) -> AgentResult<ExplorerPayload> {
        match self {
            AgentOutput::Explorer(payload) => AgentResult::Success(payload),
            other => AgentResult::failure(format!("expected explorer payload, got {}", other.role())),
        }
    }

    pub fn into_food(self) -> AgentResult<FoodPayload> {
        match self {
            AgentOutput::Food(payload) => AgentResult::Success(payload),
            other => AgentResult::failure(format!("expected food payload, got {}", other.role())),
        }
    }

    pub fn into_budget(self) -> AgentResult<BudgetPayload> {
        match self {
            AgentOutput::Budget(payload) => AgentResult::Success(payload),
            other => AgentResult::failure(format!("expected budget payload, got {}", other.role())),
        }
    }
}

/// Tier-1 payloads handed to tier-2 agents.
#[derive(Debug, Clone, Default)]
pub struct PeerOutputs {
    pub explorer: Option<ExplorerPayload>,
    pub food: Option<FoodPayload>,
}

/// Everything an agent may read while producing its payload.
#[derive(Clone)]
pub struct AgentContext {
    pub request: Arc<TravelRequest>,
    external: SharedBundle,
    pub peers: PeerOutputs,
}

impl AgentContext {
    pub fn new(request: Arc<TravelRequest>, external: SharedBundle) -> Self {
        Self {
            request,
            external,
            peers: PeerOutputs::default(),
        }
    }

    /// Context whose external data is already available.
    pub fn with_bundle(request: Arc<TravelRequest>, bundle: ExternalDataBundle) -> Self {
        let ready = futures::future::ready(Arc::new(bundle)).boxed().shared();
        Self::new(request, ready)
    }

    pub fn with_peers(mut self, peers: PeerOutputs) -> Self {
        self.peers = peers;
        self
    }

    /// Wait for the gateway's bundle.
    pub async fn external(&self) -> Arc<ExternalDataBundle> {
        self.external.clone().await
    }
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("request", &self.request)
            .field("peers", &self.peers)
            .finish_non_exhaustive()
    }
}

/// A recommendation producer.
pub trait TravelAgent: Send + Sync + fmt::Debug {
    fn role(&self) -> AgentRole;

    fn run<'a>(&'a self, ctx: &'a AgentContext) -> AgentFuture<'a>;
}
