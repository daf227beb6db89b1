use super::{
    AgentContext, AgentOutput, AgentResult, AgentRole, BudgetAgent, BudgetPayload, ExplorerAgent,
    ExplorerPayload, FoodAgent, FoodPayload, TravelAgent,
};
use crate::{
    config::PlannerConfig,
    error::Result,
    services::{ChatGenerator, TextGenerator},
    types::TRIP_DAYS,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Runs agents under a per-agent timeout, turning every error into an
/// [`AgentResult::Failure`].
#[derive(Debug, Clone)]
pub struct AgentRunner {
    explorer: Arc<dyn TravelAgent>,
    food: Arc<dyn TravelAgent>,
    budget: Arc<dyn TravelAgent>,
    timeout: Duration,
}

impl AgentRunner {
    pub fn new(
        explorer: Arc<dyn TravelAgent>,
        food: Arc<dyn TravelAgent>,
        budget: Arc<dyn TravelAgent>,
        timeout: Duration,
    ) -> Self {
        Self {
            explorer,
            food,
            budget,
            timeout,
        }
    }

    /// Build the standard agent set. The agents consult a text generator only
    /// when `config.llm` is set.
    pub fn from_config(config: &PlannerConfig) -> Result<Self> {
        let generator: Option<Arc<dyn TextGenerator>> = match config.llm.as_ref() {
            Some(llm) => Some(Arc::new(ChatGenerator::new(llm)?)),
            None => None,
        };

        let mut explorer = ExplorerAgent::new();
        let mut food = FoodAgent::new();
        if let Some(generator) = generator {
            explorer = explorer.with_generator(generator.clone());
            food = food.with_generator(generator);
        }
        let budget = BudgetAgent::new()
            .with_planned_activities(config.limits.max_activities_per_day * TRIP_DAYS as usize);

        Ok(Self::new(
            Arc::new(explorer),
            Arc::new(food),
            Arc::new(budget),
            config.agent_timeout,
        ))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn agent(&self, role: AgentRole) -> &Arc<dyn TravelAgent> {
        match role {
            AgentRole::Explorer => &self.explorer,
            AgentRole::Food => &self.food,
            AgentRole::Budget => &self.budget,
        }
    }

    /// Run the agent registered for `role`.
    pub async fn run(&self, role: AgentRole, ctx: &AgentContext) -> AgentResult<AgentOutput> {
        let agent = self.agent(role);
        let started = tokio::time::Instant::now();

        let result = match tokio::time::timeout(self.timeout, agent.run(ctx)).await {
            Ok(Ok(output)) if output.role() == role => AgentResult::Success(output),
            Ok(Ok(output)) => AgentResult::failure(format!(
                "{role} agent returned a {} payload",
                output.role()
            )),
            Ok(Err(err)) => AgentResult::failure(err.to_string()),
            Err(_) => AgentResult::failure(format!(
                "{role} agent timed out after {}ms",
                self.timeout.as_millis()
            )),
        };

        match &result {
            AgentResult::Success(_) => debug!(
                target: "travel_buddy::agents",
                agent = role.as_str(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "agent succeeded"
            ),
            AgentResult::Failure { reason } => warn!(
                target: "travel_buddy::agents",
                agent = role.as_str(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                %reason,
                "agent failed, assembler will use defaults"
            ),
        }
        result
    }

    /// Run Explorer and Food concurrently.
    pub async fn run_tier_one(
        &self,
        ctx: &AgentContext,
    ) -> (AgentResult<ExplorerPayload>, AgentResult<FoodPayload>) {
        let (explorer, food) = tokio::join!(
            self.run(AgentRole::Explorer, ctx),
            self.run(AgentRole::Food, ctx)
        );
        (
            explorer.and_then(AgentOutput::into_explorer),
            food.and_then(AgentOutput::into_food),
        )
    }

    /// Run Budget; `ctx.peers` should carry whatever tier 1 produced.
    pub async fn run_budget(&self, ctx: &AgentContext) -> AgentResult<BudgetPayload> {
        self.run(AgentRole::Budget, ctx)
            .await
            .and_then(AgentOutput::into_budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agents::AgentFuture,
        error::PlannerError,
        types::{BudgetCategory, ExternalDataBundle, TravelPreference, TravelRequest},
    };
    use chrono::NaiveDate;

    #[derive(Debug)]
    struct StuckAgent;

    impl TravelAgent for StuckAgent {
        fn role(&self) -> AgentRole {
            AgentRole::Explorer
        }

        fn run<'a>(&'a self, _ctx: &'a AgentContext) -> AgentFuture<'a> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PlannerError::Unknown("unreachable".into()))
            })
        }
    }

    #[derive(Debug)]
    struct FailingAgent;

    impl TravelAgent for FailingAgent {
        fn role(&self) -> AgentRole {
            AgentRole::Food
        }

        fn run<'a>(&'a self, _ctx: &'a AgentContext) -> AgentFuture<'a> {
            Box::pin(async { Err(PlannerError::Generation("model unavailable".into())) })
        }
    }

    fn context() -> AgentContext {
        let request = TravelRequest::new(
            "Kyoto, Japan",
            800.0,
            BudgetCategory::Moderate,
            vec![TravelPreference::Culture],
            NaiveDate::from_ymd_opt(2030, 4, 1).unwrap(),
        );
        AgentContext::with_bundle(Arc::new(request), ExternalDataBundle::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_and_errors_become_failures() {
        let runner = AgentRunner::new(
            Arc::new(StuckAgent),
            Arc::new(FailingAgent),
            Arc::new(BudgetAgent::new()),
            Duration::from_secs(20),
        );
        let ctx = context();

        let (explorer, food) = runner.run_tier_one(&ctx).await;
        assert!(explorer.failure_reason().unwrap().contains("timed out"));
        assert!(food.failure_reason().unwrap().contains("model unavailable"));

        let budget = runner.run_budget(&ctx).await;
        assert!(budget.is_success());
    }

    #[tokio::test]
    async fn test_mismatched_payload_is_a_failure() {
        let runner = AgentRunner::new(
            Arc::new(BudgetAgent::new()),
            Arc::new(FoodAgent::new()),
            Arc::new(BudgetAgent::new()),
            Duration::from_secs(5),
        );
        let result = runner.run(AgentRole::Explorer, &context()).await;
        assert_eq!(
            result.failure_reason(),
            Some("explorer agent returned a budget payload")
        );
    }
}
