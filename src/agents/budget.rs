use super::{AgentContext, AgentFuture, AgentOutput, AgentRole, BudgetPayload, TravelAgent};
use crate::{
    config::BudgetAllocation,
    error::{PlannerError, Result},
    types::{BudgetBreakdown, BudgetCategory, TravelRequest, TRIP_DAYS},
};
use tracing::debug;

/// Meals per day the food allocation has to cover (lunch and dinner).
const MEALS_PER_DAY: usize = 2;

/// Split `request.budget` across spending categories by the category's ratios.
pub fn allocate(request: &TravelRequest) -> BudgetBreakdown {
    let total = request.budget;
    let ratios = BudgetAllocation::for_category(request.budget_category);

    BudgetBreakdown {
        total_budget: total,
        accommodation: total * ratios.accommodation,
        transportation: total * ratios.transportation,
        food: total * ratios.food,
        activities: total * ratios.activities,
        miscellaneous: total * ratios.miscellaneous(),
        remaining_budget: 0.0,
    }
    .settle()
}

/// Raise one allocation to `actual`, paying for the increase out of
/// miscellaneous until it reaches zero.
pub(crate) fn cover(allocation: &mut f64, miscellaneous: &mut f64, actual: f64) {
    if actual > *allocation {
        let excess = actual - *allocation;
        *allocation = actual;
        *miscellaneous = (*miscellaneous - excess).max(0.0);
    }
}

/// Allocates the budget and reconciles it against the tier-1 payloads.
#[derive(Debug, Clone)]
pub struct BudgetAgent {
    /// How many of Explorer's ranked activities are expected to be scheduled
    planned_activities: usize,
}

impl Default for BudgetAgent {
    fn default() -> Self {
        Self {
            planned_activities: 4 * TRIP_DAYS as usize,
        }
    }
}

impl BudgetAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_planned_activities(mut self, planned_activities: usize) -> Self {
        self.planned_activities = planned_activities;
        self
    }

    fn plan_budget(&self, ctx: &AgentContext) -> Result<BudgetPayload> {
        let request = ctx.request.as_ref();
        if !request.budget.is_finite() || request.budget <= 0.0 {
            return Err(PlannerError::InvalidRequest(format!(
                "cannot allocate a budget of {}",
                request.budget
            )));
        }

        let mut breakdown = allocate(request);
        let group = request.group_size;

        if let Some(explorer) = ctx.peers.explorer.as_ref() {
            let activity_cost: f64 = explorer
                .activities
                .iter()
                .take(self.planned_activities)
                .map(|activity| activity.cost_for(group))
                .sum();
            cover(
                &mut breakdown.activities,
                &mut breakdown.miscellaneous,
                activity_cost,
            );
        }

        if let Some(food) = ctx.peers.food.as_ref() {
            let meals = MEALS_PER_DAY * TRIP_DAYS as usize;
            let food_cost: f64 = food
                .restaurants
                .iter()
                .cycle()
                .take(if food.restaurants.is_empty() { 0 } else { meals })
                .map(|restaurant| restaurant.cost_for(group))
                .sum();
            cover(&mut breakdown.food, &mut breakdown.miscellaneous, food_cost);
        }

        let breakdown = breakdown.settle();
        debug!(
            target: "travel_buddy::agents",
            agent = "budget",
            activities = breakdown.activities,
            food = breakdown.food,
            remaining = breakdown.remaining_budget,
            "budget reconciled"
        );

        let recommendations = budget_recommendations(&breakdown, request.budget_category);
        Ok(BudgetPayload {
            breakdown,
            recommendations,
        })
    }
}

impl TravelAgent for BudgetAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Budget
    }

    fn run<'a>(&'a self, ctx: &'a AgentContext) -> AgentFuture<'a> {
        Box::pin(async move { self.plan_budget(ctx).map(AgentOutput::Budget) })
    }
}

fn budget_recommendations(breakdown: &BudgetBreakdown, category: BudgetCategory) -> Vec<String> {
    let lines: &[&str] = match category {
        BudgetCategory::Budget => &[
            "Consider staying in hostels or budget hotels to maximize your accommodation budget",
            "Look for free walking tours and free museum days",
            "Use public transportation or walk between attractions",
        ],
        BudgetCategory::Moderate => &[
            "Mix mid-range hotels with unique local accommodations",
            "Consider combo tickets for multiple attractions",
            "Use a mix of public transport and occasional taxis",
        ],
        BudgetCategory::Luxury => &[
            "Stay at premium hotels or boutique accommodations",
            "Book private tours and premium experiences",
            "Use private transportation or premium car services",
        ],
    };
    let mut recommendations: Vec<String> = lines.iter().map(|line| line.to_string()).collect();

    let total = breakdown.total_budget;
    if breakdown.activities > total * 0.3 {
        recommendations.push("Consider reducing activity costs to balance your budget".to_string());
    }
    if breakdown.food < total * 0.2 {
        recommendations
            .push("You might want to allocate more budget for food experiences".to_string());
    }
    if breakdown.remaining_budget < 0.0 {
        recommendations.push(format!(
            "Planned spending exceeds your budget by ${:.2}",
            -breakdown.remaining_budget
        ));
    }

    recommendations
}
