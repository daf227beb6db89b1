//! Turns agent payloads and external data into the final [`Itinerary`].
//!
//! Assembly is pure: no I/O, no clock other than the creation timestamp.

use crate::{
    agents::{
        budget::{allocate, cover},
        explorer::{activity_from_place, rank_activities},
        food::{preferred_meal, rank_restaurants, restaurant_from_place, Meal},
        AgentResult, AgentRole, BudgetPayload, ExplorerPayload, FoodPayload,
    },
    config::AssemblyLimits,
    error::AssemblyError,
    types::{
        Activity, BudgetBreakdown, DayPlan, ExternalDataBundle, Itinerary,
        PlaceCategory, Restaurant, SoftFailure, TransitInfo, TravelRequest, WeatherForecast,
    },
};
use chrono::Utc;
use std::collections::HashSet;

pub const EMERGENCY_CONTACTS: [&str; 4] = [
    "Local Emergency: 911 (or local emergency number)",
    "Tourist Information Center",
    "Your accommodation front desk",
    "Local embassy/consulate (if international travel)",
];

/// Categories that belong in the evening slot when it is free.
const EVENING_KEYWORDS: [&str; 7] = ["bar", "club", "night", "music", "theater", "theatre", "show"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayPart {
    Morning,
    Afternoon,
    Evening,
}

/// Schedule under construction for one day.
#[derive(Debug, Default)]
struct DaySlots {
    morning: Vec<Activity>,
    afternoon: Vec<Activity>,
    evening: Vec<Activity>,
}

impl DaySlots {
    fn len(&self) -> usize {
        self.morning.len() + self.afternoon.len() + self.evening.len()
    }

    fn free_part(&self, limits: &AssemblyLimits, prefers_evening: bool) -> Option<DayPart> {
        if self.len() >= limits.max_activities_per_day {
            return None;
        }
        let morning = self.morning.len() < limits.morning_slots;
        let afternoon = self.afternoon.len() < limits.afternoon_slots;
        let evening = self.evening.len() < limits.evening_slots;

        let order: [(bool, DayPart); 3] = if prefers_evening {
            [
                (evening, DayPart::Evening),
                (afternoon, DayPart::Afternoon),
                (morning, DayPart::Morning),
            ]
        } else {
            [
                (morning, DayPart::Morning),
                (afternoon, DayPart::Afternoon),
                (evening, DayPart::Evening),
            ]
        };
        order
            .into_iter()
            .find_map(|(free, part)| free.then_some(part))
    }

    fn push(&mut self, part: DayPart, activity: Activity) {
        match part {
            DayPart::Morning => self.morning.push(activity),
            DayPart::Afternoon => self.afternoon.push(activity),
            DayPart::Evening => self.evening.push(activity),
        }
    }
}

fn prefers_evening(activity: &Activity) -> bool {
    let category = activity.category.to_lowercase();
    EVENING_KEYWORDS
        .iter()
        .any(|keyword| category.contains(keyword))
}

fn venue_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Greedy fill: each activity, in rank order, goes to the least loaded day
/// that still has a free day part. Venues are never scheduled twice.
fn schedule_activities(
    activities: &[Activity],
    days: usize,
    limits: &AssemblyLimits,
) -> Vec<DaySlots> {
    let mut slots: Vec<DaySlots> = (0..days).map(|_| DaySlots::default()).collect();
    let mut used = HashSet::new();

    for activity in activities {
        if !used.insert(venue_key(&activity.name)) {
            continue;
        }
        let evening = prefers_evening(activity);
        let target = slots
            .iter()
            .enumerate()
            .filter_map(|(idx, day)| day.free_part(limits, evening).map(|part| (idx, day.len(), part)))
            .min_by_key(|(idx, load, _)| (*load, *idx));

        match target {
            Some((idx, _, part)) => slots[idx].push(part, activity.clone()),
            None => break,
        }
    }
    slots
}

/// Lunch and dinner per day, never reusing a restaurant.
fn choose_meals(restaurants: &[Restaurant], days: usize) -> Vec<(Option<Restaurant>, Option<Restaurant>)> {
    let mut used: HashSet<String> = HashSet::new();
    let mut pick = |accept: &dyn Fn(Meal) -> bool| -> Option<Restaurant> {
        let choice = restaurants
            .iter()
            .filter(|r| !used.contains(&venue_key(&r.name)))
            .find(|r| accept(preferred_meal(r)))
            .or_else(|| {
                restaurants
                    .iter()
                    .find(|r| !used.contains(&venue_key(&r.name)))
            })?;
        used.insert(venue_key(&choice.name));
        Some(choice.clone())
    };

    let lunches: Vec<Option<Restaurant>> = (0..days)
        .map(|_| pick(&|meal: Meal| matches!(meal, Meal::Lunch | Meal::Breakfast)))
        .collect();
    let dinners: Vec<Option<Restaurant>> = (0..days)
        .map(|_| pick(&|meal: Meal| meal == Meal::Dinner))
        .collect();

    lunches.into_iter().zip(dinners).collect()
}

fn day_cost(plan: &DayPlan, group_size: u32) -> f64 {
    plan.activities()
        .map(|activity| activity.cost_for(group_size))
        .sum::<f64>()
        + plan
            .restaurants()
            .map(|restaurant| restaurant.cost_for(group_size))
            .sum::<f64>()
}

/// Weather advice; empty when there is no forecast.
pub fn weather_recommendations(forecasts: &[WeatherForecast]) -> Vec<String> {
    if forecasts.is_empty() {
        return Vec::new();
    }

    let mut recommendations = Vec::new();
    let average = forecasts.iter().map(|f| f.temperature).sum::<f64>() / forecasts.len() as f64;
    if average < 10.0 {
        recommendations.push("Cold weather expected - pack warm clothing and layers".to_string());
    } else if average > 25.0 {
        recommendations.push("Warm weather expected - pack light clothing and sunscreen".to_string());
    }

    let rainy: Vec<String> = forecasts
        .iter()
        .filter(|f| f.is_rainy())
        .map(|f| f.date.format("%b %-d").to_string())
        .collect();
    if !rainy.is_empty() {
        recommendations.push(format!(
            "Rain expected on {} - pack rain gear and favour indoor activities like museums and galleries",
            rainy.join(" and ")
        ));
    }

    if forecasts.iter().any(WeatherForecast::is_snowy) {
        recommendations.push("Snow expected - pack winter gear and check road conditions".to_string());
    }
    recommendations
}

fn transit_recommendation(transit: &TransitInfo) -> String {
    format!(
        "Getting in: {} by public transit from {} ({})",
        transit.duration, transit.origin, transit.distance
    )
}

/// Raise the breakdown's activity and food lines to what the plan actually costs.
fn reconcile(mut breakdown: BudgetBreakdown, day_plans: &[DayPlan], group_size: u32) -> BudgetBreakdown {
    let activities: f64 = day_plans
        .iter()
        .flat_map(DayPlan::activities)
        .map(|a| a.cost_for(group_size))
        .sum();
    let food: f64 = day_plans
        .iter()
        .flat_map(DayPlan::restaurants)
        .map(|r| r.cost_for(group_size))
        .sum();

    cover(&mut breakdown.activities, &mut breakdown.miscellaneous, activities);
    cover(&mut breakdown.food, &mut breakdown.miscellaneous, food);
    breakdown.settle()
}

fn push_unique(target: &mut Vec<String>, seen: &mut HashSet<String>, lines: impl IntoIterator<Item = String>) {
    for line in lines {
        if seen.insert(line.clone()) {
            target.push(line);
        }
    }
}

/// Merge agent payloads and external data into an itinerary.
///
/// Failed agents are replaced by defaults built from the places data and the
/// category budget split; every substitution is recorded as a soft failure.
/// Fails only when no activity and no restaurant is available at all.
pub fn assemble(
    request: &TravelRequest,
    external: &ExternalDataBundle,
    explorer: AgentResult<ExplorerPayload>,
    food: AgentResult<FoodPayload>,
    budget: AgentResult<BudgetPayload>,
    limits: &AssemblyLimits,
) -> Result<Itinerary, AssemblyError> {
    let mut soft_failures = external.soft_failures.clone();
    let mut note_failure = |role: AgentRole, reason: Option<&str>| {
        if let Some(reason) = reason {
            soft_failures.push(SoftFailure::new(role.failure_origin(), reason));
        }
    };
    note_failure(AgentRole::Explorer, explorer.failure_reason());
    note_failure(AgentRole::Food, food.failure_reason());
    note_failure(AgentRole::Budget, budget.failure_reason());

    let explorer = explorer.into_success().unwrap_or_else(|| ExplorerPayload {
        activities: rank_activities(
            external
                .places_of(PlaceCategory::Attraction)
                .map(activity_from_place)
                .collect(),
            request,
        ),
        recommendations: Vec::new(),
    });
    let food = food.into_success().unwrap_or_else(|| FoodPayload {
        restaurants: rank_restaurants(
            external
                .places_of(PlaceCategory::Restaurant)
                .map(|place| restaurant_from_place(place, request.budget_category))
                .collect(),
            request.budget_category,
        ),
        recommendations: Vec::new(),
    });

    if explorer.activities.is_empty() && food.restaurants.is_empty() {
        return Err(AssemblyError::NoUsableContent {
            destination: request.destination.clone(),
        });
    }

    let dates = request.date_range();
    let days = dates.days as usize;
    let schedule = schedule_activities(&explorer.activities, days, limits);
    let meals = choose_meals(&food.restaurants, days);

    let day_plans: Vec<DayPlan> = schedule
        .into_iter()
        .zip(meals)
        .zip(dates.iter())
        .enumerate()
        .map(|(idx, ((slots, (lunch, dinner)), date))| {
            let mut plan = DayPlan {
                day: idx as u32 + 1,
                date,
                morning_activities: slots.morning,
                lunch,
                afternoon_activities: slots.afternoon,
                dinner,
                evening_activities: slots.evening,
                total_estimated_cost: 0.0,
            };
            plan.total_estimated_cost = day_cost(&plan, request.group_size);
            plan
        })
        .collect();

    let total_estimated_cost: f64 = day_plans.iter().map(|plan| plan.total_estimated_cost).sum();
    let budget_utilization_percentage = total_estimated_cost / request.budget * 100.0;
    let over_budget = budget_utilization_percentage > 100.0;

    let (breakdown, budget_recommendations) = match budget.into_success() {
        Some(payload) => (payload.breakdown, payload.recommendations),
        None => (allocate(request), Vec::new()),
    };
    let budget_breakdown = reconcile(breakdown, &day_plans, request.group_size);

    let mut recommendations = Vec::new();
    let mut seen = HashSet::new();
    push_unique(&mut recommendations, &mut seen, explorer.recommendations);
    push_unique(&mut recommendations, &mut seen, budget_recommendations);
    push_unique(&mut recommendations, &mut seen, food.recommendations);
    push_unique(
        &mut recommendations,
        &mut seen,
        weather_recommendations(&external.weather),
    );
    if let Some(transit) = external.transit.as_ref() {
        push_unique(&mut recommendations, &mut seen, [transit_recommendation(transit)]);
    }
    if over_budget {
        push_unique(
            &mut recommendations,
            &mut seen,
            [format!(
                "Estimated costs reach {budget_utilization_percentage:.0}% of your budget - consider free alternatives for some activities"
            )],
        );
    }

    Ok(Itinerary {
        destination: request.destination.clone(),
        total_budget: request.budget,
        total_estimated_cost,
        budget_utilization_percentage,
        over_budget,
        day_plans,
        budget_breakdown,
        recommendations,
        emergency_contacts: EMERGENCY_CONTACTS.iter().map(|c| c.to_string()).collect(),
        weather_forecast: external.weather.clone(),
        degraded: !soft_failures.is_empty(),
        soft_failures,
        created_at: Utc::now(),
    })
}
