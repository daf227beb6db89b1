use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::external::{SoftFailure, WeatherForecast};

/// A single attraction or activity candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Activity {
    /// Attraction name
    pub name: String,
    /// Brief description of what makes this attraction special
    #[serde(default)]
    pub description: String,
    /// Address or area
    #[serde(default)]
    pub location: String,
    /// Category like "museum", "park", "landmark"
    pub category: String,
    /// Entry fee per person in USD
    #[serde(default)]
    pub entry_fee: Option<f64>,
    /// Duration in minutes
    #[serde(default = "default_duration")]
    pub estimated_duration: u32,
    /// Popularity score from 0-10
    #[serde(default)]
    pub popularity_score: f64,
    /// Uniqueness score from 0-10
    #[serde(default)]
    pub uniqueness_score: f64,
}

fn default_duration() -> u32 {
    90
}

impl Activity {
    pub fn cost_for(&self, group_size: u32) -> f64 {
        self.entry_fee.unwrap_or(0.0).max(0.0) * f64::from(group_size)
    }
}

/// A dining candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Restaurant {
    /// Restaurant name
    pub name: String,
    /// Specific cuisine, e.g. "Traditional Neapolitan Pizza"
    pub cuisine_type: String,
    /// One of "$", "$$", "$$$", "$$$$"
    pub price_range: String,
    /// Rating from 0-5
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub location: String,
    /// Estimated cost per person in USD
    pub estimated_cost_per_person: f64,
    #[serde(default)]
    pub must_try_dishes: Vec<String>,
}

impl Restaurant {
    pub fn cost_for(&self, group_size: u32) -> f64 {
        self.estimated_cost_per_person.max(0.0) * f64::from(group_size)
    }
}

/// Plan for a single trip day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    /// 1-based day counter
    pub day: u32,
    pub date: NaiveDate,
    pub morning_activities: Vec<Activity>,
    pub lunch: Option<Restaurant>,
    pub afternoon_activities: Vec<Activity>,
    pub dinner: Option<Restaurant>,
    pub evening_activities: Vec<Activity>,
    pub total_estimated_cost: f64,
}

impl DayPlan {
    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.morning_activities
            .iter()
            .chain(self.afternoon_activities.iter())
            .chain(self.evening_activities.iter())
    }

    pub fn restaurants(&self) -> impl Iterator<Item = &Restaurant> {
        self.lunch.iter().chain(self.dinner.iter())
    }

    pub fn activity_count(&self) -> usize {
        self.morning_activities.len() + self.afternoon_activities.len() + self.evening_activities.len()
    }
}

/// Allocation of the total budget across spending categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetBreakdown {
    pub total_budget: f64,
    pub accommodation: f64,
    pub transportation: f64,
    pub food: f64,
    pub activities: f64,
    pub miscellaneous: f64,
    /// Total minus all allocations; negative when allocations exceed the budget
    pub remaining_budget: f64,
}

impl BudgetBreakdown {
    pub fn allocated(&self) -> f64 {
        self.accommodation + self.transportation + self.food + self.activities + self.miscellaneous
    }

    /// Recompute `remaining_budget` from the current allocations.
    pub fn settle(mut self) -> Self {
        self.remaining_budget = self.total_budget - self.allocated();
        self
    }
}

/// The final two-day itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub destination: String,
    pub total_budget: f64,
    pub total_estimated_cost: f64,
    /// `total_estimated_cost / total_budget * 100`, not clamped
    pub budget_utilization_percentage: f64,
    pub over_budget: bool,
    pub day_plans: Vec<DayPlan>,
    pub budget_breakdown: BudgetBreakdown,
    pub recommendations: Vec<String>,
    pub emergency_contacts: Vec<String>,
    #[serde(default)]
    pub weather_forecast: Vec<WeatherForecast>,
    /// True when any source or agent output was replaced by a default
    pub degraded: bool,
    #[serde(default)]
    pub soft_failures: Vec<SoftFailure>,
    pub created_at: DateTime<Utc>,
}

impl Itinerary {
    pub fn activity_count(&self) -> usize {
        self.day_plans.iter().map(DayPlan::activity_count).sum()
    }
}
