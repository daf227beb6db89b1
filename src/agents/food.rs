use super::{AgentContext, AgentFuture, AgentOutput, AgentRole, FoodPayload, TravelAgent};
use crate::{
    completion_schema,
    error::{PlannerError, Result},
    schemas::parse_structured,
    services::{extract_json_object, TextGenerator},
    types::{BudgetCategory, Place, PlaceCategory, Restaurant, TravelPreference, TravelRequest},
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::{collections::HashSet, sync::Arc};
use tracing::debug;

pub const MAX_RANKED_RESTAURANTS: usize = 10;

/// Restaurants proposed by the text generator.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RestaurantList {
    pub restaurants: Vec<Restaurant>,
}

completion_schema!(RestaurantList, "restaurant_list");

/// The meal a restaurant suits best, judged from its name and price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
}

pub fn preferred_meal(restaurant: &Restaurant) -> Meal {
    fn has_any(name: &str, words: &[&str]) -> bool {
        words.iter().any(|word| name.contains(word))
    }

    let name = restaurant.name.to_lowercase();
    if has_any(&name, &["cafe", "café", "coffee", "breakfast", "brunch"]) {
        Meal::Breakfast
    } else if has_any(&name, &["lunch", "bistro", "deli"]) {
        Meal::Lunch
    } else if has_any(&name, &["dinner", "restaurant", "fine"]) {
        Meal::Dinner
    } else if matches!(restaurant.price_range.as_str(), "$" | "$$") {
        Meal::Lunch
    } else {
        Meal::Dinner
    }
}

/// Finds and ranks places to eat.
#[derive(Debug, Clone, Default)]
pub struct FoodAgent {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl FoodAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    async fn suggested_restaurants(&self, request: &TravelRequest) -> Result<Vec<Restaurant>> {
        let Some(generator) = self.generator.as_ref() else {
            return Ok(Vec::new());
        };

        let text = generator.generate(&restaurant_prompt(request)).await?;
        let value = extract_json_object(&text)?;
        let list: RestaurantList = parse_structured(&value)?;
        Ok(list.restaurants)
    }

    async fn find_food(&self, ctx: &AgentContext) -> Result<FoodPayload> {
        let request = ctx.request.as_ref();
        let suggested = self.suggested_restaurants(request).await?;
        let external = ctx.external().await;

        let mut seen = HashSet::new();
        let candidates: Vec<Restaurant> = suggested
            .into_iter()
            .chain(
                external
                    .places_of(PlaceCategory::Restaurant)
                    .map(|place| restaurant_from_place(place, request.budget_category)),
            )
            .filter(|restaurant| seen.insert(restaurant.name.trim().to_lowercase()))
            .collect();
        debug!(
            target: "travel_buddy::agents",
            agent = "food",
            candidates = candidates.len(),
            "restaurant candidates collected"
        );

        let restaurants = rank_restaurants(candidates, request.budget_category);
        if restaurants.is_empty() {
            return Err(PlannerError::Validation(format!(
                "no restaurants found for {}",
                request.destination
            )));
        }

        let recommendations = food_recommendations(&restaurants, request);
        Ok(FoodPayload {
            restaurants,
            recommendations,
        })
    }
}

impl TravelAgent for FoodAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Food
    }

    fn run<'a>(&'a self, ctx: &'a AgentContext) -> AgentFuture<'a> {
        Box::pin(async move { self.find_food(ctx).await.map(AgentOutput::Food) })
    }
}

fn restaurant_prompt(request: &TravelRequest) -> String {
    format!(
        "Create a dining guide for a 2-day weekend trip to {destination}.\n\
         Travel preferences: {preferences}\n\
         Budget category: {category}\n\
         Group size: {group}\n\
         Special requirements: {requirements}\n\n\
         Mix traditional local restaurants, casual spots, cafes and one or two splurges. \
         Return 8-12 restaurants as JSON: {{\"restaurants\": [{{\"name\": \"...\", \
         \"cuisine_type\": \"Traditional Neapolitan Pizza\", \"price_range\": \"$$\", \
         \"rating\": 4.5, \"location\": \"...\", \"estimated_cost_per_person\": 35.0, \
         \"must_try_dishes\": [\"...\"]}}]}}. Costs are per person in USD.",
        destination = request.destination,
        preferences = request.preferences_text(),
        category = request.budget_category,
        group = request.group_size,
        requirements = request.special_requirements.as_deref().unwrap_or("none"),
    )
}

/// Typical per-person meal cost in USD for a provider price level.
pub fn cost_per_person(price_level: Option<u8>, category: BudgetCategory) -> f64 {
    match price_level {
        Some(0) | Some(1) => 15.0,
        Some(2) => 30.0,
        Some(3) => 60.0,
        Some(_) => 100.0,
        None => match category {
            BudgetCategory::Budget => 15.0,
            BudgetCategory::Moderate => 30.0,
            BudgetCategory::Luxury => 60.0,
        },
    }
}

fn default_price_level(category: BudgetCategory) -> u8 {
    match category {
        BudgetCategory::Budget => 1,
        BudgetCategory::Moderate => 2,
        BudgetCategory::Luxury => 3,
    }
}

/// Turn a places-provider restaurant into a dining candidate.
pub fn restaurant_from_place(place: &Place, category: BudgetCategory) -> Restaurant {
    let level = place
        .price_level
        .unwrap_or_else(|| default_price_level(category))
        .clamp(1, 4);

    let cuisine_type = if place.types.iter().any(|kind| kind == "cafe") {
        "Cafe".to_string()
    } else if place.types.iter().any(|kind| kind == "meal_takeaway") {
        "Street food".to_string()
    } else {
        "Local cuisine".to_string()
    };

    Restaurant {
        name: place.name.clone(),
        cuisine_type,
        price_range: "$".repeat(usize::from(level)),
        rating: place.rating,
        location: place.location.clone(),
        estimated_cost_per_person: cost_per_person(place.price_level, category),
        must_try_dishes: Vec::new(),
    }
}

fn fits_category(restaurant: &Restaurant, category: BudgetCategory) -> bool {
    let tier = restaurant.price_range.chars().filter(|c| *c == '$').count();
    match category {
        BudgetCategory::Budget => tier <= 2,
        BudgetCategory::Moderate => (2..=3).contains(&tier),
        BudgetCategory::Luxury => tier >= 3,
    }
}

/// Best-rated first, with a bonus for price ranges that suit the budget.
pub fn rank_restaurants(candidates: Vec<Restaurant>, category: BudgetCategory) -> Vec<Restaurant> {
    let mut scored: Vec<(f64, Restaurant)> = candidates
        .into_iter()
        .map(|restaurant| {
            let bonus = if fits_category(&restaurant, category) { 0.5 } else { 0.0 };
            (restaurant.rating + bonus, restaurant)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_RANKED_RESTAURANTS)
        .map(|(_, restaurant)| restaurant)
        .collect()
}

fn food_recommendations(restaurants: &[Restaurant], request: &TravelRequest) -> Vec<String> {
    let mut recommendations = Vec::new();

    match request.budget_category {
        BudgetCategory::Budget => {
            let cheap = restaurants
                .iter()
                .filter(|r| matches!(r.price_range.as_str(), "$" | "$$"))
                .count();
            if cheap > 0 {
                recommendations.push(format!(
                    "Focus on {cheap} budget-friendly restaurants to maximize your food budget"
                ));
            }
            recommendations.extend([
                "Try local street food and markets for authentic flavors at great prices".to_string(),
                "Look for lunch specials and early bird dinner deals".to_string(),
            ]);
        }
        BudgetCategory::Moderate => recommendations.extend([
            "Mix casual and upscale dining experiences".to_string(),
            "Balance sit-down restaurants with local food markets".to_string(),
        ]),
        BudgetCategory::Luxury => {
            let premium = restaurants
                .iter()
                .filter(|r| matches!(r.price_range.as_str(), "$$$" | "$$$$"))
                .count();
            if premium > 0 {
                recommendations.push(format!("Indulge in {premium} premium dining experiences"));
            }
            recommendations.extend([
                "Make reservations at top-rated restaurants in advance".to_string(),
                "Consider wine pairings and tasting menus".to_string(),
            ]);
        }
    }

    let mut cuisines: Vec<&str> = Vec::new();
    for restaurant in restaurants {
        if !cuisines.contains(&restaurant.cuisine_type.as_str()) {
            cuisines.push(&restaurant.cuisine_type);
        }
    }
    if cuisines.len() > 3 {
        recommendations.push(format!(
            "Experience diverse cuisines: {}",
            cuisines[..3].join(", ")
        ));
    }

    if restaurants.iter().any(|r| {
        let cuisine = r.cuisine_type.to_lowercase();
        cuisine.contains("local") || cuisine.contains("traditional")
    }) {
        recommendations
            .push("Don't miss the local traditional restaurants for authentic experiences".to_string());
    }

    if request.prefers(TravelPreference::Food) {
        recommendations.push("Book a food tour early in the trip to find favourites to revisit".to_string());
    }

    if let Some(requirements) = request
        .special_requirements
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
    {
        recommendations.push(format!(
            "Confirm options for \"{requirements}\" with restaurants before you go"
        ));
    }

    recommendations
}
