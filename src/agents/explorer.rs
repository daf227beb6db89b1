use super::{AgentContext, AgentFuture, AgentOutput, AgentRole, ExplorerPayload, TravelAgent};
use crate::{
    completion_schema,
    error::{PlannerError, Result},
    schemas::parse_structured,
    services::{extract_json_object, TextGenerator},
    types::{Activity, BudgetCategory, Place, PlaceCategory, TravelPreference, TravelRequest},
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::{collections::HashSet, sync::Arc};
use tracing::debug;

/// Upper bound on ranked activities handed to the assembler.
pub const MAX_RANKED_ACTIVITIES: usize = 12;

/// Attractions proposed by the text generator.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AttractionList {
    pub attractions: Vec<Activity>,
}

completion_schema!(AttractionList, "attraction_list");

/// Finds and ranks attractions for the destination.
#[derive(Debug, Clone, Default)]
pub struct ExplorerAgent {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ExplorerAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    async fn suggested_attractions(&self, request: &TravelRequest) -> Result<Vec<Activity>> {
        let Some(generator) = self.generator.as_ref() else {
            return Ok(Vec::new());
        };

        let text = generator.generate(&attraction_prompt(request)).await?;
        let value = extract_json_object(&text)?;
        let list: AttractionList = parse_structured(&value)?;
        Ok(list.attractions)
    }

    async fn explore(&self, ctx: &AgentContext) -> Result<ExplorerPayload> {
        let request = ctx.request.as_ref();
        let suggested = self.suggested_attractions(request).await?;
        let external = ctx.external().await;

        let from_places = external
            .places_of(PlaceCategory::Attraction)
            .map(activity_from_place);
        let merged = merge_unique(suggested, from_places);
        debug!(
            target: "travel_buddy::agents",
            agent = "explorer",
            candidates = merged.len(),
            "attraction candidates collected"
        );

        let activities = rank_activities(merged, request);
        if activities.is_empty() {
            return Err(PlannerError::Validation(format!(
                "no attractions found for {}",
                request.destination
            )));
        }

        let recommendations = explorer_recommendations(&activities, request);
        Ok(ExplorerPayload {
            activities,
            recommendations,
        })
    }
}

impl TravelAgent for ExplorerAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Explorer
    }

    fn run<'a>(&'a self, ctx: &'a AgentContext) -> AgentFuture<'a> {
        Box::pin(async move { self.explore(ctx).await.map(AgentOutput::Explorer) })
    }
}

fn attraction_prompt(request: &TravelRequest) -> String {
    format!(
        "Find the top attractions and activities for a 2-day weekend trip to {destination}.\n\
         Travel preferences: {preferences}\n\
         Budget category: {category}\n\
         Group size: {group}\n\
         Special requirements: {requirements}\n\n\
         Return 8-12 attractions as JSON: {{\"attractions\": [{{\"name\": \"...\", \
         \"description\": \"...\", \"location\": \"...\", \"category\": \"museum\", \
         \"entry_fee\": 25.0, \"estimated_duration\": 120, \"popularity_score\": 8.5, \
         \"uniqueness_score\": 7.0}}]}}. Entry fees are per person in USD, durations in \
         minutes, scores from 0 to 10.",
        destination = request.destination,
        preferences = request.preferences_text(),
        category = request.budget_category,
        group = request.group_size,
        requirements = request.special_requirements.as_deref().unwrap_or("none"),
    )
}

/// Turn a places-provider attraction into an activity candidate.
pub fn activity_from_place(place: &Place) -> Activity {
    let category = place
        .types
        .iter()
        .find(|kind| kind.as_str() != "point_of_interest" && kind.as_str() != "establishment")
        .cloned()
        .unwrap_or_else(|| "landmark".to_string());

    let estimated_duration = match category.as_str() {
        "museum" | "art_gallery" | "zoo" | "aquarium" | "amusement_park" => 150,
        "park" | "natural_feature" => 120,
        _ => 90,
    };

    Activity {
        name: place.name.clone(),
        description: format!("Rated {:.1} by visitors", place.rating),
        location: place.location.clone(),
        entry_fee: Some(entry_fee_for(place.price_level)),
        category,
        estimated_duration,
        popularity_score: (place.rating * 2.0).clamp(0.0, 10.0),
        uniqueness_score: 5.0,
    }
}

fn entry_fee_for(price_level: Option<u8>) -> f64 {
    match price_level {
        Some(0) | None => 0.0,
        Some(1) => 10.0,
        Some(2) => 25.0,
        Some(3) => 45.0,
        Some(_) => 70.0,
    }
}

/// Keywords that tie an activity category to a traveller preference.
fn preference_keywords(preference: TravelPreference) -> &'static [&'static str] {
    match preference {
        TravelPreference::Adventure => &["adventure", "hiking", "outdoor", "sport", "natural", "climb"],
        TravelPreference::Culture => &[
            "culture", "museum", "gallery", "historic", "church", "landmark", "monument", "temple",
            "theater", "theatre",
        ],
        TravelPreference::Relaxation => &["relax", "spa", "garden", "beach", "park"],
        TravelPreference::Food => &["food", "market", "cafe", "culinary", "tasting"],
        TravelPreference::Nightlife => &["nightlife", "bar", "club", "night", "music", "entertainment"],
        TravelPreference::Family => &["family", "zoo", "aquarium", "amusement", "park"],
    }
}

pub(crate) fn matches_preferences(activity: &Activity, preferences: &[TravelPreference]) -> bool {
    let category = activity.category.to_lowercase();
    preferences.iter().any(|pref| {
        preference_keywords(*pref)
            .iter()
            .any(|keyword| category.contains(keyword))
    })
}

fn score(activity: &Activity, request: &TravelRequest) -> f64 {
    let mut score = (activity.popularity_score + activity.uniqueness_score) / 2.0;
    if matches_preferences(activity, &request.travel_preferences) {
        score += 1.0;
    }

    let fee = activity.entry_fee.unwrap_or(0.0);
    match request.budget_category {
        BudgetCategory::Budget if fee > 50.0 => score -= 1.0,
        BudgetCategory::Luxury if fee > 0.0 && fee < 20.0 => score -= 0.5,
        _ => {}
    }
    score
}

/// Sort candidates by score, best first, and keep the top twelve.
pub fn rank_activities(candidates: Vec<Activity>, request: &TravelRequest) -> Vec<Activity> {
    let mut scored: Vec<(f64, Activity)> = candidates
        .into_iter()
        .map(|activity| (score(&activity, request), activity))
        .collect();
    // Stable sort keeps generator order among equal scores.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_RANKED_ACTIVITIES)
        .map(|(_, activity)| activity)
        .collect()
}

/// Append `extra` to `primary`, skipping names already present.
fn merge_unique(primary: Vec<Activity>, extra: impl Iterator<Item = Activity>) -> Vec<Activity> {
    let mut seen: HashSet<String> = HashSet::new();
    primary
        .into_iter()
        .chain(extra)
        .filter(|activity| seen.insert(activity.name.trim().to_lowercase()))
        .collect()
}

fn explorer_recommendations(activities: &[Activity], request: &TravelRequest) -> Vec<String> {
    let mut recommendations = Vec::new();

    let mut categories: Vec<(&str, usize)> = Vec::new();
    for activity in activities {
        match categories
            .iter_mut()
            .find(|(category, _)| *category == activity.category)
        {
            Some((_, count)) => *count += 1,
            None => categories.push((activity.category.as_str(), 1)),
        }
    }
    for (category, count) in categories {
        if count > 1 {
            recommendations.push(format!(
                "Visit multiple {category} spots to get a comprehensive experience"
            ));
        }
    }

    if request.budget_category == BudgetCategory::Budget {
        let free = activities
            .iter()
            .filter(|a| a.entry_fee.unwrap_or(0.0) == 0.0)
            .count();
        if free > 0 {
            recommendations.push(format!(
                "Consider visiting {free} free attractions to save money"
            ));
        }
    }

    let total_minutes: u32 = activities.iter().map(|a| a.estimated_duration).sum();
    if total_minutes > 960 {
        recommendations
            .push("Your itinerary is packed - consider prioritizing must-see attractions".to_string());
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::GenerateFuture,
        types::{ExternalDataBundle, TravelPreference},
    };
    use chrono::NaiveDate;
    use serde_json::json;

    #[derive(Debug)]
    struct CannedGenerator(String);

    impl TextGenerator for CannedGenerator {
        fn generate<'a>(&'a self, _prompt: &'a str) -> GenerateFuture<'a> {
            Box::pin(async move { Ok(self.0.clone()) })
        }
    }

    fn request(category: BudgetCategory) -> TravelRequest {
        TravelRequest::new(
            "Paris, France",
            500.0,
            category,
            vec![TravelPreference::Culture],
            NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
        )
    }

    fn activity(name: &str, category: &str, fee: Option<f64>, pop: f64, uniq: f64) -> Activity {
        Activity {
            name: name.to_string(),
            description: String::new(),
            location: String::new(),
            category: category.to_string(),
            entry_fee: fee,
            estimated_duration: 90,
            popularity_score: pop,
            uniqueness_score: uniq,
        }
    }

    fn place(name: &str, kind: &str) -> Place {
        Place {
            name: name.to_string(),
            category: PlaceCategory::Attraction,
            rating: 4.5,
            price_level: Some(1),
            location: "Center".to_string(),
            place_id: name.to_string(),
            types: vec![kind.to_string(), "point_of_interest".to_string()],
        }
    }

    #[test]
    fn test_preference_match_outranks_raw_score() {
        let ranked = rank_activities(
            vec![
                activity("Cooking Class", "activity", Some(30.0), 8.0, 8.0),
                activity("Louvre", "museum", Some(20.0), 8.0, 7.5),
            ],
            &request(BudgetCategory::Moderate),
        );
        assert_eq!(ranked[0].name, "Louvre");
    }

    #[test]
    fn test_budget_travellers_penalise_expensive_entries() {
        let ranked = rank_activities(
            vec![
                activity("Skyline Tour", "tour", Some(80.0), 8.0, 8.0),
                activity("Free Walk", "tour", Some(0.0), 7.5, 7.5),
            ],
            &request(BudgetCategory::Budget),
        );
        assert_eq!(ranked[0].name, "Free Walk");
    }

    #[test]
    fn test_ranking_keeps_at_most_twelve() {
        let many = (0..20)
            .map(|i| activity(&format!("Spot {i}"), "park", None, 5.0, 5.0))
            .collect();
        assert_eq!(
            rank_activities(many, &request(BudgetCategory::Moderate)).len(),
            MAX_RANKED_ACTIVITIES
        );
    }

    #[test]
    fn test_activity_from_place_skips_generic_types() {
        let activity = activity_from_place(&place("Orsay", "museum"));
        assert_eq!(activity.category, "museum");
        assert_eq!(activity.entry_fee, Some(10.0));
        assert_eq!(activity.popularity_score, 9.0);
    }

    #[tokio::test]
    async fn test_merges_generated_and_place_attractions() {
        let generated = json!({
            "attractions": [
                {"name": "Louvre", "category": "museum", "entry_fee": 22.0,
                 "estimated_duration": 180, "popularity_score": 9.5, "uniqueness_score": 9.0}
            ]
        });
        let agent = ExplorerAgent::new().with_generator(Arc::new(CannedGenerator(format!(
            "```json\n{generated}\n```"
        ))));
        let bundle = ExternalDataBundle {
            places: vec![place("louvre", "museum"), place("Jardin", "park")],
            ..ExternalDataBundle::default()
        };
        let ctx = AgentContext::with_bundle(Arc::new(request(BudgetCategory::Moderate)), bundle);

        let output = agent.run(&ctx).await.unwrap().into_explorer().into_success().unwrap();
        let names: Vec<_> = output.activities.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Louvre", "Jardin"]);
    }

    #[tokio::test]
    async fn test_invalid_generator_payload_fails() {
        let agent = ExplorerAgent::new().with_generator(Arc::new(CannedGenerator(
            r#"{"attractions": [{"description": "missing name"}]}"#.to_string(),
        )));
        let ctx = AgentContext::with_bundle(
            Arc::new(request(BudgetCategory::Moderate)),
            ExternalDataBundle::default(),
        );
        let err = agent.run(&ctx).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_no_candidates_is_an_error() {
        let ctx = AgentContext::with_bundle(
            Arc::new(request(BudgetCategory::Moderate)),
            ExternalDataBundle::default(),
        );
        assert!(ExplorerAgent::new().run(&ctx).await.is_err());
    }
}
