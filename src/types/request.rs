use crate::error::{PlannerError, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Number of days every generated itinerary covers.
pub const TRIP_DAYS: u32 = 2;

/// Largest party a single itinerary is planned for.
pub const MAX_GROUP_SIZE: u32 = 10;

/// Preference tags a traveler can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelPreference {
    Adventure,
    Culture,
    Relaxation,
    Food,
    Nightlife,
    Family,
}

impl TravelPreference {
    pub const ALL: [TravelPreference; 6] = [
        TravelPreference::Adventure,
        TravelPreference::Culture,
        TravelPreference::Relaxation,
        TravelPreference::Food,
        TravelPreference::Nightlife,
        TravelPreference::Family,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TravelPreference::Adventure => "adventure",
            TravelPreference::Culture => "culture",
            TravelPreference::Relaxation => "relaxation",
            TravelPreference::Food => "food",
            TravelPreference::Nightlife => "nightlife",
            TravelPreference::Family => "family",
        }
    }
}

impl fmt::Display for TravelPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TravelPreference {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        TravelPreference::ALL
            .into_iter()
            .find(|pref| pref.as_str() == needle)
            .ok_or_else(|| PlannerError::InvalidRequest(format!("unknown travel preference `{s}`")))
    }
}

/// Spending tier of the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetCategory {
    Budget,
    Moderate,
    Luxury,
}

impl BudgetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetCategory::Budget => "budget",
            BudgetCategory::Moderate => "moderate",
            BudgetCategory::Luxury => "luxury",
        }
    }
}

impl fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetCategory {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "budget" => Ok(BudgetCategory::Budget),
            "moderate" => Ok(BudgetCategory::Moderate),
            "luxury" => Ok(BudgetCategory::Luxury),
            other => Err(PlannerError::InvalidRequest(format!(
                "unknown budget category `{other}`"
            ))),
        }
    }
}

/// A request for a two-day itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelRequest {
    /// Destination city and country (e.g., "Paris, France")
    pub destination: String,
    /// Total trip budget in USD
    pub budget: f64,
    pub budget_category: BudgetCategory,
    pub travel_preferences: Vec<TravelPreference>,
    /// First day of the trip
    pub start_date: NaiveDate,
    #[serde(default = "default_group_size")]
    pub group_size: u32,
    #[serde(default)]
    pub special_requirements: Option<String>,
}

fn default_group_size() -> u32 {
    1
}

impl TravelRequest {
    pub fn new(
        destination: impl Into<String>,
        budget: f64,
        budget_category: BudgetCategory,
        travel_preferences: Vec<TravelPreference>,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            destination: destination.into(),
            budget,
            budget_category,
            travel_preferences,
            start_date,
            group_size: 1,
            special_requirements: None,
        }
    }

    pub fn with_group_size(mut self, group_size: u32) -> Self {
        self.group_size = group_size;
        self
    }

    pub fn with_special_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.special_requirements = Some(requirements.into());
        self
    }

    /// Check the request invariants against `today`.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        if self.destination.trim().is_empty() {
            return Err(PlannerError::InvalidRequest(
                "destination must not be empty".to_string(),
            ));
        }
        if !self.budget.is_finite() || self.budget <= 0.0 {
            return Err(PlannerError::InvalidRequest(format!(
                "budget must be a positive amount, got {}",
                self.budget
            )));
        }
        if self.travel_preferences.is_empty() {
            return Err(PlannerError::InvalidRequest(
                "at least one travel preference is required".to_string(),
            ));
        }
        if self.start_date < today {
            return Err(PlannerError::InvalidRequest(format!(
                "start date {} is in the past",
                self.start_date
            )));
        }
        if self.group_size == 0 || self.group_size > MAX_GROUP_SIZE {
            return Err(PlannerError::InvalidRequest(format!(
                "group size must be between 1 and {MAX_GROUP_SIZE}, got {}",
                self.group_size
            )));
        }
        Ok(())
    }

    /// All calendar days covered by the trip.
    pub fn date_range(&self) -> DateRange {
        DateRange::starting(self.start_date, TRIP_DAYS)
    }

    pub fn preferences_text(&self) -> String {
        self.travel_preferences
            .iter()
            .map(TravelPreference::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn prefers(&self, preference: TravelPreference) -> bool {
        self.travel_preferences.contains(&preference)
    }
}

/// Inclusive span of trip days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub days: u32,
}

impl DateRange {
    pub fn starting(start: NaiveDate, days: u32) -> Self {
        Self {
            start,
            days: days.max(1),
        }
    }

    /// Date of the zero-based `offset` day, saturating at the range start.
    pub fn day(&self, offset: u32) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(u64::from(offset)))
            .unwrap_or(self.start)
    }

    pub fn end(&self) -> NaiveDate {
        self.day(self.days - 1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end()
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.days).map(move |offset| self.day(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> TravelRequest {
        TravelRequest::new(
            "Paris, France",
            500.0,
            BudgetCategory::Moderate,
            vec![TravelPreference::Culture, TravelPreference::Food],
            date(2030, 6, 1),
        )
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(sample().validate(date(2030, 5, 1)).is_ok());
        assert!(sample().validate(date(2030, 6, 1)).is_ok());
    }

    #[test]
    fn test_rejects_invariant_violations() {
        let today = date(2030, 5, 1);

        let mut request = sample();
        request.budget = 0.0;
        assert!(request.validate(today).is_err());

        let mut request = sample();
        request.travel_preferences.clear();
        assert!(request.validate(today).is_err());

        let request = sample();
        assert!(request.validate(date(2030, 6, 2)).is_err());

        let request = sample().with_group_size(0);
        assert!(request.validate(today).is_err());

        let request = sample().with_group_size(11);
        assert!(request.validate(today).is_err());
    }

    #[test]
    fn test_preference_parsing_is_case_insensitive() {
        assert_eq!(
            " Culture ".parse::<TravelPreference>().unwrap(),
            TravelPreference::Culture
        );
        assert!("shopping".parse::<TravelPreference>().is_err());
        assert_eq!(
            "LUXURY".parse::<BudgetCategory>().unwrap(),
            BudgetCategory::Luxury
        );
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: TravelRequest = serde_json::from_value(serde_json::json!({
            "destination": "Rome, Italy",
            "budget": 300.0,
            "budget_category": "budget",
            "travel_preferences": ["culture"],
            "start_date": "2030-09-10"
        }))
        .unwrap();
        assert_eq!(request.group_size, 1);
        assert!(request.special_requirements.is_none());
        assert_eq!(request.date_range().end(), date(2030, 9, 11));
    }

    #[test]
    fn test_date_range_days() {
        let range = DateRange::starting(date(2030, 12, 31), 2);
        let days: Vec<_> = range.iter().collect();
        assert_eq!(days, vec![date(2030, 12, 31), date(2031, 1, 1)]);
        assert!(range.contains(date(2031, 1, 1)));
        assert!(!range.contains(date(2031, 1, 2)));
    }
}
