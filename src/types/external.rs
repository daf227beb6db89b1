use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregated forecast for one trip day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecast {
    pub date: NaiveDate,
    /// Mean temperature in °C
    pub temperature: f64,
    pub description: String,
    /// Highest probability of precipitation for the day, 0.0-1.0
    pub precipitation_probability: f64,
    pub humidity: f64,
    pub wind_speed: f64,
}

impl WeatherForecast {
    pub fn is_rainy(&self) -> bool {
        self.precipitation_probability >= 0.6 || self.description.to_lowercase().contains("rain")
    }

    pub fn is_snowy(&self) -> bool {
        self.description.to_lowercase().contains("snow")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceCategory {
    Attraction,
    Restaurant,
}

impl PlaceCategory {
    /// Place type understood by the places provider.
    pub fn provider_type(&self) -> &'static str {
        match self {
            PlaceCategory::Attraction => "tourist_attraction",
            PlaceCategory::Restaurant => "restaurant",
        }
    }
}

/// A point of interest returned by the places source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub category: PlaceCategory,
    /// Rating from 0-5
    pub rating: f64,
    /// Provider price level from 0 (free) to 4 (very expensive)
    pub price_level: Option<u8>,
    pub location: String,
    pub place_id: String,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Transit summary from the arrival hub into the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitInfo {
    pub origin: String,
    pub duration: String,
    pub distance: String,
    pub status: String,
}

/// Which part of the pipeline absorbed a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    Weather,
    Places,
    Transit,
    Explorer,
    Food,
    Budget,
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureOrigin::Weather => "weather",
            FailureOrigin::Places => "places",
            FailureOrigin::Transit => "transit",
            FailureOrigin::Explorer => "explorer",
            FailureOrigin::Food => "food",
            FailureOrigin::Budget => "budget",
        };
        f.write_str(label)
    }
}

/// A failure that was replaced by a default instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftFailure {
    pub origin: FailureOrigin,
    pub reason: String,
}

impl SoftFailure {
    pub fn new(origin: FailureOrigin, reason: impl Into<String>) -> Self {
        Self {
            origin,
            reason: reason.into(),
        }
    }
}

/// Everything the external sources produced for one request.
///
/// The bundle always exists; a source that failed leaves its field empty and
/// adds an entry to `soft_failures`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalDataBundle {
    pub weather: Vec<WeatherForecast>,
    pub places: Vec<Place>,
    pub transit: Option<TransitInfo>,
    pub soft_failures: Vec<SoftFailure>,
}

impl ExternalDataBundle {
    pub fn places_of(&self, category: PlaceCategory) -> impl Iterator<Item = &Place> {
        self.places.iter().filter(move |place| place.category == category)
    }

    pub fn is_complete(&self) -> bool {
        self.soft_failures.is_empty()
    }
}
