use crate::types::{BudgetCategory, TravelPreference, TravelRequest};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

const KEY_PREFIX: &str = "itinerary:";

/// Content-derived cache key for a [`TravelRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonical form of a request. Field order here fixes the hashed byte layout.
#[derive(Serialize)]
struct NormalizedRequest<'a> {
    destination: String,
    budget: i64,
    budget_category: BudgetCategory,
    travel_preferences: Vec<&'a str>,
    start_date: String,
    group_size: u32,
    special_requirements: Option<String>,
}

fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalize(request: &TravelRequest) -> NormalizedRequest<'_> {
    let mut travel_preferences: Vec<&str> = request
        .travel_preferences
        .iter()
        .map(TravelPreference::as_str)
        .collect();
    travel_preferences.sort_unstable();
    travel_preferences.dedup();

    NormalizedRequest {
        destination: normalize_text(&request.destination),
        budget: request.budget.round() as i64,
        budget_category: request.budget_category,
        travel_preferences,
        start_date: request.start_date.format("%Y-%m-%d").to_string(),
        group_size: request.group_size,
        special_requirements: request
            .special_requirements
            .as_deref()
            .map(normalize_text)
            .filter(|text| !text.is_empty()),
    }
}

/// Derive the cache key for `request`.
///
/// Requests that differ only in destination casing or spacing, preference
/// order or duplicates, or sub-unit budget amounts share a fingerprint.
pub fn fingerprint(request: &TravelRequest) -> Fingerprint {
    let normalized = normalize(request);
    // Serializing a struct of strings and integers cannot fail.
    let canonical = serde_json::to_vec(&normalized).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    Fingerprint(format!("{KEY_PREFIX}{}", hex::encode(digest)))
}
