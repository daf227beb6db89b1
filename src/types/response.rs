use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{error::PlannerError, types::itinerary::Itinerary};

/// Envelope handed to an HTTP-facing layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itinerary: Option<Itinerary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Wall-clock seconds spent serving the request
    pub processing_time: f64,
}

impl ItineraryResponse {
    pub fn success(itinerary: Itinerary, elapsed: Duration) -> Self {
        Self {
            success: true,
            itinerary: Some(itinerary),
            error_message: None,
            error_code: None,
            processing_time: elapsed.as_secs_f64(),
        }
    }

    pub fn failure(error: &PlannerError, elapsed: Duration) -> Self {
        Self {
            success: false,
            itinerary: None,
            error_message: Some(error.to_string()),
            error_code: Some(error.error_code().to_string()),
            processing_time: elapsed.as_secs_f64(),
        }
    }
}
