pub mod external;
pub mod itinerary;
pub mod request;
pub mod response;

pub use external::{
    ExternalDataBundle, FailureOrigin, Place, PlaceCategory, SoftFailure, TransitInfo,
    WeatherForecast,
};
pub use itinerary::{Activity, BudgetBreakdown, DayPlan, Itinerary, Restaurant};
pub use request::{BudgetCategory, DateRange, TravelPreference, TravelRequest, TRIP_DAYS};
pub use response::ItineraryResponse;
