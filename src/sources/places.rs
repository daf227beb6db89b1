use super::{get_json, parse_destination, DataSource, SourceFuture};
use crate::{
    error::SourceError,
    types::{DateRange, Place, PlaceCategory},
};
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";
const SOURCE_NAME: &str = "places";
const SEARCH_RADIUS_METERS: u32 = 5000;
const RESULTS_PER_CATEGORY: usize = 10;

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<NearbyResult>,
}

#[derive(Debug, Deserialize)]
struct NearbyResult {
    name: String,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    price_level: Option<u8>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    place_id: Option<String>,
}

/// Google Places nearby search for attractions and restaurants around the
/// geocoded destination.
///
/// Without an API key the source serves generic places named after the city.
#[derive(Debug, Clone)]
pub struct PlacesSource {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl PlacesSource {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn geocode(&self, api_key: &str, destination: &str) -> Result<LatLng, SourceError> {
        let body = get_json(
            &self.client,
            SOURCE_NAME,
            &self.endpoint("geocode/json"),
            &[
                ("address", destination.to_string()),
                ("key", api_key.to_string()),
            ],
        )
        .await?;

        let response: GeocodeResponse = serde_json::from_value(body).map_err(parse_error)?;
        match (response.status.as_str(), response.results.first()) {
            ("OK", Some(result)) => Ok(result.geometry.location),
            _ => Err(SourceError::NotFound {
                source_name: SOURCE_NAME,
                query: destination.to_string(),
            }),
        }
    }

    async fn nearby(
        &self,
        api_key: &str,
        center: LatLng,
        category: PlaceCategory,
    ) -> Result<Vec<Place>, SourceError> {
        let body = get_json(
            &self.client,
            SOURCE_NAME,
            &self.endpoint("place/nearbysearch/json"),
            &[
                ("location", format!("{},{}", center.lat, center.lng)),
                ("radius", SEARCH_RADIUS_METERS.to_string()),
                ("type", category.provider_type().to_string()),
                ("key", api_key.to_string()),
            ],
        )
        .await?;

        let response: NearbyResponse = serde_json::from_value(body).map_err(parse_error)?;
        if response.status != "OK" && response.status != "ZERO_RESULTS" {
            return Err(SourceError::Parse {
                source_name: SOURCE_NAME,
                message: format!("nearby search status {}", response.status),
            });
        }

        Ok(response
            .results
            .into_iter()
            .take(RESULTS_PER_CATEGORY)
            .map(|result| Place {
                place_id: result.place_id.unwrap_or_else(|| result.name.clone()),
                name: result.name,
                category,
                rating: result.rating.unwrap_or_default(),
                price_level: result.price_level,
                location: result.vicinity.unwrap_or_default(),
                types: result.types,
            })
            .collect())
    }

    async fn fetch_live(&self, api_key: &str, destination: &str) -> Result<Vec<Place>, SourceError> {
        let center = self.geocode(api_key, destination).await?;
        let (attractions, restaurants) = tokio::try_join!(
            self.nearby(api_key, center, PlaceCategory::Attraction),
            self.nearby(api_key, center, PlaceCategory::Restaurant),
        )?;

        let mut places = attractions;
        places.extend(restaurants);
        Ok(places)
    }
}

impl DataSource for PlacesSource {
    type Output = Vec<Place>;

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn fetch<'a>(&'a self, destination: &'a str, _dates: DateRange) -> SourceFuture<'a, Self::Output> {
        Box::pin(async move {
            match self.api_key.as_deref() {
                Some(api_key) => self.fetch_live(api_key, destination).await,
                None => Ok(demo_places(destination)),
            }
        })
    }
}

fn parse_error(err: serde_json::Error) -> SourceError {
    SourceError::Parse {
        source_name: SOURCE_NAME,
        message: err.to_string(),
    }
}

fn demo_places(destination: &str) -> Vec<Place> {
    let (city, _) = parse_destination(destination);
    let attractions = [
        ("Old Town", 4.6, Some(0), "historic_site"),
        ("City Museum", 4.5, Some(2), "museum"),
        ("Central Park", 4.4, Some(0), "park"),
        ("Cathedral", 4.7, Some(1), "church"),
        ("Art Gallery", 4.3, Some(2), "art_gallery"),
        ("Riverside Walk", 4.2, Some(0), "natural_feature"),
    ];
    let restaurants = [
        ("Corner Cafe", 4.3, Some(1), "cafe"),
        ("Market Bistro", 4.4, Some(2), "restaurant"),
        ("Harbor Kitchen", 4.5, Some(3), "restaurant"),
        ("Street Food Hall", 4.2, Some(1), "meal_takeaway"),
        ("Fine Dining Room", 4.7, Some(4), "restaurant"),
    ];

    let build = |category: PlaceCategory, (suffix, rating, price_level, kind): (&str, f64, Option<u8>, &str)| {
        let name = format!("{city} {suffix}");
        Place {
            place_id: format!("demo-{}", name.to_lowercase().replace(' ', "-")),
            name,
            category,
            rating,
            price_level,
            location: format!("{suffix}, {city}"),
            types: vec![kind.to_string(), "point_of_interest".to_string()],
        }
    };

    attractions
        .into_iter()
        .map(|entry| build(PlaceCategory::Attraction, entry))
        .chain(
            restaurants
                .into_iter()
                .map(|entry| build(PlaceCategory::Restaurant, entry)),
        )
        .collect()
}
