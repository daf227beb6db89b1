//! External data sources (weather, places, transit) and the gateway that fans
//! out to them.

pub mod gateway;
pub mod places;
pub mod transit;
pub mod weather;

use crate::{error::SourceError, types::DateRange};
use reqwest::Client;
use serde_json::Value;
use std::{future::Future, pin::Pin};

pub use gateway::ExternalSourceGateway;
pub use places::PlacesSource;
pub use transit::TransitSource;
pub use weather::WeatherSource;

/// Boxed future returned by [`DataSource::fetch`].
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// A third-party data source queried once per planning run.
pub trait DataSource: Send + Sync + std::fmt::Debug {
    type Output: Send + 'static;

    /// Short name used in logs and soft-failure records
    fn name(&self) -> &'static str;

    /// Fetch data for `destination` over the trip `dates`.
    fn fetch<'a>(&'a self, destination: &'a str, dates: DateRange) -> SourceFuture<'a, Self::Output>;
}

/// Split "City, Country" into its parts; the country may be empty.
pub fn parse_destination(destination: &str) -> (String, String) {
    let mut parts = destination.split(',').map(str::trim);
    let city = parts.next().unwrap_or_default().to_string();
    let country = parts.next().unwrap_or_default().to_string();
    (city, country)
}

/// GET `url` and decode a JSON body, mapping transport and status failures
/// onto [`SourceError`].
pub(crate) async fn get_json(
    client: &Client,
    source_name: &'static str,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, SourceError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|err| SourceError::Http {
            source_name,
            message: err.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            source_name,
            status: status.as_u16(),
        });
    }

    response.json::<Value>().await.map_err(|err| SourceError::Parse {
        source_name,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_destination() {
        assert_eq!(
            parse_destination("Paris, France"),
            ("Paris".to_string(), "France".to_string())
        );
        assert_eq!(
            parse_destination("  Tokyo "),
            ("Tokyo".to_string(), String::new())
        );
        assert_eq!(
            parse_destination("Portland, Oregon, USA"),
            ("Portland".to_string(), "Oregon".to_string())
        );
    }
}
