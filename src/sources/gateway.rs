use super::{DataSource, PlacesSource, TransitSource, WeatherSource};
use crate::{
    config::{PlannerConfig, SourceTimeouts},
    error::SourceError,
    types::{
        DateRange, ExternalDataBundle, FailureOrigin, Place, SoftFailure, TransitInfo,
        WeatherForecast,
    },
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

pub type WeatherProvider = Arc<dyn DataSource<Output = Vec<WeatherForecast>>>;
pub type PlacesProvider = Arc<dyn DataSource<Output = Vec<Place>>>;
pub type TransitProvider = Arc<dyn DataSource<Output = TransitInfo>>;

/// Fans out to the weather, places and transit sources concurrently.
///
/// Each source gets its own timeout, capped by the global ceiling, so the
/// whole fan-out never outlives `timeouts.global`. A source that fails or
/// times out leaves its slot empty and is recorded as a [`SoftFailure`];
/// `gather` itself never fails.
#[derive(Clone)]
pub struct ExternalSourceGateway {
    weather: WeatherProvider,
    places: PlacesProvider,
    transit: TransitProvider,
    timeouts: SourceTimeouts,
}

impl std::fmt::Debug for ExternalSourceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalSourceGateway")
            .field("weather", &self.weather)
            .field("places", &self.places)
            .field("transit", &self.transit)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl ExternalSourceGateway {
    pub fn new(
        weather: WeatherProvider,
        places: PlacesProvider,
        transit: TransitProvider,
        timeouts: SourceTimeouts,
    ) -> Self {
        Self {
            weather,
            places,
            transit,
            timeouts,
        }
    }

    /// Gateway over the live HTTP sources configured by `config`.
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(
            Arc::new(WeatherSource::new(config.openweather_api_key.clone())),
            Arc::new(PlacesSource::new(config.google_places_api_key.clone())),
            Arc::new(TransitSource::new(config.google_maps_api_key.clone())),
            config.source_timeouts,
        )
    }

    pub fn timeouts(&self) -> SourceTimeouts {
        self.timeouts
    }

    /// Query every source for `destination` over `dates`.
    pub async fn gather(&self, destination: &str, dates: DateRange) -> ExternalDataBundle {
        let (weather, places, transit) = tokio::join!(
            bounded(
                self.weather.as_ref(),
                destination,
                dates,
                self.timeouts.weather.min(self.timeouts.global),
            ),
            bounded(
                self.places.as_ref(),
                destination,
                dates,
                self.timeouts.places.min(self.timeouts.global),
            ),
            bounded(
                self.transit.as_ref(),
                destination,
                dates,
                self.timeouts.transit.min(self.timeouts.global),
            ),
        );

        let mut bundle = ExternalDataBundle::default();
        match weather {
            Ok(forecasts) => bundle.weather = forecasts,
            Err(err) => record(&mut bundle, FailureOrigin::Weather, err),
        }
        match places {
            Ok(found) => bundle.places = found,
            Err(err) => record(&mut bundle, FailureOrigin::Places, err),
        }
        match transit {
            Ok(info) => bundle.transit = Some(info),
            Err(err) => record(&mut bundle, FailureOrigin::Transit, err),
        }

        debug!(
            target: "travel_buddy::sources",
            destination,
            weather_days = bundle.weather.len(),
            places = bundle.places.len(),
            transit = bundle.transit.is_some(),
            failures = bundle.soft_failures.len(),
            "external data gathered"
        );
        bundle
    }
}

async fn bounded<S>(
    source: &S,
    destination: &str,
    dates: DateRange,
    limit: Duration,
) -> Result<S::Output, SourceError>
where
    S: DataSource + ?Sized,
{
    match tokio::time::timeout(limit, source.fetch(destination, dates)).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout {
            source_name: source.name(),
            after: limit,
        }),
    }
}

fn record(bundle: &mut ExternalDataBundle, origin: FailureOrigin, err: SourceError) {
    warn!(
        target: "travel_buddy::sources",
        source = err.source_name(),
        timeout = err.is_timeout(),
        error = %err,
        "external source failed, continuing without it"
    );
    bundle
        .soft_failures
        .push(SoftFailure::new(origin, err.to_string()));
}
