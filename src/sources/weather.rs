use super::{get_json, parse_destination, DataSource, SourceFuture};
use crate::{
    error::SourceError,
    types::{DateRange, WeatherForecast},
};
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
const SOURCE_NAME: &str = "weather";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastSlot>,
}

#[derive(Debug, Deserialize)]
struct ForecastSlot {
    dt: i64,
    main: SlotMain,
    #[serde(default)]
    weather: Vec<SlotWeather>,
    #[serde(default)]
    wind: Option<SlotWind>,
    /// Probability of precipitation, 0.0-1.0
    #[serde(default)]
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SlotMain {
    temp: f64,
    #[serde(default)]
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct SlotWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct SlotWind {
    speed: f64,
}

/// OpenWeatherMap 5 day / 3 hour forecast, folded into one entry per trip day.
///
/// Without an API key the source serves a fixed pleasant-weather forecast.
#[derive(Debug, Clone)]
pub struct WeatherSource {
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl WeatherSource {
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

    async fn fetch_live(
        &self,
        api_key: &str,
        destination: &str,
        dates: DateRange,
    ) -> Result<Vec<WeatherForecast>, SourceError> {
        let (city, country) = parse_destination(destination);
        let location = if country.is_empty() {
            city
        } else {
            format!("{city},{country}")
        };

        let url = format!("{}/forecast", self.base_url.trim_end_matches('/'));
        let body = get_json(
            &self.client,
            SOURCE_NAME,
            &url,
            &[
                ("q", location),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ],
        )
        .await?;

        let response: ForecastResponse =
            serde_json::from_value(body).map_err(|err| SourceError::Parse {
                source_name: SOURCE_NAME,
                message: err.to_string(),
            })?;

        Ok(aggregate_daily(&response.list, dates))
    }
}

impl DataSource for WeatherSource {
    type Output = Vec<WeatherForecast>;

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn fetch<'a>(&'a self, destination: &'a str, dates: DateRange) -> SourceFuture<'a, Self::Output> {
        Box::pin(async move {
            match self.api_key.as_deref() {
                Some(api_key) => self.fetch_live(api_key, destination, dates).await,
                None => Ok(demo_forecast(dates)),
            }
        })
    }
}

/// One forecast per trip day that has at least one 3-hour slot.
fn aggregate_daily(slots: &[ForecastSlot], dates: DateRange) -> Vec<WeatherForecast> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&ForecastSlot>> = BTreeMap::new();
    for slot in slots {
        let Some(date) = DateTime::from_timestamp(slot.dt, 0).map(|ts| ts.date_naive()) else {
            continue;
        };
        if dates.contains(date) {
            by_day.entry(date).or_default().push(slot);
        }
    }

    by_day
        .into_iter()
        .map(|(date, day_slots)| {
            let count = day_slots.len() as f64;
            let temperature = day_slots.iter().map(|s| s.main.temp).sum::<f64>() / count;
            let humidity = day_slots.iter().map(|s| s.main.humidity).sum::<f64>() / count;
            let wind_speed = day_slots
                .iter()
                .filter_map(|s| s.wind.as_ref().map(|w| w.speed))
                .fold(0.0, f64::max);
            let precipitation_probability = day_slots
                .iter()
                .filter_map(|s| s.pop)
                .fold(0.0, f64::max);

            WeatherForecast {
                date,
                temperature,
                description: dominant_description(&day_slots),
                precipitation_probability,
                humidity,
                wind_speed,
            }
        })
        .collect()
}

fn dominant_description(slots: &[&ForecastSlot]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for slot in slots {
        for weather in &slot.weather {
            match counts
                .iter_mut()
                .find(|(desc, _)| *desc == weather.description)
            {
                Some((_, count)) => *count += 1,
                None => counts.push((weather.description.as_str(), 1)),
            }
        }
    }

    // max_by_key keeps the last maximum; iterate in reverse so ties go to the earliest.
    counts
        .iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(desc, _)| desc.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn demo_forecast(dates: DateRange) -> Vec<WeatherForecast> {
    let samples = [
        (22.0, "partly cloudy", 65.0, 3.2, 0.1),
        (24.0, "sunny", 60.0, 2.8, 0.05),
    ];
    dates
        .iter()
        .enumerate()
        .map(|(idx, date)| {
            let (temperature, description, humidity, wind_speed, pop) =
                samples[idx % samples.len()];
            WeatherForecast {
                date,
                temperature,
                description: description.to_string(),
                precipitation_probability: pop,
                humidity,
                wind_speed,
            }
        })
        .collect()
}
