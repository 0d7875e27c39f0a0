// src/ingest/providers/weather.rs
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::WeatherSourceConfig;
use crate::error::FetchError;
use crate::ingest::types::{Fetcher, Service};
use crate::ingest::{decode, get_text};
use crate::store::{Record, Scalar};

const NAME: &str = "weather";
const FALLBACK_CITY: &str = "Auto-Detected";

#[derive(Debug, Deserialize)]
struct LocationResponse {
    /// "lat,lon"
    loc: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    time: Option<String>,
    temperature: Option<f64>,
    humidity: Option<f64>,
}

/// Approximate position of the host, from the location lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            city: None,
        }
    }
}

/// Parse a location lookup body; `None` when `loc` is absent or malformed.
pub fn parse_location(body: &str) -> Option<Location> {
    let resp: LocationResponse = serde_json::from_str(body).ok()?;
    let (lat, lon) = resp.loc?.split_once(',').and_then(|(a, b)| {
        Some((a.trim().parse::<f64>().ok()?, b.trim().parse::<f64>().ok()?))
    })?;
    Some(Location {
        latitude: lat,
        longitude: lon,
        city: resp.city,
    })
}

/// Current conditions at one location.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSample {
    pub city: String,
    pub time: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl WeatherSample {
    /// Row shape of the `weather` table.
    pub fn into_record(self) -> Record {
        Record::from([
            ("city".to_string(), Scalar::from(self.city)),
            ("temperature".to_string(), Scalar::from(self.temperature)),
            ("humidity".to_string(), Scalar::from(self.humidity)),
            ("timestamp".to_string(), Scalar::from(self.time)),
        ])
    }
}

/// Extract the `current_weather` object; its absence is a fetch failure.
pub fn parse_current(body: &str, location: &Location) -> Result<WeatherSample, FetchError> {
    let resp: WeatherResponse = decode(body, NAME)?;
    let current = resp.current_weather.ok_or(FetchError::MissingField {
        source_name: NAME,
        field: "current_weather",
    })?;
    Ok(WeatherSample {
        city: location
            .city
            .clone()
            .unwrap_or_else(|| FALLBACK_CITY.to_string()),
        time: current.time,
        temperature: current.temperature,
        humidity: current.humidity,
    })
}

pub struct WeatherFetcher {
    mode: Mode,
}

enum Mode {
    Fixture {
        location: Option<String>,
        weather: String,
    },
    Http {
        url: String,
        location_url: String,
        client: reqwest::Client,
        timeout: Duration,
    },
}

impl WeatherFetcher {
    pub fn from_config(cfg: &WeatherSourceConfig) -> Self {
        Self {
            mode: Mode::Http {
                url: cfg.url.clone(),
                location_url: cfg.location_url.clone(),
                client: reqwest::Client::new(),
                timeout: cfg.timeout(),
            },
        }
    }

    /// Canned location (optional) and weather bodies.
    pub fn from_fixture(location: Option<&str>, weather: &str) -> Self {
        Self {
            mode: Mode::Fixture {
                location: location.map(String::from),
                weather: weather.to_string(),
            },
        }
    }

    /// Best-effort: any failure falls back to 0,0.
    async fn locate(&self) -> Location {
        let body = match &self.mode {
            Mode::Fixture { location, .. } => location.clone(),
            Mode::Http {
                location_url,
                client,
                timeout,
                ..
            } => match get_text(client, location_url, &[], *timeout, NAME).await {
                Ok(b) => Some(b),
                Err(e) => {
                    tracing::warn!(target: "ingest", provider = NAME, error = %e, "location lookup failed");
                    None
                }
            },
        };
        match body.as_deref().and_then(parse_location) {
            Some(loc) => loc,
            None => {
                tracing::warn!(target: "ingest", provider = NAME, "location unavailable, using 0,0");
                Location::default()
            }
        }
    }
}

#[async_trait]
impl Fetcher for WeatherFetcher {
    async fn fetch_latest(&self) -> Result<Vec<Record>, FetchError> {
        let location = self.locate().await;
        let body = match &self.mode {
            Mode::Fixture { weather, .. } => weather.clone(),
            Mode::Http {
                url,
                client,
                timeout,
                ..
            } => {
                let query = [
                    ("latitude", location.latitude.to_string()),
                    ("longitude", location.longitude.to_string()),
                    ("current_weather", "true".to_string()),
                ];
                get_text(client, url, &query, *timeout, NAME).await?
            }
        };
        let sample = parse_current(&body, &location)?;
        Ok(vec![sample.into_record()])
    }

    fn service(&self) -> Service {
        Service::Weather
    }
}
