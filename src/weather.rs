//! Copenhagen forecast proxy / 哥本哈根天气预报代理
//!
//! Calls the DMI forecast EDR API (GeoJSON) and reduces the first feature to
//! a small report. Error details are logged; callers only show
//! [`WeatherError::public_message`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::WeatherConfig;

const COLLECTION_PATH: &str = "/v1/forecastedr/collections/harmonie_dini_sf/position";
const COPENHAGEN: &str = "POINT(12.561%2055.715)";
const PARAMETERS: &str = "temperature-2m,wind-speed-10m,wind-dir-10m";

pub const UNAVAILABLE_MESSAGE: &str = "weather service unavailable";
pub const INCOMPLETE_MESSAGE: &str = "weather data incomplete";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("missing DMI API key")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode forecast: {0}")]
    Decode(String),

    #[error("forecast has no features")]
    Empty,

    #[error("forecast feature has no coordinates")]
    Incomplete,
}

impl WeatherError {
    /// Message safe to show to end users
    pub fn public_message(&self) -> &'static str {
        match self {
            WeatherError::Incomplete => INCOMPLETE_MESSAGE,
            _ => UNAVAILABLE_MESSAGE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Properties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// `[lon, lat]`
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Properties {
    #[serde(rename = "temperature-2m", default)]
    pub temperature: f64,
    #[serde(rename = "wind-speed-10m", default)]
    pub wind_speed: f64,
    #[serde(rename = "wind-dir-10m", default)]
    pub wind_direction: f64,
    #[serde(default)]
    pub step: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    /// Kelvin, as delivered by DMI
    pub temperature: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub step: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub location: Location,
    pub forecast: Forecast,
}

impl WeatherReport {
    /// First feature of the collection
    pub fn from_collection(collection: FeatureCollection) -> Result<Self, WeatherError> {
        let first = collection.features.into_iter().next().ok_or(WeatherError::Empty)?;
        let (longitude, latitude) = match first.geometry.coordinates.as_slice() {
            [lon, lat, ..] => (*lon, *lat),
            _ => return Err(WeatherError::Incomplete),
        };
        Ok(Self {
            location: Location { latitude, longitude },
            forecast: Forecast {
                temperature: first.properties.temperature,
                wind_speed: first.properties.wind_speed,
                wind_direction: first.properties.wind_direction,
                step: first.properties.step,
            },
        })
    }

    /// Temperature in Celsius for display
    pub fn celsius(&self) -> f64 {
        self.forecast.temperature - 273.15
    }
}

pub struct WeatherClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    fn forecast_url(&self, api_key: &str) -> String {
        let key: String = url::form_urlencoded::byte_serialize(api_key.as_bytes()).collect();
        format!(
            "{}{}?coords={}&crs=crs84&parameter-name={}&f=GeoJSON&api-key={}",
            self.api_url, COLLECTION_PATH, COPENHAGEN, PARAMETERS, key
        )
    }

    pub async fn fetch_collection(&self) -> Result<FeatureCollection, WeatherError> {
        let api_key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;

        let response = self.client.get(self.forecast_url(api_key)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.trim().chars().take(1024).collect();
            return Err(WeatherError::Status { status: status.as_u16(), body });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| WeatherError::Decode(e.to_string()))
    }

    pub async fn copenhagen(&self) -> Result<WeatherReport, WeatherError> {
        let collection = self.fetch_collection().await?;
        WeatherReport::from_collection(collection)
    }
}
