//! OpenWeather-style current-conditions provider over `ApiClient`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::alerts::derive_alert_level;
use super::provider::{ProviderError, WeatherProvider};
use crate::models::{AlertLevel, Coordinates, WeatherReading};
use crate::retrieve::{ApiClient, ClientSettings, RetrieveError};

#[derive(Debug, Deserialize)]
struct CurrentPayload {
    #[serde(default)]
    weather: Vec<ConditionPayload>,
    main: MainPayload,
    #[serde(default)]
    wind: Option<WindPayload>,
    /// Metres.
    #[serde(default)]
    visibility: Option<f64>,
    #[serde(default)]
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ConditionPayload {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainPayload {
    temp: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct WindPayload {
    #[serde(default)]
    speed: f64,
}

impl From<RetrieveError> for ProviderError {
    fn from(e: RetrieveError) -> Self {
        match e {
            RetrieveError::Decode(msg) => ProviderError::Malformed(msg),
            RetrieveError::Timeout => ProviderError::Transport("request timed out".to_string()),
            other => ProviderError::Transport(other.to_string()),
        }
    }
}

pub struct HttpWeatherProvider {
    client: ApiClient,
    api_key: String,
}

impl HttpWeatherProvider {
    pub fn new(base_url: &str, api_key: impl Into<String>, settings: &ClientSettings) -> Result<Self, RetrieveError> {
        Ok(Self {
            client: ApiClient::new(base_url, None, settings)?,
            api_key: api_key.into(),
        })
    }

    fn to_reading(site_id: &str, payload: CurrentPayload) -> WeatherReading {
        let condition = payload
            .weather
            .first()
            .map(|w| if w.description.is_empty() { w.main.clone() } else { w.description.clone() })
            .unwrap_or_else(|| "unknown".to_string());
        let recorded_at = payload
            .dt
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);
        let mut reading = WeatherReading {
            site_id: site_id.to_string(),
            temperature_c: payload.main.temp,
            humidity_pct: payload.main.humidity,
            pressure_hpa: payload.main.pressure,
            wind_speed_ms: payload.wind.map_or(0.0, |w| w.speed),
            visibility_km: payload.visibility.map_or(10.0, |m| m / 1000.0),
            condition,
            alert_level: AlertLevel::None,
            recorded_at,
        };
        reading.alert_level = derive_alert_level(&reading);
        reading
    }
}

#[async_trait]
impl WeatherProvider for HttpWeatherProvider {
    async fn current(
        &self,
        site_id: &str,
        coordinates: Coordinates,
        display_name: &str,
    ) -> Result<WeatherReading, ProviderError> {
        let query = [
            ("lat", coordinates.latitude.to_string()),
            ("lon", coordinates.longitude.to_string()),
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ];
        debug!(site_id, display_name, "Requesting current weather");
        let response = self.client.get_json::<CurrentPayload, _>("weather", &query).await?;

        if !response.success {
            return Err(match response.status {
                429 => ProviderError::RateLimited,
                status => ProviderError::Http {
                    status,
                    body: response.error_body.unwrap_or_default(),
                },
            });
        }
        let payload = response
            .data
            .ok_or_else(|| ProviderError::Malformed("empty response body".to_string()))?;
        Ok(Self::to_reading(site_id, payload))
    }
}
