use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Coordinates, WeatherReading};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Weather provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("Weather provider rate limited the request")]
    RateLimited,

    #[error("Weather provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed weather payload: {0}")]
    Malformed(String),

    #[error("Weather provider transport error: {0}")]
    Transport(String),
}

/// Source of current conditions for a coordinate pair. Implementations fill
/// `alert_level` through `derive_alert_level`.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(
        &self,
        site_id: &str,
        coordinates: Coordinates,
        display_name: &str,
    ) -> Result<WeatherReading, ProviderError>;
}

/// Provider used when no weather API is configured. Every call fails, so the
/// aggregator always falls back to the last persisted reading.
pub struct OfflineProvider;

#[async_trait]
impl WeatherProvider for OfflineProvider {
    async fn current(
        &self,
        _site_id: &str,
        _coordinates: Coordinates,
        _display_name: &str,
    ) -> Result<WeatherReading, ProviderError> {
        Err(ProviderError::Transport("no weather provider configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_provider_always_fails() {
        let result = OfflineProvider.current("site-1", Coordinates::new(46.5, 8.0), "Site").await;
        assert!(matches!(result, Err(ProviderError::Transport(_))));
    }
}
