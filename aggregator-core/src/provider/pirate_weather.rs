use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    context::FetchContext, error::FetchError, geocode::CoordinateCache, http::ApiClient,
    model::Observation,
};

use super::{WeatherSource, require_key};

pub const PIRATE_WEATHER_BASE_URL: &str = "https://api.pirateweather.net";

/// Pirate Weather (Dark Sky compatible). The key is part of the path.
#[derive(Debug, Clone)]
pub struct PirateWeatherSource {
    api_key: Option<String>,
    http: ApiClient,
    base_url: String,
}

impl PirateWeatherSource {
    pub fn new(http: ApiClient, api_key: Option<String>) -> Self {
        Self {
            api_key,
            http,
            base_url: PIRATE_WEATHER_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct PwCurrently {
    temperature: f64,
    /// Fraction in 0..=1.
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct PwResponse {
    currently: PwCurrently,
}

#[async_trait]
impl WeatherSource for PirateWeatherSource {
    fn name(&self) -> &'static str {
        "Pirate Weather"
    }

    fn needs_coordinates(&self) -> bool {
        true
    }

    async fn observe(
        &self,
        ctx: &FetchContext,
        city: &str,
        coords: &CoordinateCache,
    ) -> Result<Observation, FetchError> {
        let key = require_key(&self.api_key)?;
        let coord = coords.coordinate(ctx, city).await?;
        let url = format!(
            "{}/forecast/{}/{:.4},{:.4}",
            self.base_url, key, coord.latitude, coord.longitude
        );

        let parsed: PwResponse = self.http.get_json(ctx, &url, &[("units", "si")]).await?;

        Ok(Observation {
            temperature_c: parsed.currently.temperature,
            humidity_pct: parsed.currently.humidity.map(|h| h * 100.0),
            condition: parsed.currently.summary,
        })
    }
}
