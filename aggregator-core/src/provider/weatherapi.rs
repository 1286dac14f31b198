use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    context::FetchContext, error::FetchError, geocode::CoordinateCache, http::ApiClient,
    model::Observation,
};

use super::{WeatherSource, require_key};

pub const WEATHERAPI_BASE_URL: &str = "https://api.weatherapi.com/v1";

/// WeatherAPI.com current conditions, queried by city name.
#[derive(Debug, Clone)]
pub struct WeatherApiSource {
    api_key: Option<String>,
    http: ApiClient,
    base_url: String,
}

impl WeatherApiSource {
    pub fn new(http: ApiClient, api_key: Option<String>) -> Self {
        Self {
            api_key,
            http,
            base_url: WEATHERAPI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    #[serde(default)]
    humidity: Option<f64>,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    current: WaCurrent,
}

#[async_trait]
impl WeatherSource for WeatherApiSource {
    fn name(&self) -> &'static str {
        "WeatherAPI.com"
    }

    async fn observe(
        &self,
        ctx: &FetchContext,
        city: &str,
        _coords: &CoordinateCache,
    ) -> Result<Observation, FetchError> {
        let key = require_key(&self.api_key)?;
        let url = format!("{}/current.json", self.base_url);

        let parsed: WaResponse = self
            .http
            .get_json(ctx, &url, &[("key", key), ("q", city)])
            .await?;

        Ok(Observation {
            temperature_c: parsed.current.temp_c,
            humidity_pct: parsed.current.humidity,
            condition: parsed.current.condition.text,
        })
    }
}
