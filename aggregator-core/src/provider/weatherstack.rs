use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    context::FetchContext, error::FetchError, geocode::CoordinateCache, http::ApiClient,
    model::Observation,
};

use super::{WeatherSource, require_key};

// the free tier only serves plain HTTP
pub const WEATHERSTACK_BASE_URL: &str = "http://api.weatherstack.com";

#[derive(Debug, Clone)]
pub struct WeatherstackSource {
    api_key: Option<String>,
    http: ApiClient,
    base_url: String,
}

impl WeatherstackSource {
    pub fn new(http: ApiClient, api_key: Option<String>) -> Self {
        Self {
            api_key,
            http,
            base_url: WEATHERSTACK_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct WsCurrent {
    temperature: f64,
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(default)]
    weather_descriptions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WsResponse {
    current: WsCurrent,
}

#[async_trait]
impl WeatherSource for WeatherstackSource {
    fn name(&self) -> &'static str {
        "Weatherstack"
    }

    async fn observe(
        &self,
        ctx: &FetchContext,
        city: &str,
        _coords: &CoordinateCache,
    ) -> Result<Observation, FetchError> {
        let key = require_key(&self.api_key)?;
        let url = format!("{}/current", self.base_url);

        let parsed: WsResponse = self
            .http
            .get_json(ctx, &url, &[("access_key", key), ("query", city)])
            .await?;

        Ok(Observation {
            temperature_c: parsed.current.temperature,
            humidity_pct: parsed.current.humidity,
            condition: parsed
                .current
                .weather_descriptions
                .into_iter()
                .next()
                .unwrap_or_default(),
        })
    }
}
