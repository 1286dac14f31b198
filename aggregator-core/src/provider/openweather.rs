use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    context::FetchContext, error::FetchError, geocode::CoordinateCache, http::ApiClient,
    model::Observation,
};

use super::{WeatherSource, require_key};

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    api_key: Option<String>,
    http: ApiClient,
    base_url: String,
}

impl OpenWeatherSource {
    pub fn new(http: ApiClient, api_key: Option<String>) -> Self {
        Self {
            api_key,
            http,
            base_url: OPENWEATHER_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[async_trait]
impl WeatherSource for OpenWeatherSource {
    fn name(&self) -> &'static str {
        "OpenWeather"
    }

    async fn observe(
        &self,
        ctx: &FetchContext,
        city: &str,
        _coords: &CoordinateCache,
    ) -> Result<Observation, FetchError> {
        let key = require_key(&self.api_key)?;
        let url = format!("{}/weather", self.base_url);

        let parsed: OwCurrentResponse = self
            .http
            .get_json(ctx, &url, &[("q", city), ("appid", key), ("units", "metric")])
            .await?;

        let condition = parsed
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .unwrap_or_default();

        Ok(Observation {
            temperature_c: parsed.main.temp,
            humidity_pct: parsed.main.humidity,
            condition,
        })
    }
}
