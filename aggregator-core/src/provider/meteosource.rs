use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    context::FetchContext, error::FetchError, geocode::CoordinateCache, http::ApiClient,
    model::Observation,
};

use super::{HumidityValue, WeatherSource, require_key};

pub const METEOSOURCE_BASE_URL: &str = "https://www.meteosource.com/api/v1/free";

/// Meteosource point forecast. The free tier sometimes omits humidity or
/// sends it as a `"NN%"` string.
#[derive(Debug, Clone)]
pub struct MeteosourceSource {
    api_key: Option<String>,
    http: ApiClient,
    base_url: String,
}

impl MeteosourceSource {
    pub fn new(http: ApiClient, api_key: Option<String>) -> Self {
        Self {
            api_key,
            http,
            base_url: METEOSOURCE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct MsCurrent {
    temperature: f64,
    #[serde(default)]
    humidity: Option<HumidityValue>,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct MsResponse {
    current: MsCurrent,
}

#[async_trait]
impl WeatherSource for MeteosourceSource {
    fn name(&self) -> &'static str {
        "Meteosource"
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
        let url = format!("{}/point", self.base_url);
        let lat = format!("{:.4}", coord.latitude);
        let lon = format!("{:.4}", coord.longitude);

        let parsed: MsResponse = self
            .http
            .get_json(
                ctx,
                &url,
                &[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("sections", "current"),
                    ("language", "en"),
                    ("units", "metric"),
                    ("key", key),
                ],
            )
            .await?;

        let humidity_pct = parsed
            .current
            .humidity
            .as_ref()
            .map(HumidityValue::percent)
            .transpose()?;

        Ok(Observation {
            temperature_c: parsed.current.temperature,
            humidity_pct,
            condition: parsed.current.summary,
        })
    }
}
