use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    codes::WeatherCodeTable, context::FetchContext, error::FetchError, geocode::CoordinateCache,
    http::ApiClient, model::Observation,
};

use super::WeatherSource;

pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1";

/// Open-Meteo forecast API; free, coordinate based, reports WMO weather codes.
#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    http: ApiClient,
    codes: Arc<WeatherCodeTable>,
    base_url: String,
}

impl OpenMeteoSource {
    pub fn new(http: ApiClient, codes: Arc<WeatherCodeTable>) -> Self {
        Self {
            http,
            codes,
            base_url: OPEN_METEO_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    temperature_2m: f64,
    #[serde(default)]
    relative_humidity_2m: Option<f64>,
    weather_code: i64,
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    current: OmCurrent,
}

#[async_trait]
impl WeatherSource for OpenMeteoSource {
    fn name(&self) -> &'static str {
        "Open-Meteo"
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
        let coord = coords.coordinate(ctx, city).await?;
        let url = format!("{}/forecast", self.base_url);
        let lat = format!("{:.4}", coord.latitude);
        let lon = format!("{:.4}", coord.longitude);

        let parsed: OmResponse = self
            .http
            .get_json(
                ctx,
                &url,
                &[
                    ("latitude", lat.as_str()),
                    ("longitude", lon.as_str()),
                    ("current", "temperature_2m,relative_humidity_2m,weather_code"),
                ],
            )
            .await?;

        Ok(Observation {
            temperature_c: parsed.current.temperature_2m,
            humidity_pct: parsed.current.relative_humidity_2m,
            condition: self.codes.wmo_condition(parsed.current.weather_code).to_string(),
        })
    }
}
