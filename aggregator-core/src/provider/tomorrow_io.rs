use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    codes::WeatherCodeTable, context::FetchContext, error::FetchError, geocode::CoordinateCache,
    http::ApiClient, model::Observation,
};

use super::{WeatherSource, require_key};

pub const TOMORROW_IO_BASE_URL: &str = "https://api.tomorrow.io/v4";

/// Tomorrow.io realtime endpoint; conditions arrive as sparse numeric codes.
#[derive(Debug, Clone)]
pub struct TomorrowIoSource {
    api_key: Option<String>,
    http: ApiClient,
    codes: Arc<WeatherCodeTable>,
    base_url: String,
}

impl TomorrowIoSource {
    pub fn new(http: ApiClient, api_key: Option<String>, codes: Arc<WeatherCodeTable>) -> Self {
        Self {
            api_key,
            http,
            codes,
            base_url: TOMORROW_IO_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TioValues {
    temperature: f64,
    #[serde(default)]
    humidity: Option<f64>,
    weather_code: i64,
}

#[derive(Debug, Deserialize)]
struct TioData {
    values: TioValues,
}

#[derive(Debug, Deserialize)]
struct TioResponse {
    data: TioData,
}

#[async_trait]
impl WeatherSource for TomorrowIoSource {
    fn name(&self) -> &'static str {
        "Tomorrow.io"
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
        let url = format!("{}/weather/realtime", self.base_url);
        let location = format!("{:.4},{:.4}", coord.latitude, coord.longitude);

        let parsed: TioResponse = self
            .http
            .get_json(
                ctx,
                &url,
                &[("location", location.as_str()), ("units", "metric"), ("apikey", key)],
            )
            .await?;

        let values = parsed.data.values;
        Ok(Observation {
            temperature_c: values.temperature,
            humidity_pct: values.humidity,
            condition: self.codes.tomorrow_condition(values.weather_code).to_string(),
        })
    }
}
