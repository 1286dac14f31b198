use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::{
    context::FetchContext, error::FetchError, geocode::CoordinateCache, http::ApiClient,
    model::Observation,
};

use super::{HumidityValue, WeatherSource, parse_number};

pub const WTTR_BASE_URL: &str = "https://wttr.in";

/// wttr.in JSON feed; free, no key, city name goes into the path.
#[derive(Debug, Clone)]
pub struct WttrSource {
    http: ApiClient,
    base_url: String,
}

impl WttrSource {
    pub fn new(http: ApiClient) -> Self {
        Self {
            http,
            base_url: WTTR_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn city_url(&self, city: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::Configuration(format!("invalid wttr.in base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Configuration("wttr.in base URL cannot take a path".into()))?
            .pop_if_empty()
            .push(city);
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct WttrDescription {
    value: String,
}

// wttr.in reports every number as a string
#[derive(Debug, Deserialize)]
struct WttrCurrent {
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(default)]
    humidity: Option<HumidityValue>,
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<WttrDescription>,
}

#[derive(Debug, Deserialize)]
struct WttrResponse {
    #[serde(default)]
    current_condition: Vec<WttrCurrent>,
}

#[async_trait]
impl WeatherSource for WttrSource {
    fn name(&self) -> &'static str {
        "wttr.in"
    }

    async fn observe(
        &self,
        ctx: &FetchContext,
        city: &str,
        _coords: &CoordinateCache,
    ) -> Result<Observation, FetchError> {
        let url = self.city_url(city)?;

        let parsed: WttrResponse = self
            .http
            .get_json(ctx, url.as_str(), &[("format", "j1")])
            .await?;

        let current = parsed
            .current_condition
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Decode("no current weather data".into()))?;

        let humidity_pct = current.humidity.as_ref().map(HumidityValue::percent).transpose()?;

        Ok(Observation {
            temperature_c: parse_number(&current.temp_c, "temperature")?,
            humidity_pct,
            condition: current
                .weather_desc
                .into_iter()
                .next()
                .map(|d| d.value)
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn city_is_percent_encoded_into_the_path() {
        let client = ApiClient::new(Duration::from_secs(1)).unwrap();
        let source = WttrSource::new(client).with_base_url("http://localhost:8080/");

        let url = source.city_url("New York").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/New%20York");
    }
}
