use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::{
    context::FetchContext, error::FetchError, http::ApiClient, model::Coordinate,
};

pub const GEOCODING_BASE_URL: &str = "https://geocoding-api.open-meteo.com/v1";

/// Resolves city names to coordinates through the Open-Meteo geocoding API.
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: ApiClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    results: Option<Vec<GeoResult>>,
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    latitude: f64,
    longitude: f64,
}

impl Geocoder {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            base_url: GEOCODING_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Coordinates of the first match for `city`.
    pub async fn resolve(&self, ctx: &FetchContext, city: &str) -> Result<Coordinate, FetchError> {
        let url = format!("{}/search", self.base_url);
        let parsed: GeoResponse = self
            .client
            .get_json(
                ctx,
                &url,
                &[("name", city), ("count", "1"), ("language", "en"), ("format", "json")],
            )
            .await?;

        parsed
            .results
            .and_then(|results| results.into_iter().next())
            .map(|r| Coordinate::new(r.latitude, r.longitude))
            .ok_or_else(|| FetchError::NotFound(city.to_string()))
    }
}

/// Per-run store of geocoding outcomes, filled before fan-out and read-only after.
///
/// A stored failure is replayed to every adapter that asks for the same city;
/// only cities that were never looked up fall through to a fresh lookup.
#[derive(Debug, Clone)]
pub struct CoordinateCache {
    geocoder: Geocoder,
    entries: HashMap<String, Result<Coordinate, FetchError>>,
}

impl CoordinateCache {
    pub fn empty(geocoder: Geocoder) -> Self {
        Self {
            geocoder,
            entries: HashMap::new(),
        }
    }

    /// Looks `city` up once and remembers the outcome, success or not.
    pub async fn prime(geocoder: Geocoder, ctx: &FetchContext, city: &str) -> Self {
        let outcome = geocoder.resolve(ctx, city).await;
        match &outcome {
            Ok(coord) => debug!(city, lat = coord.latitude, lon = coord.longitude, "geocoded"),
            Err(err) => warn!(city, error = %err, "geocoding failed"),
        }
        Self::seeded(geocoder, city, outcome)
    }

    pub fn seeded(
        geocoder: Geocoder,
        city: &str,
        outcome: Result<Coordinate, FetchError>,
    ) -> Self {
        let mut cache = Self::empty(geocoder);
        cache.entries.insert(cache_key(city), outcome);
        cache
    }

    pub fn get(&self, city: &str) -> Option<&Result<Coordinate, FetchError>> {
        self.entries.get(&cache_key(city))
    }

    pub async fn coordinate(&self, ctx: &FetchContext, city: &str) -> Result<Coordinate, FetchError> {
        match self.get(city) {
            Some(outcome) => outcome.clone(),
            None => self.geocoder.resolve(ctx, city).await,
        }
    }
}

fn cache_key(city: &str) -> String {
    city.trim().to_lowercase()
}
