use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FetchError;

/// Latitude/longitude of a resolved city.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Measurements a provider returned, already mapped into common units.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub temperature_c: f64,
    /// `None` when the provider did not report humidity at all.
    pub humidity_pct: Option<f64>,
    pub condition: String,
}

/// Outcome of one source's fetch attempt.
///
/// When `error` is set the measurement fields carry no meaning and are skipped
/// by aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    pub source: String,
    pub temperature_c: f64,
    pub humidity_pct: Option<f64>,
    pub condition: String,
    pub error: Option<FetchError>,
    pub duration: Duration,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherReading {
    pub fn from_outcome(
        source: impl Into<String>,
        outcome: Result<Observation, FetchError>,
        duration: Duration,
    ) -> Self {
        match outcome {
            Ok(obs) => Self {
                source: source.into(),
                temperature_c: obs.temperature_c,
                humidity_pct: obs.humidity_pct,
                condition: obs.condition,
                error: None,
                duration,
                fetched_at: Utc::now(),
            },
            Err(err) => Self::failure(source, err, duration),
        }
    }

    pub fn failure(source: impl Into<String>, error: FetchError, duration: Duration) -> Self {
        Self {
            source: source.into(),
            temperature_c: 0.0,
            humidity_pct: None,
            condition: String::new(),
            error: Some(error),
            duration,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_outcome_keeps_measurements() {
        let obs = Observation {
            temperature_c: 12.5,
            humidity_pct: Some(0.0),
            condition: "Clear".into(),
        };
        let reading = WeatherReading::from_outcome("A", Ok(obs), Duration::from_millis(5));

        assert!(reading.is_valid());
        assert_eq!(reading.temperature_c, 12.5);
        assert_eq!(reading.humidity_pct, Some(0.0));
        assert_eq!(reading.duration, Duration::from_millis(5));
    }

    #[test]
    fn failed_outcome_reports_no_humidity() {
        let reading = WeatherReading::from_outcome(
            "B",
            Err(FetchError::missing_api_key()),
            Duration::ZERO,
        );

        assert!(!reading.is_valid());
        assert_eq!(reading.humidity_pct, None);
        assert_eq!(reading.error, Some(FetchError::missing_api_key()));
    }
}
