//! Core library for the `weather-aggregator` CLI.
//!
//! This crate defines:
//! - Source adapters for several weather APIs behind one trait
//! - Concurrent and sequential fetch orchestration under a shared deadline
//! - Condition normalization and aggregation into a consensus reading
//! - Configuration & credentials handling
//!
//! It is used by `weather-aggregator`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod codes;
pub mod config;
pub mod context;
pub mod error;
pub mod geocode;
pub mod http;
pub mod model;
pub mod orchestrator;
pub mod provider;

pub use aggregate::{AggregateSummary, Consensus, aggregate};
pub use codes::WeatherCodeTable;
pub use config::{Config, ProviderConfig};
pub use context::FetchContext;
pub use error::FetchError;
pub use geocode::{CoordinateCache, Geocoder};
pub use http::ApiClient;
pub use model::{Coordinate, Observation, WeatherReading};
pub use orchestrator::{FetchStrategy, Report, WeatherCollector};
pub use provider::{ProviderDeps, ProviderId, WeatherSource};
