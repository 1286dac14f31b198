use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

use crate::{http::DEFAULT_REQUEST_TIMEOUT, provider::ProviderId};

/// Default overall deadline of one run.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(15);

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Reads one environment variable.
pub type EnvFn = fn(&str) -> Option<String>;

#[derive(Clone, Copy)]
struct EnvLookup(EnvFn);

impl Default for EnvLookup {
    fn default() -> Self {
        EnvLookup(|name| std::env::var(name).ok())
    }
}

impl std::fmt::Debug for EnvLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EnvLookup")
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Per-request HTTP timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Deadline for a whole run in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,

    /// Example TOML:
    /// [providers.weatherapi]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(skip)]
    env: EnvLookup,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-aggregator", "weather-aggregator")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Replace how environment variables are read; the process environment by default.
    pub fn with_env_lookup(mut self, lookup: EnvFn) -> Self {
        self.env = EnvLookup(lookup);
        self
    }

    /// Set or replace a provider API key.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    /// API key for a provider: its environment variable first, then the file.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<String> {
        let from_env = provider_id
            .env_var()
            .and_then(|var| (self.env.0)(var))
            .filter(|key| !key.trim().is_empty());

        from_env.or_else(|| {
            self.providers
                .get(provider_id.as_str())
                .map(|cfg| cfg.api_key.clone())
                .filter(|key| !key.trim().is_empty())
        })
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    /// Per-request timeout, kept below the configured run deadline.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_within(self.deadline())
    }

    /// Per-request timeout for a run bounded by `deadline`. A configured value
    /// at or above the deadline is cut to nine tenths of it.
    pub fn request_timeout_within(&self, deadline: Duration) -> Duration {
        let configured = self
            .request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        if configured < deadline {
            return configured;
        }

        let clamped = deadline * 9 / 10;
        warn!(
            configured_ms = configured.as_millis() as u64,
            deadline_ms = deadline.as_millis() as u64,
            "request timeout not below run deadline, using {}ms",
            clamped.as_millis()
        );
        clamped
    }

    pub fn deadline(&self) -> Duration {
        self.deadline_secs.map(Duration::from_secs).unwrap_or(DEFAULT_DEADLINE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    fn offline() -> Config {
        Config::default().with_env_lookup(|_| None)
    }

    #[test]
    fn set_api_key_for_provider() {
        let mut cfg = offline();

        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "WEATHER_KEY".into());

        let key = cfg.provider_api_key(ProviderId::WeatherApi);
        assert_eq!(key.as_deref(), Some("WEATHER_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::WeatherApi));
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[test]
    fn upsert_replaces_existing_key() {
        let mut cfg = offline();

        cfg.upsert_provider_api_key(ProviderId::Meteosource, "OLD".into());
        cfg.upsert_provider_api_key(ProviderId::Meteosource, "NEW".into());

        assert_eq!(cfg.provider_api_key(ProviderId::Meteosource).as_deref(), Some("NEW"));
    }

    #[test]
    fn environment_wins_over_file() {
        let mut cfg = Config::default().with_env_lookup(|name| {
            (name == "OPENWEATHER_API_KEY").then(|| "FROM_ENV".to_string())
        });
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "FROM_FILE".into());
        cfg.upsert_provider_api_key(ProviderId::Weatherstack, "STACK".into());

        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather).as_deref(), Some("FROM_ENV"));
        assert_eq!(cfg.provider_api_key(ProviderId::Weatherstack).as_deref(), Some("STACK"));
    }

    #[test]
    fn blank_keys_are_not_configured() {
        let mut cfg = Config::default().with_env_lookup(|_| Some("   ".to_string()));
        cfg.upsert_provider_api_key(ProviderId::TomorrowIo, String::new());

        assert!(!cfg.is_provider_configured(ProviderId::TomorrowIo));
    }

    #[test]
    fn free_providers_never_need_keys() {
        let cfg = Config::default().with_env_lookup(|_| Some("X".to_string()));
        assert_eq!(cfg.provider_api_key(ProviderId::OpenMeteo), None);
    }

    #[test]
    fn timeouts_default_and_override() {
        let mut cfg = offline();
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.deadline(), Duration::from_secs(15));

        cfg.request_timeout_secs = Some(3);
        cfg.deadline_secs = Some(5);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.deadline(), Duration::from_secs(5));
    }

    #[test]
    fn request_timeout_stays_below_deadline() {
        let mut cfg = offline();
        cfg.request_timeout_secs = Some(30);
        cfg.deadline_secs = Some(20);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(18));

        cfg.request_timeout_secs = Some(20);
        assert!(cfg.request_timeout() < cfg.deadline());
    }

    #[test]
    fn default_request_timeout_follows_a_short_run_deadline() {
        let cfg = offline();
        assert_eq!(cfg.request_timeout_within(Duration::from_secs(60)), Duration::from_secs(10));
        assert_eq!(
            cfg.request_timeout_within(Duration::from_secs(5)),
            Duration::from_millis(4500)
        );
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = offline();
        cfg.upsert_provider_api_key(ProviderId::PirateWeather, "ARR".into());
        cfg.deadline_secs = Some(20);
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap().with_env_lookup(|_| None);
        assert_eq!(loaded.provider_api_key(ProviderId::PirateWeather).as_deref(), Some("ARR"));
        assert_eq!(loaded.deadline(), Duration::from_secs(20));
        assert_eq!(loaded.request_timeout_secs, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "providers = 3").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
