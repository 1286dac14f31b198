use crate::{
    Config,
    codes::WeatherCodeTable,
    context::FetchContext,
    error::FetchError,
    geocode::CoordinateCache,
    http::ApiClient,
    model::{Observation, WeatherReading},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Instant};

pub mod meteosource;
pub mod open_meteo;
pub mod openweather;
pub mod pirate_weather;
pub mod tomorrow_io;
pub mod weatherapi;
pub mod weatherstack;
pub mod wttr;

pub use meteosource::MeteosourceSource;
pub use open_meteo::OpenMeteoSource;
pub use openweather::OpenWeatherSource;
pub use pirate_weather::PirateWeatherSource;
pub use tomorrow_io::TomorrowIoSource;
pub use weatherapi::WeatherApiSource;
pub use weatherstack::WeatherstackSource;
pub use wttr::WttrSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    Wttr,
    WeatherApi,
    Weatherstack,
    Meteosource,
    PirateWeather,
    TomorrowIo,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "openmeteo",
            ProviderId::Wttr => "wttrin",
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::Weatherstack => "weatherstack",
            ProviderId::Meteosource => "meteosource",
            ProviderId::PirateWeather => "pirateweather",
            ProviderId::TomorrowIo => "tomorrowio",
            ProviderId::OpenWeather => "openweather",
        }
    }

    /// Name the adapter reports in its readings.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "Open-Meteo",
            ProviderId::Wttr => "wttr.in",
            ProviderId::WeatherApi => "WeatherAPI.com",
            ProviderId::Weatherstack => "Weatherstack",
            ProviderId::Meteosource => "Meteosource",
            ProviderId::PirateWeather => "Pirate Weather",
            ProviderId::TomorrowIo => "Tomorrow.io",
            ProviderId::OpenWeather => "OpenWeather",
        }
    }

    /// Environment variable holding the API key, for key-gated providers.
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            ProviderId::OpenMeteo | ProviderId::Wttr => None,
            ProviderId::WeatherApi => Some("WEATHER_API_COM_KEY"),
            ProviderId::Weatherstack => Some("WEATHERSTACK_API_KEY"),
            ProviderId::Meteosource => Some("METEOSOURCE_API_KEY"),
            ProviderId::PirateWeather => Some("PIRATE_WEATHER_API_KEY"),
            ProviderId::TomorrowIo => Some("TOMORROW_IO_API_KEY"),
            ProviderId::OpenWeather => Some("OPENWEATHER_API_KEY"),
        }
    }

    pub fn requires_key(&self) -> bool {
        self.env_var().is_some()
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenMeteo,
            ProviderId::Wttr,
            ProviderId::WeatherApi,
            ProviderId::Weatherstack,
            ProviderId::Meteosource,
            ProviderId::PirateWeather,
            ProviderId::TomorrowIo,
            ProviderId::OpenWeather,
        ]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let wanted = normalize_source_name(value);

        ProviderId::all()
            .iter()
            .copied()
            .find(|id| {
                id.as_str() == wanted || normalize_source_name(id.display_name()) == wanted
            })
            .ok_or_else(|| {
                let known: Vec<&str> = ProviderId::all().iter().map(|id| id.as_str()).collect();
                anyhow::anyhow!(
                    "Unknown provider '{value}'. Supported providers: {}.",
                    known.join(", ")
                )
            })
    }
}

/// One upstream weather API.
///
/// Implementors provide [`observe`](WeatherSource::observe); callers use
/// [`fetch`](WeatherSource::fetch), which never fails and always times the attempt.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Whether the adapter queries by coordinates rather than by city name.
    fn needs_coordinates(&self) -> bool {
        false
    }

    async fn observe(
        &self,
        ctx: &FetchContext,
        city: &str,
        coords: &CoordinateCache,
    ) -> Result<Observation, FetchError>;

    async fn fetch(
        &self,
        ctx: &FetchContext,
        city: &str,
        coords: &CoordinateCache,
    ) -> WeatherReading {
        let start = Instant::now();
        let outcome = self.observe(ctx, city, coords).await;
        WeatherReading::from_outcome(self.name(), outcome, start.elapsed())
    }
}

/// Lower-cases and strips everything but letters and digits, so
/// "Open-Meteo", "open meteo" and "OPENMETEO" compare equal.
pub fn normalize_source_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Drops every source whose name matches one of `excluded`.
pub fn exclude_sources<S: AsRef<str>>(
    sources: Vec<Arc<dyn WeatherSource>>,
    excluded: &[S],
) -> Vec<Arc<dyn WeatherSource>> {
    let excluded: Vec<String> = excluded
        .iter()
        .map(|name| normalize_source_name(name.as_ref()))
        .filter(|name| !name.is_empty())
        .collect();

    if excluded.is_empty() {
        return sources;
    }

    sources
        .into_iter()
        .filter(|source| !excluded.contains(&normalize_source_name(source.name())))
        .collect()
}

/// Short-circuits key-gated adapters that were configured without credentials.
pub(crate) fn require_key(api_key: &Option<String>) -> Result<&str, FetchError> {
    match api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(FetchError::missing_api_key()),
    }
}

/// Humidity as some providers send it: a number or a string such as `"65%"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum HumidityValue {
    Number(f64),
    Text(String),
}

impl HumidityValue {
    pub(crate) fn percent(&self) -> Result<f64, FetchError> {
        match self {
            HumidityValue::Number(n) => Ok(*n),
            HumidityValue::Text(s) => parse_number(s.trim().trim_end_matches('%'), "humidity"),
        }
    }
}

pub(crate) fn parse_number(raw: &str, field: &str) -> Result<f64, FetchError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| FetchError::Decode(format!("{field} is not a number: {raw:?}")))
}

/// What every adapter constructor needs besides its key.
#[derive(Debug, Clone)]
pub struct ProviderDeps {
    pub client: ApiClient,
    pub codes: Arc<WeatherCodeTable>,
}

/// Construct a provider from config and explicit ProviderId.
///
/// Key-gated providers without a key are still built; their readings report
/// "API key required" without touching the network.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
    deps: &ProviderDeps,
) -> Arc<dyn WeatherSource> {
    let key = config.provider_api_key(id);
    let client = deps.client.clone();

    match id {
        ProviderId::OpenMeteo => Arc::new(OpenMeteoSource::new(client, Arc::clone(&deps.codes))),
        ProviderId::Wttr => Arc::new(WttrSource::new(client)),
        ProviderId::WeatherApi => Arc::new(WeatherApiSource::new(client, key)),
        ProviderId::Weatherstack => Arc::new(WeatherstackSource::new(client, key)),
        ProviderId::Meteosource => Arc::new(MeteosourceSource::new(client, key)),
        ProviderId::PirateWeather => Arc::new(PirateWeatherSource::new(client, key)),
        ProviderId::TomorrowIo => {
            Arc::new(TomorrowIoSource::new(client, key, Arc::clone(&deps.codes)))
        }
        ProviderId::OpenWeather => Arc::new(OpenWeatherSource::new(client, key)),
    }
}

/// Providers enabled by `config`: free ones always, key-gated ones when a key
/// is present (or all of them with `include_unconfigured`).
pub fn enabled_providers(config: &Config, include_unconfigured: bool) -> Vec<ProviderId> {
    ProviderId::all()
        .iter()
        .copied()
        .filter(|id| {
            !id.requires_key() || include_unconfigured || config.is_provider_configured(*id)
        })
        .collect()
}

pub fn sources_from_config(
    config: &Config,
    deps: &ProviderDeps,
    include_unconfigured: bool,
) -> Vec<Arc<dyn WeatherSource>> {
    enabled_providers(config, include_unconfigured)
        .into_iter()
        .map(|id| provider_from_config(id, config, deps))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codes::test_table, config::Config};
    use std::time::Duration;

    fn deps() -> ProviderDeps {
        ProviderDeps {
            client: ApiClient::new(Duration::from_secs(1)).unwrap(),
            codes: Arc::new(test_table()),
        }
    }

    fn offline_config() -> Config {
        Config::default().with_env_lookup(|_| None)
    }

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let parsed = ProviderId::try_from(id.as_str()).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_accepts_display_names() {
        assert_eq!(ProviderId::try_from("Open-Meteo").unwrap(), ProviderId::OpenMeteo);
        assert_eq!(ProviderId::try_from("WeatherAPI.com").unwrap(), ProviderId::WeatherApi);
        assert_eq!(ProviderId::try_from("pirate weather").unwrap(), ProviderId::PirateWeather);
        assert_eq!(ProviderId::try_from("WTTR.IN").unwrap(), ProviderId::Wttr);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn source_names_normalize() {
        assert_eq!(normalize_source_name("Open-Meteo"), "openmeteo");
        assert_eq!(normalize_source_name("open meteo"), "openmeteo");
        assert_eq!(normalize_source_name("OPENMETEO"), "openmeteo");
        assert_eq!(normalize_source_name("wttr.in"), "wttrin");
    }

    #[test]
    fn exclusion_ignores_case_and_punctuation() {
        let config = offline_config();
        let sources = sources_from_config(&config, &deps(), false);
        assert_eq!(sources.len(), 2);

        let remaining = exclude_sources(sources, &["open-meteo"]);
        let names: Vec<_> = remaining.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["wttr.in"]);
    }

    #[test]
    fn empty_exclusions_keep_everything() {
        let sources = sources_from_config(&offline_config(), &deps(), true);
        let remaining = exclude_sources(sources, &["", " , "]);
        assert_eq!(remaining.len(), ProviderId::all().len());
    }

    #[test]
    fn unconfigured_key_providers_are_skipped_by_default() {
        let mut config = offline_config();
        config.upsert_provider_api_key(ProviderId::Meteosource, "KEY".to_string());

        let ids = enabled_providers(&config, false);
        assert_eq!(
            ids,
            vec![ProviderId::OpenMeteo, ProviderId::Wttr, ProviderId::Meteosource]
        );
        assert_eq!(enabled_providers(&config, true).len(), ProviderId::all().len());
    }

    #[test]
    fn built_sources_report_display_names() {
        let sources = sources_from_config(&offline_config(), &deps(), true);
        for (source, id) in sources.iter().zip(ProviderId::all()) {
            assert_eq!(source.name(), id.display_name());
        }
    }

    #[test]
    fn humidity_accepts_numbers_and_percent_strings() {
        assert_eq!(HumidityValue::Number(71.0).percent(), Ok(71.0));
        assert_eq!(HumidityValue::Text("65%".into()).percent(), Ok(65.0));
        assert_eq!(HumidityValue::Text(" 40 ".into()).percent(), Ok(40.0));
        assert!(matches!(
            HumidityValue::Text("humid".into()).percent(),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn blank_keys_count_as_missing() {
        assert_eq!(require_key(&None), Err(FetchError::missing_api_key()));
        assert_eq!(require_key(&Some("  ".into())), Err(FetchError::missing_api_key()));
        assert_eq!(require_key(&Some("abc".into())), Ok("abc"));
    }

    #[tokio::test]
    async fn missing_key_short_circuits_before_network() {
        let config = offline_config();
        let source = provider_from_config(ProviderId::WeatherApi, &config, &deps());
        let ctx = FetchContext::with_timeout(Duration::from_secs(5));
        let geocoder =
            crate::geocode::Geocoder::new(deps().client).with_base_url("http://127.0.0.1:9");
        let coords = CoordinateCache::empty(geocoder);

        let reading = source.fetch(&ctx, "Berlin", &coords).await;

        assert_eq!(reading.source, "WeatherAPI.com");
        assert_eq!(reading.error, Some(FetchError::missing_api_key()));
    }
}
