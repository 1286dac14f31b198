use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use tracing::warn;
use weather_aggregator_core::{
    ApiClient, Config, FetchContext, FetchStrategy, Geocoder, ProviderDeps, ProviderId,
    WeatherCodeTable, WeatherCollector,
    provider::{exclude_sources, sources_from_config},
};

use crate::display;

const MAX_CITY_LEN: usize = 100;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weather-aggregator",
    version,
    about = "Current weather for a city, aggregated across several providers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the current weather for a city from every enabled source.
    Show(ShowArgs),

    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: String,
    },

    /// List providers and whether each one has a key.
    Sources,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// City name; several words are joined with spaces.
    #[arg(long, required = true, num_args = 1..)]
    pub city: Vec<String>,

    /// Fetch one source after another instead of all at once.
    #[arg(long)]
    pub sequential: bool,

    /// Comma-separated source names to skip, e.g. "wttr.in,WeatherAPI.com".
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Also query key-gated providers that have no key configured.
    #[arg(long)]
    pub all_sources: bool,

    /// Deadline for the whole run, in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Weather code mapping file.
    #[arg(long, env = "WEATHER_CODES_PATH", default_value = "weather_codes.json")]
    pub codes: PathBuf,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Show(args) => show(args).await,
            Command::Configure { provider } => configure(&provider),
            Command::Sources => list_sources(),
        }
    }
}

/// Trims `raw` and checks it looks like a place name.
pub fn validate_city(raw: &str) -> Result<String> {
    let city = raw.trim();

    if city.is_empty() {
        bail!("city name is required and cannot be empty");
    }
    if city.starts_with('-') {
        bail!("city name cannot start with '-'");
    }
    if city.chars().count() > MAX_CITY_LEN {
        bail!("city name must not exceed {MAX_CITY_LEN} characters");
    }
    if !city.chars().all(is_city_char) {
        bail!(
            "invalid city name {city:?}. Allowed: letters (ü, é, ñ), digits, spaces, \
             hyphens, apostrophes, periods"
        );
    }

    Ok(city.to_string())
}

fn is_city_char(c: char) -> bool {
    c.is_alphabetic()
        || c.is_ascii_digit()
        || c.is_whitespace()
        || matches!(c, '_' | '\'' | '.')
        || is_dash(c)
}

// Unicode dash punctuation
fn is_dash(c: char) -> bool {
    matches!(
        c,
        '-' | '\u{058A}'
            | '\u{05BE}'
            | '\u{1400}'
            | '\u{1806}'
            | '\u{2010}'..='\u{2015}'
            | '\u{2E17}'
            | '\u{2E1A}'
            | '\u{2E3A}'
            | '\u{2E3B}'
            | '\u{2E40}'
            | '\u{301C}'
            | '\u{3030}'
            | '\u{30A0}'
            | '\u{FE31}'
            | '\u{FE32}'
            | '\u{FE58}'
            | '\u{FE63}'
            | '\u{FF0D}'
    )
}

async fn show(args: ShowArgs) -> Result<()> {
    let city = validate_city(&args.city.join(" "))?;

    let codes = WeatherCodeTable::load(&args.codes).context("Error loading weather codes")?;
    let codes = Arc::new(codes);

    let config = Config::load()?;
    let deadline = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.deadline());
    let client = ApiClient::new(config.request_timeout_within(deadline))
        .context("Failed to build HTTP client")?;
    let deps = ProviderDeps {
        client: client.clone(),
        codes: Arc::clone(&codes),
    };

    let sources = exclude_sources(
        sources_from_config(&config, &deps, args.all_sources),
        args.exclude.as_slice(),
    );
    if sources.is_empty() {
        bail!("All sources were excluded");
    }

    let strategy = if args.sequential {
        FetchStrategy::Sequential
    } else {
        FetchStrategy::Concurrent
    };
    let ctx = FetchContext::with_timeout(deadline);
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling outstanding requests");
            interrupt.cancel();
        }
    });

    let collector = WeatherCollector::new(Geocoder::new(client), codes, sources);
    println!("🌍 {city} | Fetching from {} sources...", collector.sources().len());

    let report = collector.run(&ctx, &city, strategy).await;

    for line in display::report_lines(&report, collector.codes()) {
        println!("{line}");
    }

    Ok(())
}

fn configure(provider: &str) -> Result<()> {
    let id = ProviderId::try_from(provider)?;

    if !id.requires_key() {
        println!("{} does not need an API key.", id.display_name());
        return Ok(());
    }

    let key = Password::new(&format!("{} API key:", id.display_name()))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let key = key.trim();
    if key.is_empty() {
        bail!("API key cannot be empty");
    }

    let mut config = Config::load()?;
    config.upsert_provider_api_key(id, key.to_string());
    config.save()?;

    println!(
        "Saved API key for {} to {}",
        id.display_name(),
        Config::config_file_path()?.display()
    );
    if let Some(var) = id.env_var().filter(|var| std::env::var(var).is_ok()) {
        println!("Note: {var} is set and takes precedence over the saved key.");
    }

    Ok(())
}

fn list_sources() -> Result<()> {
    let config = Config::load()?;

    for line in display::source_lines(&config) {
        println!("{line}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn accepts_common_city_names() {
        let cities = [
            "Berlin",
            "New York",
            "O'Brien",
            "St. Louis",
            "Zürich",
            "Baden-Baden",
            "São Paulo",
        ];
        for city in cities {
            assert_eq!(validate_city(city).unwrap(), city);
        }
        assert_eq!(validate_city("Aix\u{2013}en\u{2013}Provence").unwrap(), "Aix–en–Provence");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(validate_city("  Paris \t").unwrap(), "Paris");
    }

    #[test]
    fn rejects_empty_and_flag_like_names() {
        assert!(validate_city("   ").is_err());
        assert!(validate_city("-Berlin").is_err());
    }

    #[test]
    fn rejects_overlong_names() {
        let long = "a".repeat(101);
        assert!(validate_city(&long).is_err());
        assert!(validate_city(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn rejects_shell_and_url_characters() {
        for city in ["Berlin;rm", "a/b", "Paris?x=1", "Tokyo&", "<script>"] {
            assert!(validate_city(city).is_err(), "{city} should be rejected");
        }
    }

    #[test]
    fn show_joins_city_words_and_splits_exclusions() {
        let cli = Cli::try_parse_from([
            "weather-aggregator",
            "show",
            "--city",
            "New",
            "York",
            "--exclude",
            "wttr.in,WeatherAPI.com",
            "--sequential",
        ])
        .unwrap();

        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.city.join(" "), "New York");
        assert_eq!(args.exclude, vec!["wttr.in", "WeatherAPI.com"]);
        assert!(args.sequential);
        assert!(!args.all_sources);
        assert_eq!(args.timeout, None);
    }

    #[test]
    fn show_requires_a_city() {
        assert!(Cli::try_parse_from(["weather-aggregator", "show"]).is_err());
    }
}
