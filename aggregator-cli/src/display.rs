use chrono::Local;
use weather_aggregator_core::{
    AggregateSummary, Config, ProviderId, Report, WeatherCodeTable, WeatherReading,
};

/// Console report: one line per source, then the aggregate.
pub fn report_lines(report: &Report, codes: &WeatherCodeTable) -> Vec<String> {
    let finished = report
        .readings
        .iter()
        .map(|r| r.fetched_at)
        .max()
        .map(|t| t.with_timezone(&Local).format(" at %H:%M:%S").to_string())
        .unwrap_or_default();

    let mut lines = vec![format!(
        "⏱️  Completed in {:.3}s ({}){finished}",
        report.elapsed.as_secs_f64(),
        report.strategy
    )];
    lines.push(String::new());
    lines.extend(report.readings.iter().map(reading_line));
    lines.push(String::new());
    lines.extend(summary_lines(&report.summary, codes));
    lines
}

pub fn reading_line(reading: &WeatherReading) -> String {
    let source = format!("{}:", reading.source);
    let ms = reading.duration.as_secs_f64() * 1000.0;

    match &reading.error {
        Some(err) => format!("❌ {source:<18} ERROR: {err} ({ms:.0}ms)"),
        None => format!(
            "✅ {source:<18} {:.1}°C, {} humidity, {} ({ms:.0}ms)",
            reading.temperature_c,
            reading
                .humidity_pct
                .map(|h| format!("{h:.0}%"))
                .unwrap_or_else(|| "N/A".to_string()),
            reading.condition,
        ),
    }
}

pub fn summary_lines(summary: &AggregateSummary, codes: &WeatherCodeTable) -> Vec<String> {
    let mut lines = vec![format!(
        "📊 Aggregated ({}/{} valid):",
        summary.valid_count, summary.total_count
    )];

    if summary.valid_count == 0 {
        lines.push(format!("→ {}", summary.consensus));
        return lines;
    }

    lines.push(format!("→ Avg Temperature: {:.2}°C", summary.avg_temperature_c));
    lines.push(match summary.avg_humidity_pct {
        Some(h) => format!("→ Avg Humidity:    {h:.1}% ({} sources)", summary.humidity_count),
        None => "→ Avg Humidity:    N/A".to_string(),
    });

    let label = summary.consensus.label();
    lines.push(format!("→ Consensus:       {label} {}", codes.icon_for(label)));
    lines
}

pub fn source_lines(config: &Config) -> Vec<String> {
    ProviderId::all()
        .iter()
        .map(|id| {
            let status = if !id.requires_key() {
                "free"
            } else if config.is_provider_configured(*id) {
                "configured"
            } else {
                "no key"
            };
            format!(
                "{:<14} {:<16} {:<24} {status}",
                id.as_str(),
                id.display_name(),
                id.env_var().unwrap_or("-")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use weather_aggregator_core::{Consensus, FetchError, Observation};

    fn table() -> WeatherCodeTable {
        WeatherCodeTable::from_json_str(include_str!("../../weather_codes.json")).unwrap()
    }

    fn ok(humidity_pct: Option<f64>) -> WeatherReading {
        WeatherReading::from_outcome(
            "wttr.in",
            Ok(Observation {
                temperature_c: 21.04,
                humidity_pct,
                condition: "Sunny".into(),
            }),
            Duration::from_millis(142),
        )
    }

    #[test]
    fn absent_humidity_prints_na() {
        let line = reading_line(&ok(None));
        assert!(line.contains("21.0°C, N/A humidity, Sunny"), "{line}");
        assert!(line.ends_with("(142ms)"));
    }

    #[test]
    fn zero_humidity_is_still_a_value() {
        assert!(reading_line(&ok(Some(0.0))).contains(" 0% humidity"));
    }

    #[test]
    fn failed_reading_shows_error() {
        let reading = WeatherReading::failure(
            "OpenWeather",
            FetchError::missing_api_key(),
            Duration::from_millis(0),
        );
        let line = reading_line(&reading);
        assert!(line.starts_with("❌ OpenWeather:"));
        assert!(line.contains("ERROR: API key required"));
    }

    #[test]
    fn summary_without_valid_data() {
        let summary = AggregateSummary {
            total_count: 3,
            valid_count: 0,
            avg_temperature_c: 0.0,
            avg_humidity_pct: None,
            humidity_count: 0,
            consensus: Consensus::NoValidData,
        };
        assert_eq!(
            summary_lines(&summary, &table()),
            vec!["📊 Aggregated (0/3 valid):", "→ No valid data"]
        );
    }

    #[test]
    fn summary_with_consensus_icon() {
        let summary = AggregateSummary {
            total_count: 2,
            valid_count: 2,
            avg_temperature_c: 18.25,
            avg_humidity_pct: None,
            humidity_count: 0,
            consensus: Consensus::Condition("Rainy".into()),
        };
        let lines = summary_lines(&summary, &table());
        assert_eq!(lines[1], "→ Avg Temperature: 18.25°C");
        assert_eq!(lines[2], "→ Avg Humidity:    N/A");
        assert!(lines[3].starts_with("→ Consensus:       Rainy "));
        assert_eq!(lines[3], format!("→ Consensus:       Rainy {}", table().icon_for("Rainy")));
    }

    #[test]
    fn sources_listing_marks_free_providers() {
        let config = Config::default().with_env_lookup(|_| None);
        let lines = source_lines(&config);
        assert_eq!(lines.len(), ProviderId::all().len());
        assert!(lines[0].starts_with("openmeteo"));
        assert!(lines[0].ends_with("free"));
        assert!(lines.iter().any(|l| l.contains("OPENWEATHER_API_KEY") && l.ends_with("no key")));
    }
}
