//! Weather-code tables and condition normalization.
//!
//! The table is read from `weather_codes.json` once at startup and shared
//! read-only afterwards. It provides:
//! - ordered WMO code ranges (Open-Meteo),
//! - a sparse code table (Tomorrow.io),
//! - keyword lists per canonical condition, used to fold free-text labels
//!   from every provider into a handful of categories.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

pub const UNKNOWN_CONDITION: &str = "Unknown";

pub const FALLBACK_ICON: &str = "🌡️";

/// Canonical categories in matching priority order.
///
/// "Partly Cloudy" precedes "Clear" and "Cloudy": labels such as
/// "Partly cloudy" or "Partly sunny" contain the keywords of both.
pub const CANONICAL_CONDITIONS: [&str; 7] = [
    "Partly Cloudy",
    "Clear",
    "Cloudy",
    "Rainy",
    "Snowy",
    "Foggy",
    "Stormy",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CodeRange {
    pub min: i64,
    pub max: i64,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionInfo {
    pub keywords: Vec<String>,
    pub icon: String,
}

/// Loaded, validated code table.
#[derive(Debug, Clone)]
pub struct WeatherCodeTable {
    wmo_ranges: Vec<CodeRange>,
    tomorrow_codes: HashMap<i64, String>,
    conditions: HashMap<String, ConditionInfo>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    wmo: RawWmo,
    tomorrow_io: HashMap<String, String>,
    conditions: HashMap<String, RawCondition>,
}

#[derive(Debug, Deserialize)]
struct RawWmo {
    ranges: Vec<CodeRange>,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    keywords: Vec<String>,
    #[serde(alias = "emoji", default)]
    icon: String,
}

impl WeatherCodeTable {
    /// Read and validate the table from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read weather code table: {}", path.display()))?;

        Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse weather code table: {}", path.display()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawTable = serde_json::from_str(json).context("Malformed weather code JSON")?;

        if let Some(bad) = raw.wmo.ranges.iter().find(|r| r.min > r.max) {
            return Err(anyhow!(
                "WMO range for '{}' has min {} greater than max {}",
                bad.condition,
                bad.min,
                bad.max
            ));
        }

        let tomorrow_codes = raw
            .tomorrow_io
            .into_iter()
            .map(|(code, label)| {
                code.trim()
                    .parse::<i64>()
                    .map(|c| (c, label))
                    .map_err(|_| anyhow!("Tomorrow.io code '{code}' is not an integer"))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        let conditions = raw
            .conditions
            .into_iter()
            .map(|(label, info)| {
                let keywords = info
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (label, ConditionInfo { keywords, icon: info.icon })
            })
            .collect();

        Ok(Self {
            wmo_ranges: raw.wmo.ranges,
            tomorrow_codes,
            conditions,
        })
    }

    /// First WMO range containing `code`, in file order.
    pub fn wmo_condition(&self, code: i64) -> &str {
        self.wmo_ranges
            .iter()
            .find(|r| (r.min..=r.max).contains(&code))
            .map(|r| r.condition.as_str())
            .unwrap_or(UNKNOWN_CONDITION)
    }

    pub fn tomorrow_condition(&self, code: i64) -> &str {
        self.tomorrow_codes
            .get(&code)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CONDITION)
    }

    /// Folds a provider label into a canonical category, or returns it unchanged
    /// when no keyword matches.
    pub fn normalize(&self, raw: &str) -> String {
        self.canonical_for(raw)
            .map(str::to_string)
            .unwrap_or_else(|| raw.to_string())
    }

    fn canonical_for(&self, raw: &str) -> Option<&'static str> {
        let lower = raw.to_lowercase();

        CANONICAL_CONDITIONS.iter().copied().find(|canonical| {
            self.conditions
                .get(*canonical)
                .is_some_and(|info| info.keywords.iter().any(|k| lower.contains(k.as_str())))
        })
    }

    pub fn icon_for(&self, label: &str) -> &str {
        self.canonical_for(label)
            .and_then(|canonical| self.conditions.get(canonical))
            .map(|info| info.icon.as_str())
            .filter(|icon| !icon.is_empty())
            .unwrap_or(FALLBACK_ICON)
    }

    pub fn condition_info(&self, label: &str) -> Option<&ConditionInfo> {
        self.conditions.get(label)
    }
}

/// Position of `label` in [`CANONICAL_CONDITIONS`], if it is one.
pub fn canonical_rank(label: &str) -> Option<usize> {
    CANONICAL_CONDITIONS.iter().position(|c| *c == label)
}

#[cfg(test)]
pub(crate) fn test_table() -> WeatherCodeTable {
    WeatherCodeTable::from_json_str(include_str!("../../weather_codes.json"))
        .expect("bundled weather_codes.json must parse")
}
