use std::{collections::HashMap, fmt};

use crate::{
    codes::{CANONICAL_CONDITIONS, WeatherCodeTable, canonical_rank},
    model::WeatherReading,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consensus {
    /// No readings at all.
    NoData,
    /// Readings exist but every one of them failed.
    NoValidData,
    Condition(String),
}

impl Consensus {
    pub fn label(&self) -> &str {
        match self {
            Consensus::NoData => "No data",
            Consensus::NoValidData => "No valid data",
            Consensus::Condition(c) => c,
        }
    }
}

impl fmt::Display for Consensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reduction of a run's readings.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSummary {
    pub total_count: usize,
    pub valid_count: usize,
    pub avg_temperature_c: f64,
    /// Mean over the valid readings that reported humidity; `None` if none did.
    pub avg_humidity_pct: Option<f64>,
    pub humidity_count: usize,
    pub consensus: Consensus,
}

impl AggregateSummary {
    fn empty(total_count: usize, consensus: Consensus) -> Self {
        Self {
            total_count,
            valid_count: 0,
            avg_temperature_c: 0.0,
            avg_humidity_pct: None,
            humidity_count: 0,
            consensus,
        }
    }
}

pub fn aggregate(readings: &[WeatherReading], table: &WeatherCodeTable) -> AggregateSummary {
    if readings.is_empty() {
        return AggregateSummary::empty(0, Consensus::NoData);
    }

    let valid: Vec<&WeatherReading> = readings.iter().filter(|r| r.is_valid()).collect();
    if valid.is_empty() {
        return AggregateSummary::empty(readings.len(), Consensus::NoValidData);
    }

    let avg_temperature_c =
        valid.iter().map(|r| r.temperature_c).sum::<f64>() / valid.len() as f64;

    let humidities: Vec<f64> = valid.iter().filter_map(|r| r.humidity_pct).collect();
    let avg_humidity_pct = if humidities.is_empty() {
        None
    } else {
        Some(humidities.iter().sum::<f64>() / humidities.len() as f64)
    };

    let mut tally: HashMap<String, usize> = HashMap::new();
    for reading in &valid {
        *tally.entry(table.normalize(&reading.condition)).or_default() += 1;
    }

    AggregateSummary {
        total_count: readings.len(),
        valid_count: valid.len(),
        avg_temperature_c,
        avg_humidity_pct,
        humidity_count: humidities.len(),
        consensus: Consensus::Condition(consensus_label(tally)),
    }
}

/// Most frequent label. Ties go to the label ranked first in
/// [`CANONICAL_CONDITIONS`]; labels outside it rank after all canonical ones and
/// break ties alphabetically, so the result never depends on reading order.
fn consensus_label(tally: HashMap<String, usize>) -> String {
    tally
        .into_iter()
        .min_by(|(a, count_a), (b, count_b)| {
            let rank_a = canonical_rank(a).unwrap_or(CANONICAL_CONDITIONS.len());
            let rank_b = canonical_rank(b).unwrap_or(CANONICAL_CONDITIONS.len());
            count_b
                .cmp(count_a)
                .then(rank_a.cmp(&rank_b))
                .then_with(|| a.cmp(b))
        })
        .map(|(label, _)| label)
        .unwrap_or_default()
}
