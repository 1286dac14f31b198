//! Fan-out of one city query to every selected source, and fan-in of the
//! readings.
//!
//! Both strategies return exactly one reading per source. Failures, including
//! sources that run past the shared deadline, come back as readings with
//! `error` set; nothing here returns `Err`.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    aggregate::{AggregateSummary, aggregate},
    codes::WeatherCodeTable,
    context::FetchContext,
    error::FetchError,
    geocode::{CoordinateCache, Geocoder},
    model::WeatherReading,
    provider::WeatherSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStrategy {
    #[default]
    Concurrent,
    /// One source after another, input order kept. Diagnostic mode.
    Sequential,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchStrategy::Concurrent => "concurrent",
            FetchStrategy::Sequential => "sequential",
        })
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct Report {
    pub city: String,
    pub strategy: FetchStrategy,
    pub readings: Vec<WeatherReading>,
    pub summary: AggregateSummary,
    pub elapsed: Duration,
}

/// Runs one source under the shared context, turning an expired deadline or
/// cancellation into an error reading.
async fn guarded_fetch(
    source: &dyn WeatherSource,
    ctx: &FetchContext,
    city: &str,
    coords: &CoordinateCache,
) -> WeatherReading {
    let start = Instant::now();
    let reading = match ctx.guard(source.fetch(ctx, city, coords)).await {
        Ok(reading) => reading,
        Err(err) => WeatherReading::failure(source.name(), err, start.elapsed()),
    };

    match &reading.error {
        None => debug!(
            source = %reading.source,
            elapsed_ms = reading.duration.as_millis() as u64,
            "reading ok"
        ),
        Some(err) => warn!(source = %reading.source, error = %err, "source failed"),
    }
    reading
}

/// Spawns one task per source and collects the readings as they complete.
pub async fn fetch_concurrently(
    ctx: &FetchContext,
    city: &str,
    sources: &[Arc<dyn WeatherSource>],
    coords: Arc<CoordinateCache>,
) -> Vec<WeatherReading> {
    if sources.is_empty() {
        return Vec::new();
    }

    // room for every worker, so a send never waits on the collector
    let (tx, mut rx) = mpsc::channel::<(usize, WeatherReading)>(sources.len());
    let city: Arc<str> = Arc::from(city);

    for (index, source) in sources.iter().enumerate() {
        let tx = tx.clone();
        let source = Arc::clone(source);
        let ctx = ctx.clone();
        let city = Arc::clone(&city);
        let coords = Arc::clone(&coords);

        tokio::spawn(async move {
            let reading = guarded_fetch(source.as_ref(), &ctx, &city, &coords).await;
            let _ = tx.send((index, reading)).await;
        });
    }
    drop(tx);

    let mut reported = vec![false; sources.len()];
    let mut readings = Vec::with_capacity(sources.len());
    while let Some((index, reading)) = rx.recv().await {
        reported[index] = true;
        readings.push(reading);
    }

    // a worker that panicked dropped its sender without reporting
    for (index, source) in sources.iter().enumerate() {
        if !reported[index] {
            warn!(source = source.name(), "worker ended without a reading");
            readings.push(WeatherReading::failure(
                source.name(),
                FetchError::WorkerLost,
                Duration::ZERO,
            ));
        }
    }

    readings
}

pub async fn fetch_sequentially(
    ctx: &FetchContext,
    city: &str,
    sources: &[Arc<dyn WeatherSource>],
    coords: Arc<CoordinateCache>,
) -> Vec<WeatherReading> {
    let mut readings = Vec::with_capacity(sources.len());
    for source in sources {
        readings.push(guarded_fetch(source.as_ref(), ctx, city, &coords).await);
    }
    readings
}

/// The engine the CLI drives: geocode once, fan out, aggregate.
#[derive(Debug, Clone)]
pub struct WeatherCollector {
    geocoder: Geocoder,
    codes: Arc<WeatherCodeTable>,
    sources: Vec<Arc<dyn WeatherSource>>,
}

impl WeatherCollector {
    pub fn new(
        geocoder: Geocoder,
        codes: Arc<WeatherCodeTable>,
        sources: Vec<Arc<dyn WeatherSource>>,
    ) -> Self {
        Self {
            geocoder,
            codes,
            sources,
        }
    }

    pub fn sources(&self) -> &[Arc<dyn WeatherSource>] {
        &self.sources
    }

    pub fn codes(&self) -> &WeatherCodeTable {
        &self.codes
    }

    /// One reading per source. The city is geocoded at most once, and only
    /// when some source works from coordinates.
    pub async fn collect(
        &self,
        ctx: &FetchContext,
        city: &str,
        strategy: FetchStrategy,
    ) -> Vec<WeatherReading> {
        let coords = if self.sources.iter().any(|s| s.needs_coordinates()) {
            CoordinateCache::prime(self.geocoder.clone(), ctx, city).await
        } else {
            CoordinateCache::empty(self.geocoder.clone())
        };
        let coords = Arc::new(coords);

        match strategy {
            FetchStrategy::Concurrent => fetch_concurrently(ctx, city, &self.sources, coords).await,
            FetchStrategy::Sequential => fetch_sequentially(ctx, city, &self.sources, coords).await,
        }
    }

    pub async fn run(&self, ctx: &FetchContext, city: &str, strategy: FetchStrategy) -> Report {
        info!(city, sources = self.sources.len(), %strategy, "fetching weather");
        let start = Instant::now();

        let readings = self.collect(ctx, city, strategy).await;
        let summary = aggregate(&readings, &self.codes);
        let elapsed = start.elapsed();

        info!(
            city,
            valid = summary.valid_count,
            total = summary.total_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "run complete"
        );

        Report {
            city: city.to_string(),
            strategy,
            readings,
            summary,
            elapsed,
        }
    }
}
