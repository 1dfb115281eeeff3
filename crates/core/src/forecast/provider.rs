use crate::domain::weather::WeatherFeatureRow;
use crate::forecast::{aggregate_day, snapshot, HourWindow, WeatherSource};
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

/// Turns the weather timeline into the day's feature row and keeps a dated
/// copy on disk for reconciling against actual generation later.
#[derive(Clone)]
pub struct ForecastProvider {
    source: Arc<dyn WeatherSource>,
    window: HourWindow,
    snapshot_dir: PathBuf,
}

impl ForecastProvider {
    pub fn new(source: Arc<dyn WeatherSource>, window: HourWindow, snapshot_dir: PathBuf) -> Self {
        Self {
            source,
            window,
            snapshot_dir,
        }
    }

    /// Aggregates every forecast day; the first one is today.
    pub async fn fetch_today(&self) -> anyhow::Result<WeatherFeatureRow> {
        let (timeline, raw) = self
            .source
            .fetch_timeline()
            .await
            .with_context(|| format!("{} forecast fetch failed", self.source.source_name()))?;

        let rows: Vec<WeatherFeatureRow> = timeline
            .days
            .iter()
            .map(|day| aggregate_day(day, self.window))
            .collect();
        anyhow::ensure!(!rows.is_empty(), "weather response contained no days");

        snapshot::persist(&self.snapshot_dir, &rows, &raw)?;

        let today = rows.into_iter().next().context("weather response contained no days")?;
        tracing::info!(
            date = %today.date,
            solar_energy = today.cumulative_solar_energy,
            cloud_cover = today.average_cloud_cover,
            window_start = self.window.start,
            window_end = self.window.end,
            "forecast features computed"
        );
        Ok(today)
    }
}
