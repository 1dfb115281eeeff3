use crate::domain::weather::WeatherFeatureRow;
use anyhow::Context;
use chrono::NaiveDate;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub fn feature_csv_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{date}_weather_data_with_forecasts.csv"))
}

pub fn raw_json_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{date}_weather_raw.json"))
}

/// Writes the day's feature rows and the raw hourly response next to each
/// other, keyed by the first row's date. Returns the CSV path.
pub fn persist(dir: &Path, rows: &[WeatherFeatureRow], raw: &Value) -> anyhow::Result<PathBuf> {
    let first = rows.first().context("no feature rows to persist")?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create forecast dir {}", dir.display()))?;

    let csv_path = feature_csv_path(dir, first.date);
    let mut wtr = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("failed to create {}", csv_path.display()))?;
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("failed to write row for {}", row.date))?;
    }
    wtr.flush().context("failed to flush forecast snapshot")?;

    let raw_path = raw_json_path(dir, first.date);
    let file = std::fs::File::create(&raw_path)
        .with_context(|| format!("failed to create {}", raw_path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), raw)
        .context("failed to write raw weather response")?;

    tracing::debug!(path = %csv_path.display(), rows = rows.len(), "weather snapshot written");
    Ok(csv_path)
}
