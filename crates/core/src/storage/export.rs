//! Manual export of the PV forecast table as daily totals with the reserve
//! each total would call for.

use crate::domain::weather::{DailyForecastSummary, ForecastRow};
use crate::reserve::formula::round_percent;
use crate::storage::ForecastDatabase;
use anyhow::Context;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

const GENERATION_SLOPE: f64 = -0.00003;
const GENERATION_OFFSET: f64 = 1.95;

pub fn reserve_for_generation(total_generation: f64) -> i32 {
    round_percent((GENERATION_SLOPE * total_generation + GENERATION_OFFSET) * 100.0)
}

/// Groups rows by calendar date, in date order.
pub fn summarize_by_date(rows: &[ForecastRow]) -> Vec<DailyForecastSummary> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        *totals.entry(row.timestamp.date()).or_insert(0.0) += row.pv_value;
    }

    totals
        .into_iter()
        .map(|(date, total_generation)| DailyForecastSummary {
            date,
            total_generation,
            reserve_percentage: reserve_for_generation(total_generation),
        })
        .collect()
}

pub fn write_csv(summaries: &[DailyForecastSummary], writer: impl Write) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for s in summaries {
        wtr.serialize(s)
            .with_context(|| format!("failed to write summary for {}", s.date))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_csv(summaries: &[DailyForecastSummary], path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(summaries, std::io::BufWriter::new(file))
}

/// Reads the forecast table from `since` onwards and writes the daily
/// summaries to `path`.
pub async fn export_since(
    database: &dyn ForecastDatabase,
    since: NaiveDate,
    path: &Path,
) -> anyhow::Result<Vec<DailyForecastSummary>> {
    let rows = database.forecast_rows_since(since).await?;
    let summaries = summarize_by_date(&rows);
    export_csv(&summaries, path)?;
    tracing::info!(
        %since,
        rows = rows.len(),
        days = summaries.len(),
        path = %path.display(),
        "forecast export written"
    );
    Ok(summaries)
}
