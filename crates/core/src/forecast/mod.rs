pub mod aggregate;
pub mod provider;
pub mod snapshot;
pub mod visual_crossing;

use anyhow::Result;
use serde_json::Value;

pub use aggregate::{aggregate_day, HourWindow};
pub use provider::ForecastProvider;
pub use visual_crossing::{Timeline, TimelineDay, TimelineHour, VisualCrossingClient};

#[async_trait::async_trait]
pub trait WeatherSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Hourly forecast for the configured location, parsed and raw.
    async fn fetch_timeline(&self) -> Result<(Timeline, Value)>;
}
