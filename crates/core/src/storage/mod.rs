pub mod export;
pub mod postgres;

use crate::domain::weather::ForecastRow;
use chrono::NaiveDate;

pub use postgres::PgForecastDatabase;

/// Read-only access to the PV forecast table. Implementations must not hold a
/// connection open between calls.
#[async_trait::async_trait]
pub trait ForecastDatabase: Send + Sync {
    async fn check_connection(&self) -> anyhow::Result<()>;

    /// Rows with a timestamp after midnight starting `date`.
    async fn forecast_rows_since(&self, date: NaiveDate) -> anyhow::Result<Vec<ForecastRow>>;
}
