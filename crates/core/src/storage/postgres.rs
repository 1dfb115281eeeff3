use crate::config::Settings;
use crate::domain::weather::ForecastRow;
use crate::storage::ForecastDatabase;
use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::postgres::PgConnection;
use sqlx::Connection;

/// Opens a fresh connection per call and closes it before returning, so
/// nothing sits idle across the loop's long sleeps.
#[derive(Debug, Clone)]
pub struct PgForecastDatabase {
    database_url: String,
    table: String,
}

impl PgForecastDatabase {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let database_url = settings.require_database_url()?.to_string();
        validate_table_name(&settings.forecast_table)?;
        Ok(Self {
            database_url,
            table: settings.forecast_table.clone(),
        })
    }

    async fn connect(&self) -> anyhow::Result<PgConnection> {
        PgConnection::connect(&self.database_url)
            .await
            .context("connect DATABASE_URL failed")
    }
}

#[async_trait::async_trait]
impl ForecastDatabase for PgForecastDatabase {
    async fn check_connection(&self) -> anyhow::Result<()> {
        let mut conn = self.connect().await?;
        let ping = conn.ping().await.context("database ping failed");
        let _ = conn.close().await;
        ping?;
        tracing::info!("database connectivity is true");
        Ok(())
    }

    async fn forecast_rows_since(&self, date: NaiveDate) -> anyhow::Result<Vec<ForecastRow>> {
        let since = date.and_hms_opt(0, 0, 0).context("invalid forecast start date")?;
        let sql = format!("SELECT ts, pv FROM {} WHERE ts > $1 ORDER BY ts ASC", self.table);

        let mut conn = self.connect().await?;
        let rows = sqlx::query_as::<_, (NaiveDateTime, f64)>(&sql)
            .persistent(false)
            .bind(since)
            .fetch_all(&mut conn)
            .await
            .with_context(|| format!("select from {} failed", self.table));
        let _ = conn.close().await;

        Ok(rows?
            .into_iter()
            .map(|(timestamp, pv_value)| ForecastRow {
                timestamp,
                pv_value,
            })
            .collect())
    }
}

/// The table name is interpolated into SQL, so only plain identifiers
/// (optionally schema-qualified) are accepted.
fn validate_table_name(name: &str) -> anyhow::Result<()> {
    anyhow::ensure!(!name.is_empty(), "FORECAST_TABLE must be non-empty");
    for part in name.split('.') {
        let mut chars = part.chars();
        let first_ok = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        anyhow::ensure!(
            first_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "FORECAST_TABLE is not a valid identifier: {name}"
        );
    }
    Ok(())
}
