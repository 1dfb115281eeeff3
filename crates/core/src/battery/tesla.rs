use crate::battery::BatteryClient;
use crate::config::Settings;
use crate::domain::battery::BatterySnapshot;
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;

const DEFAULT_BASE_URL: &str = "https://owner-api.teslamotors.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Powerwall energy site reached through the Tesla owner API.
#[derive(Debug)]
pub struct TeslaEnergyClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    site_id: OnceCell<u64>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct Product {
    energy_site_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LiveStatus {
    timestamp: DateTime<FixedOffset>,
    percentage_charged: f64,
    /// Watts; positive while the battery discharges.
    battery_power: f64,
    load_power: f64,
}

#[derive(Debug, Deserialize)]
struct SiteInfo {
    backup_reserve_percent: f64,
}

#[derive(Debug, Serialize)]
struct BackupRequest {
    backup_reserve_percent: u8,
}

impl TeslaEnergyClient {
    /// Builds the client without touching the network. When no site id is
    /// configured, the first energy site on the account is looked up on the
    /// first device call.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let access_token = settings.require_tesla_access_token()?.to_string();
        let base_url = settings
            .tesla_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("TESLA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build Tesla http client")?;

        Ok(Self {
            http,
            base_url,
            access_token,
            site_id: OnceCell::new_with(settings.tesla_energy_site_id),
        })
    }

    async fn energy_site_id(&self) -> Result<u64> {
        self.site_id
            .get_or_try_init(|| async {
                let id = self.discover_energy_site().await?;
                tracing::info!(energy_site_id = id, "using Tesla energy site");
                Ok::<_, anyhow::Error>(id)
            })
            .await
            .copied()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.access_token))?,
        );
        Ok(headers)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .send()
            .await
            .with_context(|| format!("Tesla request failed: GET {path}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Tesla response body")?;
        if !status.is_success() {
            anyhow::bail!("Tesla HTTP {status} for GET {path}: {text}");
        }

        let parsed = serde_json::from_str::<Envelope<T>>(&text)
            .with_context(|| format!("failed to decode Tesla response for GET {path}: {text}"))?;
        Ok(parsed.response)
    }

    async fn discover_energy_site(&self) -> Result<u64> {
        let products: Vec<Product> = self.get_json("/api/1/products").await?;
        products
            .iter()
            .find_map(|p| p.energy_site_id)
            .context("no energy site found on Tesla account")
    }
}

#[async_trait::async_trait]
impl BatteryClient for TeslaEnergyClient {
    fn device_name(&self) -> &'static str {
        "tesla_powerwall"
    }

    async fn snapshot(&self) -> Result<BatterySnapshot> {
        let site = self.energy_site_id().await?;
        let live: LiveStatus = self
            .get_json(&format!("/api/1/energy_sites/{site}/live_status"))
            .await?;
        let info: SiteInfo = self
            .get_json(&format!("/api/1/energy_sites/{site}/site_info"))
            .await?;
        Ok(into_snapshot(live, info))
    }

    async fn set_backup_reserve(&self, percent: u8) -> Result<()> {
        anyhow::ensure!(percent <= 100, "backup reserve must be 0..=100 (got {percent})");

        let site = self.energy_site_id().await?;
        let path = format!("/api/1/energy_sites/{site}/backup");
        let res = self
            .http
            .post(self.url(&path))
            .headers(self.headers()?)
            .json(&BackupRequest {
                backup_reserve_percent: percent,
            })
            .send()
            .await
            .context("Tesla backup reserve request failed")?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("Tesla HTTP {status} setting backup reserve: {text}");
        }
        Ok(())
    }
}

fn into_snapshot(live: LiveStatus, info: SiteInfo) -> BatterySnapshot {
    BatterySnapshot {
        timestamp: live.timestamp.with_timezone(&Utc),
        backup_reserve: to_percent(info.backup_reserve_percent),
        percentage_charged: to_percent(live.percentage_charged),
        charge_power: -(live.battery_power / 1000.0),
        load: live.load_power / 1000.0,
    }
}

fn to_percent(v: f64) -> u8 {
    v.round().clamp(0.0, 100.0) as u8
}
