use crate::config::Settings;
use crate::forecast::WeatherSource;
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://weather.visualcrossing.com";
const TIMELINE_PATH: &str = "/VisualCrossingWebServices/rest/services/timeline";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(rename = "resolvedAddress", default)]
    pub resolved_address: Option<String>,
    pub days: Vec<TimelineDay>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineDay {
    pub datetime: NaiveDate,
    #[serde(default)]
    pub hours: Vec<TimelineHour>,
}

/// Hourly fields; the API sends `null` where it has no value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineHour {
    pub datetime: NaiveTime,
    #[serde(default)]
    pub solarenergy: Option<f64>,
    #[serde(default)]
    pub solarradiation: Option<f64>,
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub cloudcover: Option<f64>,
    #[serde(default)]
    pub visibility: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct VisualCrossingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    location: String,
}

impl VisualCrossingClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_weather_api_key()?.to_string();
        let location = settings.require_weather_location()?.to_string();
        let base_url = settings
            .weather_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("WEATHER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build weather http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            location,
        })
    }

    fn url(&self) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            TIMELINE_PATH
        ))
        .context("invalid WEATHER_BASE_URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("WEATHER_BASE_URL cannot be a base"))?
            .push(&self.location);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl WeatherSource for VisualCrossingClient {
    fn source_name(&self) -> &'static str {
        "visual_crossing"
    }

    async fn fetch_timeline(&self) -> Result<(Timeline, Value)> {
        let res = self
            .http
            .get(self.url()?)
            .query(&[
                ("unitGroup", "metric"),
                ("key", self.api_key.as_str()),
                ("contentType", "json"),
            ])
            .send()
            .await
            // The URL carries the API key.
            .map_err(|e| e.without_url())
            .context("weather request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read weather response")?;
        if !status.is_success() {
            anyhow::bail!("weather HTTP {status}: {text}");
        }

        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("weather response is not valid JSON: {text}"))?;
        let parsed = serde_json::from_value::<Timeline>(raw_json.clone())
            .context("failed to parse weather response into Timeline")?;
        Ok((parsed, raw_json))
    }
}
