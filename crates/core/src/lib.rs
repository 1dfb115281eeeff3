pub mod battery;
pub mod control;
pub mod domain;
pub mod forecast;
pub mod reserve;
pub mod resilience;
pub mod storage;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;
    use std::time::Duration;

    const DEFAULT_FORECAST_TABLE: &str = "embedded_forecast";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub forecast_table: String,
        pub tesla_access_token: Option<String>,
        pub tesla_energy_site_id: Option<u64>,
        pub tesla_base_url: Option<String>,
        pub weather_api_key: Option<String>,
        pub weather_location: Option<String>,
        pub weather_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let tesla_energy_site_id = match std::env::var("TESLA_ENERGY_SITE_ID") {
                Ok(s) if !s.trim().is_empty() => Some(
                    s.trim()
                        .parse::<u64>()
                        .with_context(|| format!("TESLA_ENERGY_SITE_ID is not a number: {s}"))?,
                ),
                _ => None,
            };

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                forecast_table: std::env::var("FORECAST_TABLE")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FORECAST_TABLE.to_string()),
                tesla_access_token: std::env::var("TESLA_ACCESS_TOKEN").ok(),
                tesla_energy_site_id,
                tesla_base_url: std::env::var("TESLA_BASE_URL").ok(),
                weather_api_key: std::env::var("WEATHER_API_KEY").ok(),
                weather_location: std::env::var("WEATHER_LOCATION").ok(),
                weather_base_url: std::env::var("WEATHER_BASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_tesla_access_token(&self) -> anyhow::Result<&str> {
            self.tesla_access_token
                .as_deref()
                .context("TESLA_ACCESS_TOKEN is required")
        }

        pub fn require_weather_api_key(&self) -> anyhow::Result<&str> {
            self.weather_api_key
                .as_deref()
                .context("WEATHER_API_KEY is required")
        }

        pub fn require_weather_location(&self) -> anyhow::Result<&str> {
            self.weather_location
                .as_deref()
                .context("WEATHER_LOCATION is required")
        }
    }

    /// Tariff hours, reserve floor and loop timings. Read once at start-up.
    #[derive(Debug, Clone)]
    pub struct ControlSettings {
        /// Hour at which cheap electricity starts (buy window opens).
        pub buy_low: u32,
        /// Hour at which the buy window closes.
        pub stop_buy: u32,
        /// Hour after which selling beats buying.
        pub sell_high: u32,
        pub min_battery_reserve: u8,
        pub max_retries: u32,
        pub retry_delay: Duration,
        pub poll_interval: Duration,
        pub buy_settle: Duration,
        pub error_cooldown: Duration,
        pub forecast_dir: PathBuf,
    }

    impl Default for ControlSettings {
        fn default() -> Self {
            Self {
                buy_low: 2,
                stop_buy: 5,
                sell_high: 16,
                min_battery_reserve: 20,
                max_retries: 30,
                retry_delay: Duration::from_secs(12),
                poll_interval: Duration::from_secs(300),
                buy_settle: Duration::from_secs(120),
                error_cooldown: Duration::from_secs(300),
                forecast_dir: PathBuf::from("./Forecasts"),
            }
        }
    }

    impl ControlSettings {
        pub fn from_env() -> anyhow::Result<Self> {
            let mut out = Self::default();

            if let Some(n) = env_parse::<u32>("BUY_LOW")? {
                out.buy_low = n;
            }
            if let Some(n) = env_parse::<u32>("STOP_BUY")? {
                out.stop_buy = n;
            }
            if let Some(n) = env_parse::<u32>("SELL_HIGH")? {
                out.sell_high = n;
            }
            if let Some(n) = env_parse::<u8>("MIN_BATTERY_RESERVE")? {
                out.min_battery_reserve = n;
            }
            if let Some(n) = env_parse::<u32>("MAX_RETRIES")? {
                out.max_retries = n;
            }
            if let Some(n) = env_parse::<u64>("RETRY_DELAY_SECS")? {
                out.retry_delay = Duration::from_secs(n);
            }
            if let Some(n) = env_parse::<u64>("POLL_INTERVAL_SECS")? {
                out.poll_interval = Duration::from_secs(n);
            }
            if let Some(n) = env_parse::<u64>("BUY_SETTLE_SECS")? {
                out.buy_settle = Duration::from_secs(n);
            }
            if let Some(n) = env_parse::<u64>("ERROR_COOLDOWN_SECS")? {
                out.error_cooldown = Duration::from_secs(n);
            }
            if let Ok(s) = std::env::var("FORECAST_DIR") {
                if !s.trim().is_empty() {
                    out.forecast_dir = PathBuf::from(s);
                }
            }

            out.validate()?;
            Ok(out)
        }

        pub fn validate(&self) -> anyhow::Result<()> {
            for (name, hour) in [
                ("BUY_LOW", self.buy_low),
                ("STOP_BUY", self.stop_buy),
                ("SELL_HIGH", self.sell_high),
            ] {
                anyhow::ensure!(hour < 24, "{name} must be an hour 0..=23 (got {hour})");
            }
            anyhow::ensure!(
                self.buy_low < self.stop_buy,
                "BUY_LOW ({}) must be before STOP_BUY ({})",
                self.buy_low,
                self.stop_buy
            );
            anyhow::ensure!(
                self.stop_buy <= self.sell_high,
                "STOP_BUY ({}) must not be after SELL_HIGH ({})",
                self.stop_buy,
                self.sell_high
            );
            anyhow::ensure!(
                self.min_battery_reserve <= 100,
                "MIN_BATTERY_RESERVE must be 0..=100 (got {})",
                self.min_battery_reserve
            );
            anyhow::ensure!(self.max_retries >= 1, "MAX_RETRIES must be >= 1");
            Ok(())
        }
    }

    fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        parse_setting(key, std::env::var(key).ok().as_deref())
    }

    /// Unset or blank keeps the default; anything else must parse.
    fn parse_setting<T>(key: &str, raw: Option<&str>) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match raw.map(str::trim) {
            Some(s) if !s.is_empty() => s
                .parse::<T>()
                .map(Some)
                .with_context(|| format!("{key} has an invalid value: {s:?}")),
            _ => Ok(None),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn defaults_are_valid() {
            ControlSettings::default().validate().unwrap();
        }

        #[test]
        fn malformed_numbers_are_errors_not_defaults() {
            let err = parse_setting::<u32>("BUY_LOW", Some("abc")).unwrap_err();
            assert!(format!("{err:#}").contains("BUY_LOW"));
            assert!(parse_setting::<u8>("MIN_BATTERY_RESERVE", Some("300")).is_err());

            assert_eq!(parse_setting::<u32>("BUY_LOW", Some(" 3 ")).unwrap(), Some(3));
            assert_eq!(parse_setting::<u32>("BUY_LOW", Some("  ")).unwrap(), None);
            assert_eq!(parse_setting::<u32>("BUY_LOW", None).unwrap(), None);
        }

        #[test]
        fn rejects_inverted_buy_window() {
            let s = ControlSettings {
                buy_low: 6,
                stop_buy: 5,
                ..ControlSettings::default()
            };
            assert!(s.validate().is_err());
        }

        #[test]
        fn rejects_out_of_range_hours_and_reserve() {
            let s = ControlSettings {
                sell_high: 24,
                ..ControlSettings::default()
            };
            assert!(s.validate().is_err());

            let s = ControlSettings {
                min_battery_reserve: 101,
                ..ControlSettings::default()
            };
            assert!(s.validate().is_err());
        }
    }
}
