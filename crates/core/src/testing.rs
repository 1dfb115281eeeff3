//! In-memory stand-ins for the device, weather, database and clock.

use crate::battery::BatteryClient;
use crate::domain::battery::BatterySnapshot;
use crate::domain::weather::ForecastRow;
use crate::forecast::{Timeline, TimelineDay, TimelineHour, WeatherSource};
use crate::storage::ForecastDatabase;
use crate::time::{Clock, Sleeper};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const SIM_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("reserve-test-{}", uuid::Uuid::new_v4()))
}

/// A day with one midday hour carrying the given totals.
pub fn timeline_day(date: &str, solar_energy: f64, cloud_cover: f64) -> TimelineDay {
    TimelineDay {
        datetime: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        hours: vec![TimelineHour {
            datetime: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            solarenergy: Some(solar_energy),
            solarradiation: Some(solar_energy * 100.0),
            temp: Some(22.0),
            cloudcover: Some(cloud_cover),
            visibility: Some(10.0),
        }],
    }
}

#[derive(Debug)]
struct BatteryState {
    reserve: u8,
    charged: u8,
    writes: Vec<u8>,
    fail_writes: bool,
    fail_reads: bool,
    ignore_writes: bool,
}

#[derive(Debug)]
pub struct FakeBattery {
    state: Mutex<BatteryState>,
}

impl FakeBattery {
    pub fn new(charged: u8) -> Self {
        Self {
            state: Mutex::new(BatteryState {
                reserve: 20,
                charged,
                writes: Vec::new(),
                fail_writes: false,
                fail_reads: false,
                ignore_writes: false,
            }),
        }
    }

    /// Every write attempt, including failed ones.
    pub fn writes(&self) -> Vec<u8> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn set_charged(&self, charged: u8) {
        self.state.lock().unwrap().charged = charged;
    }

    pub fn set_reserve(&self, reserve: u8) {
        self.state.lock().unwrap().reserve = reserve;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    /// Accept writes without changing the reported reserve.
    pub fn ignore_writes(&self, ignore: bool) {
        self.state.lock().unwrap().ignore_writes = ignore;
    }
}

#[async_trait::async_trait]
impl BatteryClient for FakeBattery {
    fn device_name(&self) -> &'static str {
        "fake_battery"
    }

    async fn snapshot(&self) -> anyhow::Result<BatterySnapshot> {
        let s = self.state.lock().unwrap();
        anyhow::ensure!(!s.fail_reads, "battery offline");
        Ok(BatterySnapshot {
            timestamp: Utc::now(),
            backup_reserve: s.reserve,
            percentage_charged: s.charged,
            charge_power: 1.5,
            load: 0.6,
        })
    }

    async fn set_backup_reserve(&self, percent: u8) -> anyhow::Result<()> {
        let mut s = self.state.lock().unwrap();
        s.writes.push(percent);
        anyhow::ensure!(!s.fail_writes, "device rejected write");
        if !s.ignore_writes {
            s.reserve = percent;
        }
        Ok(())
    }
}

pub struct FakeWeather {
    days: Vec<TimelineDay>,
    failures_left: AtomicU32,
    calls: AtomicUsize,
}

impl FakeWeather {
    pub fn with_days(days: Vec<TimelineDay>) -> Self {
        Self::failing_then(0, days)
    }

    pub fn failing() -> Self {
        Self::failing_then(u32::MAX, Vec::new())
    }

    pub fn failing_then(failures: u32, days: Vec<TimelineDay>) -> Self {
        Self {
            days,
            failures_left: AtomicU32::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WeatherSource for FakeWeather {
    fn source_name(&self) -> &'static str {
        "fake_weather"
    }

    async fn fetch_timeline(&self) -> anyhow::Result<(Timeline, Value)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            anyhow::bail!("weather API returned 503");
        }

        let timeline = Timeline {
            resolved_address: None,
            days: self.days.clone(),
        };
        let raw = serde_json::to_value(&timeline)?;
        Ok((timeline, raw))
    }
}

pub struct FakeDatabase {
    healthy_checks: u32,
    checks: AtomicU32,
    rows: Vec<ForecastRow>,
}

impl FakeDatabase {
    pub fn healthy() -> Self {
        Self::failing_after(u32::MAX)
    }

    pub fn down() -> Self {
        Self::failing_after(0)
    }

    /// Answers the first `n` health checks, then stays down.
    pub fn failing_after(n: u32) -> Self {
        Self {
            healthy_checks: n,
            checks: AtomicU32::new(0),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<ForecastRow>) -> Self {
        self.rows = rows;
        self
    }
}

#[async_trait::async_trait]
impl ForecastDatabase for FakeDatabase {
    async fn check_connection(&self) -> anyhow::Result<()> {
        let n = self.checks.fetch_add(1, Ordering::SeqCst);
        anyhow::ensure!(n < self.healthy_checks, "connection refused");
        Ok(())
    }

    async fn forecast_rows_since(&self, date: NaiveDate) -> anyhow::Result<Vec<ForecastRow>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.timestamp.date() >= date)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Wall clock that only moves when something sleeps on it.
#[derive(Debug)]
pub struct SimClock {
    now: Mutex<NaiveDateTime>,
    sleeps: Mutex<Vec<Duration>>,
}

impl SimClock {
    pub fn at(start: &str) -> Self {
        Self {
            now: Mutex::new(NaiveDateTime::parse_from_str(start, SIM_FORMAT).unwrap()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn hour(&self) -> u32 {
        self.now.lock().unwrap().hour()
    }

    pub fn now_string(&self) -> String {
        self.now.lock().unwrap().format(SIM_FORMAT).to_string()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for SimClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Sleeper for SimClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        let step = chrono::Duration::from_std(duration).unwrap();
        *self.now.lock().unwrap() += step;
    }
}
