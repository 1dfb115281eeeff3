use crate::battery::BatteryClient;
use crate::config::ControlSettings;
use crate::control::state::{decide, ControlState, Decision, Phase};
use crate::domain::battery::BatterySnapshot;
use crate::forecast::{ForecastProvider, HourWindow, WeatherSource};
use crate::reserve::{self, ReserveSetter};
use crate::resilience::{attempt, FatalError, ResilientDataSource, RetryPolicy};
use crate::storage::ForecastDatabase;
use crate::time::{seconds_until_hour, Clock, Sleeper};
use chrono::Timelike;
use std::sync::Arc;

/// Daily reserve cycle: raise the reserve at BUY_LOW from the solar forecast,
/// drop it back to the floor once charged or when the buy window closes, then
/// sleep until the next BUY_LOW.
pub struct ControlLoop {
    settings: ControlSettings,
    state: ControlState,
    battery: Arc<dyn BatteryClient>,
    setter: ReserveSetter,
    forecast: ForecastProvider,
    database: Arc<dyn ForecastDatabase>,
    guard: ResilientDataSource,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl ControlLoop {
    pub fn new(
        settings: ControlSettings,
        battery: Arc<dyn BatteryClient>,
        weather: Arc<dyn WeatherSource>,
        database: Arc<dyn ForecastDatabase>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let setter = ReserveSetter::new(battery.clone(), settings.min_battery_reserve);
        let forecast = ForecastProvider::new(
            weather,
            HourWindow::new(settings.stop_buy, settings.sell_high),
            settings.forecast_dir.clone(),
        );
        let guard = ResilientDataSource::new(
            RetryPolicy {
                max_attempts: settings.max_retries,
                delay: settings.retry_delay,
            },
            sleeper.clone(),
            setter.clone(),
        );

        Self {
            state: ControlState::new(settings.min_battery_reserve),
            settings,
            battery,
            setter,
            forecast,
            database,
            guard,
            clock,
            sleeper,
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Polls until the database guard gives up.
    pub async fn run(&mut self) -> Result<(), FatalError> {
        tracing::info!(
            buy_low = self.settings.buy_low,
            stop_buy = self.settings.stop_buy,
            sell_high = self.settings.sell_high,
            min_reserve = self.settings.min_battery_reserve,
            "control loop started"
        );
        loop {
            self.tick().await?;
        }
    }

    /// One wake-up: health check, fresh battery read, one decision, one sleep.
    pub async fn tick(&mut self) -> Result<Decision, FatalError> {
        self.check_database().await?;

        let now = self.clock.now();
        let snapshot = self.read_battery().await;
        let decision = decide(
            &self.state,
            &self.settings,
            now.hour(),
            snapshot.as_ref().map(|s| s.percentage_charged),
        );

        tracing::debug!(
            hour = now.hour(),
            phase = ?self.state.phase,
            buying_done_today = self.state.buying_done_today,
            target = self.state.target,
            percentage_charged = snapshot.as_ref().map(|s| s.percentage_charged),
            ?decision,
            "control tick"
        );

        match decision {
            Decision::Buy => self.buy().await,
            Decision::Reset => self.reset().await,
            Decision::Hold => {
                if !self.state.buying_done_today {
                    self.state.phase = Phase::Idle;
                }
                self.sleeper.sleep(self.settings.poll_interval).await;
            }
        }

        Ok(decision)
    }

    pub async fn check_database(&self) -> Result<(), FatalError> {
        let database = self.database.clone();
        self.guard
            .ensure_available("database", || database.check_connection())
            .await
    }

    async fn read_battery(&self) -> Option<BatterySnapshot> {
        match self.battery.snapshot().await {
            Ok(s) => Some(s),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "battery status unavailable");
                None
            }
        }
    }

    async fn compute_target(&self) -> anyhow::Result<i32> {
        let row = self.forecast.fetch_today().await?;
        let target = reserve::compute(&row);
        tracing::info!(date = %row.date, target, "reserve target computed");
        Ok(target)
    }

    async fn buy(&mut self) {
        self.state.phase = Phase::Buying;
        let cooldown = self.settings.error_cooldown;

        let Some(target) = attempt(
            self.compute_target(),
            "error calculating backup reserve",
            cooldown,
            self.sleeper.as_ref(),
        )
        .await
        else {
            self.state.phase = Phase::Idle;
            return;
        };

        let Some(effective) = attempt(
            self.setter.apply(target),
            "error setting backup reserve",
            cooldown,
            self.sleeper.as_ref(),
        )
        .await
        else {
            self.state.phase = Phase::Idle;
            return;
        };

        // The device may not have taken the write; make sure it at least
        // holds the floor.
        if let Some(s) = self.read_battery().await {
            if s.backup_reserve <= self.setter.min_reserve() {
                let _ = self.setter.reset_to_min().await;
            }
        }
        if let Some(s) = self.read_battery().await {
            tracing::info!(backup_reserve = s.backup_reserve, "backup reserve was set");
        }

        self.state.target = i32::from(effective);
        self.state.buying_done_today = true;
        self.state.phase = Phase::Holding;
        self.sleeper.sleep(self.settings.buy_settle).await;
    }

    async fn reset(&mut self) {
        self.state.phase = Phase::Resetting;

        if let Err(err) = self.setter.reset_to_min().await {
            // Keep today's state; the next tick tries again.
            tracing::error!(error = %format!("{err:#}"), "backup reserve reset failed; retrying after cooldown");
            self.state.phase = if self.state.buying_done_today {
                Phase::Holding
            } else {
                Phase::Idle
            };
            self.sleeper.sleep(self.settings.error_cooldown).await;
            return;
        }

        tracing::info!(
            min_reserve = self.settings.min_battery_reserve,
            "backup reserve was reset to minimum"
        );
        self.state.buying_done_today = false;
        self.state.target = i32::from(self.settings.min_battery_reserve);
        self.state.phase = Phase::Idle;

        let wait = seconds_until_hour(self.clock.now(), self.settings.buy_low);
        tracing::info!(buy_low = self.settings.buy_low, wait_secs = wait.as_secs(), "waiting for next buy window");
        self.sleeper.sleep(wait).await;
    }
}
