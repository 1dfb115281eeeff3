use crate::battery::BatteryClient;
use anyhow::Result;
use std::sync::Arc;

pub const MAX_RESERVE: u8 = 100;

/// Applies backup-reserve requests to the device, clamped to
/// `[min_reserve, 100]`.
#[derive(Clone)]
pub struct ReserveSetter {
    battery: Arc<dyn BatteryClient>,
    min_reserve: u8,
}

impl ReserveSetter {
    pub fn new(battery: Arc<dyn BatteryClient>, min_reserve: u8) -> Self {
        Self {
            battery,
            min_reserve: min_reserve.min(MAX_RESERVE),
        }
    }

    pub fn min_reserve(&self) -> u8 {
        self.min_reserve
    }

    pub fn clamp(&self, requested: i32) -> u8 {
        requested.clamp(i32::from(self.min_reserve), i32::from(MAX_RESERVE)) as u8
    }

    /// Sends the clamped reserve to the device. Failures are logged here and
    /// handed back so the caller can decide whether to cool down; they never
    /// abort the loop.
    pub async fn apply(&self, requested: i32) -> Result<u8> {
        let percent = self.clamp(requested);
        match self.battery.set_backup_reserve(percent).await {
            Ok(()) => {
                tracing::info!(
                    requested,
                    percent,
                    device = self.battery.device_name(),
                    "backup reserve set"
                );
                Ok(percent)
            }
            Err(err) => {
                tracing::error!(requested, percent, error = %err, "error setting backup reserve");
                Err(err)
            }
        }
    }

    /// Keep as much charge as possible.
    pub async fn fail_safe(&self) -> Result<u8> {
        self.apply(i32::from(MAX_RESERVE)).await
    }

    pub async fn reset_to_min(&self) -> Result<u8> {
        self.apply(i32::from(self.min_reserve)).await
    }
}
