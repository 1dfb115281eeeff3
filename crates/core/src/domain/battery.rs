use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the battery/site, read fresh on every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatterySnapshot {
    pub timestamp: DateTime<Utc>,
    /// Backup reserve currently configured on the device (0..=100).
    pub backup_reserve: u8,
    /// State of charge, rounded to a whole percent.
    pub percentage_charged: u8,
    /// kW into the battery; negative while discharging.
    pub charge_power: f64,
    /// Site load in kW.
    pub load: f64,
}
