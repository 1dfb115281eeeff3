pub mod tesla;

use crate::domain::battery::BatterySnapshot;
use anyhow::Result;

#[async_trait::async_trait]
pub trait BatteryClient: Send + Sync {
    fn device_name(&self) -> &'static str;

    /// Reads the live site status together with the configured backup reserve.
    async fn snapshot(&self) -> Result<BatterySnapshot>;

    async fn set_backup_reserve(&self, percent: u8) -> Result<()>;
}
