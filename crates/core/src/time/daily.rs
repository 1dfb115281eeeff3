use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use std::time::Duration;

/// Local wall clock. The loop only ever looks at the hour of day, so a naive
/// local timestamp is enough.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Time from `now` until the next top of `target_hour`. If `now` is at or past
/// today's target, the target rolls over to tomorrow. Never shorter than one
/// second.
pub fn seconds_until_hour(now: NaiveDateTime, target_hour: u32) -> Duration {
    let at = NaiveTime::from_hms_opt(target_hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let mut target = now.date().and_time(at);
    if now >= target {
        target += ChronoDuration::days(1);
    }

    let secs = (target - now).num_seconds().max(1);
    Duration::from_secs(secs as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn waits_until_later_today() {
        assert_eq!(seconds_until_hour(at(0, 30, 0), 2), Duration::from_secs(90 * 60));
    }

    #[test]
    fn rolls_over_to_tomorrow_once_past() {
        // 05:00 -> 02:00 next day is 21h.
        assert_eq!(seconds_until_hour(at(5, 0, 0), 2), Duration::from_secs(21 * 3600));
    }

    #[test]
    fn exactly_on_the_hour_waits_a_full_day() {
        assert_eq!(seconds_until_hour(at(2, 0, 0), 2), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn rolls_over_month_end() {
        let now = NaiveDate::from_ymd_opt(2026, 1, 31)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        assert_eq!(seconds_until_hour(now, 0), Duration::from_secs(60));
    }
}
