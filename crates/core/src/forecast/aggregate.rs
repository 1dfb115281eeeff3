use crate::domain::weather::WeatherFeatureRow;
use crate::forecast::TimelineDay;
use chrono::Timelike;

/// Inclusive range of hours of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.start..=self.end).contains(&hour)
    }
}

/// Sums each hourly field across the window. Cloud cover is a ratio, so it is
/// averaged over the hours that fell inside the window.
pub fn aggregate_day(day: &TimelineDay, window: HourWindow) -> WeatherFeatureRow {
    let mut row = WeatherFeatureRow {
        date: day.datetime,
        cumulative_solar_energy: 0.0,
        cumulative_solar_radiation: 0.0,
        cumulative_temperature: 0.0,
        average_cloud_cover: 0.0,
        cumulative_visibility: 0.0,
    };

    let mut hours: u32 = 0;
    let mut cloud_cover_total = 0.0;
    for hour in day.hours.iter().filter(|h| window.contains(h.datetime.hour())) {
        hours += 1;
        row.cumulative_solar_energy += hour.solarenergy.unwrap_or(0.0);
        row.cumulative_solar_radiation += hour.solarradiation.unwrap_or(0.0);
        row.cumulative_temperature += hour.temp.unwrap_or(0.0);
        row.cumulative_visibility += hour.visibility.unwrap_or(0.0);
        cloud_cover_total += hour.cloudcover.unwrap_or(0.0);
    }

    if hours > 0 {
        row.average_cloud_cover = cloud_cover_total / f64::from(hours);
    }
    row
}
