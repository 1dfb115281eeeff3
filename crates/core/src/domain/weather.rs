use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One day's weather, aggregated over the daylight window between the stop-buy
/// and sell-high hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherFeatureRow {
    pub date: NaiveDate,
    pub cumulative_solar_energy: f64,
    pub cumulative_solar_radiation: f64,
    pub cumulative_temperature: f64,
    pub average_cloud_cover: f64,
    pub cumulative_visibility: f64,
}

/// A single row of the external PV forecast table.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub timestamp: NaiveDateTime,
    pub pv_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecastSummary {
    pub date: NaiveDate,
    pub total_generation: f64,
    pub reserve_percentage: i32,
}
