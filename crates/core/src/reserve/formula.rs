use crate::domain::weather::WeatherFeatureRow;

// Linear fit of window PV generation against forecast solar energy and cloud
// cover, calibrated offline.
const INTERCEPT: f64 = 7.233580040904478;
const SOLAR_ENERGY_COEFFICIENT: f64 = 2.349053450659037;
const CLOUD_COVER_COEFFICIENT: f64 = 0.08670980527942238;

const BASE_TARGET: f64 = 120.0;
const PERCENT_PER_UNIT_GENERATION: f64 = 4.18;

/// Predicted generation for the stop-buy..sell-high window.
pub fn predicted_generation(row: &WeatherFeatureRow) -> f64 {
    INTERCEPT + SOLAR_ENERGY_COEFFICIENT * row.cumulative_solar_energy
        - CLOUD_COVER_COEFFICIENT * row.average_cloud_cover
}

/// Rounds to the nearest whole percent, halves to even.
pub fn round_percent(v: f64) -> i32 {
    v.round_ties_even() as i32
}

/// Reserve to buy up to before the sun takes over. Unbounded; clamping is done
/// when the value is applied to the device.
pub fn compute(row: &WeatherFeatureRow) -> i32 {
    let target = BASE_TARGET - PERCENT_PER_UNIT_GENERATION * predicted_generation(row);
    round_percent(target)
}
