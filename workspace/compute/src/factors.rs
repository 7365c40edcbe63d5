//! Climatological lookup tables for the UAE.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Baseline dust level the models regress toward.
pub const CLIMATOLOGICAL_MEAN: f64 = 30.0;

const SEASONAL: [f64; 12] = [0.72, 0.78, 0.92, 1.15, 1.35, 1.48, 1.42, 1.38, 1.22, 0.98, 0.82, 0.73];

// Monday first
const WEEKLY: [f64; 7] = [1.02, 1.03, 1.04, 1.03, 0.95, 0.96, 0.97];

const MONTHLY_MEAN: [f64; 12] = [22.0, 25.0, 32.0, 42.0, 58.0, 68.0, 62.0, 57.0, 47.0, 36.0, 28.0, 22.0];
const MONTHLY_STD: [f64; 12] = [8.0, 10.0, 15.0, 18.0, 22.0, 25.0, 23.0, 20.0, 18.0, 14.0, 10.0, 8.0];

/// Seasonal multiplier for a month in `1..=12`.
pub fn seasonal(month: u32) -> f64 {
    SEASONAL.get(month.wrapping_sub(1) as usize).copied().unwrap_or(1.0)
}

/// Diurnal multiplier for an hour in `0..24`. Peaks in the early afternoon.
pub fn diurnal(hour: u32) -> f64 {
    let h = hour as f64;
    match hour {
        0..=4 => 0.65 + h * 0.02,
        5..=7 => 0.75 + (h - 5.0) * 0.08,
        8..=10 => 0.99 + (h - 8.0) * 0.07,
        11..=14 => 1.20 + (h - 11.0) * 0.05,
        15..=17 => 1.35 - (h - 15.0) * 0.05,
        18..=20 => 1.20 - (h - 18.0) * 0.10,
        21..=23 => 0.90 - (h - 21.0) * 0.08,
        _ => 1.0,
    }
}

/// Day-of-week multiplier, Monday = 0.
pub fn weekly(weekday_from_monday: u32) -> f64 {
    WEEKLY.get(weekday_from_monday as usize).copied().unwrap_or(1.0)
}

/// Wind direction multiplier on 5° buckets. South-westerlies carry desert dust, northerlies sea air.
pub fn wind_direction(degrees: f64) -> f64 {
    let bucket = ((degrees.max(0.0) as i64) / 5) * 5;
    match bucket {
        360.. => 1.0,
        200..=260 => 1.45,
        180..=199 | 261..=290 => 1.30,
        150..=179 | 291..=320 => 1.15,
        0..=29 | 321..=355 => 0.75,
        _ => 0.90,
    }
}

pub fn monthly_mean(month: u32) -> f64 {
    MONTHLY_MEAN.get(month.wrapping_sub(1) as usize).copied().unwrap_or(35.0)
}

pub fn monthly_std(month: u32) -> f64 {
    MONTHLY_STD.get(month.wrapping_sub(1) as usize).copied().unwrap_or(15.0)
}

/// Product of the seasonal, diurnal and weekly multipliers at `time`.
pub fn combined(time: DateTime<Utc>) -> f64 {
    seasonal(time.month()) * diurnal(time.hour()) * weekly(time.weekday().num_days_from_monday())
}
