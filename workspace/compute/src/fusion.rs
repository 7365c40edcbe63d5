//! Combination of per-source readings into one city observation, plus the
//! derived indicators published with it.

use chrono::{DateTime, Utc};
use common::DustTrend;
use tracing::trace;

use crate::observation::{Field, Observation};
use crate::stats;

/// Source whose hourly dust forecast is carried into the fused observation.
pub const PRIMARY_SOURCE: &str = "Open-Meteo";

const FUSED_FIELDS: [Field; 9] = [
    Field::Dust,
    Field::Pm10,
    Field::Pm25,
    Field::Temperature,
    Field::Humidity,
    Field::WindSpeed,
    Field::WindDirection,
    Field::Visibility,
    Field::Pressure,
];

/// One upstream source's reading for a city.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReading {
    pub source: String,
    pub weight: f64,
    pub observation: Observation,
}

/// Weighted mean of `(value, weight)` pairs, dropping values beyond two standard deviations once there are three or more.
fn fuse_values(mut pairs: Vec<(f64, f64)>) -> Option<f64> {
    if pairs.len() >= 3 {
        let values: Vec<f64> = pairs.iter().map(|(v, _)| *v).collect();
        if let (Some(mean), Some(std)) = (stats::mean(&values), stats::std_dev(&values)) {
            if std > 0.0 {
                pairs.retain(|(v, _)| (v - mean).abs() <= 2.0 * std);
            }
        }
    }

    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    if pairs.is_empty() || total <= 0.0 {
        return None;
    }
    Some(pairs.iter().map(|(v, w)| v * w).sum::<f64>() / total)
}

pub fn fuse(city_id: &str, timestamp: DateTime<Utc>, readings: &[SourceReading]) -> Observation {
    let mut fused = Observation::new(city_id, timestamp);

    for field in FUSED_FIELDS {
        let pairs = readings
            .iter()
            .filter_map(|r| r.observation.get(field).map(|v| (v, r.weight)))
            .collect();
        fused.set(field, fuse_values(pairs));
    }

    fused.forecast_dust = readings
        .iter()
        .find(|r| r.source == PRIMARY_SOURCE)
        .map(|r| r.observation.forecast_dust.clone())
        .unwrap_or_default();
    fused.sources_used = readings.len();

    trace!(city_id, sources = readings.len(), dust = ?fused.dust, "Fused source readings");
    fused
}

/// Confidence in percent from the number of sources and how well their dust values agree.
pub fn confidence(readings: &[SourceReading]) -> f64 {
    let source_bonus = (readings.len() as f64 * 5.0).min(30.0);
    let dust: Vec<f64> = readings
        .iter()
        .filter_map(|r| r.observation.dust)
        .filter(|d| *d != 0.0)
        .collect();

    let agreement_bonus = if dust.len() >= 2 {
        match (stats::mean(&dust), stats::std_dev(&dust)) {
            (Some(mean), Some(std)) if mean > 0.0 => (15.0 - std / mean * 30.0).max(0.0),
            _ => 10.0,
        }
    } else {
        0.0
    };

    (50.0 + source_bonus + agreement_bonus).min(98.0)
}

/// Simplified AQI, the worse of the PM2.5 and PM10 sub-indices.
pub fn aqi(pm2_5: f64, pm10: f64) -> i32 {
    let from_pm25 = ((pm2_5 * 4.17) as i32).min(500);
    let from_pm10 = ((pm10 * 2.0) as i32).min(500);
    from_pm25.max(from_pm10)
}

/// 0-100 composite of dust, wind, visibility and dryness.
pub fn risk_score(obs: &Observation) -> i32 {
    let dust = obs.value_or(Field::Dust, 0.0);
    let wind = obs.value_or(Field::WindSpeed, 0.0);
    let visibility = obs.value_or(Field::Visibility, 10_000.0);
    let humidity = obs.value_or(Field::Humidity, 50.0);

    let score = (dust / 4.0).min(50.0)
        + (wind / 2.0).min(20.0)
        + (20.0 - visibility / 500.0).max(0.0)
        + (10.0 - humidity / 10.0).max(0.0);
    score as i32
}

pub fn data_quality_label(sources: usize) -> &'static str {
    match sources {
        5.. => "excellent",
        3..=4 => "good",
        2 => "fair",
        _ => "limited",
    }
}

/// Change against the previous collection; the first collection is stable.
pub fn trend(previous: Option<f64>, current: f64) -> DustTrend {
    let diff = current - previous.unwrap_or(current);
    if diff > 5.0 {
        DustTrend::Rising
    } else if diff < -5.0 {
        DustTrend::Falling
    } else {
        DustTrend::Stable
    }
}
