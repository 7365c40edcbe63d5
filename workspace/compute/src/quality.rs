//! Validation of incoming observations.
//!
//! Every reading gets a 0-100 quality score built from range checks, cross-field
//! consistency, short-term temporal consistency and z-score anomalies against
//! per-city baselines. Scores are tracked per city for reporting.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::Utc;
use common::{
    BatchQualityReport, CityQualitySummary, CityQualityTrend, DataQualityOverview, QualityLevel,
    QualityReport, ValueRange, round_to,
};
use tracing::{debug, info};

use crate::observation::{Field, Observation};
use crate::stats;

const MAX_SCORES_PER_CITY: usize = 100;
const MAX_RECENT_PER_CITY: usize = 50;
const MIN_BASELINE_READINGS: usize = 48;
const MIN_BASELINE_VALUES: usize = 24;

const BASELINE_FIELDS: [Field; 6] = [
    Field::Dust,
    Field::Pm10,
    Field::Pm25,
    Field::Temperature,
    Field::Humidity,
    Field::WindSpeed,
];
const ANOMALY_FIELDS: [Field; 4] = [Field::Dust, Field::Pm10, Field::Temperature, Field::Humidity];

/// Physically possible values.
fn valid_range(field: Field) -> (f64, f64) {
    match field {
        Field::Dust => (0.0, 2500.0),
        Field::Pm10 => (0.0, 3500.0),
        Field::Pm25 => (0.0, 1200.0),
        Field::Temperature => (-2.0, 55.0),
        Field::Humidity => (0.0, 100.0),
        Field::WindSpeed => (0.0, 120.0),
        Field::WindDirection => (0.0, 360.0),
        Field::Visibility => (0.0, 100_000.0),
        Field::Aqi => (0.0, 500.0),
        Field::Pressure => (950.0, 1050.0),
    }
}

/// Typical values for the region; outside is suspicious but accepted.
fn expected_range(field: Field) -> Option<(f64, f64)> {
    match field {
        Field::Dust => Some((5.0, 200.0)),
        Field::Pm10 => Some((10.0, 300.0)),
        Field::Pm25 => Some((5.0, 150.0)),
        Field::Temperature => Some((15.0, 50.0)),
        Field::Humidity => Some((10.0, 90.0)),
        Field::WindSpeed => Some((0.0, 50.0)),
        Field::Visibility => Some((1000.0, 50_000.0)),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
struct Baseline {
    means: BTreeMap<Field, f64>,
    stds: BTreeMap<Field, f64>,
}

#[derive(Debug, Default)]
pub struct DataQualityChecker {
    baselines: HashMap<String, Baseline>,
    recent_dust: HashMap<String, VecDeque<Option<f64>>>,
    scores: HashMap<String, VecDeque<f64>>,
}

impl DataQualityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score a single reading and remember it for temporal checks and trends.
    pub fn validate(&mut self, obs: &Observation) -> QualityReport {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        let mut scores = Vec::new();

        for field in Field::ALL {
            let Some(value) = obs.get(field) else { continue };
            let (min, max) = valid_range(field);
            if value < min || value > max {
                issues.push(format!("{}: out of valid range ({})", field.name(), value));
                scores.push(0.3);
                continue;
            }
            match expected_range(field) {
                Some((lo, hi)) if value < lo || value > hi => {
                    warnings.push(format!("{}: unusual but valid ({})", field.name(), value));
                    scores.push(0.85);
                }
                _ => scores.push(1.0),
            }
        }

        let inconsistencies = Self::check_consistency(obs);
        if !inconsistencies.is_empty() {
            issues.extend(inconsistencies);
            scores.push(0.7);
        }

        if let Some(warning) = self.check_temporal(obs) {
            warnings.push(warning);
            scores.push(0.8);
        }

        let anomalies = self.detect_anomalies(obs);
        if !anomalies.is_empty() {
            warnings.extend(anomalies);
            scores.push(0.85);
        }

        let mut score = stats::mean(&scores).map(|m| m * 100.0).unwrap_or(50.0);
        if issues.len() > 3 {
            score *= 0.8;
        }

        let city_scores = self.scores.entry(obs.city_id.clone()).or_default();
        city_scores.push_back(score);
        if city_scores.len() > MAX_SCORES_PER_CITY {
            city_scores.pop_front();
        }

        let recent = self.recent_dust.entry(obs.city_id.clone()).or_default();
        recent.push_back(obs.dust);
        if recent.len() > MAX_RECENT_PER_CITY {
            recent.pop_front();
        }

        if !issues.is_empty() {
            debug!(city_id = %obs.city_id, score, issues = issues.len(), "Reading has quality issues");
        }

        QualityReport {
            quality_score: round_to(score, 1),
            quality_level: QualityLevel::from_score(score),
            issues,
            warnings,
            is_valid: score >= 50.0,
            is_reliable: score >= 70.0,
            timestamp: Utc::now(),
        }
    }

    fn check_consistency(obs: &Observation) -> Vec<String> {
        let mut issues = Vec::new();
        let dust = obs.dust.unwrap_or(0.0);
        let visibility = obs.visibility.unwrap_or(10_000.0);
        let humidity = obs.humidity.unwrap_or(50.0);
        let pm25 = obs.pm2_5.unwrap_or(0.0);
        let pm10 = obs.pm10.unwrap_or(0.0);

        if dust > 100.0 && visibility > 20_000.0 {
            issues.push("Inconsistent: high dust with high visibility".to_string());
        }
        if humidity > 90.0 && dust > 150.0 {
            issues.push("Inconsistent: very high humidity with very high dust".to_string());
        }
        if pm10 > 0.0 && pm25 > pm10 * 1.2 {
            issues.push("Inconsistent: PM2.5 higher than PM10".to_string());
        }
        issues
    }

    fn check_temporal(&self, obs: &Observation) -> Option<String> {
        let recent = self.recent_dust.get(&obs.city_id)?;
        if recent.len() < 3 {
            return None;
        }
        let last: Vec<f64> = recent.iter().skip(recent.len().saturating_sub(5)).flatten().copied().collect();
        let avg = stats::mean(&last)?;
        let current = obs.dust.unwrap_or(0.0);

        if current > avg * 3.0 || (avg > 10.0 && current < avg * 0.2) {
            Some(format!("Rapid dust change: {:.1} -> {:.1}", avg, current))
        } else {
            None
        }
    }

    fn detect_anomalies(&self, obs: &Observation) -> Vec<String> {
        let Some(baseline) = self.baselines.get(&obs.city_id) else {
            return Vec::new();
        };

        ANOMALY_FIELDS
            .iter()
            .filter_map(|field| {
                let value = obs.get(*field)?;
                let mean = baseline.means.get(field)?;
                let std = baseline.stds.get(field)?.max(1.0);
                let z = ((value - mean) / std).abs();
                if z > 3.5 {
                    Some(format!("{}: statistical anomaly (z={:.1})", field.name(), z))
                } else if z > 2.5 {
                    Some(format!("{}: unusual value (z={:.1})", field.name(), z))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Recompute anomaly baselines from at least two days of hourly readings.
    pub fn update_baselines(&mut self, city_id: &str, readings: &[Observation]) {
        if readings.len() < MIN_BASELINE_READINGS {
            return;
        }

        let mut baseline = Baseline::default();
        for field in BASELINE_FIELDS {
            let values: Vec<f64> = readings.iter().filter_map(|r| r.get(field)).collect();
            if values.len() < MIN_BASELINE_VALUES {
                continue;
            }
            if let Some((mean, std)) = stats::trimmed_mean_std(&values) {
                baseline.means.insert(field, mean);
                baseline.stds.insert(field, std);
            }
        }

        info!(city_id, fields = baseline.means.len(), "Updated quality baselines");
        self.baselines.insert(city_id.to_string(), baseline);
    }

    pub fn validate_batch(&mut self, readings: &[Observation]) -> BatchQualityReport {
        let reports: Vec<QualityReport> = readings.iter().map(|r| self.validate(r)).collect();
        let total = reports.len();
        let valid = reports.iter().filter(|r| r.is_valid).count();
        let reliable = reports.iter().filter(|r| r.is_reliable).count();
        let scores: Vec<f64> = reports.iter().map(|r| r.quality_score).collect();

        let mut issue_summary: BTreeMap<String, usize> = BTreeMap::new();
        for issue in reports.iter().flat_map(|r| r.issues.iter()) {
            let kind = issue.split(':').next().unwrap_or(issue);
            *issue_summary.entry(kind.to_string()).or_default() += 1;
        }

        let rate = |count: usize| {
            if total == 0 {
                0.0
            } else {
                round_to(count as f64 / total as f64 * 100.0, 1)
            }
        };

        BatchQualityReport {
            total_readings: total,
            valid_readings: valid,
            reliable_readings: reliable,
            invalid_readings: total - valid,
            average_quality_score: round_to(stats::mean(&scores).unwrap_or(0.0), 1),
            pass_rate: rate(valid),
            reliability_rate: rate(reliable),
            issue_summary,
            timestamp: Utc::now(),
        }
    }

    pub fn quality_report(&self) -> DataQualityOverview {
        let city_quality = self
            .scores
            .iter()
            .filter(|(_, scores)| !scores.is_empty())
            .map(|(city_id, scores)| {
                let values: Vec<f64> = scores.iter().copied().collect();
                let first = stats::mean(&values[..values.len().min(5)]).unwrap_or(0.0);
                let last = stats::mean(&values[values.len().saturating_sub(5)..]).unwrap_or(0.0);
                let trend = if values.len() > 5 && last > first { "IMPROVING" } else { "STABLE" };
                let summary = CityQualitySummary {
                    average_score: round_to(stats::mean(&values).unwrap_or(0.0), 1),
                    min_score: round_to(values.iter().copied().fold(f64::INFINITY, f64::min), 1),
                    max_score: round_to(values.iter().copied().fold(f64::NEG_INFINITY, f64::max), 1),
                    samples: values.len(),
                    trend: trend.to_string(),
                };
                (city_id.clone(), summary)
            })
            .collect();

        let valid_ranges = Field::ALL
            .iter()
            .map(|field| {
                let (min, max) = valid_range(*field);
                (field.name().to_string(), ValueRange { min, max })
            })
            .collect();

        DataQualityOverview {
            cities_with_baselines: self.baselines.len(),
            cities_tracked: self.scores.len(),
            city_quality,
            valid_ranges,
            timestamp: Utc::now(),
        }
    }

    /// `None` when the city has never been scored.
    pub fn city_quality_trend(&self, city_id: &str) -> Option<CityQualityTrend> {
        let scores: Vec<f64> = self.scores.get(city_id)?.iter().copied().collect();
        let current = *scores.last()?;

        let recent_trend = if scores.len() < 10 {
            "INSUFFICIENT_DATA"
        } else {
            let n = scores.len();
            let recent = stats::mean(&scores[n - 5..]).unwrap_or(0.0);
            let older = stats::mean(&scores[n - 10..n - 5]).unwrap_or(0.0);
            match recent - older {
                d if d > 3.0 => "IMPROVING",
                d if d < -3.0 => "DECLINING",
                _ => "STABLE",
            }
        };

        Some(CityQualityTrend {
            city_id: city_id.to_string(),
            current_score: round_to(current, 1),
            average_score: round_to(stats::mean(&scores).unwrap_or(0.0), 1),
            samples: scores.len(),
            recent_trend: recent_trend.to_string(),
            timestamp: Utc::now(),
        })
    }
}
