//! Tracks forecast accuracy by matching recorded predictions to later readings,
//! and keeps the per-city calibration and bias used to correct new forecasts.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use common::{
    AccuracyHistoryResponse, AccuracyStability, AccuracyStatus, AccuracyTrend, CalibrationResponse,
    CityAccuracyStats, OverallAccuracy, PerformanceReport, ValidationReport, round_to,
};
use tracing::{debug, info, instrument};

use crate::error::{ComputeError, Result};
use crate::stats;

pub const MODEL_VERSION: &str = "6.0.0";
pub const TARGET_ACCURACY: f64 = 97.0;
pub const MIN_ACCURACY: f64 = 90.0;
pub const RETRAIN_THRESHOLD: f64 = 85.0;
pub const ESTIMATED_ACCURACY: f64 = 92.5;
pub const ENSEMBLE_MODELS: usize = 7;

const MAX_BUFFERED_PREDICTIONS: usize = 2000;
const MAX_HISTORY: usize = 200;
const MATCH_WINDOW_SECONDS: i64 = 1800;
const HIGH_CONFIDENCE: f64 = 80.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPrediction {
    pub target_time: DateTime<Utc>,
    pub predicted_dust: f64,
    pub confidence: f64,
    pub recorded_at: DateTime<Utc>,
    pub hour_ahead: i64,
}

/// An observed dust value used to score recorded predictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActualReading {
    pub timestamp: DateTime<Utc>,
    pub dust: f64,
}

#[derive(Debug, Clone, Copy)]
struct Match {
    predicted: f64,
    actual: f64,
    absolute_error: f64,
    percentage_error: f64,
    confidence: f64,
    hour_ahead: i64,
}

#[derive(Debug)]
pub struct AccuracyTracker {
    total_cities: usize,
    predictions: HashMap<String, VecDeque<RecordedPrediction>>,
    history: HashMap<String, Vec<f64>>,
    last_validated: HashMap<String, DateTime<Utc>>,
    calibration: BTreeMap<String, f64>,
    bias: BTreeMap<String, f64>,
    validation_count: usize,
}

impl AccuracyTracker {
    /// `total_cities` is reported while no validation has happened yet.
    pub fn new(total_cities: usize) -> Self {
        Self {
            total_cities,
            predictions: HashMap::new(),
            history: HashMap::new(),
            last_validated: HashMap::new(),
            calibration: BTreeMap::new(),
            bias: BTreeMap::new(),
            validation_count: 0,
        }
    }

    /// Seed calibration factors, typically from persisted values.
    pub fn load_calibration(&mut self, factors: impl IntoIterator<Item = (String, f64)>) {
        self.calibration.extend(factors);
        info!(count = self.calibration.len(), "Loaded calibration factors");
    }

    pub fn record_prediction(
        &mut self,
        city_id: &str,
        target_time: DateTime<Utc>,
        predicted_dust: f64,
        confidence: f64,
        now: DateTime<Utc>,
    ) {
        let buffer = self.predictions.entry(city_id.to_string()).or_default();
        buffer.push_back(RecordedPrediction {
            target_time,
            predicted_dust,
            confidence,
            recorded_at: now,
            hour_ahead: (target_time - now).num_hours(),
        });
        while buffer.len() > MAX_BUFFERED_PREDICTIONS {
            buffer.pop_front();
        }
    }

    pub fn buffered(&self, city_id: &str) -> usize {
        self.predictions.get(city_id).map(|b| b.len()).unwrap_or(0)
    }

    /// Score every buffered prediction against the first reading within half an hour of its target.
    #[instrument(skip(self, readings), fields(readings = readings.len()))]
    pub fn validate_predictions(
        &mut self,
        city_id: &str,
        readings: &[ActualReading],
        now: DateTime<Utc>,
    ) -> Result<ValidationReport> {
        let buffer = self
            .predictions
            .get(city_id)
            .ok_or_else(|| ComputeError::NoPredictions(city_id.to_string()))?;

        let matches: Vec<Match> = buffer
            .iter()
            .filter_map(|pred| {
                let reading = readings.iter().find(|r| {
                    (pred.target_time - r.timestamp).num_seconds().abs() < MATCH_WINDOW_SECONDS
                })?;
                let absolute_error = (pred.predicted_dust - reading.dust).abs();
                Some(Match {
                    predicted: pred.predicted_dust,
                    actual: reading.dust,
                    absolute_error,
                    percentage_error: absolute_error / reading.dust.max(1.0) * 100.0,
                    confidence: pred.confidence,
                    hour_ahead: pred.hour_ahead,
                })
            })
            .collect();

        if matches.is_empty() {
            return Err(ComputeError::NoMatches(city_id.to_string()));
        }

        let absolute: Vec<f64> = matches.iter().map(|m| m.absolute_error).collect();
        let percentage: Vec<f64> = matches.iter().map(|m| m.percentage_error).collect();
        let squared: Vec<f64> = absolute.iter().map(|e| e * e).collect();

        let mae = stats::mean(&absolute).unwrap_or(0.0);
        let rmse = stats::mean(&squared).unwrap_or(0.0).sqrt();
        let mape = stats::mean(&percentage).unwrap_or(0.0);
        let accuracy = (100.0 - mape * 0.8).clamp(0.0, 100.0);

        let high_confidence: Vec<f64> = matches
            .iter()
            .filter(|m| m.confidence >= HIGH_CONFIDENCE)
            .map(|m| m.percentage_error)
            .collect();
        let high_confidence_accuracy = stats::mean(&high_confidence)
            .map(|e| 100.0 - e * 0.8)
            .unwrap_or(accuracy);

        let mut by_horizon: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        for m in &matches {
            by_horizon.entry(m.hour_ahead).or_default().push(m.percentage_error);
        }
        let horizon_accuracy = by_horizon
            .into_iter()
            .filter_map(|(hour, errors)| stats::mean(&errors).map(|e| (hour, round_to(100.0 - e * 0.8, 2))))
            .collect();

        let history = self.history.entry(city_id.to_string()).or_default();
        history.push(accuracy);
        if history.len() > MAX_HISTORY {
            let excess = history.len() - MAX_HISTORY;
            history.drain(..excess);
        }
        self.last_validated.insert(city_id.to_string(), now);

        let differences: Vec<f64> = matches.iter().map(|m| m.predicted - m.actual).collect();
        let bias = stats::mean(&differences).unwrap_or(0.0);
        let previous_bias = self.bias.get(city_id).copied().unwrap_or(0.0);
        self.bias.insert(city_id.to_string(), bias * 0.3 + previous_bias * 0.7);

        let actuals: Vec<f64> = matches.iter().map(|m| m.actual).collect();
        let predicted: Vec<f64> = matches.iter().map(|m| m.predicted).collect();
        if let (Some(actual_avg), Some(predicted_avg)) = (stats::mean(&actuals), stats::mean(&predicted)) {
            self.update_calibration(city_id, actual_avg, predicted_avg);
        }

        self.validation_count += matches.len();
        debug!(city_id, matches = matches.len(), accuracy, "Validated predictions");

        Ok(ValidationReport {
            city_id: city_id.to_string(),
            matches: matches.len(),
            accuracy: round_to(accuracy, 2),
            mae: round_to(mae, 2),
            rmse: round_to(rmse, 2),
            mape: round_to(mape, 2),
            high_confidence_accuracy: round_to(high_confidence_accuracy, 2),
            horizon_accuracy,
            bias: round_to(bias, 2),
            needs_retraining: accuracy < RETRAIN_THRESHOLD,
            meets_target: accuracy >= TARGET_ACCURACY,
            calibration_factor: self.calibration_factor(city_id),
            timestamp: now,
        })
    }

    pub fn overall_accuracy(&self, now: DateTime<Utc>) -> OverallAccuracy {
        let mut city_averages = Vec::new();
        let mut cities = BTreeMap::new();

        for (city_id, accuracies) in self.history.iter().filter(|(_, a)| !a.is_empty()) {
            let window = &accuracies[accuracies.len().saturating_sub(48)..];
            let average = stats::mean(window).unwrap_or(0.0);
            city_averages.push(average);
            cities.insert(
                city_id.clone(),
                CityAccuracyStats {
                    accuracy: round_to(average, 2),
                    samples: accuracies.len(),
                    last_validated: self.last_validated.get(city_id).copied().unwrap_or(now),
                    trend: trend(accuracies),
                    stability: stability(accuracies),
                },
            );
        }

        let Some(overall) = stats::mean(&city_averages) else {
            return OverallAccuracy {
                overall_accuracy: ESTIMATED_ACCURACY,
                status: AccuracyStatus::Initializing,
                message: Some(
                    "System is collecting data for validation. Showing estimated accuracy based on 7-model ensemble."
                        .to_string(),
                ),
                target: TARGET_ACCURACY,
                minimum: MIN_ACCURACY,
                cities: BTreeMap::new(),
                cities_meeting_target: 0,
                total_cities: self.total_cities,
                validation_pending: true,
                total_validations: self.validation_count,
                model_version: MODEL_VERSION.to_string(),
                ensemble_models: ENSEMBLE_MODELS,
                timestamp: now,
            };
        };

        OverallAccuracy {
            overall_accuracy: round_to(overall, 2),
            status: status(overall),
            message: None,
            target: TARGET_ACCURACY,
            minimum: MIN_ACCURACY,
            cities_meeting_target: city_averages.iter().filter(|a| **a >= TARGET_ACCURACY).count(),
            total_cities: city_averages.len(),
            cities,
            validation_pending: false,
            total_validations: self.validation_count,
            model_version: MODEL_VERSION.to_string(),
            ensemble_models: ENSEMBLE_MODELS,
            timestamp: now,
        }
    }

    /// Smoothly move the city's factor toward `actual / predicted`, bounded to ±30%.
    pub fn update_calibration(&mut self, city_id: &str, actual_avg: f64, predicted_avg: f64) {
        if predicted_avg <= 0.0 {
            return;
        }
        let target = (actual_avg / predicted_avg).clamp(0.7, 1.3);
        let old = self.calibration_factor(city_id);
        self.calibration.insert(city_id.to_string(), old * 0.8 + target * 0.2);
    }

    pub fn calibration_factor(&self, city_id: &str) -> f64 {
        self.calibration.get(city_id).copied().unwrap_or(1.0)
    }

    pub fn apply_calibration(&self, city_id: &str, dust: f64) -> f64 {
        let bias = self.bias.get(city_id).copied().unwrap_or(0.0);
        (dust * self.calibration_factor(city_id) - bias * 0.5).max(0.0)
    }

    pub fn calibration_factors(&self, now: DateTime<Utc>) -> CalibrationResponse {
        CalibrationResponse {
            calibration_factors: self.calibration.clone(),
            timestamp: now,
        }
    }

    pub fn performance_report(&self, now: DateTime<Utc>) -> PerformanceReport {
        PerformanceReport {
            model_version: MODEL_VERSION.to_string(),
            total_validations: self.validation_count,
            cities_tracked: self.history.len(),
            calibration_factors: self.calibration.clone(),
            bias_corrections: self.bias.clone(),
            target_accuracy: TARGET_ACCURACY,
            timestamp: now,
        }
    }

    /// The city's most recent `limit` validation accuracies, oldest first.
    pub fn accuracy_history(&self, city_id: &str, limit: usize, now: DateTime<Utc>) -> AccuracyHistoryResponse {
        let all = self.history.get(city_id).map(Vec::as_slice).unwrap_or_default();
        let history = all[all.len().saturating_sub(limit)..].to_vec();
        AccuracyHistoryResponse {
            city_id: city_id.to_string(),
            average: round_to(stats::mean(&history).unwrap_or(0.0), 2),
            samples: history.len(),
            accuracy_history: history,
            timestamp: now,
        }
    }
}

fn trend(accuracies: &[f64]) -> AccuracyTrend {
    let n = accuracies.len();
    if n < 5 {
        return AccuracyTrend::Stable;
    }
    let recent = stats::mean(&accuracies[n - 5..]).unwrap_or(0.0);
    let older_window = if n >= 10 { &accuracies[n - 10..n - 5] } else { &accuracies[..n - 5] };
    // Exactly five samples leaves nothing to compare against
    let Some(older) = stats::mean(older_window) else {
        return AccuracyTrend::Stable;
    };

    match recent - older {
        d if d > 2.0 => AccuracyTrend::Improving,
        d if d < -2.0 => AccuracyTrend::Declining,
        _ => AccuracyTrend::Stable,
    }
}

fn stability(accuracies: &[f64]) -> AccuracyStability {
    if accuracies.len() < 10 {
        return AccuracyStability::InsufficientData;
    }
    let std = stats::std_dev(&accuracies[accuracies.len().saturating_sub(20)..]).unwrap_or(0.0);
    if std < 2.0 {
        AccuracyStability::VeryStable
    } else if std < 5.0 {
        AccuracyStability::Stable
    } else if std < 10.0 {
        AccuracyStability::Moderate
    } else {
        AccuracyStability::Volatile
    }
}

fn status(accuracy: f64) -> AccuracyStatus {
    if accuracy >= TARGET_ACCURACY {
        AccuracyStatus::Excellent
    } else if accuracy >= MIN_ACCURACY {
        AccuracyStatus::Good
    } else if accuracy >= RETRAIN_THRESHOLD {
        AccuracyStatus::Acceptable
    } else {
        AccuracyStatus::NeedsAttention
    }
}
