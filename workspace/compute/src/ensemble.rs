//! The seven-member ensemble: weighted combination, Kalman smoothing of the
//! first day, calibration, confidence bands and risk period extraction.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use common::{
    AccuracyInfo, AccuracyMetrics, ConfidenceInterval, ForecastPoint, ForecastSummary, ModelBreakdown,
    PredictionData, QualityReport, RiskLevel, RiskPeriod, round_to,
};
use tracing::{debug, instrument, trace};

use crate::accuracy::{AccuracyTracker, ENSEMBLE_MODELS};
use crate::error::{ComputeError, Result};
use crate::history::HistoryStore;
use crate::kalman::KalmanFilter;
use crate::models::{self, ForecastContext, ForecastModel, MetaEnsemble};
use crate::observation::Observation;
use crate::stats;
use crate::weights::{AdaptiveWeightOptimizer, ModelKind, ModelWeights};

pub const MODEL_VERSION: &str = "6.0.0-ultra-accuracy";
pub const DEFAULT_HORIZON_HOURS: u32 = 72;
pub const MAX_HORIZON_HOURS: u32 = 120;
/// Hours smoothed by the per-city Kalman filter.
const KALMAN_HOURS: usize = 24;

/// Per-hour member outputs in `ModelKind::ALL` order.
type MemberValues = [f64; 7];

#[derive(Debug)]
pub struct EnsemblePredictor {
    members: Vec<Box<dyn ForecastModel>>,
    meta: MetaEnsemble,
    weights: ModelWeights,
    optimizer: AdaptiveWeightOptimizer,
    filters: HashMap<String, KalmanFilter>,
    history: HistoryStore,
}

impl EnsemblePredictor {
    pub fn new(members: Vec<Box<dyn ForecastModel>>) -> Self {
        Self {
            members,
            meta: MetaEnsemble,
            weights: ModelWeights::default(),
            optimizer: AdaptiveWeightOptimizer::default(),
            filters: HashMap::new(),
            history: HistoryStore::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(models::default_members(seed))
    }

    pub fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn add_history(&mut self, obs: &Observation) {
        self.history.add(obs);
    }

    /// Shift weight toward members with lower recent error.
    pub fn update_model_weights(&mut self, errors: &BTreeMap<ModelKind, f64>) {
        self.weights = self.optimizer.update_weights(&self.weights, errors).normalized();
        debug!(weights = ?self.weights.to_named_map(), "Updated ensemble weights");
    }

    fn member_series(&mut self, obs: &Observation, hours: usize, now: DateTime<Utc>) -> Vec<Vec<f64>> {
        let history = self.history.points(&obs.city_id);
        let ctx = ForecastContext {
            observation: obs,
            history: &history,
            patterns: self.history.patterns(&obs.city_id),
            now,
            hours,
        };

        let mut series: Vec<Vec<f64>> = self.members.iter_mut().map(|m| m.forecast(&ctx)).collect();
        let meta = self.meta.combine(&series, hours);
        series.push(meta);
        series
    }

    /// Forecast `hours` hours for the observation's city.
    ///
    /// Every produced point is recorded in `tracker` for later validation.
    #[instrument(skip(self, obs, quality, tracker), fields(city_id = %obs.city_id))]
    pub fn predict(
        &mut self,
        obs: &Observation,
        hours: u32,
        now: DateTime<Utc>,
        quality: QualityReport,
        tracker: &mut AccuracyTracker,
    ) -> Result<PredictionData> {
        if hours == 0 || hours > MAX_HORIZON_HOURS {
            return Err(ComputeError::InvalidHorizon(hours));
        }
        let hours = hours as usize;
        let city_id = obs.city_id.as_str();
        let has_patterns = self.history.patterns(city_id).is_some();

        let series = self.member_series(obs, hours, now);
        let weights: Vec<f64> = ModelKind::ALL.iter().map(|k| self.weights.get(*k)).collect();
        let filter = self.filters.entry(city_id.to_string()).or_default();

        let mut points = Vec::with_capacity(hours);
        for i in 0..hours {
            let mut values: MemberValues = [0.0; 7];
            for (slot, member) in values.iter_mut().zip(&series) {
                *slot = member.get(i).copied().unwrap_or(0.0);
            }

            let mut dust: f64 = values.iter().zip(&weights).map(|(v, w)| v * w).sum();
            if i < KALMAN_HOURS {
                dust = filter.update(dust);
            }
            dust = tracker.apply_calibration(city_id, dust);

            let mean = stats::mean(&values).unwrap_or(0.0);
            let std = stats::std_dev(&values).unwrap_or(0.0);
            let confidence = confidence(mean, std, i, quality.quality_score, has_patterns);

            let spread = (1.96 + i as f64 * 0.02) * std;
            let lower = (dust - spread).max(0.0);
            let upper = dust + spread;
            let dust = dust.max(0.0);
            let time = now + chrono::Duration::hours(i as i64);

            trace!(hour = i, dust, confidence, "Ensemble point");
            points.push(ForecastPoint {
                hour: i as u32,
                time,
                dust: round_to(dust, 2),
                confidence: round_to(confidence, 1),
                confidence_interval: ConfidenceInterval {
                    lower: round_to(lower, 2),
                    upper: round_to(upper, 2),
                },
                risk_level: RiskLevel::from_dust(dust),
                data_quality: quality.quality_level,
                model_breakdown: breakdown(&values),
                model_agreement: round_to(100.0 - std / (mean + 1.0) * 100.0, 1),
            });

            tracker.record_prediction(city_id, time, dust, confidence, now);
        }

        let summary = summarize(&points).ok_or_else(|| ComputeError::EmptyForecast(city_id.to_string()))?;
        let risk_periods = find_risk_periods(&points);
        let first_day: Vec<f64> = points.iter().take(24).map(|p| p.dust).collect();
        let agreement = match (stats::mean(&first_day), stats::std_dev(&first_day)) {
            (Some(mean), Some(std)) => round_to(100.0 - std / (mean + 0.001) * 100.0, 1),
            _ => 0.0,
        };
        let overall = tracker.overall_accuracy(now);

        debug!(
            hours,
            peak = summary.peak_dust,
            risk_periods = risk_periods.len(),
            "Generated ensemble forecast"
        );

        Ok(PredictionData {
            city_id: city_id.to_string(),
            generated_at: now,
            model_version: MODEL_VERSION.to_string(),
            accuracy_metrics: AccuracyMetrics {
                model_agreement: agreement,
                data_quality: quality.quality_score,
                sources_used: obs.sources_used.max(1),
                ensemble_models: ENSEMBLE_MODELS,
                kalman_filtered: true,
            },
            data_quality: quality,
            forecast_24h: points.iter().take(24).cloned().collect(),
            next_risk_period: risk_periods.first().cloned(),
            risk_periods,
            forecast_72h: points,
            summary,
            accuracy_info: AccuracyInfo {
                overall_accuracy: overall.overall_accuracy,
                status: overall.status,
                validation_pending: overall.validation_pending,
                models_active: ENSEMBLE_MODELS,
            },
            model_weights: self.weights.to_named_map(),
        })
    }
}

/// Blend of a fixed ensemble prior, member agreement, horizon decay, input quality and city familiarity.
fn confidence(mean: f64, std: f64, hour: usize, quality_score: f64, has_patterns: bool) -> f64 {
    let cv = std / (mean + 1.0);
    let agreement = (1.0 - cv * 0.3).max(0.65);
    let decay = (-(hour as f64) * 0.008).exp().max(0.5);
    let quality = (quality_score / 100.0).max(0.75);
    let city = if has_patterns { 0.92 } else { 0.90 };

    let raw = 100.0 * (0.92 * 0.35 + agreement * 0.25 + decay * 0.20 + quality * 0.10 + city * 0.10);
    raw.clamp(50.0, 98.0)
}

fn breakdown(values: &MemberValues) -> ModelBreakdown {
    ModelBreakdown {
        pattern: round_to(values[0], 2),
        weather: round_to(values[1], 2),
        persistence: round_to(values[2], 2),
        climatology: round_to(values[3], 2),
        api: round_to(values[4], 2),
        neural: round_to(values[5], 2),
        meta: round_to(values[6], 2),
    }
}

/// Maximal runs of points at or above the HIGH threshold.
pub fn find_risk_periods(points: &[ForecastPoint]) -> Vec<RiskPeriod> {
    let mut periods = Vec::new();
    let mut start: Option<usize> = None;

    for (i, point) in points.iter().enumerate() {
        let elevated = point.dust >= RiskLevel::HIGH_THRESHOLD;
        match (start, elevated) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                periods.push(risk_period(points, s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        periods.push(risk_period(points, s, points.len()));
    }
    periods
}

fn risk_period(points: &[ForecastPoint], start: usize, end: usize) -> RiskPeriod {
    let run = &points[start..end];
    let peak = run.iter().map(|p| p.dust).fold(f64::NEG_INFINITY, f64::max);
    let severity = RiskLevel::from_dust(peak);
    RiskPeriod {
        start_hour: start as u32,
        end_hour: end as u32,
        start_time: run[0].time,
        end_time: run[run.len() - 1].time,
        duration_hours: (end - start) as u32,
        peak_dust: round_to(peak, 2),
        severity,
        recommendation: severity.recommendation().to_string(),
    }
}

/// `None` for an empty forecast.
pub fn summarize(points: &[ForecastPoint]) -> Option<ForecastSummary> {
    let first = points.first()?;
    let peak = points
        .iter()
        .fold(first, |best, p| if p.dust > best.dust { p } else { best });
    let dust: Vec<f64> = points.iter().map(|p| p.dust).collect();
    let count_at_least = |threshold: f64| dust.iter().filter(|d| **d >= threshold).count();

    Some(ForecastSummary {
        peak_dust: round_to(peak.dust, 2),
        peak_hour: peak.hour,
        peak_time: peak.time,
        min_dust: round_to(dust.iter().copied().fold(f64::INFINITY, f64::min), 2),
        avg_dust: round_to(stats::mean(&dust)?, 2),
        hours_above_moderate: count_at_least(RiskLevel::MODERATE_THRESHOLD),
        hours_above_high: count_at_least(RiskLevel::HIGH_THRESHOLD),
        hours_above_severe: count_at_least(RiskLevel::SEVERE_THRESHOLD),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::DataQualityChecker;
    use chrono::TimeZone;
    use common::QualityLevel;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap()
    }

    fn observation(dust: f64) -> Observation {
        Observation {
            dust: Some(dust),
            pm10: Some(dust * 1.2),
            temperature: Some(38.0),
            humidity: Some(30.0),
            wind_speed: Some(18.0),
            wind_direction: Some(220.0),
            visibility: Some(6000.0),
            sources_used: 3,
            ..Observation::new("dubai", now())
        }
    }

    fn point(hour: u32, dust: f64) -> ForecastPoint {
        ForecastPoint {
            hour,
            time: now() + chrono::Duration::hours(hour as i64),
            dust,
            confidence: 90.0,
            confidence_interval: ConfidenceInterval { lower: dust, upper: dust },
            risk_level: RiskLevel::from_dust(dust),
            data_quality: QualityLevel::Good,
            model_breakdown: ModelBreakdown::default(),
            model_agreement: 90.0,
        }
    }

    fn predict(predictor: &mut EnsemblePredictor, tracker: &mut AccuracyTracker, dust: f64, hours: u32) -> Result<PredictionData> {
        let obs = observation(dust);
        let quality = DataQualityChecker::new().validate(&obs);
        predictor.predict(&obs, hours, now(), quality, tracker)
    }

    #[test]
    fn test_forecast_shape() {
        let mut predictor = EnsemblePredictor::with_seed(42);
        let mut tracker = AccuracyTracker::new(8);
        let data = predict(&mut predictor, &mut tracker, 45.0, 72).unwrap();

        assert_eq!(data.forecast_72h.len(), 72);
        assert_eq!(data.forecast_24h.len(), 24);
        assert_eq!(data.model_version, MODEL_VERSION);
        assert_eq!(data.model_weights.len(), 7);
        assert_eq!(data.accuracy_info.models_active, 7);
        assert_eq!(data.accuracy_metrics.sources_used, 3);
        assert!(data.accuracy_metrics.kalman_filtered);

        for (i, p) in data.forecast_72h.iter().enumerate() {
            assert_eq!(p.hour as usize, i);
            assert_eq!(p.time, now() + chrono::Duration::hours(i as i64));
            assert!(p.dust >= 0.0);
            assert!((50.0..=98.0).contains(&p.confidence));
            assert!(p.confidence_interval.lower <= p.dust && p.dust <= p.confidence_interval.upper);
            assert_eq!(p.risk_level, RiskLevel::from_dust(p.dust));
        }
        // Kalman filter starts at the first ensemble value
        assert!(data.forecast_72h[0].dust > 0.0);
        assert_eq!(tracker.buffered("dubai"), 72);
    }

    #[test]
    fn test_invalid_horizon() {
        let mut predictor = EnsemblePredictor::with_seed(1);
        let mut tracker = AccuracyTracker::new(8);
        assert_eq!(
            predict(&mut predictor, &mut tracker, 30.0, 0),
            Err(ComputeError::InvalidHorizon(0))
        );
        assert_eq!(
            predict(&mut predictor, &mut tracker, 30.0, 121),
            Err(ComputeError::InvalidHorizon(121))
        );
        assert!(predict(&mut predictor, &mut tracker, 30.0, 120).is_ok());
    }

    #[test]
    fn test_single_hour_forecast_has_summary() {
        let mut predictor = EnsemblePredictor::with_seed(4);
        let mut tracker = AccuracyTracker::new(8);
        let data = predict(&mut predictor, &mut tracker, 45.0, 1).unwrap();

        assert_eq!(data.forecast_72h.len(), 1);
        assert_eq!(data.summary.peak_hour, 0);
        assert_eq!(data.summary.peak_dust, data.forecast_72h[0].dust);
        assert_eq!(
            ComputeError::EmptyForecast("dubai".to_string()).to_string(),
            "Ensemble produced an empty forecast for city: dubai"
        );
    }

    #[test]
    fn test_confidence_bounds() {
        // Perfect agreement, fresh forecast, perfect data
        let best = confidence(40.0, 0.0, 0, 100.0, true);
        assert!((best - 100.0 * (0.322 + 0.25 + 0.2 + 0.1 + 0.092)).abs() < 1e-9);
        let worst = confidence(10.0, 100.0, 200, 0.0, false);
        assert!((50.0..=98.0).contains(&worst));
        assert!(worst < best);
    }

    #[test]
    fn test_risk_periods() {
        let dust = [10.0, 60.0, 120.0, 55.0, 30.0, 70.0, 80.0];
        let points: Vec<ForecastPoint> = dust.iter().enumerate().map(|(i, d)| point(i as u32, *d)).collect();
        let periods = find_risk_periods(&points);

        assert_eq!(periods.len(), 2);
        assert_eq!((periods[0].start_hour, periods[0].end_hour), (1, 4));
        assert_eq!(periods[0].duration_hours, 3);
        assert_eq!(periods[0].peak_dust, 120.0);
        assert_eq!(periods[0].severity, RiskLevel::Severe);
        assert_eq!(periods[0].end_time, points[3].time);
        // Open run is closed at the end of the forecast
        assert_eq!((periods[1].start_hour, periods[1].end_hour), (5, 7));
        assert_eq!(periods[1].severity, RiskLevel::High);

        assert!(find_risk_periods(&points[..1]).is_empty());
    }

    #[test]
    fn test_summary() {
        let dust = [10.0, 60.0, 120.0, 120.0, 30.0];
        let points: Vec<ForecastPoint> = dust.iter().enumerate().map(|(i, d)| point(i as u32, *d)).collect();
        let summary = summarize(&points).unwrap();

        assert_eq!(summary.peak_dust, 120.0);
        // First maximum wins
        assert_eq!(summary.peak_hour, 2);
        assert_eq!(summary.min_dust, 10.0);
        assert_eq!(summary.avg_dust, 68.0);
        assert_eq!(summary.hours_above_moderate, 4);
        assert_eq!(summary.hours_above_high, 3);
        assert_eq!(summary.hours_above_severe, 2);
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_update_model_weights_keeps_all_members() {
        let mut predictor = EnsemblePredictor::with_seed(3);
        let errors = BTreeMap::from([(ModelKind::Persistence, 1.0)]);
        predictor.update_model_weights(&errors);
        assert!((predictor.weights().total() - 1.0).abs() < 1e-9);
        assert!(predictor.weights().get(ModelKind::Persistence) > 0.15);
    }
}
