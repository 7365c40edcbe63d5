pub mod accuracy;
pub mod ensemble;
pub mod error;
pub mod factors;
pub mod fusion;
pub mod history;
pub mod kalman;
pub mod models;
pub mod observation;
pub mod quality;
pub mod stats;
pub mod weights;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::PredictionData;
use tracing::warn;

use accuracy::AccuracyTracker;
use ensemble::EnsemblePredictor;
use error::Result;
use observation::Observation;
use quality::DataQualityChecker;
use weights::ModelKind;

/// The forecasting engine as a whole: the ensemble, its accuracy tracker and
/// the input quality checker, which all share per-city state.
#[derive(Debug)]
pub struct ForecastEngine {
    pub predictor: EnsemblePredictor,
    pub tracker: AccuracyTracker,
    pub quality: DataQualityChecker,
}

impl ForecastEngine {
    pub fn new(predictor: EnsemblePredictor, tracker: AccuracyTracker, quality: DataQualityChecker) -> Self {
        Self {
            predictor,
            tracker,
            quality,
        }
    }

    /// Forecast without touching the learning history.
    pub fn predict(&mut self, obs: &Observation, hours: u32, now: DateTime<Utc>) -> Result<PredictionData> {
        let report = self.quality.validate(obs);
        if !report.is_valid {
            warn!(city_id = %obs.city_id, issues = ?report.issues, "Low quality input data");
        }
        self.predictor.predict(obs, hours, now, report, &mut self.tracker)
    }

    /// Learn from the observation, then forecast from it.
    pub fn observe_and_predict(&mut self, obs: &Observation, hours: u32, now: DateTime<Utc>) -> Result<PredictionData> {
        self.predictor.add_history(obs);
        self.predict(obs, hours, now)
    }

    pub fn update_model_weights(&mut self, errors: &BTreeMap<ModelKind, f64>) {
        self.predictor.update_model_weights(errors);
    }
}

/// Returns the engine configured the way the service runs it.
///
/// `seed` drives the climatology noise so identical inputs give identical forecasts,
/// `total_cities` is what the accuracy report shows before any validation.
pub fn default_engine(seed: u64, total_cities: usize) -> ForecastEngine {
    ForecastEngine::new(
        EnsemblePredictor::with_seed(seed),
        AccuracyTracker::new(total_cities),
        DataQualityChecker::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::AccuracyStatus;

    fn observation(dust: f64, now: DateTime<Utc>) -> Observation {
        Observation {
            dust: Some(dust),
            humidity: Some(35.0),
            temperature: Some(39.0),
            wind_speed: Some(14.0),
            sources_used: 2,
            ..Observation::new("abu_dhabi", now)
        }
    }

    #[test]
    fn test_default_engine_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2024, 7, 10, 9, 0, 0).unwrap();
        let a = default_engine(11, 8).observe_and_predict(&observation(55.0, now), 48, now).unwrap();
        let b = default_engine(11, 8).observe_and_predict(&observation(55.0, now), 48, now).unwrap();
        assert_eq!(a.forecast_72h, b.forecast_72h);
        assert_eq!(a.accuracy_info.status, AccuracyStatus::Initializing);
        assert_eq!(a.data_quality.quality_score, 100.0);
    }

    #[test]
    fn test_predictions_can_be_validated() {
        let now = Utc.with_ymd_and_hms(2024, 7, 10, 9, 0, 0).unwrap();
        let mut engine = default_engine(5, 8);
        let forecast = engine.observe_and_predict(&observation(40.0, now), 24, now).unwrap();

        let readings: Vec<accuracy::ActualReading> = forecast
            .forecast_24h
            .iter()
            .map(|p| accuracy::ActualReading { timestamp: p.time, dust: p.dust })
            .collect();
        let report = engine.tracker.validate_predictions("abu_dhabi", &readings, now).unwrap();
        assert_eq!(report.matches, 24);
        assert!(report.accuracy > 99.0);

        let overall = engine.tracker.overall_accuracy(now);
        assert_eq!(overall.total_cities, 1);
        assert!(!overall.validation_pending);
    }
}
