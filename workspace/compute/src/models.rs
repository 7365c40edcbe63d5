//! Ensemble members.
//!
//! Six members forecast directly from the current observation and the city's
//! history; the meta member combines their outputs hour by hour.

pub mod api_forecast;
pub mod climatology;
pub mod meta_ensemble;
pub mod neural_pattern;
pub mod pattern;
pub mod persistence;
pub mod weather;

use chrono::{DateTime, Duration, Utc};

use crate::factors::CLIMATOLOGICAL_MEAN;
use crate::history::{HistoryPoint, LearnedPatterns};
use crate::observation::{Field, Observation};
use crate::weights::ModelKind;

pub use api_forecast::ApiForecastModel;
pub use climatology::ClimatologyModel;
pub use meta_ensemble::MetaEnsemble;
pub use neural_pattern::NeuralPatternModel;
pub use pattern::PatternModel;
pub use persistence::PersistenceModel;
pub use weather::WeatherModel;

/// Everything a member may look at when producing a forecast.
#[derive(Debug, Clone, Copy)]
pub struct ForecastContext<'a> {
    pub observation: &'a Observation,
    /// City history, oldest first
    pub history: &'a [&'a HistoryPoint],
    pub patterns: Option<&'a LearnedPatterns>,
    pub now: DateTime<Utc>,
    pub hours: usize,
}

impl ForecastContext<'_> {
    /// Current dust with missing or zero treated as the climatological mean.
    pub fn current_dust(&self) -> f64 {
        self.observation.value_or(Field::Dust, CLIMATOLOGICAL_MEAN)
    }

    pub fn time_at(&self, hour: usize) -> DateTime<Utc> {
        self.now + Duration::hours(hour as i64)
    }
}

/// A forecasting member of the ensemble.
pub trait ForecastModel: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> ModelKind;

    /// Hourly dust values for `ctx.hours` hours, all non-negative.
    fn forecast(&mut self, ctx: &ForecastContext<'_>) -> Vec<f64>;
}

/// Exponential relaxation of `current` toward the climatological mean.
pub(crate) fn decay_toward_mean(current: f64, rate: f64, hour: usize) -> f64 {
    let decay = rate.powi(hour as i32);
    current * decay + CLIMATOLOGICAL_MEAN * (1.0 - decay)
}

/// The six direct members in their canonical order.
pub fn default_members(seed: u64) -> Vec<Box<dyn ForecastModel>> {
    vec![
        Box::new(PatternModel),
        Box::new(WeatherModel),
        Box::new(PersistenceModel),
        Box::new(ClimatologyModel::with_seed(seed)),
        Box::new(ApiForecastModel),
        Box::new(NeuralPatternModel),
    ]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_toward_mean() {
        assert_eq!(decay_toward_mean(80.0, 0.98, 0), 80.0);
        let later = decay_toward_mean(80.0, 0.98, 500);
        assert!((later - CLIMATOLOGICAL_MEAN).abs() < 0.01);
    }

    #[test]
    fn test_default_members_cover_direct_models() {
        let members = default_members(7);
        let kinds: Vec<ModelKind> = members.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, ModelKind::ALL[..6].to_vec());
    }
}
