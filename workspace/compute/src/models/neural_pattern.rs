use chrono::Timelike;

use crate::models::{ForecastContext, ForecastModel, decay_toward_mean};
use crate::observation::Field;
use crate::weights::ModelKind;

/// Uses the city's learned hourly profile and wind sensitivity.
///
/// Without learned patterns this falls back to a plain decay toward the mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeuralPatternModel;

impl ForecastModel for NeuralPatternModel {
    fn kind(&self) -> ModelKind {
        ModelKind::NeuralPattern
    }

    fn forecast(&mut self, ctx: &ForecastContext<'_>) -> Vec<f64> {
        let dust = ctx.current_dust();

        let Some(patterns) = ctx.patterns else {
            return (0..ctx.hours)
                .map(|i| decay_toward_mean(dust, 0.97, i).max(0.0))
                .collect();
        };

        let wind_speed = ctx.observation.value_or(Field::WindSpeed, 10.0);
        let wind_effect = 1.0 + patterns.wind_correlation * (wind_speed - 15.0) / 50.0;

        (0..ctx.hours)
            .map(|i| {
                let hour_avg = patterns.hourly_average(ctx.time_at(i).hour());
                let blend = (1.0 - 0.015 * i as f64).max(0.3);
                ((dust * blend + hour_avg * (1.0 - blend)) * wind_effect).max(0.0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::LearnedPatterns;
    use crate::models::testing::{context, observation};
    use std::collections::BTreeMap;

    #[test]
    fn test_without_patterns_decays() {
        let obs = observation(Some(70.0));
        let values = NeuralPatternModel.forecast(&context(&obs, &[], 5));
        assert_eq!(values[0], 70.0);
        assert!((values[4] - decay_toward_mean(70.0, 0.97, 4)).abs() < 1e-9);
    }

    #[test]
    fn test_learned_profile_pulls_forecast() {
        let patterns = LearnedPatterns {
            hourly_averages: (0..24).map(|h| (h, 100.0)).collect::<BTreeMap<_, _>>(),
            wind_correlation: 0.5,
            baseline_dust: 100.0,
        };
        let mut obs = observation(Some(40.0));
        obs.wind_speed = Some(25.0);
        let mut ctx = context(&obs, &[], 72);
        ctx.patterns = Some(&patterns);

        let values = NeuralPatternModel.forecast(&ctx);
        let wind_effect = 1.0 + 0.5 * 10.0 / 50.0;
        assert!((values[0] - 40.0 * wind_effect).abs() < 1e-9);
        // Blend floor of 0.3 is reached by hour 47
        let expected = (40.0 * 0.3 + 100.0 * 0.7) * wind_effect;
        assert!((values[60] - expected).abs() < 1e-9);
    }
}
